pub mod collect;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod harvester;
pub mod identity;
pub mod job;
pub mod persist;
pub mod place;
pub mod review;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod surface;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use collect::{CollectionPath, Collected, WarmStop};
pub use config::HarvestConfig;
pub use error::{HarvestError, Result};
pub use fingerprint::Fingerprint;
pub use harvester::{HarvestOutcome, Harvester};
pub use identity::ExistingIdentitySet;
pub use job::{JobRequest, JobResponse};
pub use persist::{CommitReport, Persistence, SinkOutcome};
pub use place::PlaceId;
pub use review::Review;
pub use session::{ContentSession, SessionFactory, WebDriverSessionFactory};
pub use store::{FlatSink, FsFlatSink, PgReviewStore, StructuredSink};
pub use surface::{ReviewSurface, SessionSurface};
