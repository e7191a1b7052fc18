// Postgres sink: one insert-only table per place.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::StructuredSink;
use crate::error::Result;
use crate::place::PlaceId;
use crate::review::Review;

/// Column layout of a place table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSet {
    /// `name, rating, time_ago, comment`, created by this crate.
    Current,
    /// `nome, nota, tempo, comentario`, created by the earlier collector.
    Legacy,
}

impl ColumnSet {
    /// Pick the layout matching a table's existing columns.
    pub fn detect<S: AsRef<str>>(existing: &[S]) -> Self {
        let has = |col: &str| existing.iter().any(|c| c.as_ref() == col);
        if has("nome") && !has("name") {
            ColumnSet::Legacy
        } else {
            ColumnSet::Current
        }
    }

    /// Column list for INSERT, in name, rating, time, comment order.
    pub fn insert_columns(self) -> &'static str {
        match self {
            ColumnSet::Current => "name, rating, time_ago, comment",
            ColumnSet::Legacy => "nome, nota, tempo, comentario",
        }
    }
}

/// Rows per INSERT statement. Four binds per row keeps this well under
/// Postgres' 65535 bind-parameter limit.
const INSERT_CHUNK: usize = 1000;

pub struct PgReviewStore {
    pool: PgPool,
}

impl PgReviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool without connecting. Connection errors surface on first
    /// use, so a database outage only fails the structured sink.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl StructuredSink for PgReviewStore {
    /// Creates the table if missing. An existing table keeps its layout,
    /// including the legacy Portuguese column names.
    async fn ensure_container(&self, place: &PlaceId) -> Result<()> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                rating TEXT NOT NULL,
                time_ago TEXT NOT NULL,
                comment TEXT
            )
            "#,
            quote_ident(place.as_str())
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn append_rows(&self, place: &PlaceId, rows: &[Review]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1",
        )
        .bind(place.as_str())
        .fetch_all(&mut *tx)
        .await?;
        let columns = ColumnSet::detect(existing.as_slice());
        if columns == ColumnSet::Legacy {
            debug!(place = %place, "Writing to legacy column layout");
        }

        let mut written = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                quote_ident(place.as_str()),
                columns.insert_columns()
            ));
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.name.clone())
                    .push_bind(r.rating.clone())
                    .push_bind(r.time_ago.clone())
                    .push_bind(r.comment.clone());
            });
            written += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(written)
    }
}

/// Double-quote an identifier for interpolation into SQL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
