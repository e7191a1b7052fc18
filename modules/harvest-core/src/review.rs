use serde::{Deserialize, Deserializer, Serialize};

/// One review as captured from the listing.
///
/// Absent fields are empty strings, never missing: a review without a
/// comment serializes as `"comment": ""`. Older snapshots used Portuguese
/// field names, which are still accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    #[serde(alias = "nome", default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(alias = "nota", default, deserialize_with = "null_as_empty")]
    pub rating: String,
    #[serde(alias = "tempo", default, deserialize_with = "null_as_empty")]
    pub time_ago: String,
    #[serde(alias = "comentario", default, deserialize_with = "null_as_empty")]
    pub comment: String,
}

impl Review {
    pub fn new(
        name: impl Into<String>,
        rating: impl Into<String>,
        time_ago: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            rating: rating.into(),
            time_ago: time_ago.into(),
            comment: comment.into(),
        }
    }

    pub fn has_comment(&self) -> bool {
        !self.comment.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
