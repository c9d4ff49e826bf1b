use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub description: String,
    pub author_id: i64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub skills: Vec<String>,
    #[serde(skip)]
    pub version: i32,
}

/// Fields supplied when creating a post; everything else is server-assigned.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub name: String,
    pub description: String,
    pub author_id: i64,
    pub kind: String,
    pub skills: Vec<String>,
}

/// The client-settable fields of a post.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub name: String,
    pub description: String,
    pub kind: String,
    pub skills: Vec<String>,
}

/// Optional predicates for listing posts. Empty values impose no constraint.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub name: String,
    pub description: String,
    pub author_id: Option<i64>,
    pub kind: String,
    pub skills: Vec<String>,
}

pub const POST_SORT_SAFELIST: &[&str] = &["name", "created_at", "-name", "-created_at"];

pub(crate) const POST_COLUMNS: &str =
    "id, created_at, name, description, author_id, type, skills, version";
