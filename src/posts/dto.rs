use serde::{Deserialize, Serialize};

use super::model::Post;
use crate::filters::Metadata;

/// Request body for POST /posts.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePostRequest {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub skills: Vec<String>,
}

/// Request body for PATCH /posts/:id; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePostRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub skills: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub post: Post,
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<Post>,
    pub metadata: Metadata,
}
