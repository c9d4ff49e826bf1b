use serde::Serialize;

use super::model::User;
use crate::filters::Metadata;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub metadata: Metadata,
}
