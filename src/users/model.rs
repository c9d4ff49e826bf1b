use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::password::Credential;

/// User record as returned to clients. The credential and version never
/// leave the server.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub telegram: String,
    pub discord: String,
    pub email: String,
    pub skills: Vec<String>,
    #[serde(skip)]
    pub password: Credential,
    pub profile_image: String,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl User {
    /// A not-yet-persisted, unactivated user.
    pub fn new(
        name: String,
        username: String,
        email: String,
        password: Credential,
        profile_image: String,
    ) -> Self {
        Self {
            id: 0,
            created_at: OffsetDateTime::now_utc(),
            name,
            surname: String::new(),
            username,
            telegram: String::new(),
            discord: String::new(),
            email,
            skills: Vec::new(),
            password,
            profile_image,
            activated: false,
            version: 1,
        }
    }
}

pub(crate) const USER_COLUMNS: &str = "id, created_at, name, surname, username, telegram, \
     discord, email, skills, password_hash, profile_image, activated, version";

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub name: String,
    pub surname: String,
    pub username: String,
    pub telegram: String,
    pub discord: String,
    pub email: String,
    pub skills: Vec<String>,
    pub password_hash: String,
    pub profile_image: String,
    pub activated: bool,
    pub version: i32,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            created_at: r.created_at,
            name: r.name,
            surname: r.surname,
            username: r.username,
            telegram: r.telegram,
            discord: r.discord,
            email: r.email,
            skills: r.skills,
            password: Credential::from_hash(r.password_hash),
            profile_image: r.profile_image,
            activated: r.activated,
            version: r.version,
        }
    }
}

/// Optional predicates for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub name: String,
    pub username: String,
    pub skills: Vec<String>,
}

pub const USER_SORT_SAFELIST: &[&str] = &[
    "id",
    "name",
    "username",
    "created_at",
    "-id",
    "-name",
    "-username",
    "-created_at",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_omits_credential_and_version() {
        let user = User::new(
            "Ann".into(),
            "ann".into(),
            "a@x.com".into(),
            Credential::from_hash("$argon2id$fake".into()),
            "https://img/default.png".into(),
        );
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["activated"], false);
        assert_eq!(json["profileImage"], "https://img/default.png");
        assert!(json.get("password").is_none());
        assert!(json.get("version").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}
