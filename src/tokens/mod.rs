pub mod model;
pub mod repo;

pub use model::{generate_token, hash_plaintext, Scope, Token, TOKEN_PLAINTEXT_LEN};
pub use repo::{PgTokenStore, TokenStore};

use tracing::{debug, error};

use crate::{
    error::{AppError, StoreError},
    users::{model::User, repo::UserStore},
    validator::Validator,
};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("entropy source failed: {0}")]
    Randomness(rand::Error),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Randomness(e) => AppError::Internal(anyhow::anyhow!(e.to_string())),
            TokenError::Persistence(e) => AppError::Store(e),
        }
    }
}

/// Generates and persists a token. The returned value is the only place the
/// plaintext ever exists.
pub async fn issue(
    store: &dyn TokenStore,
    user_id: i64,
    ttl: time::Duration,
    scope: Scope,
) -> Result<Token, TokenError> {
    let token = generate_token(user_id, ttl, scope).map_err(|e| {
        error!(error = %e, "token randomness failed");
        TokenError::Randomness(e)
    })?;
    store.insert(&token).await?;
    debug!(user_id, %scope, "token issued");
    Ok(token)
}

/// Resolves the owner of an unexpired `scope` token. Unknown and expired
/// tokens both yield [`StoreError::NotFound`].
pub async fn lookup_user(
    users: &dyn UserStore,
    scope: Scope,
    plaintext: &str,
) -> Result<User, StoreError> {
    users.get_for_token(scope, &hash_plaintext(plaintext)).await
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.chars().count() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::Credential, memory::MemoryStore};

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::default();
        let user = UserStore::insert(
            &store,
            &User::new(
                "Ann".into(),
                "ann".into(),
                "a@x.com".into(),
                Credential::from_hash("$argon2id$fake".into()),
                String::new(),
            ),
        )
        .await
        .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn issued_token_resolves_to_its_user() {
        let (store, user) = seeded().await;
        let token = issue(&store, user.id, time::Duration::hours(1), Scope::Activation)
            .await
            .unwrap();

        let found = lookup_user(&store, Scope::Activation, &token.plaintext)
            .await
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn scope_must_match() {
        let (store, user) = seeded().await;
        let token = issue(&store, user.id, time::Duration::hours(1), Scope::Activation)
            .await
            .unwrap();

        let res = lookup_user(&store, Scope::PasswordReset, &token.plaintext).await;
        assert!(matches!(res, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn expired_token_is_not_found() {
        let (store, user) = seeded().await;
        let token = issue(
            &store,
            user.id,
            time::Duration::seconds(-1),
            Scope::PasswordReset,
        )
        .await
        .unwrap();

        let res = lookup_user(&store, Scope::PasswordReset, &token.plaintext).await;
        assert!(matches!(res, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn delete_all_for_user_is_idempotent() {
        let (store, user) = seeded().await;
        let token = issue(&store, user.id, time::Duration::hours(1), Scope::Activation)
            .await
            .unwrap();

        store.delete_all_for_user(Scope::Activation, user.id).await.unwrap();
        store.delete_all_for_user(Scope::Activation, user.id).await.unwrap();

        let res = lookup_user(&store, Scope::Activation, &token.plaintext).await;
        assert!(matches!(res, Err(StoreError::NotFound)));
    }

    #[test]
    fn token_plaintext_shape() {
        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "");
        assert_eq!(v.error("token"), Some("must be provided"));

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "TOOSHORT");
        assert_eq!(v.error("token"), Some("must be 26 bytes long"));

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, "ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert!(v.valid());
    }
}
