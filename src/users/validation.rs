use crate::validator::{matches, Validator, EMAIL_RX};

use super::model::User;

pub const MAX_FIELD_BYTES: usize = 500;
pub const MIN_PASSWORD_BYTES: usize = 8;
pub const MAX_PASSWORD_BYTES: usize = 72;

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_username(v: &mut Validator, username: &str) {
    v.check(!username.is_empty(), "username", "must be provided");
    v.check(
        username.len() <= MAX_FIELD_BYTES,
        "username",
        "must not be more than 500 bytes long",
    );
}

pub fn validate_password_plaintext(v: &mut Validator, key: &str, password: &str) {
    v.check(!password.is_empty(), key, "must be provided");
    v.check(
        password.len() >= MIN_PASSWORD_BYTES,
        key,
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_BYTES,
        key,
        "must not be more than 72 bytes long",
    );
}

fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= MAX_FIELD_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
}

/// Checks registration input before any hashing happens.
pub fn validate_registration(
    v: &mut Validator,
    name: &str,
    username: &str,
    email: &str,
    password: &str,
) {
    validate_name(v, name);
    validate_username(v, username);
    validate_email(v, email);
    validate_password_plaintext(v, "password", password);
}

/// Validates a user about to be inserted.
///
/// # Panics
///
/// If the credential hash is empty. That means the caller never set a
/// password, which is a bug rather than bad input.
pub fn validate_user(v: &mut Validator, user: &User) {
    validate_name(v, &user.name);
    validate_username(v, &user.username);
    validate_email(v, &user.email);

    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(v, "password", plaintext);
    }

    assert!(
        !user.password.hash().is_empty(),
        "missing password hash for user"
    );
}

/// Validates the editable profile fields.
pub fn validate_profile(v: &mut Validator, user: &User) {
    validate_name(v, &user.name);
    validate_username(v, &user.username);
}
