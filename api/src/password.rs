use crate::store::{self, StoreError};
use crate::telemetry::spawn_blocking_with_tracing;
use anyhow::Context;
use argon2::password_hash::SaltString;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use secrecy::{ExposeSecret, SecretBox};
use sqlx::PgPool;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials(#[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

#[derive(serde::Deserialize)]
pub struct Credentials {
    pub username: String,
    password: SecretBox<String>,
}

#[derive(serde::Deserialize)]
pub struct NewUserDetails {
    pub username: String,
    pub password: SecretBox<String>,
}

#[tracing::instrument(name = "Validate credentials", skip(credentials, pool))]
pub async fn validate_credentials(
    credentials: Credentials,
    pool: &PgPool,
) -> Result<payloads::UserId, AuthError> {
    let mut user_id = None;
    // fallback password hash to prevent timing differences
    let mut expected_password_hash = SecretBox::new(Box::new(
        "$argon2id$v=19$m=15000,t=2,p=1$\
        gZiV/M1gPc22ElAH/Jh1Hw$\
        CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno"
            .to_string(),
    ));

    if let Some((stored_user_id, stored_password_hash)) =
        get_stored_credentials(&credentials.username, pool).await?
    {
        user_id = Some(stored_user_id);
        expected_password_hash = stored_password_hash;
    }

    spawn_blocking_with_tracing(move || {
        verify_password_hash(expected_password_hash, credentials.password)
    })
    .await
    .context("Failed to spawn blocking task.")??;

    user_id
        .ok_or_else(|| anyhow::anyhow!("Unknown username."))
        .map_err(AuthError::InvalidCredentials)
}

#[tracing::instrument(name = "Get stored credentials", skip(username, pool))]
async fn get_stored_credentials(
    username: &str,
    pool: &PgPool,
) -> Result<Option<(payloads::UserId, SecretBox<String>)>, anyhow::Error> {
    let user = sqlx::query_as::<_, store::User>(
        r#"SELECT * FROM users WHERE username = $1;"#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("Failed to performed a query to retrieve stored credentials.")?
    .map(|user| (user.id, SecretBox::new(Box::new(user.password_hash))));
    Ok(user)
}

#[tracing::instrument(
    name = "Verify password hash",
    skip(expected_password_hash, password_candidate)
)]
fn verify_password_hash(
    expected_password_hash: SecretBox<String>,
    password_candidate: SecretBox<String>,
) -> Result<(), AuthError> {
    let expected_password_hash =
        PasswordHash::new(expected_password_hash.expose_secret())
            .context("Failed to parse hash in PHC string format.")?;

    Argon2::default()
        .verify_password(
            password_candidate.expose_secret().as_bytes(),
            &expected_password_hash,
        )
        .context("Invalid password.")
        .map_err(AuthError::InvalidCredentials)
}

/// Create a user with an argon2id password hash. New accounts start
/// with the employee role; elevation is an administrative action.
#[tracing::instrument(name = "Create user", skip(details, pool))]
pub async fn create_user(
    details: NewUserDetails,
    pool: &PgPool,
) -> Result<payloads::UserId, StoreError> {
    let NewUserDetails { username, password } = details;

    let validation = payloads::requests::validate_username(&username);
    if let Some(message) = validation.error_message() {
        return Err(StoreError::InvalidUsername {
            message: message.to_string(),
        });
    }

    let password_hash =
        spawn_blocking_with_tracing(move || compute_password_hash(password))
            .await
            .context("Failed to spawn blocking task.")?
            .context("Failed to hash password")?;

    store::create_user(&username, &password_hash, pool).await
}

fn compute_password_hash(
    password: SecretBox<String>,
) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut rand_core::OsRng);
    let password_hash = Argon2::new(
        Algorithm::Argon2id,
        Version::V0x13,
        Params::new(15000, 2, 1, None).unwrap(),
    )
    .hash_password(password.expose_secret().as_bytes(), &salt)?
    .to_string();
    Ok(password_hash)
}
