use payloads::{Role, requests};
use reqwest::StatusCode;

use test_helpers::{
    alice_credentials, assert_status_code, bob_credentials, spawn_app,
};

#[tokio::test]
async fn create_account_and_login() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.client.create_account(&alice_credentials()).await?;
    assert!(!app.client.login_check().await?);

    app.client
        .login(&test_helpers::alice_login_credentials())
        .await?;
    assert!(app.client.login_check().await?);

    app.client.logout().await?;
    assert!(!app.client.login_check().await?);

    Ok(())
}

#[tokio::test]
async fn login_with_wrong_password_fails() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.client.create_account(&alice_credentials()).await?;

    let result = app
        .client
        .login(&requests::LoginCredentials {
            username: "alice".into(),
            password: "not-the-password".into(),
        })
        .await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn invalid_username_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app
        .client
        .create_account(&requests::CreateAccount {
            username: "1nvalid".into(),
            password: "password123".into(),
        })
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn duplicate_username_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.client.create_account(&alice_credentials()).await?;

    let result = app.client.create_account(&alice_credentials()).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn user_profile_reflects_role() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_admin().await?;

    let profile = app.client.user_profile().await?;
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.role, Role::Admin);

    app.client.create_account(&bob_credentials()).await?;
    app.login_bob().await?;
    let profile = app.client.user_profile().await?;
    assert_eq!(profile.role, Role::Employee);

    Ok(())
}
