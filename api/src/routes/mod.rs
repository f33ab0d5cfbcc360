pub mod ledger;
pub mod login;
pub mod master_data;

use actix_identity::Identity;
use actix_web::{
    HttpResponse, Responder, ResponseError, body::BoxBody,
    dev::HttpServiceFactory, get, web,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{self, StoreError};

pub fn api_services() -> impl HttpServiceFactory {
    web::scope("/api")
        .service(health_check)
        .service(login::login)
        .service(login::login_check)
        .service(login::logout)
        .service(login::create_account)
        .service(login::user_profile)
        .service(master_data::create_party)
        .service(master_data::list_parties)
        .service(master_data::create_head)
        .service(master_data::list_heads)
        .service(master_data::create_payment_type)
        .service(master_data::list_payment_types)
        .service(master_data::create_payment_mode)
        .service(master_data::list_payment_modes)
        .service(ledger::create_entry)
        .service(ledger::get_entry)
        .service(ledger::list_entries)
        .service(ledger::decide_entry)
        .service(ledger::bulk_decide)
        .service(ledger::undo_decision)
        .service(ledger::request_edit)
        .service(ledger::approve_edit)
        .service(ledger::reject_edit)
        .service(ledger::delete_entry)
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

/// Public API errors. Only the top-level message is sent.
#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Authentication failed")]
    AuthError(#[source] anyhow::Error),
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Not found")]
    NotFound(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::AuthError(e) => {
                HttpResponse::Unauthorized().body(format!("{self}: {e}"))
            }
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::NotFound(e) => {
                HttpResponse::NotFound().body(format!("{self}: {e}"))
            }
            Self::UnexpectedError(_) => {
                HttpResponse::InternalServerError().body(self.to_string())
            }
        }
    }
}

impl From<StoreError> for APIError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(_) => APIError::UnexpectedError(e.into()),
            StoreError::UnexpectedError(_) => {
                APIError::UnexpectedError(e.into())
            }
            StoreError::RequiresApproverPermissions => {
                APIError::AuthError(e.into())
            }
            StoreError::UserNotFound => APIError::NotFound(e.into()),
            StoreError::EntryNotFound => APIError::NotFound(e.into()),
            StoreError::PartyNotFound => APIError::NotFound(e.into()),
            StoreError::HeadNotFound => APIError::NotFound(e.into()),
            StoreError::PaymentTypeNotFound => APIError::NotFound(e.into()),
            StoreError::PaymentModeNotFound => APIError::NotFound(e.into()),
            _ => APIError::BadRequest(e.into()),
        }
    }
}

fn get_user_id(user: &Identity) -> Result<payloads::UserId, APIError> {
    let id_str = user.id().map_err(|e| {
        APIError::AuthError(
            anyhow::Error::from(e).context("Invalid login session"),
        )
    })?;
    // special case: since this is used in so many routes, the user_id is
    // recorded here, but attaches to the span for the api route itself
    tracing::Span::current()
        .record("user_id", tracing::field::display(&id_str));
    Ok(payloads::UserId(
        Uuid::parse_str(&id_str).map_err(anyhow::Error::from)?,
    ))
}

/// Resolve the logged-in identity to a user row; a session naming a
/// user that no longer exists fails authentication, not lookup.
async fn get_validated_actor(
    user: &Identity,
    pool: &PgPool,
) -> Result<store::ValidatedActor, APIError> {
    let user_id = get_user_id(user)?;
    match store::get_validated_actor(&user_id, pool).await {
        Ok(actor) => Ok(actor),
        Err(e @ StoreError::UserNotFound) => Err(APIError::AuthError(
            anyhow::Error::from(e).context("Couldn't validate the actor"),
        )),
        Err(e) => Err(APIError::UnexpectedError(e.into())),
    }
}
