//! Master data management: parties, heads, payment types, and payment
//! modes. Creation requires a valid session; payment modes additionally
//! require an approver because they carry live balances.

use actix_identity::Identity;
use actix_web::{HttpResponse, get, post, web};
use payloads::requests;
use sqlx::PgPool;

use crate::store;

use super::{APIError, get_user_id, get_validated_actor};

#[tracing::instrument(skip(user, pool), ret)]
#[post("/create_party")]
pub async fn create_party(
    user: Identity,
    details: web::Json<requests::CreateParty>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let party = store::create_party(&details.name, &pool).await?;
    Ok(HttpResponse::Ok().json(party))
}

#[tracing::instrument(skip(user, pool))]
#[get("/parties")]
pub async fn list_parties(
    user: Identity,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let parties = store::list_parties(&pool).await?;
    Ok(HttpResponse::Ok().json(parties))
}

#[tracing::instrument(skip(user, pool), ret)]
#[post("/create_head")]
pub async fn create_head(
    user: Identity,
    details: web::Json<requests::CreateHead>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let head = store::create_head(&details.name, &pool).await?;
    Ok(HttpResponse::Ok().json(head))
}

#[tracing::instrument(skip(user, pool))]
#[get("/heads")]
pub async fn list_heads(
    user: Identity,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let heads = store::list_heads(&pool).await?;
    Ok(HttpResponse::Ok().json(heads))
}

#[tracing::instrument(skip(user, pool), ret)]
#[post("/create_payment_type")]
pub async fn create_payment_type(
    user: Identity,
    details: web::Json<requests::CreatePaymentType>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let payment_type = store::create_payment_type(&details, &pool).await?;
    Ok(HttpResponse::Ok().json(payment_type))
}

#[tracing::instrument(skip(user, pool))]
#[get("/payment_types")]
pub async fn list_payment_types(
    user: Identity,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let payment_types = store::list_payment_types(&pool).await?;
    Ok(HttpResponse::Ok().json(payment_types))
}

#[tracing::instrument(skip(user, pool), ret)]
#[post("/create_payment_mode")]
pub async fn create_payment_mode(
    user: Identity,
    details: web::Json<requests::CreatePaymentMode>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let payment_mode =
        store::create_payment_mode(&actor, &details.name, &pool).await?;
    Ok(HttpResponse::Ok().json(payment_mode))
}

#[tracing::instrument(skip(user, pool))]
#[get("/payment_modes")]
pub async fn list_payment_modes(
    user: Identity,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let payment_modes = store::list_payment_modes(&pool).await?;
    Ok(HttpResponse::Ok().json(payment_modes))
}
