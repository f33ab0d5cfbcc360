//! Ledger entry routes: creation, retrieval, listing, decisions, the
//! edit-request workflow, and soft deletion.

use actix_identity::Identity;
use actix_web::{HttpResponse, post, web};
use payloads::{EntryId, requests};
use sqlx::PgPool;

use crate::store;
use crate::time::TimeSource;

use super::{APIError, get_user_id, get_validated_actor};

#[tracing::instrument(skip(user, pool, time_source))]
#[post("/create_entry")]
pub async fn create_entry(
    user: Identity,
    details: web::Json<requests::CreateEntry>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let entry =
        store::ledger::create_entry(&actor, &details, &time_source, &pool)
            .await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[tracing::instrument(skip(user, pool))]
#[post("/get_entry")]
pub async fn get_entry(
    user: Identity,
    entry_id: web::Json<EntryId>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let entry = store::ledger::get_entry(&entry_id, &pool).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[tracing::instrument(skip(user, pool))]
#[post("/list_entries")]
pub async fn list_entries(
    user: Identity,
    filter: web::Json<requests::ListEntries>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, APIError> {
    get_user_id(&user)?;
    let entries = store::ledger::list_entries(&filter, &pool).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[tracing::instrument(skip(user, pool, time_source))]
#[post("/decide_entry")]
pub async fn decide_entry(
    user: Identity,
    details: web::Json<requests::DecideEntry>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let entry = match details.action {
        requests::DecisionAction::Approve => {
            store::approval::approve_entry(
                &actor,
                &details.entry_id,
                &time_source,
                &pool,
            )
            .await?
        }
        requests::DecisionAction::Reject => {
            store::approval::reject_entry(
                &actor,
                &details.entry_id,
                details.rejection_reason.as_deref(),
                &time_source,
                &pool,
            )
            .await?
        }
    };
    Ok(HttpResponse::Ok().json(entry))
}

#[tracing::instrument(skip(user, pool, time_source))]
#[post("/bulk_decide")]
pub async fn bulk_decide(
    user: Identity,
    details: web::Json<requests::BulkDecide>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let result =
        store::approval::bulk_decide(&actor, &details, &time_source, &pool)
            .await?;
    Ok(HttpResponse::Ok().json(result))
}

#[tracing::instrument(skip(user, pool, time_source))]
#[post("/undo_decision")]
pub async fn undo_decision(
    user: Identity,
    details: web::Json<requests::UndoDecision>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let entry = store::approval::undo_decision(
        &actor,
        &details.entry_id,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[tracing::instrument(skip(user, pool, time_source))]
#[post("/request_edit")]
pub async fn request_edit(
    user: Identity,
    details: web::Json<requests::RequestEdit>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let entry = store::edit_request::request_edit(
        &actor,
        &details,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[tracing::instrument(skip(user, pool, time_source))]
#[post("/approve_edit")]
pub async fn approve_edit(
    user: Identity,
    details: web::Json<requests::ApproveEdit>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let entry = store::edit_request::approve_edit(
        &actor,
        &details,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[tracing::instrument(skip(user, pool, time_source))]
#[post("/reject_edit")]
pub async fn reject_edit(
    user: Identity,
    details: web::Json<requests::RejectEdit>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let entry = store::edit_request::reject_edit(
        &actor,
        &details,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[tracing::instrument(skip(user, pool, time_source))]
#[post("/delete_entry")]
pub async fn delete_entry(
    user: Identity,
    details: web::Json<requests::DeleteEntry>,
    pool: web::Data<PgPool>,
    time_source: web::Data<TimeSource>,
) -> Result<HttpResponse, APIError> {
    let actor = get_validated_actor(&user, &pool).await?;
    let entry = store::ledger::delete_entry(
        &actor,
        &details,
        &time_source,
        &pool,
    )
    .await?;
    Ok(HttpResponse::Ok().json(entry))
}
