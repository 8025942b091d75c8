//! Requests and the memberships they grant.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use gymhub_infra::Services;
use gymhub_infra::services::RequestListing;
use gymhub_ledger::MembershipChanges;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::context::ActorContext;

pub async fn create_request(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<dto::CreateRequestRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let saved = services.ledger.create_request(ctx.actor(), body.into()).await?;
    Ok(dto::versioned_response(StatusCode::CREATED, &saved))
}

pub async fn my_requests(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
) -> ApiResult {
    let found = services.ledger.my_requests(ctx.actor()).await?;
    Ok(dto::versioned_items(&found))
}

pub async fn get_request(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let request = services.ledger.get_request(ctx.actor(), dto::parse_id(&id)?).await?;
    Ok(dto::versioned_response(StatusCode::OK, &request))
}

/// `?pending=true` narrows the listing to requests awaiting review.
pub async fn gym_requests(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::RequestListQuery>,
) -> ApiResult {
    let listing = if query.pending {
        RequestListing::PendingOnly
    } else {
        RequestListing::All
    };
    let found = services
        .ledger
        .gym_requests(ctx.actor(), dto::parse_id(&id)?, listing)
        .await?;
    Ok(dto::versioned_items(&found))
}

/// Optional body: `{"start_date": "<RFC 3339>"}` for the granted membership.
pub async fn accept_request(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    payload: Option<Json<dto::AcceptRequestBody>>,
) -> ApiResult {
    let body = payload.map(|Json(b)| b).unwrap_or_default();
    let saved = services
        .ledger
        .accept_request(ctx.actor(), dto::parse_id(&id)?, body.start_date)
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn deny_request(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let saved = services.ledger.deny_request(ctx.actor(), dto::parse_id(&id)?).await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn gym_memberships(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let found = services.ledger.gym_memberships(ctx.actor(), dto::parse_id(&id)?).await?;
    Ok(dto::versioned_items(&found))
}

pub async fn create_membership(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::CreateMembershipRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let saved = services
        .ledger
        .create_membership(ctx.actor(), dto::parse_id(&id)?, body.into())
        .await?;
    Ok(dto::versioned_response(StatusCode::CREATED, &saved))
}

pub async fn my_memberships(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
) -> ApiResult {
    let found = services.ledger.my_memberships(ctx.actor()).await?;
    Ok(dto::versioned_items(&found))
}

pub async fn update_membership(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    payload: Result<Json<MembershipChanges>, JsonRejection>,
) -> ApiResult {
    let Json(changes) = payload?;
    let saved = services
        .ledger
        .update_membership(ctx.actor(), dto::parse_id(&id)?, changes)
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn delete_membership(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    services.ledger.delete_membership(ctx.actor(), dto::parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
