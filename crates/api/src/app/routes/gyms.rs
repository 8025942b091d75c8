use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{Path, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};

use gymhub_core::{GymId, UserId};
use gymhub_gyms::UpdateGym;
use gymhub_infra::Services;

use super::{activity, requests};
use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_gym).get(list_gyms))
        .route("/:id", get(get_gym).patch(update_gym).delete(delete_gym))
        .route("/:id/trainers", post(assign_trainer))
        .route("/:id/trainers/:user_id", delete(remove_trainer))
        .route("/:id/members", post(add_member))
        .route("/:id/members/:user_id", delete(remove_member))
        .route("/:id/plans", post(add_plan))
        .route("/:id/plans/:name", delete(remove_plan))
        .route("/:id/photos", post(upload_photo))
        .route(
            "/:id/memberships",
            get(requests::gym_memberships).post(requests::create_membership),
        )
        .route("/:id/requests", get(requests::gym_requests))
        .route("/:id/messages/:peer_id", get(activity::conversation))
        .route("/:id/reviews", get(activity::reviews).post(activity::write_review))
        .route("/:id/bookings", get(activity::bookings).post(activity::book_session))
        .route(
            "/:id/announcements",
            get(activity::announcements).post(activity::post_announcement),
        )
}

pub async fn create_gym(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<dto::CreateGymRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let saved = services.gyms.create(ctx.actor(), body.into()).await?;
    Ok(dto::versioned_response(StatusCode::CREATED, &saved))
}

pub async fn list_gyms(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
) -> ApiResult {
    let gyms = services.gyms.list(ctx.actor()).await?;
    Ok(dto::versioned_items(&gyms))
}

pub async fn get_gym(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let gym = services.gyms.get(ctx.actor(), dto::parse_id(&id)?).await?;
    Ok(dto::versioned_response(StatusCode::OK, &gym))
}

pub async fn update_gym(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<UpdateGym>, JsonRejection>,
) -> ApiResult {
    let Json(changes) = payload?;
    let saved = services
        .gyms
        .update(ctx.actor(), dto::parse_id(&id)?, changes, dto::precondition(&headers)?)
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn delete_gym(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    services
        .gyms
        .delete(ctx.actor(), dto::parse_id(&id)?, dto::precondition(&headers)?)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn assign_trainer(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<dto::RosterRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let saved = services
        .gyms
        .assign_trainer(ctx.actor(), dto::parse_id(&id)?, body.user_id, dto::precondition(&headers)?)
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn remove_trainer(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path((id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult {
    let (id, user_id): (GymId, UserId) = (dto::parse_id(&id)?, dto::parse_id(&user_id)?);
    let saved = services
        .gyms
        .remove_trainer(ctx.actor(), id, user_id, dto::precondition(&headers)?)
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn add_member(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<dto::RosterRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let saved = services
        .gyms
        .add_member(ctx.actor(), dto::parse_id(&id)?, body.user_id, dto::precondition(&headers)?)
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn remove_member(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path((id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult {
    let (id, user_id): (GymId, UserId) = (dto::parse_id(&id)?, dto::parse_id(&user_id)?);
    let saved = services
        .gyms
        .remove_member(ctx.actor(), id, user_id, dto::precondition(&headers)?)
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn add_plan(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<dto::AddPlanRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let saved = services
        .gyms
        .add_plan(
            ctx.actor(),
            dto::parse_id(&id)?,
            body.name,
            body.duration,
            body.price_cents,
            dto::precondition(&headers)?,
        )
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

pub async fn remove_plan(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path((id, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult {
    let saved = services
        .gyms
        .remove_plan(ctx.actor(), dto::parse_id(&id)?, name, dto::precondition(&headers)?)
        .await?;
    Ok(dto::versioned_response(StatusCode::OK, &saved))
}

/// Raw request body is the image; `Content-Type` is passed to storage.
pub async fn upload_photo(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let saved = services
        .gyms
        .upload_photo(ctx.actor(), dto::parse_id(&id)?, content_type, body.to_vec())
        .await?;
    Ok(dto::versioned_response(StatusCode::CREATED, &saved))
}
