//! Messages, plans, progress logs, reviews, bookings, announcements.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use gymhub_core::{GymId, UserId};
use gymhub_infra::Services;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::context::ActorContext;

pub async fn send_message(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<dto::SendMessageRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let message = services
        .activity
        .send_message(ctx.actor(), body.gym_id, body.receiver_id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

pub async fn conversation(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path((id, peer_id)): Path<(String, String)>,
) -> ApiResult {
    let (gym_id, peer_id): (GymId, UserId) = (dto::parse_id(&id)?, dto::parse_id(&peer_id)?);
    let messages = services.activity.conversation(ctx.actor(), gym_id, peer_id).await?;
    Ok(dto::items(messages))
}

pub async fn create_plan(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<dto::CreatePlanRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let plan = services.activity.create_plan(ctx.actor(), body.into()).await?;
    Ok((StatusCode::CREATED, Json(plan)).into_response())
}

pub async fn my_plans(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
) -> ApiResult {
    Ok(dto::items(services.activity.my_plans(ctx.actor()).await?))
}

pub async fn log_macros(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<dto::MacroLogRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let log = services.activity.log_macros(ctx.actor(), body.into()).await?;
    Ok((StatusCode::CREATED, Json(log)).into_response())
}

pub async fn log_body(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<dto::BodyLogRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let log = services.activity.log_body(ctx.actor(), body.into()).await?;
    Ok((StatusCode::CREATED, Json(log)).into_response())
}

pub async fn macro_logs(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(member_id): Path<String>,
) -> ApiResult {
    let logs = services.activity.macro_logs(ctx.actor(), dto::parse_id(&member_id)?).await?;
    Ok(dto::items(logs))
}

pub async fn body_logs(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(member_id): Path<String>,
) -> ApiResult {
    let logs = services.activity.body_logs(ctx.actor(), dto::parse_id(&member_id)?).await?;
    Ok(dto::items(logs))
}

pub async fn write_review(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::ReviewRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let review = services
        .activity
        .write_review(ctx.actor(), dto::parse_id(&id)?, body.rating, &body.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(review)).into_response())
}

pub async fn reviews(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    Ok(dto::items(services.activity.reviews(ctx.actor(), dto::parse_id(&id)?).await?))
}

pub async fn book_session(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::BookingRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let booking = services
        .activity
        .book_session(ctx.actor(), dto::parse_id(&id)?, body.into())
        .await?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

pub async fn bookings(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    Ok(dto::items(services.activity.bookings(ctx.actor(), dto::parse_id(&id)?).await?))
}

pub async fn cancel_booking(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let booking = services.activity.cancel_booking(ctx.actor(), dto::parse_id(&id)?).await?;
    Ok(Json(booking).into_response())
}

pub async fn post_announcement(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::AnnouncementRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let announcement = services
        .activity
        .post_announcement(ctx.actor(), dto::parse_id(&id)?, &body.title, &body.body)
        .await?;
    Ok((StatusCode::CREATED, Json(announcement)).into_response())
}

pub async fn announcements(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    Ok(dto::items(services.activity.announcements(ctx.actor(), dto::parse_id(&id)?).await?))
}
