use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use gymhub_auth::ProfileUpdate;
use gymhub_core::UserId;
use gymhub_infra::Services;

use crate::app::dto;
use crate::app::errors::ApiResult;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/me", get(me).patch(update_me))
        .route("/:id", get(get_user))
}

/// Public: register a new identity.
pub async fn signup(
    Extension(services): Extension<Arc<Services>>,
    payload: Result<Json<dto::SignupRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let view = services.users.signup(body.into()).await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

pub async fn me(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
) -> ApiResult {
    let view = services.users.me(ctx.actor()).await?;
    Ok(Json(view).into_response())
}

pub async fn update_me(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult {
    let Json(update) = payload?;
    let view = services.users.update_profile(ctx.actor(), update).await?;
    Ok(Json(view).into_response())
}

pub async fn get_user(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: UserId = dto::parse_id(&id)?;
    let view = services.users.get(ctx.actor(), id).await?;
    Ok(Json(view).into_response())
}
