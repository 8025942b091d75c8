use std::sync::Arc;

use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use gymhub_infra::Services;

use crate::app::errors::ApiResult;
use crate::context::ActorContext;

/// Super-role only: derive the roster index again from the stored gyms.
pub async fn rebuild_roster(
    Extension(services): Extension<Arc<Services>>,
    Extension(ctx): Extension<ActorContext>,
) -> ApiResult {
    let gyms = services.gyms.rebuild_index(ctx.actor()).await?;
    tracing::info!(gyms, by = %ctx.user_id(), "roster index rebuilt");
    Ok((StatusCode::OK, Json(serde_json::json!({ "gyms": gyms }))).into_response())
}
