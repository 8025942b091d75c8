use axum::{
    Router,
    routing::{get, patch, post},
};

pub mod activity;
pub mod admin;
pub mod gyms;
pub mod requests;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/users", users::router())
        .nest("/gyms", gyms::router())
        .route("/requests", post(requests::create_request))
        .route("/requests/mine", get(requests::my_requests))
        .route("/requests/:id", get(requests::get_request))
        .route("/requests/:id/accept", post(requests::accept_request))
        .route("/requests/:id/deny", post(requests::deny_request))
        .route("/memberships/mine", get(requests::my_memberships))
        .route(
            "/memberships/:id",
            patch(requests::update_membership).delete(requests::delete_membership),
        )
        .route("/messages", post(activity::send_message))
        .route("/plans", post(activity::create_plan))
        .route("/plans/mine", get(activity::my_plans))
        .route("/logs/macros", post(activity::log_macros))
        .route("/logs/body", post(activity::log_body))
        .route("/logs/macros/:member_id", get(activity::macro_logs))
        .route("/logs/body/:member_id", get(activity::body_logs))
        .route("/bookings/:id/cancel", post(activity::cancel_booking))
        .route("/admin/roster/rebuild", post(admin::rebuild_roster))
}
