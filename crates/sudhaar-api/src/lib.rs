pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod serialize;
pub mod state;
pub mod validators;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, patch, post},
};

use handlers::{campaigns, dashboard, donations, issues, transparency, users};
use middleware::{authenticate, require_auth};
use state::AppState;

/// All `/api` routes. Anonymous requests reach only the read-only public
/// routes; everything else requires a valid access token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/issues", get(issues::list_issues))
        .route("/issues/stats", get(issues::stats))
        .route("/issues/{id}", get(issues::get_issue))
        .route("/issues/{id}/comments", get(issues::list_comments))
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/{id}", get(campaigns::get_campaign))
        .route("/campaigns/{id}/donations", get(campaigns::campaign_donations))
        .route("/transparency", get(transparency::list_reports))
        .route("/transparency/summary", get(transparency::summary))
        .route("/transparency/{id}", get(transparency::get_report));

    let protected_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::me).patch(users::update_me))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/issues", post(issues::create_issue))
        .route(
            "/issues/{id}",
            patch(issues::update_issue).delete(issues::delete_issue),
        )
        .route("/issues/{id}/upvote", post(issues::upvote))
        .route("/issues/{id}/remove_upvote", post(issues::remove_upvote))
        .route("/issues/{id}/comments", post(issues::add_comment))
        .route("/issues/{id}/delete_comment", post(issues::delete_comment))
        .route("/issues/{id}/update_status", post(issues::update_status))
        .route("/campaigns", post(campaigns::create_campaign))
        .route(
            "/campaigns/{id}",
            patch(campaigns::update_campaign).delete(campaigns::delete_campaign),
        )
        .route("/campaigns/{id}/verify", post(campaigns::verify_campaign))
        .route("/campaigns/{id}/complete", post(campaigns::complete_campaign))
        .route(
            "/donations",
            get(donations::list_donations).post(donations::create_donation),
        )
        .route(
            "/donations/{id}",
            get(donations::get_donation).delete(donations::delete_donation),
        )
        .route("/transparency", post(transparency::create_report))
        .route("/transparency/{id}", delete(transparency::delete_report))
        .route("/dashboard/stats", get(dashboard::stats))
        .layer(axum_middleware::from_fn(require_auth));

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum_middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new().nest("/api", api).with_state(state)
}
