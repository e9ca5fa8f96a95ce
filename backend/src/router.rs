use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, middleware, state::AppState};

pub fn build_router(state: AppState) -> Router {
    let ride_routes = Router::new()
        .route("/api/rides", post(handlers::rides::create_ride))
        .route("/api/rides/{ride_id}/live", get(handlers::rides::get_live_ride))
        .route(
            "/api/rides/{ride_id}/checkpoints",
            post(handlers::rides::add_checkpoint),
        )
        .route(
            "/api/rides/{ride_id}/activate",
            post(handlers::rides::activate_ride),
        )
        .route(
            "/api/rides/{ride_id}/complete",
            post(handlers::rides::complete_ride),
        )
        .route(
            "/api/rides/{ride_id}/participants",
            get(handlers::participants::list_participants)
                .post(handlers::participants::join_ride),
        )
        .route(
            "/api/rides/{ride_id}/participants/{participant_id}",
            put(handlers::participants::update_participant_role)
                .delete(handlers::participants::remove_participant),
        )
        .route(
            "/api/rides/{ride_id}/location",
            post(handlers::tracking::submit_location),
        )
        .route(
            "/api/rides/{ride_id}/checkin",
            post(handlers::tracking::check_in),
        )
        .route(
            "/api/rides/{ride_id}/attendance",
            get(handlers::tracking::get_attendance),
        )
        .route(
            "/api/rides/{ride_id}/attendance/override",
            post(handlers::tracking::override_attendance),
        )
        .route(
            "/api/rides/{ride_id}/activities",
            get(handlers::activities::get_activities),
        )
        .route(
            "/api/rides/{ride_id}/alert",
            post(handlers::activities::raise_alert),
        )
        .route(
            "/api/rides/{ride_id}/set-lead",
            post(handlers::intercom::set_lead),
        )
        .route(
            "/api/rides/{ride_id}/remove-lead",
            post(handlers::intercom::remove_lead),
        )
        .route(
            "/api/rides/{ride_id}/intercom/token",
            get(handlers::intercom::get_intercom_token),
        )
        .route(
            "/api/rides/{ride_id}/intercom/status",
            get(handlers::intercom::get_intercom_status),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth,
        ));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(ride_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers(Any)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state)
}
