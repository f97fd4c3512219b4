//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Maximum request body size (chunk uploads dominate).
const MAX_BODY_SIZE: usize = 100 * 1024 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Everything under a bearer token. Signup, login and the OAuth callback
    // stay public; the callback authenticates via the stored state value.
    let protected = Router::new()
        .route("/api/drive/link", get(handlers::drive::drive_link))
        .route("/api/drive/accounts", get(handlers::drive::list_accounts))
        .route("/api/drive/space", get(handlers::drive::drive_spaces))
        .route(
            "/api/files/upload/initiate",
            post(handlers::uploads::initiate_upload),
        )
        .route(
            "/api/files/upload/chunk",
            post(handlers::uploads::upload_chunk),
        )
        .route(
            "/api/files/chunking/calculate",
            post(handlers::uploads::calculate_chunking),
        )
        .route(
            "/api/files/upload/finalize",
            post(handlers::uploads::finalize_upload),
        )
        .route(
            "/api/files/upload/status/{session_id}",
            get(handlers::uploads::upload_status),
        )
        .route(
            "/api/files/download-key/{session_id}",
            get(handlers::uploads::download_key_file),
        )
        .route("/api/files/list", get(handlers::downloads::list_files))
        .route(
            "/api/files/download/initiate",
            post(handlers::downloads::initiate_download),
        )
        .route(
            "/api/files/download/status/{session_id}",
            get(handlers::downloads::download_status),
        )
        .route(
            "/api/files/download/file/{session_id}",
            get(handlers::downloads::download_file),
        )
        .route(
            "/api/files/verify/{file_id}",
            get(handlers::downloads::verify_file),
        )
        .route("/api/files/{file_id}", delete(handlers::downloads::delete_file))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .route("/api/signup", post(handlers::auth::signup))
        .route("/api/login", post(handlers::auth::login))
        .route("/oauth2/callback", get(handlers::drive::oauth_callback))
        .route("/oauth/finished", get(handlers::drive::oauth_finished))
        .route("/healthz", get(handlers::health_check));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
