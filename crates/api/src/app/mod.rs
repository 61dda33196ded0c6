pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};

use waxmarket_auth::{Hs256JwtValidator, JwtValidator};

use crate::middleware::{auth_middleware, AuthState};

/// Build the HTTP application: in-memory services, bearer-token middleware,
/// and the route tree.
pub fn build_app(jwt_secret: String) -> Router {
    let services = services::build_services();

    let jwt: Arc<dyn JwtValidator> = Arc::new(Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = AuthState { jwt };

    let protected = Router::new()
        .nest("/catalog", routes::catalog::router())
        .nest("/inventory", routes::inventory::router())
        .nest("/orders", routes::orders::router())
        .route("/events/stream", get(routes::event_stream::stream))
        .route("/whoami", get(routes::system::whoami))
        .layer(
            tower::ServiceBuilder::new()
                .layer(Extension(services))
                .layer(axum::middleware::from_fn_with_state(
                    auth_state,
                    auth_middleware,
                )),
        );

    Router::new()
        .route("/healthz", get(routes::system::health))
        .merge(protected)
}
