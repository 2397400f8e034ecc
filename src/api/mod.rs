mod base;
mod socket;

use std::borrow::Cow;

use axum::{
    error_handling::HandleErrorLayer, extract::State, http::StatusCode, response::IntoResponse,
    routing, Json, Router,
};
use tokio::time::Duration;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;
use tracing::{event, instrument, Level};

pub mod paths;

use crate::error::Result;
use crate::relay::{HubHandle, PresenceSnapshot};

/// Build the relay API around a running hub
pub fn api(hub: HubHandle) -> Router {
    Router::new()
        .route(paths::base::ROOT, routing::get(base::root))
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(base::about))
        .route(paths::relay::STATS, routing::get(stats))
        .route(paths::relay::SOCKET, routing::get(socket::websocket))
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(Duration::from_secs(10)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

#[instrument(skip(hub), level = "debug")]
async fn stats(State(hub): State<HubHandle>) -> Result<Json<PresenceSnapshot>> {
    hub.snapshot().await.map(Json).map_err(|err| {
        event!(
            Level::ERROR,
            message = "Failed reading presence snapshot",
            err = format!("{:?}", err)
        );
        err
    })
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Cow::from("service is overloaded, try again later"),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Cow::from(format!("Unhandled internal error: {}", error)),
    )
}
