//! OpenAPI document for the HTTP endpoints.
//!
//! The WebSocket protocol is not described here; see [`crate::ws`].

use utoipa::OpenApi;

use super::handlers::system;

/// Generated OpenAPI specification.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "connect4-gateway"),
    paths(system::health_handler, system::stats_handler),
    tags((name = "System", description = "Health and session statistics"))
)]
pub struct ApiDoc;
