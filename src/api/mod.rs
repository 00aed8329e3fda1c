//! HTTP API layer: system endpoints and the OpenAPI document.

pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

/// Builds the HTTP router with every REST endpoint, plus Swagger UI when
/// the `swagger-ui` feature is enabled.
pub fn build_router() -> Router<AppState> {
    let router = Router::new().merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
    };

    router
}
