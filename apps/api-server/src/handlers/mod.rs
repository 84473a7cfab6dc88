//! HTTP handlers and route configuration.

mod demo;
mod health;

use actix_web::{HttpRequest, HttpResponse, web};

use crate::middleware::error::{AppError, AppResult};

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/", web::get().to(demo::home))
        .service(
            web::scope("/api")
                .route("/test", web::get().to(demo::test))
                .route("/test", web::post().to(demo::test))
                .route("/data", web::get().to(demo::data)),
        );
}

/// Fallback for unknown routes.
pub async fn not_found(req: HttpRequest) -> AppResult<HttpResponse> {
    Err(AppError::NotFound(format!("No route for {}", req.path())))
}
