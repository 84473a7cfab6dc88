//! Demo endpoints that sit behind the rate limiter and echo the caller.

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use quota_shared::dto::{DataItem, DataResponse, EchoResponse};

use crate::middleware::client::{api_token, client_ip};
use crate::state::AppState;

/// GET /
pub async fn home(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let response = EchoResponse::new("Welcome to the Rate Limiter API").with_caller(
        client_ip(&req),
        api_token(&req, &state.api_key_header),
    );

    HttpResponse::Ok().json(response)
}

/// GET|POST /api/test
pub async fn test(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let response = EchoResponse::new(format!("Test endpoint accessed via {}", req.method()))
        .with_caller(client_ip(&req), api_token(&req, &state.api_key_header));

    HttpResponse::Ok().json(response)
}

/// GET /api/data
pub async fn data(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let data = (1..=3)
        .map(|id| DataItem {
            id,
            name: format!("Item {id}"),
            value: id * 100,
        })
        .collect();

    HttpResponse::Ok().json(DataResponse {
        message: "Data retrieved successfully".to_string(),
        timestamp: Utc::now(),
        ip: client_ip(&req),
        token: api_token(&req, &state.api_key_header).unwrap_or_default(),
        data,
    })
}
