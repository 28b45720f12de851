use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::database::RecordStore;

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `healthy` when the record store answers, `degraded` otherwise
    pub status: String,
    pub service: String,
    pub version: String,
    /// Record store backend in use (`mongodb` or `memory`)
    pub store: String,
    pub store_reachable: bool,
    pub timestamp: i64,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service and record store are up", body = HealthResponse),
        (status = 503, description = "Record store unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(store: web::Data<dyn RecordStore>) -> HttpResponse {
    let reachable = match store.ping().await {
        Ok(()) => true,
        Err(e) => {
            log::error!("❌ Health check: {} store unreachable: {}", store.backend(), e);
            false
        }
    };

    let body = HealthResponse {
        status: if reachable { "healthy" } else { "degraded" }.to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store.backend().to_string(),
        store_reachable: reachable,
        timestamp: chrono::Utc::now().timestamp(),
    };

    if reachable {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
