use axum::Json;
use chrono::Utc;
use pocketlegal_common::HealthStatus;

pub async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}
