use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;

use crate::models::HealthResponse;
use crate::supervisor::Supervisor;

/// Probes every worker and reports how many are no longer consuming.
pub async fn health(
    State(supervisor): State<Arc<Supervisor>>,
    headers: HeaderMap,
) -> (StatusCode, Json<HealthResponse>) {
    if !accepts_json(&headers) {
        return (
            StatusCode::NOT_ACCEPTABLE,
            Json(HealthResponse {
                healthy: false,
                message: "not supported response format".to_string(),
            }),
        );
    }

    let stopped = supervisor.check().await;
    if stopped > 0 {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                healthy: false,
                message: format!("Number of failed consumers: {}", stopped),
            }),
        );
    }
    (
        StatusCode::OK,
        Json(HealthResponse {
            healthy: true,
            message: "success".to_string(),
        }),
    )
}

pub async fn restart(
    State(supervisor): State<Arc<Supervisor>>,
) -> (StatusCode, Json<HealthResponse>) {
    log::info!("Restarting all consumers");
    match supervisor.restart().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                healthy: true,
                message: "success".to_string(),
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse {
                healthy: false,
                message: e.to_string(),
            }),
        ),
    }
}

pub async fn stop(State(supervisor): State<Arc<Supervisor>>) -> (StatusCode, Json<HealthResponse>) {
    log::info!("Stopping all consumers");
    supervisor.stop().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            healthy: true,
            message: "success".to_string(),
        }),
    )
}

// The health endpoint only speaks JSON; a request that cannot accept it is
// turned away. A missing Accept header accepts anything.
fn accepts_json(headers: &HeaderMap) -> bool {
    let mut has_accept = false;
    for value in headers.get_all(header::ACCEPT) {
        has_accept = true;
        let Ok(value) = value.to_str() else {
            continue;
        };
        for entry in value.split(',') {
            let media_range = entry.split(';').next().unwrap_or("").trim();
            if media_range == "application/json" || media_range == "*/*" {
                return true;
            }
        }
    }
    !has_accept
}
