//! Banner and health endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::state::AppState;

pub const SERVICE_NAME: &str = "Answer Pipeline API";

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    fn healthy(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }
}

pub async fn banner() -> impl IntoResponse {
    Json(BannerResponse {
        message: SERVICE_NAME,
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Component status; an empty knowledge index degrades but still serves
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks: Vec<HealthCheck> = ["classifier", "generator", "quality_checker", "judge"]
        .iter()
        .map(|name| HealthCheck::healthy(name))
        .collect();
    checks.push(check_index(&state));

    let status = if checks.iter().all(|c| c.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    };

    (StatusCode::OK, Json(response))
}

fn check_index(state: &AppState) -> HealthCheck {
    let entries = state.index.len();
    let dimension = state
        .index
        .dimension()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());

    HealthCheck {
        name: "retriever".to_string(),
        status: if entries > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        message: Some(format!("{} entries indexed, dimension {}", entries, dimension)),
    }
}
