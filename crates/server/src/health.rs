use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use verdant_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub checks: Vec<HealthCheck>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let checks = vec![service_check(), catalog_check(&state.db_pool).await];
    let ready = checks.iter().all(|check| check.status == "ready");

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        checks,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn service_check() -> HealthCheck {
    HealthCheck {
        name: "service",
        status: "ready",
        detail: "verdant-server runtime initialized".to_string(),
    }
}

/// Counts the product table instead of pinging `SELECT 1`: a reachable
/// database with no catalog schema is still a broken deployment.
async fn catalog_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM product").fetch_one(pool).await {
        Ok(count) => HealthCheck {
            name: "catalog",
            status: "ready",
            detail: format!("catalog reachable with {count} products"),
        },
        Err(error) => HealthCheck {
            name: "catalog",
            status: "degraded",
            detail: format!("catalog query failed: {error}"),
        },
    }
}
