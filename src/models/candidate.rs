use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::alert::AlertSeverity;
use crate::models::driver::Driver;

#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub rating_score: f64,
    pub experience_score: f64,
    pub recency_score: f64,
}

/// Ranked candidate produced by one matching pass. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub driver: Driver,
    pub distance_km: f64,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Event fanned out to connected dashboards over the websocket stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    DriverAssigned {
        order_id: Uuid,
        driver_id: Uuid,
        score: f64,
        distance_km: f64,
        at: DateTime<Utc>,
    },
    AlertRaised {
        rule: String,
        severity: AlertSeverity,
        title: String,
        at: DateTime<Utc>,
    },
}
