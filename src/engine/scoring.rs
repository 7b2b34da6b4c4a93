use chrono::{DateTime, Utc};

use crate::models::candidate::ScoreBreakdown;
use crate::models::driver::Driver;

const DISTANCE_WEIGHT: f64 = 0.50;
const RATING_WEIGHT: f64 = 0.20;
const EXPERIENCE_WEIGHT: f64 = 0.15;
const RECENCY_WEIGHT: f64 = 0.15;

/// Rating assumed for drivers who have never been rated.
pub const DEFAULT_RATING: f64 = 3.0;

const EXPERIENCE_SATURATION: f64 = 100.0;
const RECENCY_FULL_MINUTES: f64 = 5.0;
const RECENCY_ZERO_MINUTES: f64 = 30.0;

/// Composite suitability of a driver for a pickup `distance_km` away,
/// in [0, 1]. Pure: ties are left to the caller's stable ordering.
pub fn compute_score(
    driver: &Driver,
    distance_km: f64,
    radius_km: f64,
    now: DateTime<Utc>,
) -> (f64, ScoreBreakdown) {
    let breakdown = ScoreBreakdown {
        distance_score: distance_score(distance_km, radius_km),
        rating_score: rating_score(driver.rating),
        experience_score: experience_score(driver.completed_deliveries),
        recency_score: recency_score(driver.last_seen_at, now),
    };

    let score = weighted_score(&breakdown);
    (score, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.distance_score * DISTANCE_WEIGHT)
        + (breakdown.rating_score * RATING_WEIGHT)
        + (breakdown.experience_score * EXPERIENCE_WEIGHT)
        + (breakdown.recency_score * RECENCY_WEIGHT)
}

fn distance_score(distance_km: f64, radius_km: f64) -> f64 {
    if radius_km <= 0.0 {
        return 0.0;
    }
    (1.0 - distance_km / radius_km).max(0.0)
}

fn rating_score(rating: Option<f64>) -> f64 {
    (rating.unwrap_or(DEFAULT_RATING) / 5.0).clamp(0.0, 1.0)
}

fn experience_score(completed_deliveries: u32) -> f64 {
    (completed_deliveries as f64 / EXPERIENCE_SATURATION).min(1.0)
}

/// Full score while seen within the last 5 minutes, linear decay to zero
/// at 30 minutes.
fn recency_score(last_seen_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let minutes = (now - last_seen_at).num_seconds() as f64 / 60.0;
    if minutes <= RECENCY_FULL_MINUTES {
        1.0
    } else if minutes >= RECENCY_ZERO_MINUTES {
        0.0
    } else {
        1.0 - (minutes - RECENCY_FULL_MINUTES) / (RECENCY_ZERO_MINUTES - RECENCY_FULL_MINUTES)
    }
}
