use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverStatus {
    Offline,
    Online,
    Busy,
    Break,
}

/// Last reported position of a driver's device, with freshness timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverLocation {
    pub point: GeoPoint,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub speed: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Operational record of a driver. The id is the owning user's id; name,
/// email and phone are mirrored from the user profile by the profile sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub status: DriverStatus,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub current_order_id: Option<Uuid>,
    #[serde(default = "default_vehicle")]
    pub vehicle_type: String,
    #[serde(default)]
    pub location: Option<DriverLocation>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub completed_deliveries: u32,
    pub last_seen_at: DateTime<Utc>,
}

fn default_vehicle() -> String {
    "bike".to_string()
}

impl Driver {
    /// Fresh record for a user who just took on the driver role.
    pub fn for_new_user(user: &UserProfile, now: DateTime<Utc>) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            status: DriverStatus::Offline,
            is_available: false,
            current_order_id: None,
            vehicle_type: default_vehicle(),
            location: Some(DriverLocation {
                point: GeoPoint { lat: 0.0, lng: 0.0 },
                heading: 0.0,
                speed: 0.0,
                recorded_at: now,
            }),
            rating: Some(5.0),
            completed_deliveries: 0,
            last_seen_at: now,
        }
    }
}

/// Contact fields that changed on the owning user profile; only set fields
/// are written back to the driver record.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none()
    }
}
