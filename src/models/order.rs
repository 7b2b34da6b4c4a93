use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Paid,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// No transition is accepted out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Paid => "paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub kind: String,
    pub title: String,
    pub description: String,
    pub actor: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub status: OrderStatus,
    pub customer_id: Uuid,
    #[serde(default)]
    pub driver_id: Option<Uuid>,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub driver_phone: Option<String>,
    #[serde(default)]
    pub shop_id: Option<Uuid>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub delivery_fee: f64,
    #[serde(default)]
    pub items_count: u32,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl Order {
    /// Applied once at ingestion so downstream code never re-checks ranges.
    pub fn normalize(&mut self) {
        if !self.total.is_finite() || self.total < 0.0 {
            self.total = 0.0;
        }
        if !self.delivery_fee.is_finite() || self.delivery_fee < 0.0 {
            self.delivery_fee = 0.0;
        }
    }

    /// Effective hand-off time for staleness checks.
    pub fn shipped_or_updated_at(&self) -> DateTime<Utc> {
        self.shipped_at.unwrap_or(self.updated_at)
    }
}
