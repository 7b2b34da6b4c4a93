use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::alert::AlertSeverity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", content = "user_id", rename_all = "lowercase")]
pub enum NotificationTarget {
    User(Uuid),
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub target: NotificationTarget,
    pub kind: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn new(
        target: NotificationTarget,
        kind: &str,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            kind: kind.to_string(),
            severity,
            title: title.into(),
            message: message.into(),
            read: false,
            created_at: now,
        }
    }
}
