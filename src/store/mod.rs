pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::alert::AlertRecord;
use crate::models::driver::{ContactPatch, Driver, DriverLocation, DriverStatus};
use crate::models::notification::NotificationRecord;
use crate::models::order::{Order, TimelineEvent};
use crate::models::records::{ActivityEntry, Dispute, Shop, Verification};
use crate::models::user::UserProfile;

/// One write inside an all-or-nothing side-effect batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    AppendActivity(ActivityEntry),
    AppendNotification(NotificationRecord),
    ReleaseDriver(Uuid),
}

/// Side effects of one lifecycle transition, committed together.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity(&mut self, entry: ActivityEntry) {
        self.ops.push(WriteOp::AppendActivity(entry));
    }

    pub fn notification(&mut self, record: NotificationRecord) {
        self.ops.push(WriteOp::AppendNotification(record));
    }

    pub fn release_driver(&mut self, driver_id: Uuid) {
        self.ops.push(WriteOp::ReleaseDriver(driver_id));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Access to the backing document store. Injected into every component so
/// tests can run against the in-memory implementation.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>, StoreError>;
    async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError>;
    async fn upsert_driver(&self, driver: Driver) -> Result<(), StoreError>;

    /// Conditional claim: succeeds only while the driver is online,
    /// available and holds no current order. Returns false when the
    /// precondition no longer holds (lost race, state drift).
    async fn claim_driver(&self, driver_id: Uuid, order_id: Uuid) -> Result<bool, StoreError>;

    /// Clears the claim and puts the driver back in rotation. Idempotent.
    async fn release_driver(&self, driver_id: Uuid) -> Result<(), StoreError>;

    /// Soft-deactivation: offline and unavailable, record retained.
    async fn deactivate_driver(&self, driver_id: Uuid) -> Result<(), StoreError>;

    async fn patch_driver_contact(
        &self,
        driver_id: Uuid,
        patch: ContactPatch,
    ) -> Result<(), StoreError>;

    async fn update_driver_location(
        &self,
        driver_id: Uuid,
        location: DriverLocation,
    ) -> Result<Driver, StoreError>;

    async fn update_driver_status(
        &self,
        driver_id: Uuid,
        status: DriverStatus,
    ) -> Result<Driver, StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;
    async fn upsert_order(&self, order: Order) -> Result<(), StoreError>;

    /// Records the winning driver's projection on the order.
    async fn set_order_assignment(&self, order_id: Uuid, driver: &Driver)
    -> Result<(), StoreError>;

    /// Initializes the order timeline with one event, only when it is empty.
    async fn seed_timeline(&self, order_id: Uuid, event: TimelineEvent) -> Result<(), StoreError>;

    async fn upsert_user(&self, user: UserProfile) -> Result<(), StoreError>;
    async fn remove_user(&self, id: Uuid) -> Result<(), StoreError>;
    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError>;

    async fn upsert_dispute(&self, dispute: Dispute) -> Result<(), StoreError>;
    async fn list_disputes(&self) -> Result<Vec<Dispute>, StoreError>;

    async fn upsert_verification(&self, verification: Verification) -> Result<(), StoreError>;
    async fn list_verifications(&self) -> Result<Vec<Verification>, StoreError>;

    async fn upsert_shop(&self, shop: Shop) -> Result<(), StoreError>;
    async fn list_shops(&self) -> Result<Vec<Shop>, StoreError>;

    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError>;
    async fn append_notification(&self, record: NotificationRecord) -> Result<(), StoreError>;

    async fn append_alert(&self, record: AlertRecord) -> Result<(), StoreError>;
    async fn recent_alerts(&self, since: DateTime<Utc>) -> Result<Vec<AlertRecord>, StoreError>;

    /// Applies the whole batch or none of it.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
