use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::alert::AlertRecord;
use crate::models::driver::{ContactPatch, Driver, DriverLocation, DriverStatus};
use crate::models::notification::NotificationRecord;
use crate::models::order::{Order, TimelineEvent};
use crate::models::records::{ActivityEntry, Dispute, Shop, Verification};
use crate::models::user::UserProfile;
use crate::store::{Store, WriteBatch, WriteOp};

/// In-process document store. Stands in for the managed store in tests and
/// single-node deployments; collections mirror the production schema.
#[derive(Default)]
pub struct MemoryStore {
    drivers: DashMap<Uuid, Driver>,
    orders: DashMap<Uuid, Order>,
    users: DashMap<Uuid, UserProfile>,
    disputes: DashMap<Uuid, Dispute>,
    verifications: DashMap<Uuid, Verification>,
    shops: DashMap<Uuid, Shop>,
    activity: Mutex<Vec<ActivityEntry>>,
    notifications: Mutex<Vec<NotificationRecord>>,
    alert_history: Mutex<Vec<AlertRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activity_log(&self) -> Vec<ActivityEntry> {
        self.activity.lock().expect("activity lock").clone()
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.notifications.lock().expect("notifications lock").clone()
    }

    pub fn alert_history(&self) -> Vec<AlertRecord> {
        self.alert_history.lock().expect("alert history lock").clone()
    }

    fn release_driver_sync(&self, driver_id: Uuid) {
        if let Some(mut driver) = self.drivers.get_mut(&driver_id) {
            driver.current_order_id = None;
            driver.is_available = true;
            driver.status = DriverStatus::Online;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_driver(&self, id: Uuid) -> Result<Option<Driver>, StoreError> {
        Ok(self.drivers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, StoreError> {
        Ok(self.drivers.iter().map(|e| e.value().clone()).collect())
    }

    async fn upsert_driver(&self, driver: Driver) -> Result<(), StoreError> {
        self.drivers.insert(driver.id, driver);
        Ok(())
    }

    async fn claim_driver(&self, driver_id: Uuid, order_id: Uuid) -> Result<bool, StoreError> {
        let Some(mut driver) = self.drivers.get_mut(&driver_id) else {
            return Ok(false);
        };

        let claimable = driver.status == DriverStatus::Online
            && driver.is_available
            && driver.current_order_id.is_none();
        if !claimable {
            return Ok(false);
        }

        driver.current_order_id = Some(order_id);
        driver.status = DriverStatus::Busy;
        driver.is_available = false;
        Ok(true)
    }

    async fn release_driver(&self, driver_id: Uuid) -> Result<(), StoreError> {
        self.release_driver_sync(driver_id);
        Ok(())
    }

    async fn deactivate_driver(&self, driver_id: Uuid) -> Result<(), StoreError> {
        if let Some(mut driver) = self.drivers.get_mut(&driver_id) {
            driver.status = DriverStatus::Offline;
            driver.is_available = false;
        }
        Ok(())
    }

    async fn patch_driver_contact(
        &self,
        driver_id: Uuid,
        patch: ContactPatch,
    ) -> Result<(), StoreError> {
        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| StoreError::NotFound(format!("driver {driver_id}")))?;

        if let Some(name) = patch.name {
            driver.name = name;
        }
        if let Some(email) = patch.email {
            driver.email = email;
        }
        if let Some(phone) = patch.phone {
            driver.phone = phone;
        }
        Ok(())
    }

    async fn update_driver_location(
        &self,
        driver_id: Uuid,
        location: DriverLocation,
    ) -> Result<Driver, StoreError> {
        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| StoreError::NotFound(format!("driver {driver_id}")))?;

        driver.last_seen_at = location.recorded_at;
        driver.location = Some(location);
        Ok(driver.clone())
    }

    async fn update_driver_status(
        &self,
        driver_id: Uuid,
        status: DriverStatus,
    ) -> Result<Driver, StoreError> {
        let mut driver = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| StoreError::NotFound(format!("driver {driver_id}")))?;

        driver.status = status;
        driver.is_available =
            status == DriverStatus::Online && driver.current_order_id.is_none();
        driver.last_seen_at = Utc::now();
        Ok(driver.clone())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        Ok(self.orders.iter().map(|e| e.value().clone()).collect())
    }

    async fn upsert_order(&self, order: Order) -> Result<(), StoreError> {
        self.orders.insert(order.id, order);
        Ok(())
    }

    async fn set_order_assignment(
        &self,
        order_id: Uuid,
        driver: &Driver,
    ) -> Result<(), StoreError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        order.driver_id = Some(driver.id);
        order.driver_name = Some(driver.name.clone());
        order.driver_phone = Some(driver.phone.clone());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn seed_timeline(&self, order_id: Uuid, event: TimelineEvent) -> Result<(), StoreError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;

        if order.timeline.is_empty() {
            order.timeline.push(event);
        }
        Ok(())
    }

    async fn upsert_user(&self, user: UserProfile) -> Result<(), StoreError> {
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn remove_user(&self, id: Uuid) -> Result<(), StoreError> {
        self.users.remove(&id);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError> {
        Ok(self.users.iter().map(|e| e.value().clone()).collect())
    }

    async fn upsert_dispute(&self, dispute: Dispute) -> Result<(), StoreError> {
        self.disputes.insert(dispute.id, dispute);
        Ok(())
    }

    async fn list_disputes(&self) -> Result<Vec<Dispute>, StoreError> {
        Ok(self.disputes.iter().map(|e| e.value().clone()).collect())
    }

    async fn upsert_verification(&self, verification: Verification) -> Result<(), StoreError> {
        self.verifications.insert(verification.id, verification);
        Ok(())
    }

    async fn list_verifications(&self) -> Result<Vec<Verification>, StoreError> {
        Ok(self.verifications.iter().map(|e| e.value().clone()).collect())
    }

    async fn upsert_shop(&self, shop: Shop) -> Result<(), StoreError> {
        self.shops.insert(shop.id, shop);
        Ok(())
    }

    async fn list_shops(&self) -> Result<Vec<Shop>, StoreError> {
        Ok(self.shops.iter().map(|e| e.value().clone()).collect())
    }

    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        self.activity.lock().expect("activity lock").push(entry);
        Ok(())
    }

    async fn append_notification(&self, record: NotificationRecord) -> Result<(), StoreError> {
        self.notifications
            .lock()
            .expect("notifications lock")
            .push(record);
        Ok(())
    }

    async fn append_alert(&self, record: AlertRecord) -> Result<(), StoreError> {
        self.alert_history
            .lock()
            .expect("alert history lock")
            .push(record);
        Ok(())
    }

    async fn recent_alerts(&self, since: DateTime<Utc>) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(self
            .alert_history
            .lock()
            .expect("alert history lock")
            .iter()
            .filter(|record| record.fired_at >= since)
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        // Single-threaded application of the whole batch; none of the ops
        // below can fail part-way for this backend.
        for op in batch.into_ops() {
            match op {
                WriteOp::AppendActivity(entry) => {
                    self.activity.lock().expect("activity lock").push(entry);
                }
                WriteOp::AppendNotification(record) => {
                    self.notifications
                        .lock()
                        .expect("notifications lock")
                        .push(record);
                }
                WriteOp::ReleaseDriver(driver_id) => {
                    self.release_driver_sync(driver_id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::MemoryStore;
    use crate::models::driver::{Driver, DriverStatus};
    use crate::models::user::{UserProfile, UserRole};
    use crate::store::{Store, WriteBatch};

    fn online_driver(id: Uuid) -> Driver {
        let user = UserProfile {
            id,
            role: UserRole::Driver,
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            phone: "+33600000001".to_string(),
            created_at: Utc::now(),
        };
        let mut driver = Driver::for_new_user(&user, Utc::now());
        driver.status = DriverStatus::Online;
        driver.is_available = true;
        driver
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let store = MemoryStore::new();
        let driver_id = Uuid::from_u128(1);
        store.upsert_driver(online_driver(driver_id)).await.unwrap();

        let first = store
            .claim_driver(driver_id, Uuid::from_u128(10))
            .await
            .unwrap();
        let second = store
            .claim_driver(driver_id, Uuid::from_u128(11))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);

        let driver = store.get_driver(driver_id).await.unwrap().unwrap();
        assert_eq!(driver.current_order_id, Some(Uuid::from_u128(10)));
        assert_eq!(driver.status, DriverStatus::Busy);
        assert!(!driver.is_available);
    }

    #[tokio::test]
    async fn release_restores_rotation_and_is_idempotent() {
        let store = MemoryStore::new();
        let driver_id = Uuid::from_u128(1);
        store.upsert_driver(online_driver(driver_id)).await.unwrap();
        store
            .claim_driver(driver_id, Uuid::from_u128(10))
            .await
            .unwrap();

        store.release_driver(driver_id).await.unwrap();
        store.release_driver(driver_id).await.unwrap();

        let driver = store.get_driver(driver_id).await.unwrap().unwrap();
        assert_eq!(driver.current_order_id, None);
        assert_eq!(driver.status, DriverStatus::Online);
        assert!(driver.is_available);
    }

    #[tokio::test]
    async fn commit_applies_every_op() {
        let store = MemoryStore::new();
        let driver_id = Uuid::from_u128(1);
        store.upsert_driver(online_driver(driver_id)).await.unwrap();
        store
            .claim_driver(driver_id, Uuid::from_u128(10))
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch.activity(crate::models::records::ActivityEntry::new(
            "order.status_changed",
            "shipped -> delivered",
            "system",
            Uuid::from_u128(10),
            Utc::now(),
        ));
        batch.release_driver(driver_id);

        store.commit(batch).await.unwrap();

        assert_eq!(store.activity_log().len(), 1);
        let driver = store.get_driver(driver_id).await.unwrap().unwrap();
        assert_eq!(driver.current_order_id, None);
    }
}
