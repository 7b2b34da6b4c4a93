use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{ContactPatch, Driver};
use crate::models::user::{UserProfile, UserRole};
use crate::store::Store;

/// Keeps a driver's operational record consistent with its owning user
/// profile on user-record change events.
#[derive(Clone)]
pub struct DriverProfileSync {
    store: Arc<dyn Store>,
}

impl DriverProfileSync {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn on_user_change(
        &self,
        user_id: Uuid,
        before: Option<&UserProfile>,
        after: Option<&UserProfile>,
    ) -> Result<(), AppError> {
        let was_driver = before.is_some_and(|u| u.role == UserRole::Driver);

        let Some(after) = after else {
            // user deleted; the driver record is retained but benched
            if was_driver {
                self.store.deactivate_driver(user_id).await?;
                info!(user_id = %user_id, "driver deactivated after user deletion");
            }
            return Ok(());
        };

        if after.role != UserRole::Driver {
            if was_driver {
                self.store.deactivate_driver(user_id).await?;
                info!(user_id = %user_id, "driver deactivated after role change");
            }
            return Ok(());
        }

        match self.store.get_driver(user_id).await? {
            None => {
                self.store
                    .upsert_driver(Driver::for_new_user(after, Utc::now()))
                    .await?;
                info!(user_id = %user_id, "driver record created");
            }
            Some(existing) => {
                let patch = contact_diff(&existing, after);
                if patch.is_empty() {
                    debug!(user_id = %user_id, "driver profile already in sync");
                } else {
                    self.store.patch_driver_contact(user_id, patch).await?;
                    info!(user_id = %user_id, "driver contact fields synced");
                }
            }
        }

        Ok(())
    }
}

/// Only fields that actually differ are written back.
fn contact_diff(driver: &Driver, user: &UserProfile) -> ContactPatch {
    let mut patch = ContactPatch::default();
    if driver.name != user.name {
        patch.name = Some(user.name.clone());
    }
    if driver.email != user.email {
        patch.email = Some(user.email.clone());
    }
    if driver.phone != user.phone {
        patch.phone = Some(user.phone.clone());
    }
    patch
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use super::DriverProfileSync;
    use crate::models::driver::DriverStatus;
    use crate::models::user::{UserProfile, UserRole};
    use crate::store::Store;
    use crate::store::memory::MemoryStore;

    fn user(id: u128, role: UserRole, name: &str) -> UserProfile {
        UserProfile {
            id: Uuid::from_u128(id),
            role,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "+33600000001".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn new_driver_role_creates_record_with_defaults() {
        let store = Arc::new(MemoryStore::new());
        let sync = DriverProfileSync::new(store.clone());
        let after = user(1, UserRole::Driver, "Ana");

        sync.on_user_change(after.id, None, Some(&after))
            .await
            .unwrap();

        let driver = store.get_driver(after.id).await.unwrap().unwrap();
        assert_eq!(driver.status, DriverStatus::Offline);
        assert!(!driver.is_available);
        assert_eq!(driver.vehicle_type, "bike");
        assert_eq!(driver.rating, Some(5.0));
        assert_eq!(driver.completed_deliveries, 0);
        assert_eq!(driver.current_order_id, None);
    }

    #[tokio::test]
    async fn role_change_away_deactivates_but_keeps_record() {
        let store = Arc::new(MemoryStore::new());
        let sync = DriverProfileSync::new(store.clone());
        let before = user(1, UserRole::Driver, "Ana");

        sync.on_user_change(before.id, None, Some(&before))
            .await
            .unwrap();
        {
            let mut driver = store.get_driver(before.id).await.unwrap().unwrap();
            driver.status = DriverStatus::Online;
            driver.is_available = true;
            driver.completed_deliveries = 12;
            store.upsert_driver(driver).await.unwrap();
        }

        let after = user(1, UserRole::Client, "Ana");
        sync.on_user_change(before.id, Some(&before), Some(&after))
            .await
            .unwrap();

        let driver = store.get_driver(before.id).await.unwrap().unwrap();
        assert_eq!(driver.status, DriverStatus::Offline);
        assert!(!driver.is_available);
        assert_eq!(driver.completed_deliveries, 12);
    }

    #[tokio::test]
    async fn user_deletion_deactivates_driver() {
        let store = Arc::new(MemoryStore::new());
        let sync = DriverProfileSync::new(store.clone());
        let before = user(1, UserRole::Driver, "Ana");

        sync.on_user_change(before.id, None, Some(&before))
            .await
            .unwrap();
        sync.on_user_change(before.id, Some(&before), None)
            .await
            .unwrap();

        let driver = store.get_driver(before.id).await.unwrap().unwrap();
        assert_eq!(driver.status, DriverStatus::Offline);
        assert!(!driver.is_available);
    }

    #[tokio::test]
    async fn contact_changes_are_patched_field_by_field() {
        let store = Arc::new(MemoryStore::new());
        let sync = DriverProfileSync::new(store.clone());
        let before = user(1, UserRole::Driver, "Ana");

        sync.on_user_change(before.id, None, Some(&before))
            .await
            .unwrap();

        let mut after = before.clone();
        after.phone = "+33699999999".to_string();
        sync.on_user_change(before.id, Some(&before), Some(&after))
            .await
            .unwrap();

        let driver = store.get_driver(before.id).await.unwrap().unwrap();
        assert_eq!(driver.phone, "+33699999999");
        assert_eq!(driver.name, "Ana");
        assert_eq!(driver.email, "ana@example.com");
    }

    #[tokio::test]
    async fn non_driver_users_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let sync = DriverProfileSync::new(store.clone());

        let before = user(1, UserRole::Client, "Bea");
        let mut after = before.clone();
        after.name = "Beatriz".to_string();

        sync.on_user_change(before.id, Some(&before), Some(&after))
            .await
            .unwrap();

        assert!(store.get_driver(before.id).await.unwrap().is_none());
    }
}
