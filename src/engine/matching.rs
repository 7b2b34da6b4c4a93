use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::scoring::compute_score;
use crate::error::StoreError;
use crate::geo::haversine_km;
use crate::models::candidate::{EngineEvent, MatchCandidate};
use crate::models::driver::{Driver, DriverStatus, GeoPoint};
use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::store::Store;

pub const DEFAULT_MAX_CANDIDATES: usize = 5;

/// Ranks eligible drivers for a pickup and claims the winner for an order.
#[derive(Clone)]
pub struct DriverMatcher {
    store: Arc<dyn Store>,
    radius_km: f64,
    metrics: Metrics,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl DriverMatcher {
    pub fn new(
        store: Arc<dyn Store>,
        radius_km: f64,
        metrics: Metrics,
        events_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            store,
            radius_km,
            metrics,
            events_tx,
        }
    }

    /// Online drivers within the service radius, ranked by composite score.
    /// An empty result is an expected outcome, not a failure.
    pub async fn find_best_drivers(
        &self,
        pickup: &GeoPoint,
        max_results: usize,
    ) -> Result<Vec<MatchCandidate>, StoreError> {
        let now = Utc::now();
        let drivers = self.store.list_drivers().await?;

        let mut candidates: Vec<MatchCandidate> = drivers
            .into_iter()
            .filter(|driver| driver.status == DriverStatus::Online)
            // drivers holding an order should already be busy; re-check anyway
            .filter(|driver| driver.current_order_id.is_none())
            .filter_map(|driver| {
                let location = driver.location.as_ref()?;
                let distance_km = haversine_km(&location.point, pickup);
                if distance_km > self.radius_km {
                    return None;
                }

                let (score, breakdown) = compute_score(&driver, distance_km, self.radius_km, now);
                Some(MatchCandidate {
                    driver,
                    distance_km,
                    score,
                    breakdown,
                })
            })
            .collect();

        // sort_by is stable: equal scores keep their input order
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(max_results);
        Ok(candidates)
    }

    /// Walks the ranked candidates and claims the first one whose
    /// conditional claim still succeeds. Returns None when nobody is
    /// eligible; the order stays unassigned for a later pass.
    pub async fn auto_assign_driver(&self, order: &Order) -> Result<Option<Driver>, StoreError> {
        let start = Instant::now();
        let result = self.assign_inner(order).await;

        let outcome = match &result {
            Ok(Some(_)) => "success",
            Ok(None) => "no_candidates",
            Err(_) => "error",
        };
        self.metrics
            .match_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .matches_total
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn assign_inner(&self, order: &Order) -> Result<Option<Driver>, StoreError> {
        let candidates = self
            .find_best_drivers(&order.pickup, DEFAULT_MAX_CANDIDATES)
            .await?;

        if candidates.is_empty() {
            debug!(order_id = %order.id, "no eligible drivers in radius");
            return Ok(None);
        }

        for candidate in candidates {
            if !self.store.claim_driver(candidate.driver.id, order.id).await? {
                debug!(
                    order_id = %order.id,
                    driver_id = %candidate.driver.id,
                    "claim lost, trying next candidate"
                );
                continue;
            }

            if let Err(err) = self
                .store
                .set_order_assignment(order.id, &candidate.driver)
                .await
            {
                // never leave a dangling claim behind a failed order write
                warn!(
                    order_id = %order.id,
                    driver_id = %candidate.driver.id,
                    error = %err,
                    "order update failed, compensating driver claim"
                );
                self.store.release_driver(candidate.driver.id).await?;
                return Err(err);
            }

            info!(
                order_id = %order.id,
                driver_id = %candidate.driver.id,
                score = candidate.score,
                distance_km = candidate.distance_km,
                "driver assigned"
            );

            let _ = self.events_tx.send(EngineEvent::DriverAssigned {
                order_id: order.id,
                driver_id: candidate.driver.id,
                score: candidate.score,
                distance_km: candidate.distance_km,
                at: Utc::now(),
            });

            return Ok(Some(self.claimed_snapshot(candidate.driver, order.id)));
        }

        debug!(order_id = %order.id, "every candidate was claimed concurrently");
        Ok(None)
    }

    fn claimed_snapshot(&self, mut driver: Driver, order_id: Uuid) -> Driver {
        driver.current_order_id = Some(order_id);
        driver.status = DriverStatus::Busy;
        driver.is_available = false;
        driver
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use tokio::sync::broadcast;
    use uuid::Uuid;

    use super::DriverMatcher;
    use crate::models::driver::{Driver, DriverLocation, DriverStatus, GeoPoint};
    use crate::models::order::{Order, OrderStatus};
    use crate::observability::metrics::Metrics;
    use crate::store::Store;
    use crate::store::memory::MemoryStore;

    const PICKUP: GeoPoint = GeoPoint {
        lat: 48.8566,
        lng: 2.3522,
    };

    fn driver(seed: u128, lat: f64, lng: f64, rating: f64, completed: u32) -> Driver {
        let now = Utc::now();
        Driver {
            id: Uuid::from_u128(seed),
            name: format!("driver-{seed}"),
            email: String::new(),
            phone: format!("+3360000{seed:04}"),
            status: DriverStatus::Online,
            is_available: true,
            current_order_id: None,
            vehicle_type: "bike".to_string(),
            location: Some(DriverLocation {
                point: GeoPoint { lat, lng },
                heading: 0.0,
                speed: 0.0,
                recorded_at: now,
            }),
            rating: Some(rating),
            completed_deliveries: completed,
            last_seen_at: now - Duration::minutes(1),
        }
    }

    fn order(seed: u128) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::from_u128(seed),
            status: OrderStatus::Created,
            customer_id: Uuid::from_u128(900),
            driver_id: None,
            driver_name: None,
            driver_phone: None,
            shop_id: None,
            total: 42.0,
            delivery_fee: 4.0,
            items_count: 3,
            pickup: PICKUP,
            dropoff: GeoPoint {
                lat: 48.87,
                lng: 2.36,
            },
            zone: None,
            timeline: Vec::new(),
            created_at: now,
            updated_at: now,
            shipped_at: None,
            delivered_at: None,
            estimated_delivery: None,
        }
    }

    fn matcher(store: Arc<MemoryStore>) -> DriverMatcher {
        let (events_tx, _rx) = broadcast::channel(16);
        DriverMatcher::new(store, 10.0, Metrics::new(), events_tx)
    }

    #[tokio::test]
    async fn excludes_drivers_beyond_radius() {
        let store = Arc::new(MemoryStore::new());
        // Marseille, ~775 km out
        store
            .upsert_driver(driver(1, 43.2965, 5.3698, 4.5, 50))
            .await
            .unwrap();

        let candidates = matcher(store).find_best_drivers(&PICKUP, 5).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn excludes_offline_claimed_and_locationless_drivers() {
        let store = Arc::new(MemoryStore::new());

        let mut offline = driver(1, 48.857, 2.353, 4.5, 50);
        offline.status = DriverStatus::Offline;
        store.upsert_driver(offline).await.unwrap();

        let mut claimed = driver(2, 48.857, 2.353, 4.5, 50);
        claimed.current_order_id = Some(Uuid::from_u128(77));
        store.upsert_driver(claimed).await.unwrap();

        let mut no_location = driver(3, 48.857, 2.353, 4.5, 50);
        no_location.location = None;
        store.upsert_driver(no_location).await.unwrap();

        let eligible = driver(4, 48.857, 2.353, 4.5, 50);
        store.upsert_driver(eligible).await.unwrap();

        let candidates = matcher(store).find_best_drivers(&PICKUP, 5).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].driver.id, Uuid::from_u128(4));
    }

    #[tokio::test]
    async fn ranks_by_score_and_truncates() {
        let store = Arc::new(MemoryStore::new());
        // ten eligible drivers at increasing distance from the pickup
        for seed in 0..10u128 {
            let offset = 0.005 * seed as f64;
            store
                .upsert_driver(driver(seed + 1, 48.8566 + offset, 2.3522, 4.0, 20))
                .await
                .unwrap();
        }

        let candidates = matcher(store).find_best_drivers(&PICKUP, 3).await.unwrap();
        assert_eq!(candidates.len(), 3);
        assert!(candidates[0].score >= candidates[1].score);
        assert!(candidates[1].score >= candidates[2].score);
        assert_eq!(candidates[0].driver.id, Uuid::from_u128(1));
    }

    #[tokio::test]
    async fn returned_candidates_respect_radius_and_claim_invariants() {
        let store = Arc::new(MemoryStore::new());
        for seed in 0..6u128 {
            store
                .upsert_driver(driver(seed + 1, 48.85 + 0.02 * seed as f64, 2.35, 4.0, 20))
                .await
                .unwrap();
        }

        let candidates = matcher(store).find_best_drivers(&PICKUP, 10).await.unwrap();
        for candidate in &candidates {
            assert!(candidate.distance_km <= 10.0);
            assert!(candidate.driver.current_order_id.is_none());
        }
    }

    #[tokio::test]
    async fn assign_returns_none_on_empty_pool() {
        let store = Arc::new(MemoryStore::new());
        let assigned = matcher(store).auto_assign_driver(&order(100)).await.unwrap();
        assert!(assigned.is_none());
    }

    #[tokio::test]
    async fn assign_claims_winner_and_updates_order() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_driver(driver(1, 48.857, 2.353, 4.8, 80))
            .await
            .unwrap();

        let the_order = order(100);
        store.upsert_order(the_order.clone()).await.unwrap();

        let assigned = matcher(store.clone())
            .auto_assign_driver(&the_order)
            .await
            .unwrap()
            .expect("driver assigned");

        assert_eq!(assigned.id, Uuid::from_u128(1));
        assert_eq!(assigned.current_order_id, Some(the_order.id));

        let stored_driver = store.get_driver(assigned.id).await.unwrap().unwrap();
        assert_eq!(stored_driver.status, DriverStatus::Busy);
        assert_eq!(stored_driver.current_order_id, Some(the_order.id));

        let stored_order = store.get_order(the_order.id).await.unwrap().unwrap();
        assert_eq!(stored_order.driver_id, Some(assigned.id));
        assert_eq!(stored_order.driver_phone.as_deref(), Some(assigned.phone.as_str()));
    }

    #[tokio::test]
    async fn assign_falls_through_to_next_candidate_when_claim_lost() {
        let store = Arc::new(MemoryStore::new());

        // top-ranked driver looks eligible in the scan but its availability
        // flag already dropped, so the conditional claim must lose
        let mut top = driver(1, 48.8566, 2.3522, 5.0, 100);
        top.is_available = false;
        let runner_up = driver(2, 48.86, 2.36, 4.0, 20);
        store.upsert_driver(top).await.unwrap();
        store.upsert_driver(runner_up).await.unwrap();

        let the_order = order(100);
        store.upsert_order(the_order.clone()).await.unwrap();

        let assigned = matcher(store.clone())
            .auto_assign_driver(&the_order)
            .await
            .unwrap()
            .expect("runner-up assigned");
        assert_eq!(assigned.id, Uuid::from_u128(2));

        let untouched = store.get_driver(Uuid::from_u128(1)).await.unwrap().unwrap();
        assert_eq!(untouched.current_order_id, None);
    }
}
