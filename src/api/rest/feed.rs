use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use tracing::debug;

use crate::error::AppError;
use crate::feed::ChangeEvent;
use crate::models::order::Order;
use crate::models::records::{Dispute, Shop, Verification};
use crate::models::user::UserProfile;
use crate::state::AppState;

/// Change-feed ingestion. Each endpoint receives one (id, before, after)
/// tuple; delivery is at-least-once, so the handlers behind these routes
/// carry their own idempotency guards.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/feed/orders", post(order_event))
        .route("/feed/users", post(user_event))
        .route("/feed/disputes", post(dispute_event))
        .route("/feed/verifications", post(verification_event))
        .route("/feed/shops", post(shop_event))
}

async fn order_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ChangeEvent<Order>>,
) -> Result<StatusCode, AppError> {
    let outcome = handle_order_event(&state, event).await;
    record(&state, "orders", &outcome);
    outcome.map(|_| StatusCode::ACCEPTED)
}

async fn handle_order_event(
    state: &AppState,
    event: ChangeEvent<Order>,
) -> Result<(), AppError> {
    match (event.before, event.after) {
        (None, Some(mut after)) => {
            after.normalize();
            // at-least-once delivery: the first copy of a creation event
            // already ran the side effects and the matching pass
            if state.store.get_order(after.id).await?.is_some() {
                debug!(order_id = %after.id, "redelivered creation event ignored");
                return Ok(());
            }
            state.store.upsert_order(after.clone()).await?;
            state.lifecycle.on_order_created(&after).await
        }
        (Some(mut before), Some(mut after)) => {
            before.normalize();
            after.normalize();
            // mirror the external write only once the transition is accepted
            state.lifecycle.on_order_status_change(&before, &after).await?;
            state.store.upsert_order(after).await?;
            Ok(())
        }
        (Some(_), None) => {
            // deletes only happen through retention, nothing to orchestrate
            debug!(order_id = %event.id, "order deletion event ignored");
            Ok(())
        }
        (None, None) => Err(AppError::BadRequest(
            "change event carries neither before nor after".to_string(),
        )),
    }
}

async fn user_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ChangeEvent<UserProfile>>,
) -> Result<StatusCode, AppError> {
    let outcome = handle_user_event(&state, event).await;
    record(&state, "users", &outcome);
    outcome.map(|_| StatusCode::ACCEPTED)
}

async fn handle_user_event(
    state: &AppState,
    event: ChangeEvent<UserProfile>,
) -> Result<(), AppError> {
    match &event.after {
        Some(after) => state.store.upsert_user(after.clone()).await?,
        None => state.store.remove_user(event.id).await?,
    }

    state
        .profile_sync
        .on_user_change(event.id, event.before.as_ref(), event.after.as_ref())
        .await
}

async fn dispute_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ChangeEvent<Dispute>>,
) -> Result<StatusCode, AppError> {
    if let Some(after) = event.after {
        state.store.upsert_dispute(after).await?;
    }
    state
        .metrics
        .feed_events_total
        .with_label_values(&["disputes", "success"])
        .inc();
    Ok(StatusCode::ACCEPTED)
}

async fn verification_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ChangeEvent<Verification>>,
) -> Result<StatusCode, AppError> {
    if let Some(after) = event.after {
        state.store.upsert_verification(after).await?;
    }
    state
        .metrics
        .feed_events_total
        .with_label_values(&["verifications", "success"])
        .inc();
    Ok(StatusCode::ACCEPTED)
}

async fn shop_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<ChangeEvent<Shop>>,
) -> Result<StatusCode, AppError> {
    if let Some(after) = event.after {
        state.store.upsert_shop(after).await?;
    }
    state
        .metrics
        .feed_events_total
        .with_label_values(&["shops", "success"])
        .inc();
    Ok(StatusCode::ACCEPTED)
}

fn record(state: &AppState, collection: &str, outcome: &Result<(), AppError>) {
    let label = if outcome.is_ok() { "success" } else { "error" };
    state
        .metrics
        .feed_events_total
        .with_label_values(&[collection, label])
        .inc();
}
