use serde::Deserialize;
use uuid::Uuid;

/// Change-feed envelope for one document mutation, delivered at-least-once.
/// `before` absent means creation; `after` absent means deletion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEvent<T> {
    pub id: Uuid,
    pub before: Option<T>,
    pub after: Option<T>,
}
