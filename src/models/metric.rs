use serde::{Deserialize, Serialize};

/// One named sample shipped to the external metrics sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub interval: u64,
    pub time: i64,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64, interval: u64, time: i64) -> Self {
        Self {
            name: name.into(),
            value,
            interval,
            time,
        }
    }
}
