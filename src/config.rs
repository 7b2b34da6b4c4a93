use std::env;
use std::time::Duration;

use crate::error::AppError;

/// Product-chosen health thresholds. Reference values are defaults, never
/// hard-coded at the call sites.
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    pub max_utilization: f64,
    pub max_open_disputes: usize,
    pub max_pending_verifications: usize,
    pub min_on_time_rate: f64,
    pub on_time_min_sample: usize,
    pub stale_shipped_hours: i64,
    pub revenue_check_hour: u32,
    pub revenue_min_orders: usize,
    pub signup_check_hour: u32,
    pub signup_min_users: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_utilization: 0.90,
            max_open_disputes: 10,
            max_pending_verifications: 20,
            min_on_time_rate: 0.80,
            on_time_min_sample: 5,
            stale_shipped_hours: 2,
            revenue_check_hour: 12,
            revenue_min_orders: 10,
            signup_check_hour: 18,
            signup_min_users: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub service_radius_km: f64,
    pub monitor_interval_secs: u64,
    pub alert_dedup_minutes: i64,
    pub outbound_timeout_secs: u64,
    pub alert_webhook_url: Option<String>,
    pub push_endpoint: Option<String>,
    pub metrics_sink_url: Option<String>,
    pub admin_device_tokens: Vec<String>,
    pub thresholds: HealthThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            service_radius_km: 10.0,
            monitor_interval_secs: 300,
            alert_dedup_minutes: 30,
            outbound_timeout_secs: 5,
            alert_webhook_url: None,
            push_endpoint: None,
            metrics_sink_url: None,
            admin_device_tokens: Vec::new(),
            thresholds: HealthThresholds::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();
        let threshold_defaults = HealthThresholds::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            service_radius_km: parse_or_default("SERVICE_RADIUS_KM", defaults.service_radius_km)?,
            monitor_interval_secs: parse_or_default(
                "MONITOR_INTERVAL_SECS",
                defaults.monitor_interval_secs,
            )?,
            alert_dedup_minutes: parse_or_default(
                "ALERT_DEDUP_MINUTES",
                defaults.alert_dedup_minutes,
            )?,
            outbound_timeout_secs: parse_or_default(
                "OUTBOUND_TIMEOUT_SECS",
                defaults.outbound_timeout_secs,
            )?,
            alert_webhook_url: env::var("ALERT_WEBHOOK_URL").ok(),
            push_endpoint: env::var("PUSH_ENDPOINT").ok(),
            metrics_sink_url: env::var("METRICS_SINK_URL").ok(),
            admin_device_tokens: env::var("ADMIN_DEVICE_TOKENS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|token| !token.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            thresholds: HealthThresholds {
                max_utilization: parse_or_default(
                    "MAX_UTILIZATION",
                    threshold_defaults.max_utilization,
                )?,
                max_open_disputes: parse_or_default(
                    "MAX_OPEN_DISPUTES",
                    threshold_defaults.max_open_disputes,
                )?,
                max_pending_verifications: parse_or_default(
                    "MAX_PENDING_VERIFICATIONS",
                    threshold_defaults.max_pending_verifications,
                )?,
                min_on_time_rate: parse_or_default(
                    "MIN_ON_TIME_RATE",
                    threshold_defaults.min_on_time_rate,
                )?,
                on_time_min_sample: parse_or_default(
                    "ON_TIME_MIN_SAMPLE",
                    threshold_defaults.on_time_min_sample,
                )?,
                stale_shipped_hours: parse_or_default(
                    "STALE_SHIPPED_HOURS",
                    threshold_defaults.stale_shipped_hours,
                )?,
                revenue_check_hour: parse_or_default(
                    "REVENUE_CHECK_HOUR",
                    threshold_defaults.revenue_check_hour,
                )?,
                revenue_min_orders: parse_or_default(
                    "REVENUE_MIN_ORDERS",
                    threshold_defaults.revenue_min_orders,
                )?,
                signup_check_hour: parse_or_default(
                    "SIGNUP_CHECK_HOUR",
                    threshold_defaults.signup_check_hour,
                )?,
                signup_min_users: parse_or_default(
                    "SIGNUP_MIN_USERS",
                    threshold_defaults.signup_min_users,
                )?,
            },
        })
    }

    pub fn outbound_timeout(&self) -> Duration {
        Duration::from_secs(self.outbound_timeout_secs)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
