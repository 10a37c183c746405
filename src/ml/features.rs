//! Behavioral fingerprint extraction
//!
//! Turns an entity's ordered event history within a scoring window into a
//! fixed 14-dimension feature vector.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::events::{Event, EventType, WindowBounds};

/// Feature names in the stable order the models are trained on
pub const FEATURE_NAMES: &[&str] = &[
    "avg_login_hour",
    "login_hour_std",
    "unique_locations_count",
    "location_deviation",
    "unique_ports_count",
    "unusual_port_rate",
    "file_access_rate",
    "sensitive_file_rate",
    "privilege_escalation_rate",
    "firewall_change_count",
    "network_event_volume",
    "failed_login_count",
    "weekday_activity_ratio",
    "night_activity_ratio",
];

/// Number of features extracted
pub const NUM_FEATURES: usize = 14;

/// Version tag of the feature schema; carried by vectors and artifacts
pub const SCHEMA_VERSION: u32 = 1;

/// Feature indices by name
pub mod idx {
    pub const AVG_LOGIN_HOUR: usize = 0;
    pub const LOGIN_HOUR_STD: usize = 1;
    pub const UNIQUE_LOCATIONS_COUNT: usize = 2;
    pub const LOCATION_DEVIATION: usize = 3;
    pub const UNIQUE_PORTS_COUNT: usize = 4;
    pub const UNUSUAL_PORT_RATE: usize = 5;
    pub const FILE_ACCESS_RATE: usize = 6;
    pub const SENSITIVE_FILE_RATE: usize = 7;
    pub const PRIVILEGE_ESCALATION_RATE: usize = 8;
    pub const FIREWALL_CHANGE_COUNT: usize = 9;
    pub const NETWORK_EVENT_VOLUME: usize = 10;
    pub const FAILED_LOGIN_COUNT: usize = 11;
    pub const WEEKDAY_ACTIVITY_RATIO: usize = 12;
    pub const NIGHT_ACTIVITY_RATIO: usize = 13;
}

/// Ports considered ordinary workstation traffic; anything else counts as
/// unusual for the unusual_port_rate feature
const COMMON_PORTS: &[u16] = &[
    20, 21, 22, 25, 53, 80, 110, 143, 443, 465, 587, 993, 995, 3306, 3389, 5432, 8080, 8443,
];

/// Path fragments marking a file as sensitive
const SENSITIVE_KEYWORDS: &[&str] = &[
    "secret",
    "password",
    "credential",
    "key",
    "/etc/",
    "/root/",
    "config",
];

/// Night bucket: 22:00 (inclusive) to 06:00 (exclusive)
const NIGHT_START_HOUR: u32 = 22;
const NIGHT_END_HOUR: u32 = 6;

/// Extracted fingerprint for one entity over one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub entity_id: String,
    /// Feature values, ordered as FEATURE_NAMES
    pub values: Vec<f64>,
    pub schema_version: u32,
    pub computed_at: DateTime<Utc>,
}

impl FeatureVector {
    /// Get feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .and_then(|i| self.values.get(i).copied())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Human-readable feature name for reports
pub fn display_name(index: usize) -> &'static str {
    match index {
        idx::AVG_LOGIN_HOUR => "Average Login Hour",
        idx::LOGIN_HOUR_STD => "Login Time Variability",
        idx::UNIQUE_LOCATIONS_COUNT => "Unique Locations",
        idx::LOCATION_DEVIATION => "Location Deviation",
        idx::UNIQUE_PORTS_COUNT => "Unique Ports",
        idx::UNUSUAL_PORT_RATE => "Unusual Port Usage",
        idx::FILE_ACCESS_RATE => "File Access Rate",
        idx::SENSITIVE_FILE_RATE => "Sensitive File Access",
        idx::PRIVILEGE_ESCALATION_RATE => "Privilege Escalation Rate",
        idx::FIREWALL_CHANGE_COUNT => "Firewall Changes",
        idx::NETWORK_EVENT_VOLUME => "Network Activity",
        idx::FAILED_LOGIN_COUNT => "Failed Logins",
        idx::WEEKDAY_ACTIVITY_RATIO => "Weekday Activity Ratio",
        idx::NIGHT_ACTIVITY_RATIO => "Night Activity Ratio",
        _ => "Unknown Feature",
    }
}

/// Stateless fingerprint extractor
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the 14-dimension fingerprint for one entity.
    ///
    /// Events outside the window are ignored; unordered input is tolerated.
    /// An entity with zero in-window events yields the all-zero vector.
    pub fn extract(
        &self,
        entity_id: &str,
        events: &[Event],
        window: &WindowBounds,
        baseline_location: Option<&str>,
    ) -> FeatureVector {
        let mut in_window: Vec<&Event> = events
            .iter()
            .filter(|e| window.contains(e.timestamp))
            .collect();
        in_window.sort_by_key(|e| e.timestamp);

        let mut values = vec![0.0; NUM_FEATURES];

        if in_window.is_empty() {
            return FeatureVector {
                entity_id: entity_id.to_string(),
                values,
                schema_version: SCHEMA_VERSION,
                computed_at: Utc::now(),
            };
        }

        let days = window.days();
        let total = in_window.len() as f64;

        // Login timing
        let login_hours: Vec<f64> = in_window
            .iter()
            .filter(|e| e.event_type == EventType::Login)
            .map(|e| e.timestamp.hour() as f64)
            .collect();
        values[idx::AVG_LOGIN_HOUR] = mean(&login_hours);
        values[idx::LOGIN_HOUR_STD] = population_std(&login_hours);

        // Locations
        let locations: Vec<&str> = in_window
            .iter()
            .filter_map(|e| e.location.as_deref())
            .filter(|l| !l.is_empty())
            .collect();
        values[idx::UNIQUE_LOCATIONS_COUNT] =
            locations.iter().collect::<HashSet<_>>().len() as f64;
        values[idx::LOCATION_DEVIATION] = match baseline_location {
            Some(baseline) if !locations.is_empty() => {
                let differing = locations.iter().filter(|&&l| l != baseline).count();
                differing as f64 / locations.len() as f64
            }
            _ => 0.0,
        };

        // Ports
        let ports: Vec<u16> = in_window.iter().filter_map(|e| e.port).collect();
        values[idx::UNIQUE_PORTS_COUNT] = ports.iter().collect::<HashSet<_>>().len() as f64;
        values[idx::UNUSUAL_PORT_RATE] = if ports.is_empty() {
            0.0
        } else {
            let unusual = ports.iter().filter(|&p| !COMMON_PORTS.contains(p)).count();
            unusual as f64 / ports.len() as f64
        };

        // File access
        let file_events: Vec<&&Event> = in_window
            .iter()
            .filter(|e| e.event_type == EventType::FileAccess)
            .collect();
        values[idx::FILE_ACCESS_RATE] = file_events.len() as f64 / days;
        let sensitive = file_events
            .iter()
            .filter(|e| e.file_path.as_deref().map(is_sensitive_path).unwrap_or(false))
            .count();
        values[idx::SENSITIVE_FILE_RATE] = sensitive as f64 / days;

        // Privilege escalation: dedicated events plus any privileged-flagged event
        let priv_count = in_window
            .iter()
            .filter(|e| e.event_type == EventType::PrivilegeEscalation || e.privileged)
            .count();
        values[idx::PRIVILEGE_ESCALATION_RATE] = priv_count as f64 / days;

        // Firewall changes and failed logins are raw in-window counts
        values[idx::FIREWALL_CHANGE_COUNT] = in_window
            .iter()
            .filter(|e| e.event_type == EventType::FirewallChange)
            .count() as f64;
        values[idx::FAILED_LOGIN_COUNT] = in_window
            .iter()
            .filter(|e| {
                e.event_type == EventType::FailedLogin
                    || (e.event_type == EventType::Login && !e.success)
            })
            .count() as f64;

        // Network volume
        let network = in_window
            .iter()
            .filter(|e| e.event_type == EventType::NetworkConnection)
            .count();
        values[idx::NETWORK_EVENT_VOLUME] = network as f64 / days;

        // Time-of-week buckets
        let weekday = in_window
            .iter()
            .filter(|e| !matches!(e.timestamp.weekday(), Weekday::Sat | Weekday::Sun))
            .count();
        values[idx::WEEKDAY_ACTIVITY_RATIO] = weekday as f64 / total;

        let night = in_window
            .iter()
            .filter(|e| {
                let hour = e.timestamp.hour();
                hour >= NIGHT_START_HOUR || hour < NIGHT_END_HOUR
            })
            .count();
        values[idx::NIGHT_ACTIVITY_RATIO] = night as f64 / total;

        FeatureVector {
            entity_id: entity_id.to_string(),
            values,
            schema_version: SCHEMA_VERSION,
            computed_at: Utc::now(),
        }
    }
}

fn is_sensitive_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    SENSITIVE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> WindowBounds {
        // June 2025; the 2nd is a Monday
        let end = Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap();
        WindowBounds::last_days(end, 30)
    }

    fn login_at(day: u32, hour: u32) -> Event {
        let ts = Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap();
        Event::new("emp-1", EventType::Login, ts).with_location("hq")
    }

    #[test]
    fn test_empty_history_is_all_zero() {
        let extractor = FeatureExtractor::new();
        let fv = extractor.extract("emp-1", &[], &window(), Some("hq"));

        assert_eq!(fv.len(), NUM_FEATURES);
        assert!(fv.values.iter().all(|v| *v == 0.0));
        assert!(fv.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_login_hour_stats() {
        let extractor = FeatureExtractor::new();
        let events = vec![login_at(2, 9), login_at(3, 9), login_at(4, 11)];
        let fv = extractor.extract("emp-1", &events, &window(), Some("hq"));

        let avg = fv.get("avg_login_hour").unwrap();
        assert!((avg - 29.0 / 3.0).abs() < 1e-9);
        assert!(fv.get("login_hour_std").unwrap() > 0.0);
    }

    #[test]
    fn test_location_deviation() {
        let extractor = FeatureExtractor::new();
        let mut events = vec![login_at(2, 9), login_at(3, 9)];
        events.push(login_at(4, 9).with_location("offsite"));
        let fv = extractor.extract("emp-1", &events, &window(), Some("hq"));

        assert_eq!(fv.get("unique_locations_count"), Some(2.0));
        assert!((fv.get("location_deviation").unwrap() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_baseline_location_means_zero_deviation() {
        let extractor = FeatureExtractor::new();
        let events = vec![login_at(2, 9).with_location("anywhere")];
        let fv = extractor.extract("emp-1", &events, &window(), None);
        assert_eq!(fv.get("location_deviation"), Some(0.0));
    }

    #[test]
    fn test_unusual_port_rate() {
        let extractor = FeatureExtractor::new();
        let ts = Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap();
        let events = vec![
            Event::new("emp-1", EventType::NetworkConnection, ts).with_port(443),
            Event::new("emp-1", EventType::NetworkConnection, ts).with_port(4444),
            Event::new("emp-1", EventType::NetworkConnection, ts).with_port(31337),
        ];
        let fv = extractor.extract("emp-1", &events, &window(), None);

        assert_eq!(fv.get("unique_ports_count"), Some(3.0));
        assert!((fv.get("unusual_port_rate").unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensitive_file_rate() {
        let extractor = FeatureExtractor::new();
        let ts = Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap();
        let events = vec![
            Event::new("emp-1", EventType::FileAccess, ts).with_file_path("/home/u/report.txt"),
            Event::new("emp-1", EventType::FileAccess, ts).with_file_path("/etc/shadow"),
            Event::new("emp-1", EventType::FileAccess, ts).with_file_path("C:/creds/PASSWORD.txt"),
        ];
        let fv = extractor.extract("emp-1", &events, &window(), None);

        assert!((fv.get("file_access_rate").unwrap() - 3.0 / 30.0).abs() < 1e-9);
        assert!((fv.get("sensitive_file_rate").unwrap() - 2.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_counts_and_ratios() {
        let extractor = FeatureExtractor::new();
        let monday = Utc.with_ymd_and_hms(2025, 6, 2, 23, 0, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2025, 6, 7, 10, 0, 0).unwrap();
        let events = vec![
            Event::new("emp-1", EventType::FirewallChange, monday),
            Event::new("emp-1", EventType::FailedLogin, monday),
            Event::new("emp-1", EventType::Login, saturday).failed(),
            Event::new("emp-1", EventType::PrivilegeEscalation, monday),
        ];
        let fv = extractor.extract("emp-1", &events, &window(), None);

        assert_eq!(fv.get("firewall_change_count"), Some(1.0));
        assert_eq!(fv.get("failed_login_count"), Some(2.0));
        assert!((fv.get("privilege_escalation_rate").unwrap() - 1.0 / 30.0).abs() < 1e-9);
        assert!((fv.get("weekday_activity_ratio").unwrap() - 0.75).abs() < 1e-9);
        // The three Monday 23:00 events land in the night bucket
        assert!((fv.get("night_activity_ratio").unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_events_outside_window_ignored() {
        let extractor = FeatureExtractor::new();
        let outside = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let events = vec![Event::new("emp-1", EventType::Login, outside)];
        let fv = extractor.extract("emp-1", &events, &window(), None);
        assert!(fv.values.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_feature_name_table_matches_dimension() {
        assert_eq!(FEATURE_NAMES.len(), NUM_FEATURES);
        assert_eq!(display_name(idx::NIGHT_ACTIVITY_RATIO), "Night Activity Ratio");
    }
}
