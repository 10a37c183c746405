//! Domain model for activity events
//!
//! Events are recorded by the surrounding collection/persistence layer and
//! consumed read-only by the scoring core.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of activity event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Login,
    FailedLogin,
    FileAccess,
    NetworkConnection,
    PrivilegeEscalation,
    FirewallChange,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Login => "login",
            EventType::FailedLogin => "failed_login",
            EventType::FileAccess => "file_access",
            EventType::NetworkConnection => "network",
            EventType::PrivilegeEscalation => "privilege_escalation",
            EventType::FirewallChange => "firewall",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(EventType::Login),
            "failed_login" => Ok(EventType::FailedLogin),
            "file_access" => Ok(EventType::FileAccess),
            "network" => Ok(EventType::NetworkConnection),
            "privilege_escalation" => Ok(EventType::PrivilegeEscalation),
            "firewall" => Ok(EventType::FirewallChange),
            _ => Err(format!("Unknown event type: {}", s)),
        }
    }
}

/// A single recorded activity event for one entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub entity_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<u16>,
    pub file_path: Option<String>,
    /// Whether the event was performed with elevated privileges
    pub privileged: bool,
    /// Outcome flag; only meaningful for login events
    pub success: bool,
}

impl Event {
    pub fn new(entity_id: impl Into<String>, event_type: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            entity_id: entity_id.into(),
            event_type,
            timestamp,
            location: None,
            ip_address: None,
            port: None,
            file_path: None,
            privileged: false,
            success: true,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Inclusive-start, exclusive-end scoring window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WindowBounds {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window ending at `end` and spanning the previous `days` days
    pub fn last_days(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Window length in days, floored at 1.0 for rate normalization
    pub fn days(&self) -> f64 {
        let secs = (self.end - self.start).num_seconds().max(0) as f64;
        (secs / 86_400.0).max(1.0)
    }
}
