//! ATT&CK technique mapping
//!
//! Maps the dominant contributing features of an anomaly onto a fixed
//! attack-technique taxonomy via a declarative rule table.

use serde::{Deserialize, Serialize};

use crate::ml::explain::FeatureContribution;
use crate::ml::features::idx;

/// A contribution of this many score points (or more) counts as a
/// full-strength indicator when scaling rule confidence
const CONTRIBUTION_FULL_SCALE: f64 = 25.0;

/// Mappings below this confidence are not reported
const MIN_CONFIDENCE: f64 = 0.3;

/// One technique rule: which features indicate it and how strongly
#[derive(Debug, Clone, Copy)]
pub struct TechniqueRule {
    pub technique_id: &'static str,
    pub name: &'static str,
    pub tactic: &'static str,
    pub description: &'static str,
    pub base_confidence: f64,
    /// Feature indices whose contribution triggers this rule
    pub indicators: &'static [usize],
}

/// Technique rule table. Order is not significant; output is sorted by
/// confidence.
pub static TECHNIQUE_RULES: &[TechniqueRule] = &[
    TechniqueRule {
        technique_id: "T1078",
        name: "Valid Accounts",
        tactic: "Initial Access / Persistence",
        description: "Adversaries may obtain and abuse credentials of existing accounts",
        base_confidence: 0.8,
        indicators: &[
            idx::AVG_LOGIN_HOUR,
            idx::LOGIN_HOUR_STD,
            idx::UNIQUE_LOCATIONS_COUNT,
            idx::LOCATION_DEVIATION,
            idx::FAILED_LOGIN_COUNT,
            idx::NIGHT_ACTIVITY_RATIO,
        ],
    },
    TechniqueRule {
        technique_id: "T1021",
        name: "Remote Services",
        tactic: "Lateral Movement",
        description: "Adversaries may use valid accounts to log into a service",
        base_confidence: 0.75,
        indicators: &[
            idx::UNIQUE_PORTS_COUNT,
            idx::UNUSUAL_PORT_RATE,
            idx::NETWORK_EVENT_VOLUME,
        ],
    },
    TechniqueRule {
        technique_id: "T1068",
        name: "Exploitation for Privilege Escalation",
        tactic: "Privilege Escalation",
        description: "Adversaries may exploit software vulnerabilities to elevate privileges",
        base_confidence: 0.9,
        indicators: &[idx::PRIVILEGE_ESCALATION_RATE],
    },
    TechniqueRule {
        technique_id: "T1048",
        name: "Exfiltration Over Alternative Protocol",
        tactic: "Exfiltration",
        description: "Adversaries may steal data by exfiltrating it over a different protocol",
        base_confidence: 0.7,
        indicators: &[idx::UNUSUAL_PORT_RATE, idx::NETWORK_EVENT_VOLUME],
    },
    TechniqueRule {
        technique_id: "T1562",
        name: "Impair Defenses",
        tactic: "Defense Evasion",
        description: "Adversaries may maliciously modify components to impair defenses",
        base_confidence: 0.9,
        indicators: &[idx::FIREWALL_CHANGE_COUNT],
    },
    TechniqueRule {
        technique_id: "T1530",
        name: "Data from Cloud Storage",
        tactic: "Collection",
        description: "Adversaries may access data from cloud storage",
        base_confidence: 0.7,
        indicators: &[idx::SENSITIVE_FILE_RATE, idx::FILE_ACCESS_RATE],
    },
    TechniqueRule {
        technique_id: "T1110",
        name: "Brute Force",
        tactic: "Credential Access",
        description: "Adversaries may use brute force techniques to gain access",
        base_confidence: 0.85,
        indicators: &[idx::FAILED_LOGIN_COUNT],
    },
    TechniqueRule {
        technique_id: "T1098",
        name: "Account Manipulation",
        tactic: "Persistence",
        description: "Adversaries may manipulate accounts to maintain access",
        base_confidence: 0.6,
        indicators: &[idx::PRIVILEGE_ESCALATION_RATE],
    },
];

/// A mapped technique with its confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitreMapping {
    pub technique_id: String,
    pub name: String,
    pub tactic: String,
    pub description: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// Map top contributing features onto techniques.
///
/// Confidence = base confidence x the matched feature's normalized
/// contribution magnitude, capped at 1.0. Returns an empty list, not an
/// error, when nothing reaches the reporting threshold.
pub fn map_techniques(top_features: &[FeatureContribution]) -> Vec<MitreMapping> {
    let mut mappings: Vec<MitreMapping> = TECHNIQUE_RULES
        .iter()
        .filter_map(|rule| {
            let magnitude = top_features
                .iter()
                .filter(|c| rule.indicators.contains(&c.index))
                .map(|c| (c.contribution.abs() / CONTRIBUTION_FULL_SCALE).min(1.0))
                .fold(None::<f64>, |best, m| Some(best.map_or(m, |b| b.max(m))))?;

            let confidence = (rule.base_confidence * magnitude).min(1.0);
            if confidence < MIN_CONFIDENCE {
                return None;
            }

            Some(MitreMapping {
                technique_id: rule.technique_id.to_string(),
                name: rule.name.to_string(),
                tactic: rule.tactic.to_string(),
                description: rule.description.to_string(),
                confidence,
            })
        })
        .collect();

    mappings.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.technique_id.cmp(&b.technique_id))
    });

    mappings
}

/// Primary anomaly classification, derived from the dominant feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    UnusualLoginTime,
    UnusualLoginPattern,
    UnusualLocation,
    LocationVariance,
    UnusualPortUsage,
    UnusualPort,
    UnusualFileAccess,
    SensitiveFileAccess,
    PrivilegeEscalation,
    FirewallChange,
    NetworkActivity,
    FailedLogin,
    UnusualSchedule,
    NightActivity,
    Behavioral,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::UnusualLoginTime => "unusual_login_time",
            AnomalyType::UnusualLoginPattern => "unusual_login_pattern",
            AnomalyType::UnusualLocation => "unusual_location",
            AnomalyType::LocationVariance => "location_variance",
            AnomalyType::UnusualPortUsage => "unusual_port_usage",
            AnomalyType::UnusualPort => "unusual_port",
            AnomalyType::UnusualFileAccess => "unusual_file_access",
            AnomalyType::SensitiveFileAccess => "sensitive_file_access",
            AnomalyType::PrivilegeEscalation => "privilege_escalation",
            AnomalyType::FirewallChange => "firewall_change",
            AnomalyType::NetworkActivity => "network_activity",
            AnomalyType::FailedLogin => "failed_login",
            AnomalyType::UnusualSchedule => "unusual_schedule",
            AnomalyType::NightActivity => "night_activity",
            AnomalyType::Behavioral => "behavioral_anomaly",
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify the anomaly from its dominant contributing feature
pub fn determine_anomaly_type(top_features: &[FeatureContribution]) -> AnomalyType {
    let Some(top) = top_features.first() else {
        return AnomalyType::Behavioral;
    };

    match top.index {
        idx::AVG_LOGIN_HOUR => AnomalyType::UnusualLoginTime,
        idx::LOGIN_HOUR_STD => AnomalyType::UnusualLoginPattern,
        idx::UNIQUE_LOCATIONS_COUNT => AnomalyType::UnusualLocation,
        idx::LOCATION_DEVIATION => AnomalyType::LocationVariance,
        idx::UNIQUE_PORTS_COUNT => AnomalyType::UnusualPortUsage,
        idx::UNUSUAL_PORT_RATE => AnomalyType::UnusualPort,
        idx::FILE_ACCESS_RATE => AnomalyType::UnusualFileAccess,
        idx::SENSITIVE_FILE_RATE => AnomalyType::SensitiveFileAccess,
        idx::PRIVILEGE_ESCALATION_RATE => AnomalyType::PrivilegeEscalation,
        idx::FIREWALL_CHANGE_COUNT => AnomalyType::FirewallChange,
        idx::NETWORK_EVENT_VOLUME => AnomalyType::NetworkActivity,
        idx::FAILED_LOGIN_COUNT => AnomalyType::FailedLogin,
        idx::WEEKDAY_ACTIVITY_RATIO => AnomalyType::UnusualSchedule,
        idx::NIGHT_ACTIVITY_RATIO => AnomalyType::NightActivity,
        _ => AnomalyType::Behavioral,
    }
}

/// Human-readable anomaly summary for the report
pub fn describe_anomaly(
    entity_id: &str,
    anomaly_type: AnomalyType,
    top_features: &[FeatureContribution],
) -> String {
    let Some(top) = top_features.first() else {
        return format!("Unusual behavioral pattern detected for {}", entity_id);
    };
    let value = top.value;

    match anomaly_type {
        AnomalyType::UnusualLoginTime => {
            format!("{} logged in at an unusual time ({:.1}:00)", entity_id, value)
        }
        AnomalyType::UnusualLoginPattern => {
            format!("{} shows irregular login patterns (std: {:.2})", entity_id, value)
        }
        AnomalyType::UnusualLocation => {
            format!("{} accessed from {} different locations", entity_id, value as i64)
        }
        AnomalyType::LocationVariance => format!(
            "{} accessed from unusual location ({:.0}% deviation)",
            entity_id,
            value * 100.0
        ),
        AnomalyType::UnusualPortUsage => {
            format!("{} accessed {} distinct ports", entity_id, value as i64)
        }
        AnomalyType::UnusualPort => format!(
            "{} used unusual ports in {:.0}% of connections",
            entity_id,
            value * 100.0
        ),
        AnomalyType::UnusualFileAccess => format!(
            "{} accessed {:.1} files/day (unusual volume)",
            entity_id, value
        ),
        AnomalyType::SensitiveFileAccess => {
            format!("{} accessed {:.2} sensitive files/day", entity_id, value)
        }
        AnomalyType::PrivilegeEscalation => format!(
            "{} performed {:.2} privilege escalations/day",
            entity_id, value
        ),
        AnomalyType::FirewallChange => {
            format!("{} made {} firewall changes", entity_id, value as i64)
        }
        AnomalyType::NetworkActivity => format!(
            "{} generated {:.1} network events/day",
            entity_id, value
        ),
        AnomalyType::FailedLogin => {
            format!("{} had {} failed logins", entity_id, value as i64)
        }
        AnomalyType::UnusualSchedule => format!(
            "{} shows unusual work schedule ({:.0}% weekday activity)",
            entity_id,
            value * 100.0
        ),
        AnomalyType::NightActivity => format!(
            "{} shows {:.0}% night activity (unusual)",
            entity_id,
            value * 100.0
        ),
        AnomalyType::Behavioral => {
            format!("Unusual {} detected for {}", top.display, entity_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::{display_name, FEATURE_NAMES};

    fn contribution(index: usize, value: f64, contribution: f64) -> FeatureContribution {
        FeatureContribution {
            index,
            name: FEATURE_NAMES[index].to_string(),
            display: display_name(index).to_string(),
            value,
            contribution,
            rank: 1,
            description: String::new(),
        }
    }

    #[test]
    fn test_rule_table_indicators_in_range() {
        for rule in TECHNIQUE_RULES {
            assert!(!rule.indicators.is_empty(), "{}", rule.technique_id);
            assert!(rule.base_confidence > 0.0 && rule.base_confidence <= 1.0);
            for &i in rule.indicators {
                assert!(i < FEATURE_NAMES.len());
            }
        }
    }

    #[test]
    fn test_strong_privilege_escalation_maps_t1068() {
        let top = vec![contribution(idx::PRIVILEGE_ESCALATION_RATE, 4.0, 30.0)];
        let mappings = map_techniques(&top);

        assert!(!mappings.is_empty());
        let t1068 = mappings
            .iter()
            .find(|m| m.technique_id == "T1068")
            .expect("T1068 mapped");
        assert!(t1068.confidence > 0.5);
        assert_eq!(t1068.tactic, "Privilege Escalation");
    }

    #[test]
    fn test_weak_contributions_map_nothing() {
        let top = vec![
            contribution(idx::AVG_LOGIN_HOUR, 9.0, 1.5),
            contribution(idx::FILE_ACCESS_RATE, 5.0, -0.8),
        ];
        assert!(map_techniques(&top).is_empty());
    }

    #[test]
    fn test_mappings_sorted_by_confidence() {
        let top = vec![
            contribution(idx::PRIVILEGE_ESCALATION_RATE, 4.0, 30.0),
            contribution(idx::UNUSUAL_PORT_RATE, 1.0, 18.0),
            contribution(idx::FAILED_LOGIN_COUNT, 12.0, 12.0),
        ];
        let mappings = map_techniques(&top);

        assert!(mappings.len() >= 3);
        for pair in mappings.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        for mapping in &mappings {
            assert!(mapping.confidence <= 1.0);
        }
    }

    #[test]
    fn test_determine_anomaly_type() {
        let top = vec![contribution(idx::UNUSUAL_PORT_RATE, 1.0, 25.0)];
        assert_eq!(determine_anomaly_type(&top), AnomalyType::UnusualPort);
        assert_eq!(determine_anomaly_type(&[]), AnomalyType::Behavioral);
    }

    #[test]
    fn test_describe_anomaly() {
        let top = vec![contribution(idx::LOCATION_DEVIATION, 1.0, 25.0)];
        let description = describe_anomaly("emp-7", AnomalyType::LocationVariance, &top);
        assert!(description.contains("emp-7"));
        assert!(description.contains("100% deviation"));
    }
}
