//! Mitigation recommendations
//!
//! Turns a classified anomaly and its mapped techniques into a prioritized
//! remediation list, driven by declarative rule tables.

use serde::{Deserialize, Serialize};

use crate::mitre::{AnomalyType, MitreMapping};
use crate::ml::scoring::RiskLevel;

/// How many of the top mapped techniques get technique-specific add-ons
const TECHNIQUE_ADDON_LIMIT: usize = 2;

/// Urgency bucket of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationCategory {
    Immediate,
    ShortTerm,
    LongTerm,
}

impl MitigationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MitigationCategory::Immediate => "immediate",
            MitigationCategory::ShortTerm => "short_term",
            MitigationCategory::LongTerm => "long_term",
        }
    }
}

/// One recommended remediation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitigationStrategy {
    /// 1 = highest priority
    pub priority: u8,
    pub category: MitigationCategory,
    pub action: String,
    pub description: String,
}

/// Rule-table entry
#[derive(Debug, Clone, Copy)]
struct Template {
    priority: u8,
    category: MitigationCategory,
    action: &'static str,
    description: &'static str,
}

impl Template {
    fn to_strategy(self) -> MitigationStrategy {
        MitigationStrategy {
            priority: self.priority,
            category: self.category,
            action: self.action.to_string(),
            description: self.description.to_string(),
        }
    }
}

use MitigationCategory::{Immediate, LongTerm, ShortTerm};

const LOGIN_TIME_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Verify employee activity",
        description: "Contact the employee to confirm the login was legitimate",
    },
    Template {
        priority: 2,
        category: Immediate,
        action: "Review access logs",
        description: "Check all activities performed during the unusual login session",
    },
    Template {
        priority: 3,
        category: ShortTerm,
        action: "Enable MFA alerts",
        description: "Configure alerts for logins outside normal hours",
    },
];

const LOCATION_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Verify location",
        description: "Confirm the employee is traveling or working from a new location",
    },
    Template {
        priority: 2,
        category: Immediate,
        action: "Check for VPN usage",
        description: "Verify whether the location change is due to a VPN or proxy",
    },
    Template {
        priority: 3,
        category: ShortTerm,
        action: "Implement geo-fencing",
        description: "Set up alerts for logins from unexpected geographic locations",
    },
];

const PORT_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Block suspicious port",
        description: "Temporarily block the unusual port pending investigation",
    },
    Template {
        priority: 2,
        category: Immediate,
        action: "Analyze network traffic",
        description: "Review all traffic on the unusual port for malicious activity",
    },
    Template {
        priority: 3,
        category: ShortTerm,
        action: "Update firewall rules",
        description: "Restrict port access to authorized users only",
    },
];

const FILE_ACCESS_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Review file access",
        description: "Audit which sensitive files were accessed and why",
    },
    Template {
        priority: 1,
        category: Immediate,
        action: "Check for data exfiltration",
        description: "Monitor for unusual data transfers or downloads",
    },
    Template {
        priority: 2,
        category: ShortTerm,
        action: "Restrict file permissions",
        description: "Review and tighten access controls on sensitive files",
    },
    Template {
        priority: 3,
        category: LongTerm,
        action: "Implement DLP",
        description: "Deploy data-loss-prevention tooling to monitor sensitive data",
    },
];

const PRIVILEGE_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Suspend elevated privileges",
        description: "Temporarily revoke sudo/admin access pending investigation",
    },
    Template {
        priority: 1,
        category: Immediate,
        action: "Review privilege usage",
        description: "Audit all commands executed with elevated privileges",
    },
    Template {
        priority: 2,
        category: ShortTerm,
        action: "Implement privilege monitoring",
        description: "Set up real-time alerts for privilege escalation attempts",
    },
    Template {
        priority: 3,
        category: LongTerm,
        action: "Apply least privilege principle",
        description: "Review and minimize privilege assignments across the organization",
    },
];

const FIREWALL_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Revert firewall changes",
        description: "Roll back unauthorized firewall rule modifications",
    },
    Template {
        priority: 1,
        category: Immediate,
        action: "Investigate change reason",
        description: "Determine why firewall rules were modified",
    },
    Template {
        priority: 2,
        category: ShortTerm,
        action: "Restrict firewall access",
        description: "Limit firewall configuration access to the security team only",
    },
    Template {
        priority: 3,
        category: LongTerm,
        action: "Implement change management",
        description: "Require an approval workflow for all firewall changes",
    },
];

const FAILED_LOGIN_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Lock account temporarily",
        description: "Prevent further login attempts to protect the account",
    },
    Template {
        priority: 2,
        category: Immediate,
        action: "Contact employee",
        description: "Verify whether the employee has login issues or the account is compromised",
    },
    Template {
        priority: 2,
        category: ShortTerm,
        action: "Force password reset",
        description: "Require a password reset with strong requirements",
    },
    Template {
        priority: 3,
        category: ShortTerm,
        action: "Enable account monitoring",
        description: "Set up enhanced monitoring for this account",
    },
];

const NETWORK_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Analyze traffic patterns",
        description: "Review network logs for signs of data exfiltration",
    },
    Template {
        priority: 2,
        category: Immediate,
        action: "Check for malware",
        description: "Scan the employee workstation for malware or backdoors",
    },
    Template {
        priority: 3,
        category: ShortTerm,
        action: "Implement bandwidth limits",
        description: "Set reasonable bandwidth limits for user accounts",
    },
];

const NIGHT_ACTIVITY_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Verify employee activity",
        description: "Confirm whether the employee was working late or the account is compromised",
    },
    Template {
        priority: 2,
        category: ShortTerm,
        action: "Review activities performed",
        description: "Audit all actions taken during off-hours",
    },
    Template {
        priority: 3,
        category: ShortTerm,
        action: "Set up off-hours alerts",
        description: "Configure notifications for activity outside business hours",
    },
];

/// Fallback when no type-specific rule matches
const DEFAULT_STRATEGIES: &[Template] = &[
    Template {
        priority: 1,
        category: Immediate,
        action: "Investigate anomaly",
        description: "Review the detected anomaly and gather more context",
    },
    Template {
        priority: 2,
        category: Immediate,
        action: "Contact employee",
        description: "Verify the unusual behavior with the employee",
    },
    Template {
        priority: 3,
        category: ShortTerm,
        action: "Monitor and review access",
        description: "Enable enhanced monitoring and review access for this account",
    },
];

/// Strategy lists keyed by anomaly type
static TYPE_STRATEGIES: &[(AnomalyType, &[Template])] = &[
    (AnomalyType::UnusualLoginTime, LOGIN_TIME_STRATEGIES),
    (AnomalyType::UnusualLoginPattern, LOGIN_TIME_STRATEGIES),
    (AnomalyType::UnusualLocation, LOCATION_STRATEGIES),
    (AnomalyType::LocationVariance, LOCATION_STRATEGIES),
    (AnomalyType::UnusualPortUsage, PORT_STRATEGIES),
    (AnomalyType::UnusualPort, PORT_STRATEGIES),
    (AnomalyType::UnusualFileAccess, FILE_ACCESS_STRATEGIES),
    (AnomalyType::SensitiveFileAccess, FILE_ACCESS_STRATEGIES),
    (AnomalyType::PrivilegeEscalation, PRIVILEGE_STRATEGIES),
    (AnomalyType::FirewallChange, FIREWALL_STRATEGIES),
    (AnomalyType::NetworkActivity, NETWORK_STRATEGIES),
    (AnomalyType::FailedLogin, FAILED_LOGIN_STRATEGIES),
    (AnomalyType::NightActivity, NIGHT_ACTIVITY_STRATEGIES),
    (AnomalyType::UnusualSchedule, NIGHT_ACTIVITY_STRATEGIES),
];

/// Technique-specific add-ons, applied for the top mapped techniques
static TECHNIQUE_STRATEGIES: &[(&str, Template)] = &[
    (
        "T1078",
        Template {
            priority: 2,
            category: ShortTerm,
            action: "Implement MFA",
            description: "Enable multi-factor authentication to prevent credential abuse",
        },
    ),
    (
        "T1021",
        Template {
            priority: 2,
            category: ShortTerm,
            action: "Restrict remote access",
            description: "Limit remote service access to authorized users and IPs",
        },
    ),
    (
        "T1068",
        Template {
            priority: 1,
            category: Immediate,
            action: "Patch vulnerabilities",
            description: "Apply security patches to prevent privilege escalation exploits",
        },
    ),
    (
        "T1048",
        Template {
            priority: 1,
            category: Immediate,
            action: "Monitor data transfers",
            description: "Implement network monitoring to detect data exfiltration",
        },
    ),
    (
        "T1562",
        Template {
            priority: 1,
            category: Immediate,
            action: "Restore security controls",
            description: "Re-enable any disabled security mechanisms",
        },
    ),
    (
        "T1530",
        Template {
            priority: 2,
            category: ShortTerm,
            action: "Audit cloud access",
            description: "Review and restrict cloud storage access permissions",
        },
    ),
];

const CRITICAL_ESCALATION: Template = Template {
    priority: 1,
    category: Immediate,
    action: "Escalate to security team",
    description: "CRITICAL: Immediately notify the security operations center",
};

const HIGH_ESCALATION: Template = Template {
    priority: 1,
    category: Immediate,
    action: "Alert security team",
    description: "HIGH RISK: Notify the security team for immediate review",
};

/// Build the prioritized mitigation list for an anomaly.
///
/// Deterministic and pure; always returns at least one entry, sorted
/// ascending by priority.
pub fn recommend(
    anomaly_type: AnomalyType,
    risk_level: RiskLevel,
    mappings: &[MitreMapping],
) -> Vec<MitigationStrategy> {
    let base = TYPE_STRATEGIES
        .iter()
        .find(|(ty, _)| *ty == anomaly_type)
        .map(|(_, templates)| *templates)
        .unwrap_or(DEFAULT_STRATEGIES);

    let mut strategies: Vec<MitigationStrategy> = Vec::with_capacity(base.len() + 3);

    match risk_level {
        RiskLevel::Critical => strategies.push(CRITICAL_ESCALATION.to_strategy()),
        RiskLevel::High => strategies.push(HIGH_ESCALATION.to_strategy()),
        _ => {}
    }

    strategies.extend(base.iter().map(|t| t.to_strategy()));

    for mapping in mappings.iter().take(TECHNIQUE_ADDON_LIMIT) {
        if let Some((_, template)) = TECHNIQUE_STRATEGIES
            .iter()
            .find(|(id, _)| *id == mapping.technique_id)
        {
            strategies.push(template.to_strategy());
        }
    }

    strategies.sort_by_key(|s| s.priority);
    strategies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(technique_id: &str, confidence: f64) -> MitreMapping {
        MitreMapping {
            technique_id: technique_id.to_string(),
            name: String::new(),
            tactic: String::new(),
            description: String::new(),
            confidence,
        }
    }

    #[test]
    fn test_always_at_least_one_strategy() {
        let strategies = recommend(AnomalyType::Behavioral, RiskLevel::Low, &[]);
        assert!(!strategies.is_empty());
        assert_eq!(strategies[0].action, "Investigate anomaly");
    }

    #[test]
    fn test_sorted_by_priority() {
        let strategies = recommend(
            AnomalyType::PrivilegeEscalation,
            RiskLevel::Critical,
            &[mapping("T1068", 0.9)],
        );

        assert!(strategies.len() >= 5);
        for pair in strategies.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
    }

    #[test]
    fn test_critical_adds_escalation() {
        let strategies = recommend(AnomalyType::UnusualLoginTime, RiskLevel::Critical, &[]);
        assert!(strategies.iter().any(|s| s.action == "Escalate to security team"));
        assert_eq!(strategies[0].priority, 1);

        let low = recommend(AnomalyType::UnusualLoginTime, RiskLevel::Low, &[]);
        assert!(!low.iter().any(|s| s.action == "Escalate to security team"));
    }

    #[test]
    fn test_technique_addons_capped_at_two() {
        let mappings = vec![
            mapping("T1078", 0.9),
            mapping("T1021", 0.8),
            mapping("T1530", 0.7),
        ];
        let strategies = recommend(AnomalyType::UnusualLoginTime, RiskLevel::Medium, &mappings);

        assert!(strategies.iter().any(|s| s.action == "Implement MFA"));
        assert!(strategies.iter().any(|s| s.action == "Restrict remote access"));
        // Third technique is beyond the add-on limit
        assert!(!strategies.iter().any(|s| s.action == "Audit cloud access"));
    }

    #[test]
    fn test_unknown_technique_is_ignored() {
        let strategies = recommend(
            AnomalyType::UnusualPort,
            RiskLevel::Medium,
            &[mapping("T9999", 0.9)],
        );
        assert_eq!(
            strategies.len(),
            PORT_STRATEGIES.len(),
            "unknown technique adds nothing"
        );
    }
}
