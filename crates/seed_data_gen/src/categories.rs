//! Categorical vocabularies and weighted distribution tables.
//!
//! Every category value written to the database comes from this module.
//! Weighted tables are fixed constants so their shape can be checked in
//! isolation; uniform vocabularies are plain slices.

use crate::GenerateError;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

/// A named categorical distribution: `(label, weight)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedTable {
    pub name: &'static str,
    pub entries: &'static [(&'static str, u32)],
}

pub const ASSET_STATUS: WeightedTable = WeightedTable {
    name: "asset_status",
    entries: &[
        ("active", 70),
        ("inactive", 15),
        ("maintenance", 10),
        ("decommissioned", 5),
    ],
};

pub const EVENT_SEVERITY: WeightedTable = WeightedTable {
    name: "event_severity",
    entries: &[("low", 30), ("medium", 40), ("high", 25), ("critical", 5)],
};

pub const INCIDENT_SEVERITY: WeightedTable = WeightedTable {
    name: "incident_severity",
    entries: &[("low", 20), ("medium", 35), ("high", 35), ("critical", 10)],
};

pub const INCIDENT_PRIORITY: WeightedTable = WeightedTable {
    name: "incident_priority",
    entries: &[("low", 20), ("medium", 35), ("high", 35), ("urgent", 10)],
};

pub const INCIDENT_STATUS: WeightedTable = WeightedTable {
    name: "incident_status",
    entries: &[
        ("open", 30),
        ("investigating", 25),
        ("contained", 15),
        ("resolved", 20),
        ("closed", 10),
    ],
};

pub const EVENT_OCCURRENCE_STATUS: WeightedTable = WeightedTable {
    name: "event_occurrence_status",
    entries: &[
        ("new", 40),
        ("acknowledged", 25),
        ("investigating", 15),
        ("resolved", 15),
        ("false_positive", 5),
    ],
};

pub const INCIDENT_OCCURRENCE_STATUS: WeightedTable = WeightedTable {
    name: "incident_occurrence_status",
    entries: &[
        ("reported", 30),
        ("triaged", 25),
        ("escalated", 20),
        ("mitigated", 15),
        ("resolved", 10),
    ],
};

pub const USER_ASSET_ROLE: WeightedTable = WeightedTable {
    name: "user_asset_role",
    entries: &[("viewer", 40), ("editor", 30), ("admin", 20), ("owner", 10)],
};

/// Every weighted table, for validation.
pub const WEIGHTED_TABLES: &[WeightedTable] = &[
    ASSET_STATUS,
    EVENT_SEVERITY,
    INCIDENT_SEVERITY,
    INCIDENT_PRIORITY,
    INCIDENT_STATUS,
    EVENT_OCCURRENCE_STATUS,
    INCIDENT_OCCURRENCE_STATUS,
    USER_ASSET_ROLE,
];

/// Incident statuses that carry a `resolved_at` timestamp.
pub const RESOLVED_INCIDENT_STATUSES: &[&str] = &["resolved", "closed"];

/// Named tags assigned, in order, to the first generated tags.
pub const TAG_VOCABULARY: &[&str] = &[
    "critical",
    "production",
    "development",
    "staging",
    "database",
    "web-server",
    "api-gateway",
    "message-queue",
    "cache",
    "storage",
    "pci-compliant",
    "gdpr-regulated",
    "sox-compliant",
    "public-facing",
    "internal",
    "deprecated",
    "legacy",
    "cloud",
    "on-premise",
    "hybrid",
];

pub const ASSET_TYPES: &[&str] = &[
    "server",
    "database",
    "application",
    "network-device",
    "container",
    "kubernetes-pod",
    "storage-bucket",
    "api-endpoint",
];

pub const EVENT_TYPES: &[&str] = &[
    "authentication_failure",
    "authorization_violation",
    "data_exfiltration",
    "malware_detected",
    "vulnerability_scan",
    "configuration_change",
    "suspicious_activity",
    "brute_force_attempt",
    "privilege_escalation",
    "anomaly_detected",
    "policy_violation",
    "compliance_check_failed",
];

pub const INCIDENT_TYPES: &[&str] = &[
    "security_breach",
    "data_leak",
    "ransomware_attack",
    "ddos_attack",
    "insider_threat",
    "compliance_violation",
    "unauthorized_access",
    "system_compromise",
    "phishing_campaign",
    "supply_chain_attack",
];

pub const OPERATING_SYSTEMS: &[&str] = &["Linux", "Windows", "Unix", "Container"];

pub const ENVIRONMENTS: &[&str] = &["production", "staging", "development", "test"];

/// Criticality and estimated-impact levels
pub const IMPACT_LEVELS: &[&str] = &["low", "medium", "high", "critical"];

pub const PROTOCOLS: &[&str] = &["TCP", "UDP", "ICMP", "HTTP", "HTTPS"];

pub const DETECTION_METHODS: &[&str] = &["signature", "anomaly", "heuristic", "ml_model"];

pub const ATTACK_VECTORS: &[&str] = &["network", "email", "web", "physical", "social"];

pub const DETECTION_SOURCES: &[&str] = &["siem", "ids", "manual", "automated"];

/// Hostname prefixes
pub const HOST_PREFIXES: &[&str] = &["web", "db", "app", "api", "lb", "mail", "cache", "srv"];

impl WeightedTable {
    /// Labels in declaration order
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(label, _)| *label)
    }

    /// Weight assigned to a label, if the label belongs to this table
    pub fn weight_of(&self, label: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, w)| *w)
    }

    pub fn total_weight(&self) -> u32 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Check the table is non-empty, has positive weights and distinct labels.
    pub fn validate(&self) -> Result<(), GenerateError> {
        let invalid = |reason: String| GenerateError::InvalidWeights {
            table: self.name,
            reason,
        };

        if self.entries.is_empty() {
            return Err(invalid("no entries".to_string()));
        }
        for (i, (label, weight)) in self.entries.iter().enumerate() {
            if *weight == 0 {
                return Err(invalid(format!("label '{}' has zero weight", label)));
            }
            if self.entries[..i].iter().any(|(other, _)| other == label) {
                return Err(invalid(format!("label '{}' appears twice", label)));
            }
        }
        Ok(())
    }

    /// Build a sampler for this table.
    pub fn picker(&self) -> Result<WeightedPicker, GenerateError> {
        self.validate()?;
        let index = WeightedIndex::new(self.entries.iter().map(|(_, w)| *w)).map_err(|e| {
            GenerateError::InvalidWeights {
                table: self.name,
                reason: e.to_string(),
            }
        })?;
        Ok(WeightedPicker {
            labels: self.labels().collect(),
            index,
        })
    }
}

/// Pre-built sampler over a [`WeightedTable`].
#[derive(Debug, Clone)]
pub struct WeightedPicker {
    labels: Vec<&'static str>,
    index: WeightedIndex<u32>,
}

impl WeightedPicker {
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &'static str {
        self.labels[self.index.sample(rng)]
    }
}
