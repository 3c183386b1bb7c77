// 🚩 Discrepancy Records - what the classifier emits
//
// A record is immutable once created except for `status`, which only an
// explicit actor moves from active to resolved. Records are never deleted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TAXONOMY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    DataInconsistency,
    QuantitativeDiscrepancy,
    ContextualViolation,
    FormatError,
    MissingField,
}

impl DiscrepancyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyType::DataInconsistency => "data_inconsistency",
            DiscrepancyType::QuantitativeDiscrepancy => "quantitative_discrepancy",
            DiscrepancyType::ContextualViolation => "contextual_violation",
            DiscrepancyType::FormatError => "format_error",
            DiscrepancyType::MissingField => "missing_field",
        }
    }
}

impl fmt::Display for DiscrepancyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscrepancyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data_inconsistency" => Ok(DiscrepancyType::DataInconsistency),
            "quantitative_discrepancy" => Ok(DiscrepancyType::QuantitativeDiscrepancy),
            "contextual_violation" => Ok(DiscrepancyType::ContextualViolation),
            "format_error" => Ok(DiscrepancyType::FormatError),
            "missing_field" => Ok(DiscrepancyType::MissingField),
            other => Err(format!("unknown discrepancy type: {}", other)),
        }
    }
}

/// Ordered: Low < Medium < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyStatus {
    Active,
    Resolved,
}

impl DiscrepancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyStatus::Active => "active",
            DiscrepancyStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for DiscrepancyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DiscrepancyStatus::Active),
            "resolved" => Ok(DiscrepancyStatus::Resolved),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

// ============================================================================
// RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyRecord {
    pub discrepancy_type: DiscrepancyType,
    pub severity: Severity,

    /// Equivalence group, deadline rule or field the record is about
    pub field_name: String,

    pub documents_involved: BTreeSet<String>,

    /// Document id → value as presented
    pub values_by_document: BTreeMap<String, String>,

    /// UCP 600 article code (e.g., "article_18b"); None when no article applies
    pub ucp_reference: Option<String>,

    pub description: String,

    /// Verbatim article text
    pub rule_explanation: Option<String>,

    pub advice: Option<String>,

    pub status: DiscrepancyStatus,

    /// SHA-256 over type, field and per-document values
    pub fingerprint: String,
}

impl DiscrepancyRecord {
    pub fn new(
        discrepancy_type: DiscrepancyType,
        severity: Severity,
        field_name: impl Into<String>,
        values_by_document: BTreeMap<String, String>,
        description: impl Into<String>,
    ) -> Self {
        let field_name = field_name.into();
        let documents_involved = values_by_document.keys().cloned().collect();
        let fingerprint = compute_fingerprint(discrepancy_type, &field_name, &values_by_document);

        DiscrepancyRecord {
            discrepancy_type,
            severity,
            field_name,
            documents_involved,
            values_by_document,
            ucp_reference: None,
            description: description.into(),
            rule_explanation: None,
            advice: None,
            status: DiscrepancyStatus::Active,
            fingerprint,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DiscrepancyStatus::Active
    }
}

/// Deterministic identity of a finding, independent of document order
pub fn compute_fingerprint(
    discrepancy_type: DiscrepancyType,
    field_name: &str,
    values_by_document: &BTreeMap<String, String>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(discrepancy_type.as_str());
    hasher.update([0u8]);
    hasher.update(field_name);
    for (document, value) in values_by_document {
        hasher.update([0u8]);
        hasher.update(document);
        hasher.update([1u8]);
        hasher.update(value);
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_severity_is_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_new_record_is_active() {
        let record = DiscrepancyRecord::new(
            DiscrepancyType::QuantitativeDiscrepancy,
            Severity::High,
            "amount",
            values(&[("inv", "50000"), ("lc", "45000")]),
            "Amounts differ",
        );

        assert!(record.is_active());
        assert_eq!(record.documents_involved.len(), 2);
        assert_eq!(record.fingerprint.len(), 64);
    }

    #[test]
    fn test_fingerprint_depends_on_content() {
        let a = compute_fingerprint(DiscrepancyType::DataInconsistency, "x", &values(&[("d1", "a")]));
        let b = compute_fingerprint(DiscrepancyType::DataInconsistency, "x", &values(&[("d1", "b")]));
        let c = compute_fingerprint(DiscrepancyType::FormatError, "x", &values(&[("d1", "a")]));

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a,
            compute_fingerprint(DiscrepancyType::DataInconsistency, "x", &values(&[("d1", "a")]))
        );
    }

    #[test]
    fn test_parse_stored_strings() {
        assert_eq!(
            "quantitative_discrepancy".parse::<DiscrepancyType>(),
            Ok(DiscrepancyType::QuantitativeDiscrepancy)
        );
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert!("urgent".parse::<Severity>().is_err());
        assert_eq!("resolved".parse::<DiscrepancyStatus>(), Ok(DiscrepancyStatus::Resolved));
    }
}
