// 📋 Discrepancy Report - what the document examiner reads
//
// Groups the records of one run by severity and type and derives an overall
// recommendation from the active ones. Resolved records stay in the report but
// no longer weigh on the recommendation.

use crate::classifier::ClassificationRun;
use crate::discrepancy::{DiscrepancyRecord, DiscrepancyType, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// No discrepancies: honour the presentation
    Accept,
    /// Only medium/low findings: honour, noting the reservations
    AcceptWithReservations,
    /// High findings: ask the applicant for an amendment or waiver
    SeekAmendment,
    /// Critical findings: refuse the presentation
    Reject,
}

impl Recommendation {
    pub fn for_severity(highest: Option<Severity>) -> Self {
        match highest {
            None => Recommendation::Accept,
            Some(Severity::Critical) => Recommendation::Reject,
            Some(Severity::High) => Recommendation::SeekAmendment,
            Some(Severity::Medium | Severity::Low) => Recommendation::AcceptWithReservations,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Accept => "accept",
            Recommendation::AcceptWithReservations => "accept_with_reservations",
            Recommendation::SeekAmendment => "seek_amendment",
            Recommendation::Reject => "reject",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub lc_reference: Option<String>,
    pub documents_examined: usize,
    pub total: usize,
    pub active: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_type: BTreeMap<DiscrepancyType, usize>,
    pub recommendation: Recommendation,

    /// Most severe first
    pub records: Vec<DiscrepancyRecord>,
}

impl DiscrepancyReport {
    pub fn from_run(run: &ClassificationRun, lc_reference: Option<String>) -> Self {
        Self::from_records(run.records.clone(), run.documents_examined, lc_reference)
    }

    /// Build from stored records (e.g. a persisted run reloaded later)
    pub fn from_records(
        mut records: Vec<DiscrepancyRecord>,
        documents_examined: usize,
        lc_reference: Option<String>,
    ) -> Self {
        records.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.field_name.cmp(&b.field_name))
        });

        let mut by_severity = BTreeMap::new();
        let mut by_type = BTreeMap::new();
        for record in &records {
            *by_severity.entry(record.severity).or_insert(0) += 1;
            *by_type.entry(record.discrepancy_type).or_insert(0) += 1;
        }

        let highest_active = records
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.severity)
            .max();
        let active = records.iter().filter(|r| r.is_active()).count();

        DiscrepancyReport {
            lc_reference,
            documents_examined,
            total: records.len(),
            active,
            by_severity,
            by_type,
            recommendation: Recommendation::for_severity(highest_active),
            records,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn summary(&self) -> String {
        format!(
            "LC {}: {} documents examined, {} discrepancies ({} active; {} critical, {} high, {} medium, {} low) - recommendation: {}",
            self.lc_reference.as_deref().unwrap_or("(unreferenced)"),
            self.documents_examined,
            self.total,
            self.active,
            self.count(Severity::Critical),
            self.count(Severity::High),
            self.count(Severity::Medium),
            self.count(Severity::Low),
            self.recommendation
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrepancy::DiscrepancyStatus;

    fn record(discrepancy_type: DiscrepancyType, severity: Severity, field: &str) -> DiscrepancyRecord {
        let values = BTreeMap::from([("doc-1".to_string(), field.to_string())]);
        DiscrepancyRecord::new(discrepancy_type, severity, field, values, "test finding")
    }

    #[test]
    fn test_empty_report_accepts() {
        let report = DiscrepancyReport::from_records(vec![], 3, Some("LC123456789".to_string()));

        assert_eq!(report.recommendation, Recommendation::Accept);
        assert_eq!(report.total, 0);
        assert!(report.summary().contains("LC123456789"));

        println!("✅ Test passed: {}", report.summary());
    }

    #[test]
    fn test_recommendation_follows_highest_active_severity() {
        let records = vec![
            record(DiscrepancyType::FormatError, Severity::Low, "44C"),
            record(DiscrepancyType::QuantitativeDiscrepancy, Severity::High, "amount"),
            record(DiscrepancyType::ContextualViolation, Severity::Critical, "shipping_date"),
        ];

        let report = DiscrepancyReport::from_records(records, 3, None);

        assert_eq!(report.recommendation, Recommendation::Reject);
        assert_eq!(report.records[0].severity, Severity::Critical);
        assert_eq!(report.count(Severity::High), 1);
        assert_eq!(report.by_type[&DiscrepancyType::FormatError], 1);

        println!("✅ Test passed: {}", report.summary());
    }

    #[test]
    fn test_resolved_records_do_not_weigh() {
        let mut critical = record(DiscrepancyType::ContextualViolation, Severity::Critical, "shipping_date");
        critical.status = DiscrepancyStatus::Resolved;
        let records = vec![
            critical,
            record(DiscrepancyType::MissingField, Severity::Medium, "bl_number"),
        ];

        let report = DiscrepancyReport::from_records(records, 2, None);

        assert_eq!(report.total, 2);
        assert_eq!(report.active, 1);
        assert_eq!(report.recommendation, Recommendation::AcceptWithReservations);
    }

    #[test]
    fn test_recommendation_levels() {
        assert_eq!(Recommendation::for_severity(Some(Severity::High)), Recommendation::SeekAmendment);
        assert_eq!(
            Recommendation::for_severity(Some(Severity::Low)),
            Recommendation::AcceptWithReservations
        );
    }
}
