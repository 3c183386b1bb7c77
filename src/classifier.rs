// ⚖️ Discrepancy Classifier - cross-document comparison under UCP 600
//
// Given the typed fields of every document in a presentation, the classifier:
//   1. validates catalogued fields against their compiled SWIFT formats
//   2. flags mandatory fields a document is missing
//   3. compares every equivalence group across the documents that carry it
//   4. checks date ordering against deadlines (shipment vs. expiry)
//   5. cites the UCP 600 article for each finding
//
// It is pure: no I/O, no clock, no shared state. The same document set always
// yields the same records, whatever order the documents arrive in.

use crate::discrepancy::{DiscrepancyRecord, DiscrepancyType, Severity};
use crate::error::ClassifyError;
use crate::fields::{DocumentFields, DocumentSet, ExtractedField, FieldValue, Tolerance};
use crate::reference::{DeadlineRule, EquivalenceGroup, FieldRef, ReferenceData, ValueKind};
use crate::validator::{validate, ValidationOutcome};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Below this OCR confidence a finding carries a verification hint
const LOW_CONFIDENCE: f64 = 0.6;

/// Word overlap at which two conflicting texts read as variants of each other
const AMBIGUITY_OVERLAP: f64 = 0.5;

// ============================================================================
// RUN OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    pub document_id: String,
    pub field_name: String,
    pub format: String,
    pub outcome: ValidationOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRun {
    pub records: Vec<DiscrepancyRecord>,

    /// Outcome for every catalogued field that was format-checked
    pub field_validations: Vec<FieldValidation>,

    /// Misconfigured groups that were skipped; the run itself still completed
    pub configuration_errors: Vec<ClassifyError>,

    pub documents_examined: usize,
}

impl ClassificationRun {
    pub fn has_discrepancies(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.records.iter().map(|r| r.severity).max()
    }

    pub fn records_of(&self, discrepancy_type: DiscrepancyType) -> Vec<&DiscrepancyRecord> {
        self.records
            .iter()
            .filter(|r| r.discrepancy_type == discrepancy_type)
            .collect()
    }
}

// ============================================================================
// SEVERITY POLICY
// ============================================================================

/// Severity of a finding.
///
/// `material` marks a data inconsistency that cannot be read away as wording
/// (texts that largely agree yet name different goods, or contradicting
/// currencies).
pub fn severity_for(discrepancy_type: DiscrepancyType, material: bool) -> Severity {
    match discrepancy_type {
        DiscrepancyType::ContextualViolation => Severity::Critical,
        DiscrepancyType::QuantitativeDiscrepancy => Severity::High,
        DiscrepancyType::DataInconsistency if material => Severity::High,
        DiscrepancyType::DataInconsistency => Severity::Medium,
        DiscrepancyType::MissingField => Severity::Medium,
        DiscrepancyType::FormatError => Severity::Low,
    }
}

// ============================================================================
// TEXT COMPARISON
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextComparison {
    Consistent,
    /// One text restates the other in general terms; `first` when that is `a`
    GeneralTerms { first: bool },
    Conflict { ambiguous: bool },
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "of", "on", "or", "per", "the", "to",
    "with",
];

fn canonical_word(word: &str) -> String {
    let expanded = match word {
        "co" => "company",
        "ltd" => "limited",
        "inc" => "incorporated",
        "corp" => "corporation",
        "intl" => "international",
        "pcs" => "pieces",
        "qty" => "quantity",
        other => other,
    };
    // crude plural folding: "widgets" ~ "widget"
    if expanded.len() > 3 && expanded.ends_with('s') && !expanded.ends_with("ss") {
        expanded[..expanded.len() - 1].to_string()
    } else {
        expanded.to_string()
    }
}

/// Lower-case, punctuation to spaces, whitespace collapsed
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn significant_words(text: &str) -> BTreeSet<String> {
    normalize_text(text)
        .split(' ')
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .map(canonical_word)
        .collect()
}

/// Share of significant words two texts have in common (Jaccard)
fn word_overlap(words_a: &BTreeSet<String>, words_b: &BTreeSet<String>) -> f64 {
    let total = words_a.union(words_b).count();
    if total == 0 {
        return 1.0;
    }
    words_a.intersection(words_b).count() as f64 / total as f64
}

/// Compare two narrative values.
///
/// Identical after normalisation, or the same significant words in any order,
/// is consistent. A text whose words are a subset of the other's restates it
/// in general terms; whether that is acceptable depends on the document it
/// comes from. Anything else conflicts, ambiguously when the texts still
/// share most of their words.
pub fn compare_text(a: &str, b: &str) -> TextComparison {
    if normalize_text(a) == normalize_text(b) {
        return TextComparison::Consistent;
    }

    let words_a = significant_words(a);
    let words_b = significant_words(b);
    if words_a == words_b {
        return TextComparison::Consistent;
    }
    if words_a.is_subset(&words_b) {
        return TextComparison::GeneralTerms { first: true };
    }
    if words_b.is_subset(&words_a) {
        return TextComparison::GeneralTerms { first: false };
    }

    TextComparison::Conflict {
        ambiguous: word_overlap(&words_a, &words_b) >= AMBIGUITY_OVERLAP,
    }
}

fn same_amount(a: f64, b: f64) -> bool {
    (a * 100.0).round() == (b * 100.0).round()
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct DiscrepancyClassifier {
    reference: ReferenceData,
}

/// One document's contribution to a group or deadline
struct Contribution<'a> {
    document: &'a DocumentFields,
    field: &'a ExtractedField,
}

/// A record before citation, with the fields its values were read from
struct Finding {
    record: DiscrepancyRecord,
    /// (document id, field name) behind each quoted value
    sources: Vec<(String, String)>,
    /// Conflict only among documents allowed to use general terms
    general_terms: bool,
}

impl Finding {
    fn new(record: DiscrepancyRecord, sources: Vec<(String, String)>) -> Self {
        Finding {
            record,
            sources,
            general_terms: false,
        }
    }

    fn from_contributions<'c, 'a: 'c>(
        record: DiscrepancyRecord,
        contributions: impl IntoIterator<Item = &'c Contribution<'a>>,
    ) -> Self {
        let sources = contributions
            .into_iter()
            .map(|c| (c.document.document_id.clone(), c.field.field_name.clone()))
            .collect();
        Finding::new(record, sources)
    }
}

impl DiscrepancyClassifier {
    pub fn new(reference: ReferenceData) -> Self {
        DiscrepancyClassifier { reference }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Classify one presentation.
    ///
    /// Fails only when nothing can be compared at all; misconfigured groups
    /// are reported in the run and skipped.
    pub fn classify(&self, documents: &DocumentSet) -> Result<ClassificationRun, ClassifyError> {
        if self.reference.equivalence_groups.is_empty() {
            return Err(ClassifyError::ClassificationUnavailable(
                "reference data has no equivalence map".to_string(),
            ));
        }

        let mut findings = Vec::new();
        let mut configuration_errors = Vec::new();

        let field_validations = self.check_formats(documents, &mut findings);
        self.check_unreadable(documents, &field_validations, &mut findings);
        self.check_mandatory(documents, &mut findings);

        for group in &self.reference.equivalence_groups {
            match self.compare_group(group, documents) {
                Ok(Some(finding)) => findings.push(finding),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(group = %group.name, %error, "skipping misconfigured equivalence group");
                    configuration_errors.push(error);
                }
            }
        }

        for rule in &self.reference.deadline_rules {
            match self.check_deadline(rule, documents) {
                Ok(Some(finding)) => findings.push(finding),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(rule = %rule.name, %error, "skipping misconfigured deadline rule");
                    configuration_errors.push(error);
                }
            }
        }

        let records: Vec<DiscrepancyRecord> = findings
            .into_iter()
            .map(|finding| self.cite(finding, documents))
            .collect();

        tracing::info!(
            documents = documents.len(),
            discrepancies = records.len(),
            configuration_errors = configuration_errors.len(),
            "classification complete"
        );

        Ok(ClassificationRun {
            records,
            field_validations,
            configuration_errors,
            documents_examined: documents.len(),
        })
    }

    // ------------------------------------------------------------------------
    // Field-level checks
    // ------------------------------------------------------------------------

    fn check_formats(&self, documents: &DocumentSet, findings: &mut Vec<Finding>) -> Vec<FieldValidation> {
        let catalog = &self.reference.field_formats;
        let mut validations = Vec::new();

        for document in documents.values() {
            if !catalog.covers(&document.document_type) {
                continue;
            }
            for field in document.fields.values() {
                let Some(spec) = catalog.get(&document.document_type, &field.field_name) else {
                    continue;
                };
                let outcome = validate(&field.raw_value, &spec.compile());

                if !outcome.passed {
                    let values = BTreeMap::from([(document.document_id.clone(), field.raw_value.clone())]);
                    let record = DiscrepancyRecord::new(
                        DiscrepancyType::FormatError,
                        severity_for(DiscrepancyType::FormatError, false),
                        field.field_name.clone(),
                        values,
                        format!(
                            "Field {} ({}) of document '{}' does not match format {}: {}",
                            spec.tag,
                            spec.name,
                            document.document_id,
                            spec.format,
                            outcome.summary()
                        ),
                    );
                    findings.push(Finding::new(
                        record,
                        vec![(document.document_id.clone(), field.field_name.clone())],
                    ));
                }

                validations.push(FieldValidation {
                    document_id: document.document_id.clone(),
                    field_name: field.field_name.clone(),
                    format: spec.format.clone(),
                    outcome,
                });
            }
        }

        validations
    }

    fn check_unreadable(
        &self,
        documents: &DocumentSet,
        validations: &[FieldValidation],
        findings: &mut Vec<Finding>,
    ) {
        for document in documents.values() {
            for field in document.fields.values().filter(|f| f.value.is_unreadable()) {
                let already_reported = validations.iter().any(|v| {
                    !v.outcome.passed
                        && v.document_id == document.document_id
                        && v.field_name == field.field_name
                });
                if already_reported {
                    continue;
                }

                let values = BTreeMap::from([(document.document_id.clone(), field.raw_value.clone())]);
                let record = DiscrepancyRecord::new(
                    DiscrepancyType::FormatError,
                    severity_for(DiscrepancyType::FormatError, false),
                    field.field_name.clone(),
                    values,
                    format!(
                        "Field '{}' of document '{}' could not be read as {}: '{}'",
                        field.field_name,
                        document.document_id,
                        field.data_type.name(),
                        field.raw_value
                    ),
                );
                findings.push(Finding::new(
                    record,
                    vec![(document.document_id.clone(), field.field_name.clone())],
                ));
            }
        }
    }

    /// A requirement is met by the field or any alias the reference data
    /// accepts for it on the same document type
    fn check_mandatory(&self, documents: &DocumentSet, findings: &mut Vec<Finding>) {
        for document in documents.values() {
            let Some(requirement) = self.reference.requirement(&document.document_type) else {
                continue;
            };
            for name in &requirement.mandatory {
                let present = self
                    .reference
                    .aliases(&document.document_type, name)
                    .into_iter()
                    .filter_map(|alias| document.get(alias))
                    .any(|f| !f.raw_value.trim().is_empty());
                if present {
                    continue;
                }

                let values = BTreeMap::from([(document.document_id.clone(), String::new())]);
                let record = DiscrepancyRecord::new(
                    DiscrepancyType::MissingField,
                    severity_for(DiscrepancyType::MissingField, false),
                    name.clone(),
                    values,
                    format!(
                        "Mandatory field '{}' is missing from {} '{}'",
                        name, document.document_type, document.document_id
                    ),
                );
                findings.push(Finding::new(record, Vec::new()));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Cross-document checks
    // ------------------------------------------------------------------------

    /// First present member per document; unreadable values are left out
    /// (they were reported as format errors)
    fn collect<'a>(members: &[FieldRef], documents: &'a DocumentSet) -> Vec<Contribution<'a>> {
        documents
            .values()
            .filter_map(|document| {
                members
                    .iter()
                    .filter(|m| m.document_type == document.document_type)
                    .find_map(|m| document.get(&m.field))
                    .filter(|field| !field.value.is_unreadable())
                    .map(|field| Contribution { document, field })
            })
            .collect()
    }

    fn check_kind(
        group: &str,
        kind: ValueKind,
        contribution: &Contribution<'_>,
    ) -> Result<(), ClassifyError> {
        let compatible = matches!(
            (kind, &contribution.field.value),
            (ValueKind::Amount | ValueKind::Number, FieldValue::Amount { .. } | FieldValue::Number(_))
                | (ValueKind::Date, FieldValue::Date(_))
                | (ValueKind::Text, FieldValue::Text(_))
        );
        if compatible {
            Ok(())
        } else {
            Err(ClassifyError::TypeMismatch {
                group: group.to_string(),
                expected: kind.name().to_string(),
                found: contribution.field.value.kind().to_string(),
                document_id: contribution.document.document_id.clone(),
                field: contribution.field.field_name.clone(),
            })
        }
    }

    fn values_of(contributions: &[Contribution<'_>]) -> BTreeMap<String, String> {
        contributions
            .iter()
            .map(|c| (c.document.document_id.clone(), c.field.raw_value.trim().to_string()))
            .collect()
    }

    fn compare_group(
        &self,
        group: &EquivalenceGroup,
        documents: &DocumentSet,
    ) -> Result<Option<Finding>, ClassifyError> {
        let contributions = Self::collect(&group.members, documents);
        if contributions.len() < 2 {
            tracing::debug!(group = %group.name, contributors = contributions.len(), "not enough documents to compare");
            return Ok(None);
        }

        for contribution in &contributions {
            Self::check_kind(&group.name, group.kind, contribution)?;
        }

        let finding = match group.kind {
            ValueKind::Amount | ValueKind::Number => self
                .compare_amounts(group, &contributions, documents)
                .map(|record| Finding::from_contributions(record, &contributions)),
            ValueKind::Date => Self::compare_dates(group, &contributions)
                .map(|record| Finding::from_contributions(record, &contributions)),
            ValueKind::Text => self.compare_texts(group, &contributions),
        };
        Ok(finding)
    }

    fn compare_amounts(
        &self,
        group: &EquivalenceGroup,
        contributions: &[Contribution<'_>],
        documents: &DocumentSet,
    ) -> Option<DiscrepancyRecord> {
        let currencies: BTreeSet<&str> = contributions
            .iter()
            .filter_map(|c| match &c.field.value {
                FieldValue::Amount { currency: Some(ccy), .. } => Some(ccy.as_str()),
                _ => None,
            })
            .collect();

        if currencies.len() > 1 {
            let listed: Vec<&str> = currencies.into_iter().collect();
            return Some(DiscrepancyRecord::new(
                DiscrepancyType::DataInconsistency,
                severity_for(DiscrepancyType::DataInconsistency, true),
                group.name.clone(),
                Self::values_of(contributions),
                format!("Currency of '{}' differs across documents: {}", group.name, listed.join(", ")),
            ));
        }

        let tolerance = group.tolerance.as_ref().and_then(|source| {
            let fields: Vec<FieldRef> = source
                .fields
                .iter()
                .map(|f| FieldRef::new(&source.document_type, f))
                .collect();
            Self::collect(&fields, documents)
                .into_iter()
                .find_map(|c| Tolerance::parse(&c.field.raw_value))
                .map(|t| (source.document_type.as_str(), t))
        });

        let amount = |c: &Contribution<'_>| c.field.value.as_number().unwrap_or_default();
        let (mismatch, band_note) = match tolerance {
            Some((credit_type, band)) => {
                let (credit, others): (Vec<&Contribution<'_>>, Vec<&Contribution<'_>>) = contributions
                    .iter()
                    .partition(|c| c.document.document_type == credit_type);
                let mismatch = if credit.is_empty() {
                    Self::any_pair_differs(contributions.iter().map(amount).collect())
                } else {
                    Self::any_pair_differs(credit.iter().map(|c| amount(c)).collect())
                        || others.iter().any(|other| {
                            credit.iter().any(|c| !band.accepts(amount(c), amount(other)))
                        })
                };
                let note = format!(
                    " (tolerance +{}%/-{}%)",
                    band.plus_percent, band.minus_percent
                );
                (mismatch, note)
            }
            None => (
                Self::any_pair_differs(contributions.iter().map(amount).collect()),
                String::new(),
            ),
        };

        if !mismatch {
            return None;
        }

        // Ties go to the lowest document id so the text is order-independent
        let highest = contributions.iter().max_by(|a, b| {
            amount(a)
                .total_cmp(&amount(b))
                .then_with(|| b.document.document_id.cmp(&a.document.document_id))
        })?;
        let lowest = contributions.iter().min_by(|a, b| {
            amount(a)
                .total_cmp(&amount(b))
                .then_with(|| a.document.document_id.cmp(&b.document.document_id))
        })?;

        Some(DiscrepancyRecord::new(
            DiscrepancyType::QuantitativeDiscrepancy,
            severity_for(DiscrepancyType::QuantitativeDiscrepancy, false),
            group.name.clone(),
            Self::values_of(contributions),
            format!(
                "{} of {} '{}' ({:.2}) exceeds {} '{}' ({:.2}) beyond the permitted tolerance{}",
                group.name,
                highest.document.document_type,
                highest.document.document_id,
                amount(highest),
                lowest.document.document_type,
                lowest.document.document_id,
                amount(lowest),
                band_note
            ),
        ))
    }

    fn any_pair_differs(values: Vec<f64>) -> bool {
        values
            .iter()
            .any(|a| values.iter().any(|b| !same_amount(*a, *b)))
    }

    fn compare_dates(group: &EquivalenceGroup, contributions: &[Contribution<'_>]) -> Option<DiscrepancyRecord> {
        let dates: BTreeSet<_> = contributions.iter().filter_map(|c| c.field.value.as_date()).collect();
        if dates.len() <= 1 {
            return None;
        }

        Some(DiscrepancyRecord::new(
            DiscrepancyType::DataInconsistency,
            severity_for(DiscrepancyType::DataInconsistency, true),
            group.name.clone(),
            Self::values_of(contributions),
            format!("Documents state different dates for '{}'", group.name),
        ))
    }

    fn compare_texts(&self, group: &EquivalenceGroup, contributions: &[Contribution<'_>]) -> Option<Finding> {
        let mut conflict = false;
        let mut ambiguous = false;
        let mut strict_conflict = false;

        for (i, a) in contributions.iter().enumerate() {
            for b in &contributions[i + 1..] {
                let (Some(text_a), Some(text_b)) = (a.field.value.as_text(), b.field.value.as_text()) else {
                    continue;
                };
                let outcome = match compare_text(text_a, text_b) {
                    TextComparison::Consistent => None,
                    TextComparison::GeneralTerms { first } => {
                        // Only the document stating the general terms is held to account
                        let general = if first { a } else { b };
                        self.reference
                            .is_strict(&general.document.document_type)
                            .then(|| {
                                word_overlap(&significant_words(text_a), &significant_words(text_b))
                                    >= AMBIGUITY_OVERLAP
                            })
                    }
                    TextComparison::Conflict { ambiguous } => Some(ambiguous),
                };

                if let Some(amb) = outcome {
                    conflict = true;
                    ambiguous |= amb;
                    strict_conflict |= self.reference.is_strict(&a.document.document_type)
                        || self.reference.is_strict(&b.document.document_type);
                }
            }
        }

        if !conflict {
            return None;
        }

        let types: BTreeSet<&str> = contributions
            .iter()
            .map(|c| c.document.document_type.as_str())
            .collect();
        let record = DiscrepancyRecord::new(
            DiscrepancyType::DataInconsistency,
            severity_for(DiscrepancyType::DataInconsistency, ambiguous),
            group.name.clone(),
            Self::values_of(contributions),
            format!(
                "{} conflicts between {}",
                humanize(&group.name),
                types.into_iter().collect::<Vec<_>>().join(", ")
            ),
        );

        let mut finding = Finding::from_contributions(record, contributions);
        finding.general_terms = !strict_conflict;
        Some(finding)
    }

    fn check_deadline(
        &self,
        rule: &DeadlineRule,
        documents: &DocumentSet,
    ) -> Result<Option<Finding>, ClassifyError> {
        let events = Self::collect(&rule.events, documents);
        let deadlines = Self::collect(&rule.deadline, documents);
        if events.is_empty() || deadlines.is_empty() {
            return Ok(None);
        }

        for contribution in events.iter().chain(deadlines.iter()) {
            Self::check_kind(&rule.name, ValueKind::Date, contribution)?;
        }

        let Some(deadline) = deadlines.iter().filter_map(|c| c.field.value.as_date()).min() else {
            return Ok(None);
        };
        let late: Vec<&Contribution<'_>> = events
            .iter()
            .filter(|c| c.field.value.as_date().map(|d| d > deadline).unwrap_or(false))
            .collect();
        let Some(latest) = late.iter().filter_map(|c| c.field.value.as_date()).max() else {
            return Ok(None);
        };

        let mut values = Self::values_of(&deadlines);
        for contribution in &late {
            values.insert(
                contribution.document.document_id.clone(),
                contribution.field.raw_value.trim().to_string(),
            );
        }

        let record = DiscrepancyRecord::new(
            DiscrepancyType::ContextualViolation,
            severity_for(DiscrepancyType::ContextualViolation, false),
            rule.name.clone(),
            values,
            format!(
                "{} ({}) is after {} ({})",
                rule.event_label,
                latest.format("%Y-%m-%d"),
                rule.deadline_label,
                deadline.format("%Y-%m-%d")
            ),
        );
        let sources = deadlines.iter().chain(late.iter().copied());
        Ok(Some(Finding::from_contributions(record, sources)))
    }

    // ------------------------------------------------------------------------
    // UCP citation
    // ------------------------------------------------------------------------

    fn cite(&self, finding: Finding, documents: &DocumentSet) -> DiscrepancyRecord {
        let Finding {
            mut record,
            sources,
            general_terms,
        } = finding;

        let article = if general_terms {
            self.reference
                .lookup_general_terms(record.discrepancy_type, &record.field_name)
        } else {
            self.reference.lookup(record.discrepancy_type, &record.field_name)
        };
        match article {
            Some(article) => {
                record.ucp_reference = Some(article.code.clone());
                record.rule_explanation = Some(article.text.clone());
                record.advice = article.advice.clone();
            }
            None => {
                record.ucp_reference = None;
                record.rule_explanation = None;
                record.advice = Some(generic_advice(record.discrepancy_type).to_string());
            }
        }

        let low_confidence = sources.iter().any(|(document_id, field_name)| {
            documents
                .get(document_id)
                .and_then(|document| document.get(field_name))
                .map(|field| field.confidence < LOW_CONFIDENCE)
                .unwrap_or(false)
        });
        if low_confidence {
            record
                .description
                .push_str(". Extraction confidence is low; verify against the original document");
        }

        record
    }
}

fn generic_advice(discrepancy_type: DiscrepancyType) -> &'static str {
    match discrepancy_type {
        DiscrepancyType::MissingField => "Obtain a corrected document that states the missing data.",
        DiscrepancyType::FormatError => "Correct the field so it follows the SWIFT format for its tag.",
        _ => "Review the documents against the credit terms before honouring.",
    }
}

fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
