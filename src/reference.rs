// 📖 Reference Data - UCP 600 content, equivalence map, deadlines, requirements
//
// Everything the classifier looks up lives in one immutable bundle handed to
// it at construction. The standard bundle covers MT700 against commercial
// invoice and bill of lading; a JSON file can replace it.

use crate::catalog::FieldCatalog;
use crate::discrepancy::DiscrepancyType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

// ============================================================================
// UCP 600 CONTENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UcpArticle {
    /// Article code (e.g., "article_18b")
    pub code: String,
    pub title: String,
    /// Full article text
    pub text: String,
    /// Canned remediation guidance
    #[serde(default)]
    pub advice: Option<String>,
}

/// Maps a discrepancy to an article; `field_name: None` matches any field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UcpLookupEntry {
    pub discrepancy_type: DiscrepancyType,
    #[serde(default)]
    pub field_name: Option<String>,
    pub article: String,
    /// Only for conflicts among documents allowed to state data in general terms
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub general_terms: bool,
}

// ============================================================================
// EQUIVALENCE MAP
// ============================================================================

/// A field of a document type (e.g., mt700 / "32B")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub document_type: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(document_type: &str, field: &str) -> Self {
        FieldRef {
            document_type: document_type.to_string(),
            field: field.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Amount,
    Number,
    Date,
    Text,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Amount => "amount",
            ValueKind::Number => "number",
            ValueKind::Date => "date",
            ValueKind::Text => "text",
        }
    }
}

/// Where the percentage tolerance of a group is stated (MT700 field 39A)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSource {
    /// Document type that states the credit amount and its tolerance
    pub document_type: String,
    /// Field aliases holding the tolerance, first present wins
    pub fields: Vec<String>,
}

/// Fields across document types that describe the same attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceGroup {
    /// Name carried into records (e.g., "amount")
    pub name: String,
    pub kind: ValueKind,
    /// Several members may name the same document type as aliases; per
    /// document the first present member wins
    pub members: Vec<FieldRef>,
    #[serde(default)]
    pub tolerance: Option<ToleranceSource>,
}

/// Dates in `events` must not fall after the date in `deadline`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineRule {
    pub name: String,
    pub event_label: String,
    pub deadline_label: String,
    pub events: Vec<FieldRef>,
    pub deadline: Vec<FieldRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequirement {
    pub document_type: String,
    pub mandatory: Vec<String>,
}

// ============================================================================
// BUNDLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub ucp_articles: BTreeMap<String, UcpArticle>,
    #[serde(default)]
    pub ucp_lookup: Vec<UcpLookupEntry>,
    #[serde(default)]
    pub equivalence_groups: Vec<EquivalenceGroup>,
    #[serde(default)]
    pub deadline_rules: Vec<DeadlineRule>,
    #[serde(default)]
    pub document_requirements: Vec<DocumentRequirement>,
    /// Document types that must not state data in general terms
    #[serde(default)]
    pub strict_documents: Vec<String>,
    #[serde(default)]
    pub field_formats: FieldCatalog,
}

impl ReferenceData {
    /// Load a bundle from JSON
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read reference data file: {:?}", path.as_ref()))?;

        let reference: ReferenceData =
            serde_json::from_str(&content).context("Failed to parse reference data JSON")?;

        tracing::info!(
            articles = reference.ucp_articles.len(),
            groups = reference.equivalence_groups.len(),
            deadlines = reference.deadline_rules.len(),
            "loaded reference data"
        );
        Ok(reference)
    }

    /// Bundle for MT700 / commercial invoice / bill of lading presentations
    pub fn standard() -> Self {
        ReferenceData {
            ucp_articles: standard_articles(),
            ucp_lookup: standard_lookup(),
            equivalence_groups: standard_groups(),
            deadline_rules: standard_deadlines(),
            document_requirements: standard_requirements(),
            strict_documents: vec!["commercial_invoice".to_string()],
            field_formats: FieldCatalog::standard_mt700(),
        }
    }

    pub fn article(&self, code: &str) -> Option<&UcpArticle> {
        self.ucp_articles.get(code)
    }

    /// Article for a discrepancy: exact field entry first, then the type wildcard
    pub fn lookup(&self, discrepancy_type: DiscrepancyType, field_name: &str) -> Option<&UcpArticle> {
        let candidates: Vec<&UcpLookupEntry> = self
            .ucp_lookup
            .iter()
            .filter(|entry| entry.discrepancy_type == discrepancy_type && !entry.general_terms)
            .collect();

        let entry = candidates
            .iter()
            .find(|entry| entry.field_name.as_deref() == Some(field_name))
            .or_else(|| candidates.iter().find(|entry| entry.field_name.is_none()))?;
        self.article(&entry.article)
    }

    /// Article for a conflict among documents that may use general terms;
    /// falls back to the ordinary lookup
    pub fn lookup_general_terms(
        &self,
        discrepancy_type: DiscrepancyType,
        field_name: &str,
    ) -> Option<&UcpArticle> {
        self.ucp_lookup
            .iter()
            .find(|entry| {
                entry.general_terms
                    && entry.discrepancy_type == discrepancy_type
                    && entry.field_name.as_deref().map_or(true, |f| f == field_name)
            })
            .and_then(|entry| self.article(&entry.article))
            .or_else(|| self.lookup(discrepancy_type, field_name))
    }

    pub fn is_strict(&self, document_type: &str) -> bool {
        self.strict_documents.iter().any(|t| t == document_type)
    }

    pub fn requirement(&self, document_type: &str) -> Option<&DocumentRequirement> {
        self.document_requirements
            .iter()
            .find(|req| req.document_type == document_type)
    }

    /// Every field name that stands for `field` on `document_type`: the field
    /// itself plus the aliases listed next to it in a group, deadline rule or
    /// tolerance source
    pub fn aliases<'a>(&'a self, document_type: &str, field: &'a str) -> BTreeSet<&'a str> {
        let mut aliases = BTreeSet::from([field]);

        let member_lists = self
            .equivalence_groups
            .iter()
            .map(|g| g.members.as_slice())
            .chain(
                self.deadline_rules
                    .iter()
                    .flat_map(|d| [d.events.as_slice(), d.deadline.as_slice()]),
            );
        for members in member_lists {
            let same_type = members.iter().filter(|m| m.document_type == document_type);
            if same_type.clone().any(|m| m.field == field) {
                aliases.extend(same_type.map(|m| m.field.as_str()));
            }
        }

        for source in self.equivalence_groups.iter().filter_map(|g| g.tolerance.as_ref()) {
            if source.document_type == document_type && source.fields.iter().any(|f| f == field) {
                aliases.extend(source.fields.iter().map(String::as_str));
            }
        }

        aliases
    }
}

fn standard_articles() -> BTreeMap<String, UcpArticle> {
    let articles = [
        UcpArticle {
            code: "article_14c".to_string(),
            title: "Standard for Examination of Documents, 14(c)".to_string(),
            text: "A presentation including one or more original transport documents subject to articles 19, 20, 21, 22, 23, 24 or 25 must be made by or on behalf of the beneficiary not later than 21 calendar days after the date of shipment as described in these rules, but in any event not later than the expiry date of the credit.".to_string(),
            advice: Some("Request amendment to the LC to extend the expiry date or consider requesting a new LC.".to_string()),
        },
        UcpArticle {
            code: "article_14d".to_string(),
            title: "Standard for Examination of Documents, 14(d)".to_string(),
            text: "Data in a document, when read in context with the credit, the document itself and international standard banking practice, need not be identical to, but must not conflict with, data in that document, any other stipulated document or the credit.".to_string(),
            advice: Some("Ensure descriptions are consistent or use more general terms in documents other than the commercial invoice.".to_string()),
        },
        UcpArticle {
            code: "article_14e".to_string(),
            title: "Standard for Examination of Documents, 14(e)".to_string(),
            text: "In documents other than the commercial invoice, the description of the goods, services or performance, if stated, may be in general terms not conflicting with their description in the credit.".to_string(),
            advice: Some("Restate the description in terms that do not conflict with the credit; general terms are acceptable outside the commercial invoice.".to_string()),
        },
        UcpArticle {
            code: "article_18b".to_string(),
            title: "Commercial Invoice, 18(b)".to_string(),
            text: "A nominated bank acting on its nomination, a confirming bank, if any, or the issuing bank may accept a commercial invoice issued for an amount in excess of the amount permitted by the credit, and its decision will be binding upon all parties, provided the bank in question has not honoured or negotiated for an amount in excess of that permitted by the credit.".to_string(),
            advice: Some("Check if the nominated bank is willing to accept the invoice with an amount exceeding the credit amount.".to_string()),
        },
    ];

    articles
        .into_iter()
        .map(|article| (article.code.clone(), article))
        .collect()
}

fn standard_lookup() -> Vec<UcpLookupEntry> {
    let entry = |discrepancy_type, field_name: Option<&str>, article: &str, general_terms| UcpLookupEntry {
        discrepancy_type,
        field_name: field_name.map(str::to_string),
        article: article.to_string(),
        general_terms,
    };

    vec![
        entry(DiscrepancyType::QuantitativeDiscrepancy, None, "article_18b", false),
        entry(DiscrepancyType::ContextualViolation, None, "article_14c", false),
        entry(DiscrepancyType::DataInconsistency, Some("description_of_goods"), "article_14e", true),
        entry(DiscrepancyType::DataInconsistency, Some("description_of_goods"), "article_14d", false),
        entry(DiscrepancyType::DataInconsistency, None, "article_14d", false),
    ]
}

fn standard_groups() -> Vec<EquivalenceGroup> {
    vec![
        EquivalenceGroup {
            name: "amount".to_string(),
            kind: ValueKind::Amount,
            members: vec![
                FieldRef::new("commercial_invoice", "amount"),
                FieldRef::new("mt700", "32B"),
                FieldRef::new("mt700", "amount"),
            ],
            tolerance: Some(ToleranceSource {
                document_type: "mt700".to_string(),
                fields: vec!["39A".to_string(), "tolerance".to_string()],
            }),
        },
        EquivalenceGroup {
            name: "description_of_goods".to_string(),
            kind: ValueKind::Text,
            members: vec![
                FieldRef::new("commercial_invoice", "description_of_goods"),
                FieldRef::new("commercial_invoice", "description"),
                FieldRef::new("bill_of_lading", "description_of_goods"),
                FieldRef::new("bill_of_lading", "description"),
                FieldRef::new("mt700", "45A"),
                FieldRef::new("mt700", "description"),
            ],
            tolerance: None,
        },
        EquivalenceGroup {
            name: "applicant".to_string(),
            kind: ValueKind::Text,
            members: vec![
                FieldRef::new("commercial_invoice", "applicant"),
                FieldRef::new("mt700", "50"),
                FieldRef::new("mt700", "applicant"),
            ],
            tolerance: None,
        },
        EquivalenceGroup {
            name: "beneficiary".to_string(),
            kind: ValueKind::Text,
            members: vec![
                FieldRef::new("commercial_invoice", "beneficiary"),
                FieldRef::new("bill_of_lading", "shipper"),
                FieldRef::new("mt700", "59"),
                FieldRef::new("mt700", "beneficiary"),
            ],
            tolerance: None,
        },
        EquivalenceGroup {
            name: "port_of_loading".to_string(),
            kind: ValueKind::Text,
            members: vec![
                FieldRef::new("bill_of_lading", "port_of_loading"),
                FieldRef::new("mt700", "44E"),
                FieldRef::new("mt700", "port_of_loading"),
            ],
            tolerance: None,
        },
        EquivalenceGroup {
            name: "port_of_discharge".to_string(),
            kind: ValueKind::Text,
            members: vec![
                FieldRef::new("bill_of_lading", "port_of_discharge"),
                FieldRef::new("mt700", "44F"),
                FieldRef::new("mt700", "port_of_discharge"),
            ],
            tolerance: None,
        },
    ]
}

fn standard_deadlines() -> Vec<DeadlineRule> {
    vec![
        DeadlineRule {
            name: "shipping_date".to_string(),
            event_label: "Shipping date".to_string(),
            deadline_label: "LC expiry date".to_string(),
            events: vec![
                FieldRef::new("bill_of_lading", "shipping_date"),
                FieldRef::new("bill_of_lading", "shipped_on_board_date"),
            ],
            deadline: vec![
                FieldRef::new("mt700", "31D"),
                FieldRef::new("mt700", "expiry_date"),
            ],
        },
        DeadlineRule {
            name: "latest_shipment_date".to_string(),
            event_label: "Shipping date".to_string(),
            deadline_label: "latest date of shipment".to_string(),
            events: vec![
                FieldRef::new("bill_of_lading", "shipping_date"),
                FieldRef::new("bill_of_lading", "shipped_on_board_date"),
            ],
            deadline: vec![
                FieldRef::new("mt700", "44C"),
                FieldRef::new("mt700", "latest_shipment_date"),
            ],
        },
    ]
}

fn standard_requirements() -> Vec<DocumentRequirement> {
    let requirement = |document_type: &str, fields: &[&str]| DocumentRequirement {
        document_type: document_type.to_string(),
        mandatory: fields.iter().map(|f| f.to_string()).collect(),
    };

    vec![
        requirement(
            "commercial_invoice",
            &["invoice_number", "date", "applicant", "beneficiary", "currency", "amount", "description_of_goods"],
        ),
        requirement(
            "bill_of_lading",
            &[
                "bl_number", "carrier", "vessel_name", "port_of_loading", "port_of_discharge",
                "shipper", "consignee", "description_of_goods", "shipping_date",
            ],
        ),
        requirement(
            "mt700",
            &["27", "40A", "31D", "50", "59", "32B", "39A", "41D", "42C", "42D", "43P", "44A", "45A"],
        ),
    ]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_prefers_exact_field() {
        let mut reference = ReferenceData::standard();
        reference.ucp_articles.insert(
            "article_14e".to_string(),
            UcpArticle {
                code: "article_14e".to_string(),
                title: "14(e)".to_string(),
                text: "General terms".to_string(),
                advice: None,
            },
        );
        reference.ucp_lookup.insert(
            0,
            UcpLookupEntry {
                discrepancy_type: DiscrepancyType::DataInconsistency,
                field_name: Some("port_of_loading".to_string()),
                article: "article_14e".to_string(),
                general_terms: false,
            },
        );

        let exact = reference.lookup(DiscrepancyType::DataInconsistency, "port_of_loading").unwrap();
        assert_eq!(exact.code, "article_14e");

        let wildcard = reference.lookup(DiscrepancyType::DataInconsistency, "applicant").unwrap();
        assert_eq!(wildcard.code, "article_14d");
    }

    #[test]
    fn test_standard_lookups() {
        let reference = ReferenceData::standard();

        assert_eq!(
            reference.lookup(DiscrepancyType::QuantitativeDiscrepancy, "amount").unwrap().code,
            "article_18b"
        );
        assert_eq!(
            reference.lookup(DiscrepancyType::ContextualViolation, "shipping_date").unwrap().code,
            "article_14c"
        );
        assert!(reference.lookup(DiscrepancyType::MissingField, "amount").is_none());
        assert!(reference.lookup(DiscrepancyType::FormatError, "32B").is_none());
    }

    #[test]
    fn test_lookup_with_dangling_article_is_none() {
        let reference = ReferenceData {
            ucp_lookup: vec![UcpLookupEntry {
                discrepancy_type: DiscrepancyType::DataInconsistency,
                field_name: None,
                article: "article_99".to_string(),
                general_terms: false,
            }],
            ..ReferenceData::default()
        };

        assert!(reference.lookup(DiscrepancyType::DataInconsistency, "x").is_none());
    }

    #[test]
    fn test_general_terms_lookup() {
        let reference = ReferenceData::standard();

        let general = reference
            .lookup_general_terms(DiscrepancyType::DataInconsistency, "description_of_goods")
            .unwrap();
        assert_eq!(general.code, "article_14e");
        assert!(general.text.contains("other than the commercial invoice"));

        // The general-terms entry never answers an ordinary lookup
        assert_eq!(
            reference.lookup(DiscrepancyType::DataInconsistency, "description_of_goods").unwrap().code,
            "article_14d"
        );
        assert_eq!(
            reference.lookup_general_terms(DiscrepancyType::DataInconsistency, "applicant").unwrap().code,
            "article_14d"
        );
        assert!(reference.is_strict("commercial_invoice"));
        assert!(!reference.is_strict("bill_of_lading"));
    }

    #[test]
    fn test_aliases() {
        let reference = ReferenceData::standard();

        let expiry = reference.aliases("mt700", "31D");
        assert!(expiry.contains("31D"));
        assert!(expiry.contains("expiry_date"));

        let description = reference.aliases("commercial_invoice", "description_of_goods");
        assert!(description.contains("description"));
        assert!(!description.contains("45A"));

        assert!(reference.aliases("mt700", "39A").contains("tolerance"));
        assert_eq!(reference.aliases("bill_of_lading", "vessel_name").len(), 1);
    }

    #[test]
    fn test_bundle_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");
        let json = serde_json::to_string_pretty(&ReferenceData::standard()).unwrap();
        fs::write(&path, json).unwrap();

        let loaded = ReferenceData::from_file(&path).unwrap();
        assert_eq!(loaded, ReferenceData::standard());

        fs::write(&path, r#"{"equivalence_groups": []}"#).unwrap();
        let sparse = ReferenceData::from_file(&path).unwrap();
        assert!(sparse.ucp_articles.is_empty());
        assert!(sparse.field_formats.is_empty());
    }
}
