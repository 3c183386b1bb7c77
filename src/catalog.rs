// 📚 Field Catalogue - SWIFT message field formats
//
// Reference rows (message type, tag, name, format, mandatory) as published for
// each message type. Rules are never stored here: they are compiled from the
// format string whenever someone asks.

use crate::format::{compile_format, FieldFormatSpec, ValidationRule};
use crate::validator::{validate, ValidationOutcome};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCatalog {
    specs: Vec<FieldFormatSpec>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        FieldCatalog { specs: Vec::new() }
    }

    pub fn from_specs(specs: Vec<FieldFormatSpec>) -> Self {
        FieldCatalog { specs }
    }

    /// Load catalogue rows from CSV with header
    /// `message_type,tag,name,format,mandatory`
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("Failed to open field format CSV: {:?}", path.as_ref()))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut specs = Vec::new();

        for result in rdr.deserialize() {
            let mut spec: FieldFormatSpec =
                result.context("Failed to deserialize field format row")?;
            spec.message_type = spec.message_type.trim().to_lowercase();
            spec.tag = spec.tag.trim().to_uppercase();
            specs.push(spec);
        }

        tracing::debug!(rows = specs.len(), "loaded field format catalogue");
        Ok(FieldCatalog { specs })
    }

    /// Built-in MT700 (issue of a documentary credit) field formats
    pub fn standard_mt700() -> Self {
        const MT700: &[(&str, &str, &str, bool)] = &[
            ("27", "Sequence of Total", "1!n/1!n", true),
            ("40A", "Form of Documentary Credit", "24x", true),
            ("20", "Documentary Credit Number", "16x", true),
            ("23", "Reference to Pre-Advice", "16x", false),
            ("31C", "Date of Issue", "6!n", false),
            ("40E", "Applicable Rules", "30x[/35x]", true),
            ("31D", "Date and Place of Expiry", "6!n29x", true),
            ("50", "Applicant", "4*35x", true),
            ("59", "Beneficiary", "[/34x]CRLF4*35x", true),
            ("32B", "Currency Code, Amount", "3!a15d", true),
            ("39A", "Percentage Credit Amount Tolerance", "2n/2n", true),
            ("39C", "Additional Amounts Covered", "4*35x", false),
            ("41D", "Available With ... By ...", "4*35xCRLF14x", true),
            ("42C", "Drafts at ...", "3*35x", true),
            ("42D", "Drawee", "4*35x", true),
            ("43P", "Partial Shipments", "11x", true),
            ("43T", "Transhipment", "11x", false),
            ("44A", "Place of Taking in Charge/Dispatch from .../Place of Receipt", "65x", true),
            ("44B", "Place of Final Destination/For Transportation to .../Place of Delivery", "65x", false),
            ("44C", "Latest Date of Shipment", "6!n", false),
            ("44D", "Shipment Period", "6*65x", false),
            ("44E", "Port of Loading/Airport of Departure", "65x", false),
            ("44F", "Port of Discharge/Airport of Destination", "65x", false),
            ("45A", "Description of Goods and/or Services", "100*65x", true),
            ("46A", "Documents Required", "100*65x", false),
            ("47A", "Additional Conditions", "100*65x", false),
            ("48", "Period for Presentation in Days", "3n[/35x]", false),
            ("49", "Confirmation Instructions", "7!x", false),
            ("71B", "Charges", "6*35x", false),
            ("72Z", "Sender to Receiver Information", "6*35x", false),
            ("78", "Instructions to the Paying/Accepting/Negotiating Bank", "12*65x", false),
        ];

        let specs = MT700
            .iter()
            .map(|(tag, name, format, mandatory)| {
                FieldFormatSpec::new("mt700", *tag, *name, *format, *mandatory)
            })
            .collect();

        FieldCatalog { specs }
    }

    pub fn get(&self, message_type: &str, tag: &str) -> Option<&FieldFormatSpec> {
        self.specs.iter().find(|spec| {
            spec.message_type.eq_ignore_ascii_case(message_type) && spec.tag.eq_ignore_ascii_case(tag)
        })
    }

    /// Compile the rules of one field (None when the field is not catalogued)
    pub fn rules_for(&self, message_type: &str, tag: &str) -> Option<Vec<ValidationRule>> {
        self.get(message_type, tag).map(|spec| compile_format(&spec.format))
    }

    /// Validate a value against the catalogued format of its field
    pub fn validate_field(&self, message_type: &str, tag: &str, value: &str) -> Option<ValidationOutcome> {
        self.rules_for(message_type, tag).map(|rules| validate(value, &rules))
    }

    pub fn covers(&self, message_type: &str) -> bool {
        self.specs
            .iter()
            .any(|spec| spec.message_type.eq_ignore_ascii_case(message_type))
    }

    pub fn specs(&self) -> &[FieldFormatSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::RuleType;

    #[test]
    fn test_standard_mt700_lookup() {
        let catalog = FieldCatalog::standard_mt700();

        let spec = catalog.get("MT700", "32b").unwrap();
        assert_eq!(spec.format, "3!a15d");
        assert!(spec.mandatory);

        let rules = catalog.rules_for("mt700", "31C").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_type, RuleType::ExactNumeric);

        assert!(catalog.rules_for("mt700", "99Z").is_none());
        assert!(catalog.covers("mt700"));
        assert!(!catalog.covers("mt760"));
    }

    #[test]
    fn test_sample_values_pass_their_formats() {
        let catalog = FieldCatalog::standard_mt700();
        let samples = [
            ("27", "1/1"),
            ("40A", "IRREVOCABLE"),
            ("20", "LC123456789"),
            ("31D", "250518NEW YORK"),
            ("32B", "USD45000,00"),
            ("39A", "05/05"),
            ("41D", "CITIBANK NY\r\nBY NEGOTIATION"),
            ("44C", "250510"),
        ];

        for (tag, value) in samples {
            let outcome = catalog.validate_field("mt700", tag, value).unwrap();
            assert!(outcome.passed, "{} = {:?}: {}", tag, value, outcome.summary());
        }
    }

    #[test]
    fn test_bad_value_fails_its_format() {
        let catalog = FieldCatalog::standard_mt700();

        let outcome = catalog.validate_field("mt700", "44C", "2025-05-10").unwrap();
        assert!(!outcome.passed);
    }

    #[test]
    fn test_from_reader_normalises_keys() {
        let csv_data = "message_type,tag,name,format,mandatory\n\
                        MT700 ,32b,Currency Code Amount,3!a15d,true\n\
                        mt700,45A,Description of Goods,100*65x,false\n";

        let catalog = FieldCatalog::from_reader(csv_data.as_bytes()).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.specs()[0].message_type, "mt700");
        assert_eq!(catalog.specs()[0].tag, "32B");
        assert!(catalog.get("mt700", "45A").is_some());
    }

    #[test]
    fn test_from_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formats.csv");
        std::fs::write(
            &path,
            "message_type,tag,name,format,mandatory\nmt700,31C,Date of Issue,6!n,false\n",
        )
        .unwrap();

        let catalog = FieldCatalog::from_csv(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(FieldCatalog::from_csv(dir.path().join("missing.csv")).is_err());
    }
}
