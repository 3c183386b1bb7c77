// 📄 Extracted Fields - typed values at the ingestion boundary
//
// The OCR collaborator hands us strings. They are read into a closed set of
// value kinds here, once, so the classifier can dispatch on the kind instead
// of re-parsing strings while comparing.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

// ============================================================================
// VALUE KINDS
// ============================================================================

/// Declared type of an extracted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Numeric,
    Currency,
    Date,
    Text,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Numeric => "numeric",
            DataType::Currency => "currency",
            DataType::Date => "date",
            DataType::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Number(f64),
    Amount {
        currency: Option<String>,
        value: f64,
    },
    Date(NaiveDate),
    Text(String),
    /// Raw text that could not be read as its declared type
    Unreadable(String),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Number(_) => "number",
            FieldValue::Amount { .. } => "amount",
            FieldValue::Date(_) => "date",
            FieldValue::Text(_) => "text",
            FieldValue::Unreadable(_) => "unreadable",
        }
    }

    /// Numeric magnitude of numbers and amounts
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Amount { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, FieldValue::Unreadable(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Amount {
                currency: Some(ccy),
                value,
            } => write!(f, "{} {:.2}", ccy, value),
            FieldValue::Amount { currency: None, value } => write!(f, "{:.2}", value),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Text(t) | FieldValue::Unreadable(t) => write!(f, "{}", t),
        }
    }
}

// ============================================================================
// EXTRACTED FIELD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub document_id: String,
    pub field_name: String,

    /// Text exactly as the OCR collaborator produced it
    pub raw_value: String,

    /// Typed reading of `raw_value`
    pub value: FieldValue,

    /// OCR confidence (0.0 - 1.0)
    pub confidence: f64,

    pub data_type: DataType,
}

impl ExtractedField {
    /// Read a raw extraction into a typed field
    pub fn parse(
        document_id: impl Into<String>,
        field_name: impl Into<String>,
        raw_value: impl Into<String>,
        confidence: f64,
        data_type: DataType,
    ) -> Self {
        let raw_value = raw_value.into();
        let value = parse_value(&raw_value, data_type);
        ExtractedField {
            document_id: document_id.into(),
            field_name: field_name.into(),
            raw_value,
            value,
            confidence: if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) },
            data_type,
        }
    }
}

/// Read raw text as the declared type; failures become `Unreadable`
pub fn parse_value(raw: &str, data_type: DataType) -> FieldValue {
    let trimmed = raw.trim();
    let parsed = match data_type {
        DataType::Numeric => parse_number(trimmed).map(FieldValue::Number),
        DataType::Currency => {
            parse_amount(trimmed).map(|(currency, value)| FieldValue::Amount { currency, value })
        }
        DataType::Date => parse_date(trimmed).map(FieldValue::Date),
        DataType::Text => return FieldValue::Text(trimmed.to_string()),
    };
    parsed.unwrap_or_else(|| FieldValue::Unreadable(raw.to_string()))
}

// ============================================================================
// PARSERS
// ============================================================================

/// Parse a plain or SWIFT-style number.
///
/// A single comma with no dot and at most two trailing digits is a SWIFT
/// decimal comma ("45000,00"); otherwise commas are thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '$').collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if !cleaned.contains('.') && cleaned.matches(',').count() == 1 {
        let decimals = cleaned.rsplit(',').next().map(str::len).unwrap_or(0);
        if decimals <= 2 {
            cleaned.replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    } else {
        cleaned.replace(',', "")
    };

    let value = normalized.parse::<f64>().ok()?;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Parse an amount with an optional ISO currency prefix or suffix.
///
/// Handles "USD45000,00" (field 32B), "USD 50,000.00", "50000.00 EUR" and "50000".
pub fn parse_amount(raw: &str) -> Option<(Option<String>, f64)> {
    let trimmed = raw.trim();
    let prefix: String = trimmed.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if prefix.len() == 3 {
        let value = parse_number(&trimmed[3..])?;
        return Some((Some(prefix.to_ascii_uppercase()), value));
    }

    let suffix_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map(|(i, _)| i);
    if let Some(start) = suffix_start {
        let suffix = &trimmed[start..];
        if suffix.len() == 3 {
            let value = parse_number(&trimmed[..start])?;
            return Some((Some(suffix.to_ascii_uppercase()), value));
        }
        return None;
    }

    parse_number(trimmed).map(|value| (None, value))
}

/// Parse ISO, US and SWIFT (YYMMDD, optionally followed by place text) dates
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }

    // SWIFT 6!n date, e.g. field 31D "250518NEW YORK"
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 8 {
        return NaiveDate::parse_from_str(&digits, "%Y%m%d").ok();
    }
    if digits.len() == 6 {
        return NaiveDate::parse_from_str(&digits, "%y%m%d").ok();
    }

    None
}

/// Percentage tolerance band (field 39A)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub plus_percent: f64,
    pub minus_percent: f64,
}

impl Tolerance {
    /// Parse "05/10" (plus/minus) or "5PCT" (symmetric)
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().to_ascii_uppercase();

        if let Some((plus, minus)) = trimmed.split_once('/') {
            return Some(Tolerance {
                plus_percent: plus.trim().parse().ok()?,
                minus_percent: minus.trim().parse().ok()?,
            });
        }

        let number = trimmed
            .trim_end_matches("PCT")
            .trim_end_matches('%')
            .trim();
        let percent: f64 = number.parse().ok()?;
        Some(Tolerance {
            plus_percent: percent,
            minus_percent: percent,
        })
    }

    /// Whether `value` lies inside the band around `reference`
    pub fn accepts(&self, reference: f64, value: f64) -> bool {
        let upper = reference * (1.0 + self.plus_percent / 100.0);
        let lower = reference * (1.0 - self.minus_percent / 100.0);
        value >= lower.min(upper) && value <= upper.max(lower)
    }
}

// ============================================================================
// DOCUMENTS
// ============================================================================

/// All fields extracted from one presented document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFields {
    pub document_id: String,

    /// Document type as named in the equivalence map (e.g., "commercial_invoice")
    pub document_type: String,

    pub fields: BTreeMap<String, ExtractedField>,
}

impl DocumentFields {
    pub fn new(document_id: impl Into<String>, document_type: impl Into<String>) -> Self {
        DocumentFields {
            document_id: document_id.into(),
            document_type: document_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: add a field read from raw text
    pub fn with_field(
        mut self,
        field_name: &str,
        raw_value: &str,
        confidence: f64,
        data_type: DataType,
    ) -> Self {
        let field = ExtractedField::parse(
            self.document_id.clone(),
            field_name,
            raw_value,
            confidence,
            data_type,
        );
        self.fields.insert(field_name.to_string(), field);
        self
    }

    pub fn get(&self, field_name: &str) -> Option<&ExtractedField> {
        self.fields.get(field_name)
    }
}

/// Documents of one presentation, keyed by document id
pub type DocumentSet = BTreeMap<String, DocumentFields>;

pub fn document_set(documents: impl IntoIterator<Item = DocumentFields>) -> DocumentSet {
    documents
        .into_iter()
        .map(|doc| (doc.document_id.clone(), doc))
        .collect()
}

// ============================================================================
// PRESENTATION FILE (OCR collaborator output)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawField {
    pub field_name: String,
    pub value: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_data_type")]
    pub data_type: DataType,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_data_type() -> DataType {
    DataType::Text
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub document_id: String,
    pub document_type: String,
    pub fields: Vec<RawField>,
}

/// A presentation as delivered by ingestion: LC reference plus documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub lc_reference: Option<String>,
    pub documents: Vec<RawDocument>,
}

impl Presentation {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read presentation file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse presentation JSON")
    }

    /// Read every raw field into its typed value
    pub fn into_document_set(self) -> DocumentSet {
        document_set(self.documents.into_iter().map(|raw| {
            let mut doc = DocumentFields::new(raw.document_id, raw.document_type);
            for field in raw.fields {
                doc = doc.with_field(&field.field_name, &field.value, field.confidence, field.data_type);
            }
            doc
        }))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_swift_amount_uses_decimal_comma() {
        assert_eq!(parse_amount("USD45000,00"), Some((Some("USD".to_string()), 45000.0)));
        assert_eq!(parse_amount("EUR1250,5"), Some((Some("EUR".to_string()), 1250.5)));
    }

    #[test]
    fn test_plain_amounts() {
        assert_eq!(parse_amount("50000.00"), Some((None, 50000.0)));
        assert_eq!(parse_amount("50,000.00"), Some((None, 50000.0)));
        assert_eq!(parse_amount("50,000"), Some((None, 50000.0)));
        assert_eq!(parse_amount("USD 50,000.00"), Some((Some("USD".to_string()), 50000.0)));
        assert_eq!(parse_amount("50000 usd"), Some((Some("USD".to_string()), 50000.0)));
        assert_eq!(parse_amount("fifty thousand"), None);
    }

    #[test]
    fn test_dates() {
        let expected = NaiveDate::from_ymd_opt(2025, 5, 18).unwrap();

        assert_eq!(parse_date("2025-05-18"), Some(expected));
        assert_eq!(parse_date("05/18/2025"), Some(expected));
        assert_eq!(parse_date("250518"), Some(expected));
        assert_eq!(parse_date("250518NEW YORK"), Some(expected));
        assert_eq!(parse_date("20250518"), Some(expected));
        assert_eq!(parse_date("next tuesday"), None);
    }

    #[test]
    fn test_unreadable_value_keeps_raw_text() {
        let field = ExtractedField::parse("inv-1", "amount", "N/A", 0.4, DataType::Currency);

        assert_eq!(field.value, FieldValue::Unreadable("N/A".to_string()));
        assert!(field.value.is_unreadable());
    }

    #[test]
    fn test_confidence_clamped() {
        let high = ExtractedField::parse("d", "f", "x", 1.7, DataType::Text);
        let low = ExtractedField::parse("d", "f", "x", -0.2, DataType::Text);

        assert_eq!(high.confidence, 1.0);
        assert_eq!(low.confidence, 0.0);
    }

    #[test]
    fn test_tolerance_parsing() {
        assert_eq!(
            Tolerance::parse("05/10"),
            Some(Tolerance { plus_percent: 5.0, minus_percent: 10.0 })
        );
        assert_eq!(
            Tolerance::parse("5PCT"),
            Some(Tolerance { plus_percent: 5.0, minus_percent: 5.0 })
        );
        assert_eq!(Tolerance::parse("about"), None);
    }

    #[test]
    fn test_tolerance_band() {
        let tolerance = Tolerance { plus_percent: 10.0, minus_percent: 5.0 };

        assert!(tolerance.accepts(45000.0, 49500.0));
        assert!(tolerance.accepts(45000.0, 42750.0));
        assert!(!tolerance.accepts(45000.0, 50000.0));
        assert!(!tolerance.accepts(45000.0, 42000.0));
    }

    #[test]
    fn test_presentation_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "lc_reference": "LC123456789",
                "documents": [
                    {{
                        "document_id": "inv-1",
                        "document_type": "commercial_invoice",
                        "fields": [
                            {{"field_name": "amount", "value": "50000.00", "confidence": 0.93, "data_type": "currency"}},
                            {{"field_name": "description_of_goods", "value": "100 units of Model X Widgets"}}
                        ]
                    }}
                ]
            }}"#
        )
        .unwrap();

        let presentation = Presentation::from_file(file.path()).unwrap();
        assert_eq!(presentation.lc_reference.as_deref(), Some("LC123456789"));

        let documents = presentation.into_document_set();
        let invoice = &documents["inv-1"];
        assert_eq!(invoice.document_type, "commercial_invoice");
        assert_eq!(invoice.get("amount").unwrap().value.as_number(), Some(50000.0));
        assert_eq!(invoice.get("description_of_goods").unwrap().data_type, DataType::Text);
    }
}
