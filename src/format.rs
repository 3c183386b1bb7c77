// 🧩 Format Rule Compiler - SWIFT field format notation → validation rules
//
// A format string like "3!a15d" or "4*35x" is scanned by a pipeline of
// independent matchers. Each matcher looks at the whole string and appends
// whatever rules it recognises, so one format can yield a length rule plus
// several structural allowances. Unknown notation simply yields nothing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

// ============================================================================
// FORMAT SPEC
// ============================================================================

/// A field format as published in the message reference table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFormatSpec {
    /// Owning message type (e.g., "mt700")
    pub message_type: String,

    /// Field tag (e.g., "32B")
    pub tag: String,

    /// Human-readable field name
    #[serde(default)]
    pub name: String,

    /// Raw format notation (e.g., "3!a15d")
    pub format: String,

    /// Whether the message standard marks the field mandatory
    #[serde(default)]
    pub mandatory: bool,
}

impl FieldFormatSpec {
    pub fn new(
        message_type: impl Into<String>,
        tag: impl Into<String>,
        name: impl Into<String>,
        format: impl Into<String>,
        mandatory: bool,
    ) -> Self {
        FieldFormatSpec {
            message_type: message_type.into(),
            tag: tag.into(),
            name: name.into(),
            format: format.into(),
            mandatory,
        }
    }

    /// Compile this spec into its ordered rule set
    pub fn compile(&self) -> Vec<ValidationRule> {
        compile_format(&self.format)
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    ExactNumeric,
    MaxNumeric,
    MaxAlphanumeric,
    ExactAlphabetic,
    MaxAlphabetic,
    Decimal,
    CrlfAllowed,
    RepetitionAllowed,
    SlashSeparator,
    OptionalSection,
    ConditionalSection,
}

impl RuleType {
    /// Length rules constrain the value; everything else only annotates it
    pub fn is_length_constraint(&self) -> bool {
        matches!(
            self,
            RuleType::ExactNumeric
                | RuleType::MaxNumeric
                | RuleType::MaxAlphanumeric
                | RuleType::ExactAlphabetic
                | RuleType::MaxAlphabetic
                | RuleType::Decimal
        )
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, RuleType::ExactNumeric | RuleType::ExactAlphabetic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Numeric,
    Alphabetic,
    Alphanumeric,
    Decimal,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub rule_type: RuleType,

    pub character_class: CharacterClass,

    /// Exact length (set only for `!` rules)
    pub exact_length: Option<usize>,

    /// Upper bound (set only for non-`!` length rules)
    pub max_length: Option<usize>,

    pub is_mandatory: bool,

    /// Lower = stricter, checked first
    pub priority: u8,

    pub description: String,

    /// Format string this rule was derived from
    pub origin: String,
}

impl ValidationRule {
    fn exact(rule_type: RuleType, class: CharacterClass, length: usize, origin: &str) -> Self {
        let noun = match class {
            CharacterClass::Numeric => "numeric",
            CharacterClass::Alphabetic => "alphabetic",
            _ => "",
        };
        ValidationRule {
            rule_type,
            character_class: class,
            exact_length: Some(length),
            max_length: None,
            is_mandatory: true,
            priority: 1,
            description: format!("Exactly {} {} characters", length, noun),
            origin: origin.to_string(),
        }
    }

    fn max(rule_type: RuleType, class: CharacterClass, length: usize, origin: &str) -> Self {
        let description = match class {
            CharacterClass::Decimal => format!("Decimal number with up to {} digits", length),
            CharacterClass::Numeric => format!("Up to {} numeric characters", length),
            CharacterClass::Alphabetic => format!("Up to {} alphabetic characters", length),
            _ => format!("Up to {} characters", length),
        };
        ValidationRule {
            rule_type,
            character_class: class,
            exact_length: None,
            max_length: Some(length),
            is_mandatory: false,
            priority: 2,
            description,
            origin: origin.to_string(),
        }
    }

    fn allowance(rule_type: RuleType, priority: u8, description: &str, origin: &str) -> Self {
        ValidationRule {
            rule_type,
            character_class: CharacterClass::None,
            exact_length: None,
            max_length: None,
            is_mandatory: false,
            priority,
            description: description.to_string(),
            origin: origin.to_string(),
        }
    }

    /// Length budget of a length rule (exact or max)
    pub fn length_budget(&self) -> Option<usize> {
        self.exact_length.or(self.max_length)
    }
}

// ============================================================================
// MATCHERS
// ============================================================================

/// One length token: count, optional `!`, class letter
fn length_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"(\d+)(!?)([a-z])").expect("length token pattern is valid"))
}

struct LengthToken {
    count: usize,
    exact: bool,
    class: char,
    next: Option<char>,
}

fn length_tokens(format: &str) -> impl Iterator<Item = LengthToken> + '_ {
    length_token().captures_iter(format).filter_map(move |caps| {
        let whole = caps.get(0)?;
        let count = caps[1].parse::<usize>().ok()?;
        Some(LengthToken {
            count,
            exact: !caps[2].is_empty(),
            class: caps[3].chars().next()?,
            next: format[whole.end()..].chars().next(),
        })
    })
}

type Matcher = fn(&str, &mut Vec<ValidationRule>);

const MATCHERS: &[Matcher] = &[
    match_exact_numeric,
    match_max_numeric,
    match_max_alphanumeric,
    match_exact_alphabetic,
    match_max_alphabetic,
    match_decimal,
    match_crlf,
    match_repetition,
    match_slash,
    match_optional_section,
    match_conditional_section,
];

fn match_exact_numeric(format: &str, rules: &mut Vec<ValidationRule>) {
    for token in length_tokens(format).filter(|t| t.exact && t.class == 'n') {
        rules.push(ValidationRule::exact(
            RuleType::ExactNumeric,
            CharacterClass::Numeric,
            token.count,
            format,
        ));
    }
}

fn match_max_numeric(format: &str, rules: &mut Vec<ValidationRule>) {
    for token in length_tokens(format).filter(|t| !t.exact && t.class == 'n') {
        rules.push(ValidationRule::max(
            RuleType::MaxNumeric,
            CharacterClass::Numeric,
            token.count,
            format,
        ));
    }
}

fn match_max_alphanumeric(format: &str, rules: &mut Vec<ValidationRule>) {
    for token in length_tokens(format).filter(|t| !t.exact && t.class == 'x') {
        rules.push(ValidationRule::max(
            RuleType::MaxAlphanumeric,
            CharacterClass::Alphanumeric,
            token.count,
            format,
        ));
    }
}

fn match_exact_alphabetic(format: &str, rules: &mut Vec<ValidationRule>) {
    for token in length_tokens(format).filter(|t| t.exact && t.class == 'a') {
        rules.push(ValidationRule::exact(
            RuleType::ExactAlphabetic,
            CharacterClass::Alphabetic,
            token.count,
            format,
        ));
    }
}

fn match_max_alphabetic(format: &str, rules: &mut Vec<ValidationRule>) {
    let candidates = length_tokens(format).filter(|t| {
        !t.exact && t.class == 'a' && !matches!(t.next, Some('d') | Some('x') | Some('!'))
    });
    for token in candidates {
        rules.push(ValidationRule::max(
            RuleType::MaxAlphabetic,
            CharacterClass::Alphabetic,
            token.count,
            format,
        ));
    }
}

fn match_decimal(format: &str, rules: &mut Vec<ValidationRule>) {
    for token in length_tokens(format).filter(|t| t.class == 'd') {
        rules.push(ValidationRule::max(
            RuleType::Decimal,
            CharacterClass::Decimal,
            token.count,
            format,
        ));
    }
}

fn match_crlf(format: &str, rules: &mut Vec<ValidationRule>) {
    if format.contains("CRLF") {
        rules.push(ValidationRule::allowance(
            RuleType::CrlfAllowed,
            3,
            "Line breaks (CRLF) allowed",
            format,
        ));
    }
}

fn match_repetition(format: &str, rules: &mut Vec<ValidationRule>) {
    if format.contains("...") {
        rules.push(ValidationRule::allowance(
            RuleType::RepetitionAllowed,
            3,
            "Field content may repeat",
            format,
        ));
    }
}

fn match_slash(format: &str, rules: &mut Vec<ValidationRule>) {
    if format.contains('/') {
        rules.push(ValidationRule::allowance(
            RuleType::SlashSeparator,
            3,
            "Slash separates sub-fields",
            format,
        ));
    }
}

fn match_optional_section(format: &str, rules: &mut Vec<ValidationRule>) {
    if format.contains('[') || format.contains(']') {
        rules.push(ValidationRule::allowance(
            RuleType::OptionalSection,
            4,
            "Contains optional section",
            format,
        ));
    }
}

fn match_conditional_section(format: &str, rules: &mut Vec<ValidationRule>) {
    if format.contains('{') || format.contains('}') {
        rules.push(ValidationRule::allowance(
            RuleType::ConditionalSection,
            4,
            "Contains conditional section",
            format,
        ));
    }
}

// ============================================================================
// COMPILER
// ============================================================================

/// Compile a field format spec into its ordered rule set
pub fn compile(spec: &FieldFormatSpec) -> Vec<ValidationRule> {
    spec.compile()
}

/// Compile raw format notation.
///
/// Never fails: unrecognised notation contributes no rules, and an empty
/// result means the field is unconstrained. Rules come back sorted by
/// ascending priority (stable, so matcher order breaks ties).
///
/// ```
/// use lc_compliance::format::{compile_format, RuleType};
///
/// let rules = compile_format("6!n");
/// assert_eq!(rules.len(), 1);
/// assert_eq!(rules[0].rule_type, RuleType::ExactNumeric);
/// assert_eq!(rules[0].exact_length, Some(6));
/// ```
pub fn compile_format(format: &str) -> Vec<ValidationRule> {
    let mut rules = Vec::new();
    for matcher in MATCHERS {
        matcher(format, &mut rules);
    }
    rules.sort_by_key(|rule| rule.priority);
    rules
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn types(rules: &[ValidationRule]) -> Vec<RuleType> {
        rules.iter().map(|r| r.rule_type).collect()
    }

    #[test]
    fn test_exact_numeric() {
        let rules = compile_format("6!n");

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_type, RuleType::ExactNumeric);
        assert_eq!(rules[0].character_class, CharacterClass::Numeric);
        assert_eq!(rules[0].exact_length, Some(6));
        assert_eq!(rules[0].max_length, None);
        assert!(rules[0].is_mandatory);
        assert_eq!(rules[0].priority, 1);
        assert_eq!(rules[0].origin, "6!n");
    }

    #[test]
    fn test_line_count_prefix_ignored() {
        let rules = compile_format("4*35x");

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_type, RuleType::MaxAlphanumeric);
        assert_eq!(rules[0].max_length, Some(35));
        assert_eq!(rules[0].exact_length, None);
        assert!(!rules[0].is_mandatory);
        assert_eq!(rules[0].priority, 2);
    }

    #[test]
    fn test_currency_amount() {
        let rules = compile_format("3!a15d");

        assert_eq!(types(&rules), vec![RuleType::ExactAlphabetic, RuleType::Decimal]);
        assert_eq!(rules[0].exact_length, Some(3));
        assert_eq!(rules[1].max_length, Some(15));
        assert_eq!(rules[1].character_class, CharacterClass::Decimal);
    }

    #[test]
    fn test_max_alphabetic_lookahead() {
        // "2a" followed by nothing is a max-alphabetic token
        assert_eq!(types(&compile_format("2a")), vec![RuleType::MaxAlphabetic]);

        // exact form never yields a max rule
        assert_eq!(types(&compile_format("2!a")), vec![RuleType::ExactAlphabetic]);
    }

    #[test]
    fn test_compound_format_yields_independent_rules() {
        let rules = compile_format("6!n4!a2a");

        assert_eq!(
            types(&rules),
            vec![RuleType::ExactNumeric, RuleType::ExactAlphabetic, RuleType::MaxAlphabetic]
        );
    }

    #[test]
    fn test_structural_allowances_sorted_last() {
        let rules = compile_format("[/34x]CRLF4!a2!a2!c[3!c]...{1}");

        assert_eq!(
            types(&rules),
            vec![
                RuleType::ExactAlphabetic,
                RuleType::ExactAlphabetic,
                RuleType::MaxAlphanumeric,
                RuleType::CrlfAllowed,
                RuleType::RepetitionAllowed,
                RuleType::SlashSeparator,
                RuleType::OptionalSection,
                RuleType::ConditionalSection,
            ]
        );

        let priorities: Vec<u8> = rules.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn test_tolerance_format() {
        let rules = compile_format("2n/2n");

        assert_eq!(
            types(&rules),
            vec![RuleType::MaxNumeric, RuleType::MaxNumeric, RuleType::SlashSeparator]
        );
    }

    #[test]
    fn test_unrecognised_format_is_unconstrained() {
        assert!(compile_format("").is_empty());
        assert!(compile_format("free text").is_empty());
        assert!(compile_format("!!??").is_empty());
    }

    #[test]
    fn test_compile_is_idempotent() {
        for format in ["6!n", "4*35x", "3!a15d", "6!n29x", "[/34x]CRLF4!a2!a2!c[3!c]"] {
            assert_eq!(compile_format(format), compile_format(format));
        }
    }

    #[test]
    fn test_field_format_compile_matches_raw() {
        let spec = FieldFormatSpec::new("mt700", "31C", "Date of Issue", "6!n", true);

        assert_eq!(compile(&spec), compile_format("6!n"));
    }
}
