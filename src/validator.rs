// ✅ Field Validator - apply a compiled rule set to one value
//
// Length rules reject; structural allowances only annotate. Validation never
// fails as an operation: every input yields an outcome, possibly with
// violations.

use crate::format::{CharacterClass, RuleType, ValidationRule};
use serde::{Deserialize, Serialize};

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: ValidationRule,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub violations: Vec<Violation>,

    /// Structural allowances that applied to the value (CRLF, slash, ...)
    pub allowances: Vec<RuleType>,
}

impl ValidationOutcome {
    fn from_violations(violations: Vec<Violation>, allowances: Vec<RuleType>) -> Self {
        ValidationOutcome {
            passed: violations.is_empty(),
            violations,
            allowances,
        }
    }

    pub fn summary(&self) -> String {
        if self.passed {
            "Passed".to_string()
        } else {
            self.violations
                .iter()
                .map(|v| v.reason.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate a value against rules produced by the format compiler.
///
/// A single length rule is checked in full. Several length rules describe
/// consecutive sub-fields whose boundaries are unknown, so they are checked
/// as an aggregate length budget attributed to the dominant (first) rule.
pub fn validate(value: &str, rules: &[ValidationRule]) -> ValidationOutcome {
    let mut ordered: Vec<&ValidationRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| rule.priority);

    let length_rules: Vec<&ValidationRule> = ordered
        .iter()
        .copied()
        .filter(|rule| rule.rule_type.is_length_constraint())
        .collect();

    let allowances: Vec<RuleType> = ordered
        .iter()
        .filter(|rule| !rule.rule_type.is_length_constraint())
        .map(|rule| rule.rule_type)
        .collect();

    let mut violations = Vec::new();
    match length_rules.as_slice() {
        [] => {}
        [single] => {
            if let Some(reason) = check_single(value, single) {
                violations.push(Violation {
                    rule: (*single).clone(),
                    reason,
                });
            }
        }
        [dominant, ..] => {
            let has_optional = allowances.contains(&RuleType::OptionalSection);
            let has_slash = allowances.contains(&RuleType::SlashSeparator);
            if let Some(reason) = check_aggregate(value, &length_rules, has_optional, has_slash) {
                violations.push(Violation {
                    rule: (*dominant).clone(),
                    reason,
                });
            }
        }
    }

    ValidationOutcome::from_violations(violations, allowances)
}

fn lines(value: &str) -> impl Iterator<Item = &str> {
    value.split('\n').map(|line| line.trim_end_matches('\r'))
}

fn check_single(value: &str, rule: &ValidationRule) -> Option<String> {
    // Length rules are per line (SWIFT n*m notation)
    for line in lines(value) {
        if let Some(reason) = check_line(line, rule) {
            return Some(reason);
        }
    }
    None
}

fn check_line(line: &str, rule: &ValidationRule) -> Option<String> {
    let length = line.chars().count();

    match rule.rule_type {
        RuleType::ExactNumeric | RuleType::ExactAlphabetic => {
            let expected = rule.exact_length.unwrap_or(0);
            if length != expected {
                return Some(format!(
                    "Expected exactly {} characters, found {}",
                    expected, length
                ));
            }
            if !line.chars().all(|c| in_class(c, rule.character_class)) {
                return Some(format!(
                    "Expected only {} characters in '{}'",
                    class_name(rule.character_class),
                    line
                ));
            }
            None
        }
        RuleType::Decimal => check_decimal(line, rule.max_length.unwrap_or(usize::MAX)),
        RuleType::MaxNumeric | RuleType::MaxAlphanumeric | RuleType::MaxAlphabetic => {
            let max = rule.max_length.unwrap_or(usize::MAX);
            if length > max {
                Some(format!("Exceeds maximum length {} (found {})", max, length))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn check_decimal(line: &str, max_digits: usize) -> Option<String> {
    let separators = line.chars().filter(|c| *c == ',' || *c == '.').count();
    let digits = line.chars().filter(|c| c.is_ascii_digit()).count();

    if separators > 1 || digits + separators != line.chars().count() {
        return Some(format!("'{}' is not a decimal number", line));
    }
    if digits == 0 {
        return Some("Decimal value has no digits".to_string());
    }
    if digits > max_digits {
        return Some(format!(
            "Decimal exceeds {} digits (found {})",
            max_digits, digits
        ));
    }
    None
}

fn check_aggregate(
    value: &str,
    rules: &[&ValidationRule],
    has_optional: bool,
    has_slash: bool,
) -> Option<String> {
    let budget: usize = rules.iter().filter_map(|r| r.length_budget()).sum();
    let all_exact = rules.iter().all(|r| r.rule_type.is_exact());
    let multiline = value.contains('\n');

    for line in lines(value) {
        let length = line
            .chars()
            .filter(|c| !(has_slash && *c == '/'))
            .count();

        if length > budget {
            return Some(format!(
                "Exceeds combined length {} of compound format (found {})",
                budget, length
            ));
        }
        // Exact sub-fields add up to a fixed length only on a single line
        if all_exact && !has_optional && !multiline && length != budget {
            return Some(format!(
                "Expected exactly {} characters for compound format, found {}",
                budget, length
            ));
        }
    }
    None
}

fn in_class(c: char, class: CharacterClass) -> bool {
    match class {
        CharacterClass::Numeric => c.is_ascii_digit(),
        CharacterClass::Alphabetic => c.is_ascii_uppercase(),
        CharacterClass::Alphanumeric => c.is_ascii_alphanumeric(),
        CharacterClass::Decimal => c.is_ascii_digit() || c == ',' || c == '.',
        CharacterClass::None => true,
    }
}

fn class_name(class: CharacterClass) -> &'static str {
    match class {
        CharacterClass::Numeric => "numeric",
        CharacterClass::Alphabetic => "upper-case alphabetic",
        CharacterClass::Alphanumeric => "alphanumeric",
        CharacterClass::Decimal => "decimal",
        CharacterClass::None => "any",
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::compile_format;

    #[test]
    fn test_exact_numeric_pass_and_fail() {
        let rules = compile_format("6!n");

        assert!(validate("250518", &rules).passed);

        let short = validate("2505", &rules);
        assert!(!short.passed);
        assert_eq!(short.violations.len(), 1);
        assert_eq!(short.violations[0].rule.rule_type, RuleType::ExactNumeric);

        let letters = validate("25O518", &rules);
        assert!(!letters.passed);
        assert!(letters.violations[0].reason.contains("numeric"));
    }

    #[test]
    fn test_max_alphanumeric_has_no_minimum() {
        let rules = compile_format("35x");

        assert!(validate("", &rules).passed);
        assert!(validate("ABC TRADING CO.", &rules).passed);
        assert!(!validate(&"X".repeat(36), &rules).passed);
    }

    #[test]
    fn test_multiline_checked_per_line() {
        let rules = compile_format("4*35x");
        let value = format!("{}\r\n{}\r\n{}", "A".repeat(35), "B".repeat(20), "C".repeat(35));

        assert!(validate(&value, &rules).passed);
        assert!(!validate(&format!("{}\n{}", "A".repeat(36), "B"), &rules).passed);
    }

    #[test]
    fn test_decimal() {
        let rules = compile_format("15d");

        assert!(validate("45000,00", &rules).passed);
        assert!(validate("45000", &rules).passed);
        assert!(!validate("45,000.00", &rules).passed);
        assert!(!validate("1234567890123456", &rules).passed);
        assert!(!validate(",", &rules).passed);
    }

    #[test]
    fn test_exact_alphabetic_is_upper_case() {
        let rules = compile_format("3!a");

        assert!(validate("USD", &rules).passed);
        assert!(!validate("usd", &rules).passed);
        assert!(!validate("US", &rules).passed);
    }

    #[test]
    fn test_compound_format_checked_as_aggregate() {
        let rules = compile_format("3!a15d");

        let ok = validate("USD45000,00", &rules);
        assert!(ok.passed);

        let too_long = validate(&format!("USD{}", "9".repeat(16)), &rules);
        assert!(!too_long.passed);
        assert_eq!(too_long.violations.len(), 1);
        assert_eq!(too_long.violations[0].rule.rule_type, RuleType::ExactAlphabetic);
    }

    #[test]
    fn test_all_exact_compound_requires_full_length() {
        let rules = compile_format("4!a2!a");

        assert!(validate("CITIUS", &rules).passed);
        assert!(!validate("CITI", &rules).passed);
    }

    #[test]
    fn test_slash_separator_not_counted() {
        let rules = compile_format("1!n/1!n");

        assert!(validate("1/1", &rules).passed);
        assert!(!validate("1/12", &rules).passed);
    }

    #[test]
    fn test_optional_section_relaxes_exact_compound() {
        let rules = compile_format("4!a2!a2!c[3!c]");

        assert!(validate("CITI", &rules).passed);
        assert!(!validate("CITIUSXXXXXXX", &rules).passed);
    }

    #[test]
    fn test_allowances_never_violate() {
        let rules = compile_format("CRLF.../[]{}");

        let outcome = validate("anything at all\r\nwith / slashes", &rules);
        assert!(outcome.passed);
        assert!(outcome.violations.is_empty());
        assert_eq!(outcome.allowances.len(), 5);
    }

    #[test]
    fn test_empty_rules_pass_anything() {
        let outcome = validate("whatever", &[]);

        assert!(outcome.passed);
        assert_eq!(outcome.summary(), "Passed");
    }

    #[test]
    fn test_validate_never_panics_on_odd_input() {
        let rule_sets = [
            compile_format("6!n"),
            compile_format("3!a15d"),
            compile_format("4*35x"),
            compile_format("2n/2n"),
            compile_format("6!n4!a2a"),
        ];
        let values = ["", "\r\n", "ÄÖÜ€", "\u{0}", "12,34,56", "🙂🙂🙂🙂🙂🙂"];

        for rules in &rule_sets {
            for value in values {
                let _ = validate(value, rules);
            }
        }
    }
}
