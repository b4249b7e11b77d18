//! Rule validators.
//!
//! Each compiled rule becomes a [`Validator`] run against the cleaned value
//! of a field. Rules see storage values, so lengths count characters of the
//! trimmed string (or selected options) and value bounds compare numbers.

use schemata_db::Value;
use schemata_schema::{CompiledRule, Rule};

/// A single check over a cleaned field value.
pub trait Validator {
    /// Stable error code reported when the check fails.
    fn code(&self) -> &'static str;

    /// Returns the default failure message, or `None` when `value` passes.
    fn check(&self, value: &Value) -> Option<String>;
}

impl Validator for Rule {
    fn code(&self) -> &'static str {
        self.type_name()
    }

    fn check(&self, value: &Value) -> Option<String> {
        match self {
            Self::MinLength(min) => {
                let len = length(value)?;
                (len < *min).then(|| length_message("at least", *min, len, value))
            }
            Self::MaxLength(max) => {
                let len = length(value)?;
                (len > *max).then(|| length_message("at most", *max, len, value))
            }
            Self::MinValue(min) => {
                let n = value.as_float()?;
                (n < *min).then(|| format!("Ensure this value is greater than or equal to {min}."))
            }
            Self::MaxValue(max) => {
                let n = value.as_float()?;
                (n > *max).then(|| format!("Ensure this value is less than or equal to {max}."))
            }
            Self::Pattern(regex) => {
                let s = value.as_str()?;
                (!regex.is_match(s)).then(|| "Enter a valid value.".to_string())
            }
        }
    }
}

/// A failed rule: its code and the message to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    /// The rule type, e.g. `max_length`.
    pub code: &'static str,
    /// The custom message if one was declared, else the default.
    pub message: String,
}

/// Runs `rules` in order and returns the first failure.
pub fn run_rules(rules: &[CompiledRule], value: &Value) -> Option<RuleFailure> {
    rules.iter().find_map(|compiled| {
        compiled.rule.check(value).map(|default| RuleFailure {
            code: compiled.rule.code(),
            message: compiled.message.clone().unwrap_or(default),
        })
    })
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Json(serde_json::Value::Array(items)) => Some(items.len()),
        _ => None,
    }
}

fn length_message(bound: &str, limit: usize, actual: usize, value: &Value) -> String {
    if matches!(value, Value::Json(_)) {
        format!("Select {bound} {limit} options (it has {actual}).")
    } else {
        format!("Ensure this value has {bound} {limit} characters (it has {actual}).")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_schema::ValidationRule;
    use serde_json::json;

    fn compiled(rules: &[ValidationRule]) -> Vec<CompiledRule> {
        rules.iter().map(|r| r.compile().unwrap()).collect()
    }

    #[test]
    fn test_length_counts_characters() {
        let rules = compiled(&[ValidationRule::max_length(3)]);
        assert!(run_rules(&rules, &Value::String("äöü".into())).is_none());
        let failure = run_rules(&rules, &Value::String("abcd".into())).unwrap();
        assert_eq!(failure.code, "max_length");
        assert_eq!(
            failure.message,
            "Ensure this value has at most 3 characters (it has 4)."
        );
    }

    #[test]
    fn test_length_of_multi_select() {
        let rules = compiled(&[ValidationRule::min_length(2)]);
        let failure = run_rules(&rules, &Value::Json(json!(["a"]))).unwrap();
        assert_eq!(failure.code, "min_length");
        assert!(failure.message.starts_with("Select at least 2 options"));
        assert!(run_rules(&rules, &Value::Json(json!(["a", "b"]))).is_none());
    }

    #[test]
    fn test_value_bounds() {
        let rules = compiled(&[ValidationRule::min_value(0.0), ValidationRule::max_value(10.0)]);
        assert!(run_rules(&rules, &Value::Int(10)).is_none());
        assert_eq!(run_rules(&rules, &Value::Int(-1)).unwrap().code, "min_value");
        assert_eq!(run_rules(&rules, &Value::Float(10.5)).unwrap().code, "max_value");
    }

    #[test]
    fn test_pattern() {
        let rules = compiled(&[ValidationRule::pattern("[A-Z]{3}")]);
        assert!(run_rules(&rules, &Value::String("ABC".into())).is_none());
        assert_eq!(run_rules(&rules, &Value::String("ABCD".into())).unwrap().code, "pattern");
    }

    #[test]
    fn test_first_failure_wins_and_custom_message() {
        let rules = compiled(&[
            ValidationRule::min_length(5).with_message("Too short"),
            ValidationRule::pattern("[0-9]+"),
        ]);
        let failure = run_rules(&rules, &Value::String("ab".into())).unwrap();
        assert_eq!(failure.code, "min_length");
        assert_eq!(failure.message, "Too short");
    }
}
