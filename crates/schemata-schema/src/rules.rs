//! Validation rule definitions.
//!
//! A field carries an ordered list of [`ValidationRule`]s exactly as the
//! administrator declared them (`{type, message?, params}`). They are checked
//! at registration with [`ValidationRule::compile`], which yields a typed
//! [`Rule`] ready for the validation engine. Anything that does not compile is
//! rejected before it is stored.

use crate::datatype::Datatype;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// A declared validation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// One of `min_length`, `max_length`, `min_value`, `max_value`, `pattern`.
    #[serde(rename = "type")]
    pub rule_type: String,
    /// Replaces the default error message when the rule fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Rule parameters (`value` or `regex`).
    #[serde(default)]
    pub params: Map<String, serde_json::Value>,
}

impl ValidationRule {
    /// Creates a rule with a single parameter.
    pub fn new(rule_type: impl Into<String>, key: &str, value: serde_json::Value) -> Self {
        let mut params = Map::new();
        params.insert(key.to_string(), value);
        Self {
            rule_type: rule_type.into(),
            message: None,
            params,
        }
    }

    /// `min_length` with the given bound.
    pub fn min_length(n: u64) -> Self {
        Self::new("min_length", "value", n.into())
    }

    /// `max_length` with the given bound.
    pub fn max_length(n: u64) -> Self {
        Self::new("max_length", "value", n.into())
    }

    /// `min_value` with the given bound.
    pub fn min_value(n: f64) -> Self {
        Self::new("min_value", "value", n.into())
    }

    /// `max_value` with the given bound.
    pub fn max_value(n: f64) -> Self {
        Self::new("max_value", "value", n.into())
    }

    /// `pattern` with the given regular expression.
    pub fn pattern(regex: impl Into<String>) -> Self {
        Self::new("pattern", "regex", serde_json::Value::String(regex.into()))
    }

    /// Sets a custom failure message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Compiles the rule into its typed form.
    ///
    /// # Errors
    ///
    /// Returns a message when the type is unknown or the parameters are
    /// malformed.
    pub fn compile(&self) -> Result<CompiledRule, String> {
        let rule = match self.rule_type.as_str() {
            "min_length" => Rule::MinLength(self.length_param()?),
            "max_length" => Rule::MaxLength(self.length_param()?),
            "min_value" => Rule::MinValue(self.number_param()?),
            "max_value" => Rule::MaxValue(self.number_param()?),
            "pattern" => {
                let source = self
                    .params
                    .get("regex")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| "A pattern rule requires a 'regex' string.".to_string())?;
                // Anchored so the whole value has to match.
                let regex = Regex::new(&format!("^(?:{source})$"))
                    .map_err(|e| format!("Invalid regular expression: {e}"))?;
                Rule::Pattern(regex)
            }
            other => return Err(format!("Unknown rule type '{other}'.")),
        };
        Ok(CompiledRule {
            rule,
            message: self.message.clone(),
        })
    }

    fn length_param(&self) -> Result<usize, String> {
        self.params
            .get("value")
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| format!("'{}' requires a non-negative integer 'value'.", self.rule_type))
    }

    fn number_param(&self) -> Result<f64, String> {
        self.params
            .get("value")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| format!("'{}' requires a numeric 'value'.", self.rule_type))
    }
}

/// A typed, ready-to-run rule.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Minimum number of characters (or selected options).
    MinLength(usize),
    /// Maximum number of characters (or selected options).
    MaxLength(usize),
    /// Inclusive lower bound.
    MinValue(f64),
    /// Inclusive upper bound.
    MaxValue(f64),
    /// The whole value must match.
    Pattern(Regex),
}

impl Rule {
    /// Returns `true` if this rule can apply to values of `datatype`.
    pub const fn applies_to(&self, datatype: Datatype) -> bool {
        match self {
            Self::MinLength(_) | Self::MaxLength(_) => datatype.has_length(),
            Self::MinValue(_) | Self::MaxValue(_) => datatype.is_numeric(),
            Self::Pattern(_) => datatype.is_textual(),
        }
    }

    /// Returns the declared type name.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::MinLength(_) => "min_length",
            Self::MaxLength(_) => "max_length",
            Self::MinValue(_) => "min_value",
            Self::MaxValue(_) => "max_value",
            Self::Pattern(_) => "pattern",
        }
    }
}

/// A compiled rule plus its optional custom message.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// The typed rule.
    pub rule: Rule,
    /// Overrides the default message on failure.
    pub message: Option<String>,
}

/// Compiles every rule of a field, in order.
///
/// # Errors
///
/// Returns `(index, message)` pairs for every rule that does not compile or
/// cannot apply to `datatype`.
pub fn compile_all(
    rules: &[ValidationRule],
    datatype: Datatype,
) -> Result<Vec<CompiledRule>, Vec<(usize, String)>> {
    let mut compiled = Vec::with_capacity(rules.len());
    let mut problems = Vec::new();
    for (i, rule) in rules.iter().enumerate() {
        match rule.compile() {
            Ok(c) if c.rule.applies_to(datatype) => compiled.push(c),
            Ok(c) => problems.push((
                i,
                format!(
                    "A {} rule cannot apply to a {datatype} field.",
                    c.rule.type_name()
                ),
            )),
            Err(message) => problems.push((i, message)),
        }
    }
    if problems.is_empty() {
        Ok(compiled)
    } else {
        Err(problems)
    }
}
