//! Field validators as a closed set of rule kinds.
//!
//! # Responsibility
//! - Provide pure, reusable predicates for text/number input fields.
//! - Let callers report which rule rejected a value.
//!
//! # Invariants
//! - Length rules count Unicode scalar values of the trimmed input.
//! - Numeric rules fail on input that does not parse as a finite number.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("valid email regex"));

/// One validation rule applied to a raw input value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validator {
    /// Trimmed value must not be empty.
    Required,
    /// Trimmed value must have at least `n` characters.
    MinLength(usize),
    /// Trimmed value must have at most `n` characters.
    MaxLength(usize),
    /// Value must parse as a number `>= n`.
    Min(f64),
    /// Value must parse as a number `<= n`.
    Max(f64),
    /// Value must look like `local@domain.tld`.
    Email,
}

impl Validator {
    /// Returns whether `value` satisfies this rule.
    pub fn check(&self, value: &str) -> bool {
        match *self {
            Self::Required => !value.trim().is_empty(),
            Self::MinLength(min) => value.trim().chars().count() >= min,
            Self::MaxLength(max) => value.trim().chars().count() <= max,
            Self::Min(bound) => parse_number(value).is_some_and(|number| number >= bound),
            Self::Max(bound) => parse_number(value).is_some_and(|number| number <= bound),
            Self::Email => EMAIL_RE.is_match(value),
        }
    }
}

impl Display for Validator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => write!(f, "value is required"),
            Self::MinLength(min) => write!(f, "value must be at least {min} characters"),
            Self::MaxLength(max) => write!(f, "value must be at most {max} characters"),
            Self::Min(bound) => write!(f, "value must be a number >= {bound}"),
            Self::Max(bound) => write!(f, "value must be a number <= {bound}"),
            Self::Email => write!(f, "value must be a valid email address"),
        }
    }
}

/// Returns `true` when every rule accepts `value`.
pub fn validate(value: &str, validators: &[Validator]) -> bool {
    validators.iter().all(|validator| validator.check(value))
}

/// Returns the first rule that rejects `value`, in declaration order.
pub fn first_failure(value: &str, validators: &[Validator]) -> Option<Validator> {
    validators
        .iter()
        .copied()
        .find(|validator| !validator.check(value))
}

fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}
