//! Intervention expression parser
//!
//! Accepts `<variable> * <factor>` (scale) or `<variable> = <value>` (set).
//! A factor of `1.2` is stored as `0.2`, the fractional increase.

use crate::error::{Result, SdkError};
use caus_core::{Intervention, InterventionAction};
use regex::Regex;
use std::sync::OnceLock;

const PATTERN: &str = r"^([a-zA-Z0-9_.-]+)\s*(\*|=)\s*([0-9.]+)$";

fn pattern() -> Result<&'static Regex> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PATTERN))
        .as_ref()
        .map_err(|e| SdkError::Config(format!("invalid intervention pattern: {}", e)))
}

/// Parse an intervention expression
///
/// Surrounding whitespace is ignored. The number must be non-negative and
/// written without sign or exponent.
pub fn parse_intervention(input: &str) -> Result<Intervention> {
    let trimmed = input.trim();
    let captures = pattern()?
        .captures(trimmed)
        .ok_or_else(|| SdkError::InvalidInterventionFormat(input.to_string()))?;

    let target = captures[1].to_string();
    let literal = &captures[3];
    let number: f64 = literal
        .parse()
        .map_err(|_| SdkError::InvalidNumber(literal.to_string()))?;

    let (action, value) = match &captures[2] {
        "*" => (InterventionAction::IncreaseByPercent, number - 1.0),
        _ => (InterventionAction::SetToFixed, number),
    };

    Ok(Intervention {
        target,
        action,
        value,
    })
}
