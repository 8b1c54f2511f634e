//! Cron expression handling.

use crate::error::{FeedhookError, Result};

/// Convert a cron expression to the seconds-first form the job scheduler
/// parses.
///
/// Standard 5-field expressions (`min hour dom month dow`) get a leading
/// `0` seconds field. 6-field expressions are returned unchanged.
pub fn normalize_cron(expr: &str) -> Result<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();

    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 => Ok(fields.join(" ")),
        n => Err(FeedhookError::Config(format!(
            "invalid cron expression '{}': expected 5 fields, got {}",
            expr.trim(),
            n
        ))),
    }
}
