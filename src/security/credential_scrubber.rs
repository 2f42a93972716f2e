//! Credential scrubbing for strings that reach logs or summaries.
//!
//! Device credentials come from the binding file and are handed to the SSH
//! layer; transport errors and device output can echo them back. Everything
//! that is logged passes through [`scrub_credentials`] first.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex patterns for detecting credentials and their replacements
    static ref CREDENTIAL_PATTERNS: Vec<(Regex, &'static str)> = vec![
        // Generic passwords
        (Regex::new(r"(?i)(password|passwd|pwd)\s*[:=]\s*([^\s]+)").unwrap(),
         "$1=<REDACTED_PASSWORD>"),

        // Device configuration secrets, e.g. "secret 10 $6$abc..."
        (Regex::new(r"(?i)\b(secret|password)\s+(\d+)\s+(\S+)").unwrap(),
         "$1 $2 <REDACTED_SECRET>"),

        // user:password@host in ssh/scp style URLs
        (Regex::new(r"(?i)(ssh|scp|sftp)://([^:/@\s]+):([^@\s]+)@").unwrap(),
         "$1://$2:<REDACTED_PASS>@"),

        // Generic tokens
        (Regex::new(r"(?i)(token|access[_-]?token|auth[_-]?token)\s*[:=]\s*([A-Za-z0-9\-._~+/]{20,})").unwrap(),
         "$1=<REDACTED_TOKEN>"),
    ];
}

/// Scrub credentials from a string.
///
/// # Example
///
/// ```
/// use diag_harvester::security::credential_scrubber::scrub_credentials;
///
/// let input = "login rejected: password=secret123";
/// assert_eq!(scrub_credentials(input), "login rejected: password=<REDACTED_PASSWORD>");
/// ```
pub fn scrub_credentials(input: &str) -> String {
    let mut result = input.to_string();

    for (pattern, replacement) in CREDENTIAL_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }

    result
}

/// Placeholder for a credential value; empty values stay visibly empty
pub fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<EMPTY>"
    } else {
        "<REDACTED>"
    }
}

/// Format `context: error` and scrub the result
pub fn safe_error_message(context: &str, error: &impl std::fmt::Display) -> String {
    let raw_message = format!("{}: {}", context, error);
    scrub_credentials(&raw_message)
}
