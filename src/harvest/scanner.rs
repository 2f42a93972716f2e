use log::debug;
use regex::Regex;

use crate::config::ErrorPattern;
use crate::constants::CURSOR_PREFIX_LEN;

/// Return the patterns that match `content`, in input order.
///
/// Literal patterns are compiled as regular expressions on the spot; one
/// that does not compile never matches.
pub fn scan(content: &str, patterns: &[ErrorPattern]) -> Vec<String> {
    patterns
        .iter()
        .filter(|pattern| match pattern {
            ErrorPattern::Literal(text) => match Regex::new(text) {
                Ok(regex) => regex.is_match(content),
                Err(e) => {
                    debug!("Skipping invalid literal pattern {:?}: {}", text, e);
                    false
                }
            },
            ErrorPattern::Compiled(regex) => regex.is_match(content),
        })
        .map(|pattern| pattern.as_str().to_string())
        .collect()
}

/// Extract the cursor for the next incremental log request.
///
/// The cursor is the start of the last complete line: everything up to the
/// trailing newline, cut to the timestamp prefix. Content without a newline
/// holds no complete line.
pub fn last_log_line(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() < 2 {
        return None;
    }

    let last = lines[lines.len() - 2].trim_end_matches('\r');
    let prefix: String = last.chars().take(CURSOR_PREFIX_LEN).collect();
    Some(prefix)
}
