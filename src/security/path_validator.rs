//! Path validation for names that come from the device or the command line.
//!
//! Core file names are reported by the device and test names are given by
//! the operator; both end up as local path components, so neither may escape
//! the directory they are joined onto.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Result};

/// Validates a device-relative path suffix before it is joined onto a local
/// directory.
///
/// # Returns
///
/// * `Ok(PathBuf)` - The suffix as a relative path made only of normal components
/// * `Err` - If the suffix is empty, absolute, contains `..` or null bytes
pub fn validate_relative_suffix(suffix: &str) -> Result<PathBuf> {
    if suffix.contains('\0') {
        bail!("Path contains null bytes");
    }

    let mut resolved = PathBuf::new();
    for component in Path::new(suffix).components() {
        match component {
            Component::Normal(name) => resolved.push(name),
            Component::CurDir => {}
            Component::ParentDir => {
                bail!("Path traversal attempt detected: {} contains '..'", suffix);
            }
            Component::RootDir | Component::Prefix(_) => {
                bail!("Absolute paths not allowed for device file {}", suffix);
            }
        }
    }

    if resolved.as_os_str().is_empty() {
        bail!("Empty device file path");
    }

    Ok(resolved)
}

/// Turns a test name into a single local path component.
///
/// Spaces become underscores; separators and shell metacharacters are
/// replaced as well.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = String::with_capacity(filename.len());

    for ch in filename.trim().chars() {
        match ch {
            ' ' => sanitized.push('_'),
            '/' | '\\' => sanitized.push('_'),
            '\0' => continue,
            '<' | '>' | ':' | '"' | '\'' | '|' | '?' | '*' => sanitized.push('_'),
            c if c.is_control() => sanitized.push('_'),
            c => sanitized.push(c),
        }
    }

    if sanitized.is_empty() {
        sanitized = "unnamed".to_string();
    } else if sanitized.chars().all(|c| c == '.') {
        sanitized = format!("_{}", sanitized);
    }

    sanitized
}
