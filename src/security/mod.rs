//! Security utilities.
//!
//! - Credential scrubbing so binding passwords never reach logs
//! - Path validation for device-reported file names and catalog commands

pub mod credential_scrubber;
pub mod path_validator;

pub use credential_scrubber::{redact, safe_error_message, scrub_credentials};
pub use path_validator::{sanitize_filename, validate_relative_suffix};
