use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// How a catalog command is turned into a device command and post-processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Incremental log output, resumed from the stored cursor
    Logging,
    /// Plain CLI output captured to a file
    Command,
    /// Diagnostic archive written by the device itself
    ShowTech,
    /// A `type` value this harvester does not know; reported at harvest time
    Unrecognized(String),
}

impl CommandKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "logging" => CommandKind::Logging,
            "command" => CommandKind::Command,
            "show-tech" => CommandKind::ShowTech,
            other => CommandKind::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::Logging => "logging",
            CommandKind::Command => "command",
            CommandKind::ShowTech => "show-tech",
            CommandKind::Unrecognized(value) => value,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error pattern from the catalog.
///
/// Literal patterns are matched as regular-expression fragments, not as
/// exact substrings: `"ERROR.*"` matches any line containing `ERROR`, and a
/// literal with metacharacters such as `"[x]"` matches a single `x`.
#[derive(Debug, Clone)]
pub enum ErrorPattern {
    Literal(String),
    Compiled(Regex),
}

impl ErrorPattern {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorPattern::Literal(text) => text,
            ErrorPattern::Compiled(regex) => regex.as_str(),
        }
    }
}

impl PartialEq for ErrorPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ErrorPattern::Literal(a), ErrorPattern::Literal(b)) => a == b,
            (ErrorPattern::Compiled(a), ErrorPattern::Compiled(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// One command to harvest
#[derive(Debug, Clone, PartialEq)]
pub struct CommandCatalogEntry {
    pub command: String,
    pub kind: CommandKind,
    pub error_patterns: Vec<ErrorPattern>,
}

impl CommandCatalogEntry {
    pub fn new(command: &str, kind: CommandKind) -> Self {
        Self {
            command: command.to_string(),
            kind,
            error_patterns: Vec::new(),
        }
    }

    pub fn with_literals(mut self, patterns: &[&str]) -> Self {
        self.error_patterns
            .extend(patterns.iter().map(|p| ErrorPattern::Literal(p.to_string())));
        self
    }
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "errorPatterns", alias = "error_patterns", default)]
    error_patterns: Option<Vec<RawPattern>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPattern {
    Literal(String),
    Regex { regex: String },
}

/// Ordered, read-only table of commands to harvest.
///
/// The YAML source is a mapping from command text to
/// `{type: logging|command|show-tech, errorPatterns: [...]}`; mapping order
/// is harvest order. A pattern is either a plain string (literal) or
/// `{regex: "..."}` (compiled at load time).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandCatalog {
    entries: Vec<CommandCatalogEntry>,
}

impl CommandCatalog {
    pub fn new(entries: Vec<CommandCatalogEntry>) -> Self {
        Self { entries }
    }

    /// Load a catalog from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read command catalog: {}", path.display()))?;

        let catalog = Self::from_yaml_str(&content)
            .context(format!("Invalid command catalog: {}", path.display()))?;

        info!("Loaded {} catalog commands from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Parse a catalog, failing on any structurally malformed entry
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let mapping: Mapping = serde_yaml::from_str(content)
            .context("Failed to parse YAML catalog")?;

        let mut entries = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let command = key
                .as_str()
                .ok_or_else(|| anyhow!("Catalog keys must be command strings, got {:?}", key))?
                .to_string();

            let raw: RawEntry = serde_yaml::from_value(value)
                .context(format!("Malformed catalog entry for command {}", command))?;

            let kind = CommandKind::parse(&raw.kind);
            if let CommandKind::Unrecognized(value) = &kind {
                warn!("Command {} has unknown type {}", command, value);
            }

            let mut error_patterns = Vec::new();
            for pattern in raw.error_patterns.unwrap_or_default() {
                error_patterns.push(compile_pattern(&command, pattern)?);
            }

            debug!("Catalog entry {} ({}), {} error patterns", command, kind, error_patterns.len());
            entries.push(CommandCatalogEntry { command, kind, error_patterns });
        }

        Ok(Self { entries })
    }

    /// Render the catalog back to its YAML form
    pub fn to_yaml_string(&self) -> Result<String> {
        let mut mapping = Mapping::new();
        for entry in &self.entries {
            let mut record = Mapping::new();
            record.insert(Value::from("type"), Value::from(entry.kind.as_str()));

            let patterns: Vec<Value> = entry
                .error_patterns
                .iter()
                .map(|pattern| match pattern {
                    ErrorPattern::Literal(text) => Value::from(text.as_str()),
                    ErrorPattern::Compiled(regex) => {
                        let mut tagged = Mapping::new();
                        tagged.insert(Value::from("regex"), Value::from(regex.as_str()));
                        Value::Mapping(tagged)
                    }
                })
                .collect();
            record.insert(Value::from("errorPatterns"), Value::Sequence(patterns));

            mapping.insert(Value::from(entry.command.as_str()), Value::Mapping(record));
        }

        serde_yaml::to_string(&mapping).context("Failed to serialize command catalog")
    }

    /// Save the catalog to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_yaml_string()?)
            .context(format!("Failed to write catalog to {}", path.display()))?;
        info!("Saved command catalog to {}", path.display());
        Ok(())
    }

    pub fn entries(&self) -> &[CommandCatalogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandCatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compile_pattern(command: &str, pattern: RawPattern) -> Result<ErrorPattern> {
    match pattern {
        RawPattern::Literal(text) => {
            // Literals keep their lenient behaviour: an invalid one simply never matches
            if Regex::new(&text).is_err() {
                warn!("Error pattern {:?} for command {} is not a valid regex and will never match", text, command);
            }
            Ok(ErrorPattern::Literal(text))
        }
        RawPattern::Regex { regex } => match Regex::new(&regex) {
            Ok(compiled) => Ok(ErrorPattern::Compiled(compiled)),
            Err(e) => bail!("Invalid regex {:?} for command {}: {}", regex, command, e),
        },
    }
}
