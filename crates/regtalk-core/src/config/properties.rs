//! Key/value file parser
//!
//! Format: one `key=value` per line, split at the first `=`, with key and value
//! trimmed. Lines starting with `#` are comments; blank lines are skipped.
//! Comment lines before the first entry are kept as a header and written back
//! on save.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use super::ConfigError;

/// A parsed key/value file, preserving entry order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, String)>,
    header_comments: Vec<String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse properties from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut props = Properties::new();
        let mut in_header = true;

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }

            if trimmed.starts_with('#') {
                if in_header {
                    props.header_comments.push(trimmed.to_string());
                }
                continue;
            }

            in_header = false;

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::MalformedLine {
                    line: idx + 1,
                    content: trimmed.to_string(),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::MalformedLine {
                    line: idx + 1,
                    content: trimmed.to_string(),
                });
            }
            props.set(key, value.trim());
        }

        Ok(props)
    }

    /// Load properties from a file
    ///
    /// Handles both UTF-8 and ISO-8859-1 (Latin-1) encoded files.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)?;
        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => e.as_bytes().iter().map(|&b| b as char).collect(),
        };
        Self::parse(&content)
    }

    /// Save properties to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_string())
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a value, keeping the position of an existing key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Get all entries in order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Set the header comments (each line should start with '#')
    pub fn set_header(&mut self, comments: Vec<String>) {
        self.header_comments = comments;
    }

    /// Get header comments
    pub fn header_comments(&self) -> &[String] {
        &self.header_comments
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for comment in &self.header_comments {
            writeln!(f, "{}", comment)?;
        }
        for (key, value) in &self.entries {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}
