//! Session Configuration
//!
//! Loads and persists the session's product class, target address and port,
//! plus the alias table. Every key other than `product`, `address` and `port`
//! is an alias name mapped to a raw command string.

mod properties;

pub use properties::Properties;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::batch::AliasTable;
use crate::protocol::{TransportTarget, WireFormat};

/// Reserved configuration keys
pub const RESERVED_KEYS: [&str; 3] = ["product", "address", "port"];

/// Errors that can occur while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config line {line}: '{content}'")]
    MalformedLine { line: usize, content: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid alias name '{0}'")]
    InvalidAlias(String),

    #[error("Missing required setting '{0}'")]
    Missing(&'static str),
}

/// Product class of the target; decides the session's wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Product {
    Drx,
    Toc,
    Roc,
    Dwg,
}

impl Product {
    pub const ALL: [Product; 4] = [Product::Drx, Product::Toc, Product::Roc, Product::Dwg];

    /// Wire format spoken by this product class
    pub fn wire_format(&self, message_type: u16) -> WireFormat {
        match self {
            Product::Drx | Product::Toc => WireFormat::Compact,
            Product::Roc | Product::Dwg => WireFormat::Framed { message_type },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Product::Drx => "DRX",
            Product::Toc => "TOC",
            Product::Roc => "ROC",
            Product::Dwg => "DWG",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Product {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Product::ALL
            .into_iter()
            .find(|p| p.name() == upper)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "product".into(),
                message: format!("'{}' is not one of DRX, TOC, ROC, DWG", s.trim()),
            })
    }
}

/// Persistent session settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    pub product: Option<Product>,
    pub address: Option<String>,
    pub port: Option<u32>,
    aliases: AliasTable,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location (`<config dir>/regtalk/regtalk.cfg`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("regtalk").join("regtalk.cfg"))
    }

    /// Parse configuration text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Self::from_properties(&Properties::parse(content)?)
    }

    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_properties(&Properties::load(path)?)
    }

    /// Load configuration, treating a missing file as empty
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no config at {}, using defaults", path.as_ref().display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Write the configuration back to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.to_properties().save(path)?;
        Ok(())
    }

    fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let mut config = SessionConfig::new();

        for (key, value) in props.entries() {
            match key.to_ascii_lowercase().as_str() {
                "product" => config.product = Some(value.parse()?),
                "address" => config.address = Some(value.to_string()),
                "port" => {
                    let port = value.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                        key: "port".into(),
                        message: e.to_string(),
                    })?;
                    config.port = Some(port);
                }
                _ => config.add_alias(key, value)?,
            }
        }

        Ok(config)
    }

    fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.set_header(vec!["# regtalk session configuration".into()]);
        if let Some(product) = self.product {
            props.set("product", product.name());
        }
        if let Some(address) = &self.address {
            props.set("address", address.as_str());
        }
        if let Some(port) = self.port {
            props.set("port", port.to_string());
        }
        for (name, commands) in self.aliases.iter() {
            props.set(name, commands);
        }
        props
    }

    /// Alias table loaded from the file
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Define an alias. Names must be a single word that cannot be mistaken
    /// for another token form.
    pub fn add_alias(&mut self, name: &str, commands: &str) -> Result<(), ConfigError> {
        let name = name.trim();
        let lower = name.to_ascii_lowercase();
        let valid = !name.is_empty()
            && !name.starts_with('#')
            && !name.contains(|c: char| c.is_whitespace() || c == ';' || c == '=')
            && lower != "cont"
            && !RESERVED_KEYS.contains(&lower.as_str());
        if !valid {
            return Err(ConfigError::InvalidAlias(name.to_string()));
        }
        self.aliases.insert(name, commands.trim());
        Ok(())
    }

    /// Remove an alias, returning its command string
    pub fn remove_alias(&mut self, name: &str) -> Option<String> {
        self.aliases.remove(name)
    }

    /// Transport target from `address` and `port`
    pub fn target(&self) -> Result<TransportTarget, ConfigError> {
        let address = self.address.as_deref().ok_or(ConfigError::Missing("address"))?;
        let port = self.port.ok_or(ConfigError::Missing("port"))?;
        TransportTarget::from_address(address, port).map_err(|e| ConfigError::InvalidValue {
            key: "address".into(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
# bench target
product=roc
address=192.168.0.20
port=65432
status=r 602b
Warmup=w 10 1; delay=0.5; status
";

    #[test]
    fn test_parse_reserved_and_aliases() {
        let config = SessionConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.product, Some(Product::Roc));
        assert_eq!(config.address.as_deref(), Some("192.168.0.20"));
        assert_eq!(config.port, Some(65432));
        assert_eq!(config.aliases().len(), 2);
        assert_eq!(
            config.aliases().get("WARMUP"),
            Some("w 10 1; delay=0.5; status")
        );
    }

    #[test]
    fn test_product_wire_format() {
        assert_eq!(Product::Drx.wire_format(1), WireFormat::Compact);
        assert_eq!(
            Product::Dwg.wire_format(3),
            WireFormat::Framed { message_type: 3 }
        );
        assert!("xyz".parse::<Product>().is_err());
        assert_eq!("DRx".parse::<Product>().unwrap(), Product::Drx);
    }

    #[test]
    fn test_invalid_port() {
        assert!(matches!(
            SessionConfig::parse("port=abc"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_target() {
        let config = SessionConfig::parse(SAMPLE).unwrap();
        assert_eq!(
            config.target().unwrap(),
            TransportTarget::Tcp {
                host: "192.168.0.20".into(),
                port: 65432
            }
        );
        assert!(matches!(
            SessionConfig::new().target(),
            Err(ConfigError::Missing("address"))
        ));
    }

    #[test]
    fn test_alias_name_validation() {
        let mut config = SessionConfig::new();
        assert!(config.add_alias("read all", "r 1").is_err());
        assert!(config.add_alias("cont", "r 1").is_err());
        assert!(config.add_alias("#x", "r 1").is_err());
        assert!(config.add_alias("ok_name", "r 1").is_ok());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("regtalk.cfg");

        let mut config = SessionConfig::parse(SAMPLE).unwrap();
        config.add_alias("reset", "w 0 1").unwrap();
        config.remove_alias("status");
        config.save(&path).unwrap();

        let reloaded = SessionConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
        assert!(reloaded.aliases().get("status").is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::load_or_default(dir.path().join("absent.cfg")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }
}
