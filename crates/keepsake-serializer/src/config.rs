//! Serializer settings, loaded from TOML or left at their defaults.

use std::path::Path;

use keepsake_codec::{CodecOptions, Format, DEFAULT_MAX_DEPTH};
use keepsake_props::StoreMode;
use serde::{Deserialize, Serialize};

use crate::error::{SerializeError, SerializeResult};

/// How inline objects that carry an identity are treated on restore.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreMode {
    /// Always build fresh objects; never touch the reference manager.
    ByValue,
    /// Register each identified inline object as it is created, reusing a
    /// live registration under the same key when there is one.
    #[default]
    ByReference,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Session default for properties that do not pick a mode themselves.
    pub store_mode: StoreMode,
    pub restore_mode: RestoreMode,
    /// Encoding used when a caller does not name one.
    pub format: Format,
    pub indent: usize,
    pub max_depth: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            store_mode: StoreMode::ByReference,
            restore_mode: RestoreMode::ByReference,
            format: Format::Binary,
            indent: 2,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SerializerConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> SerializeResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| SerializeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> SerializeResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SerializeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> SerializeResult<String> {
        toml::to_string(self).map_err(|e| SerializeError::Config(e.to_string()))
    }

    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            indent: self.indent,
            max_depth: self.max_depth,
        }
    }

    fn validate(&self) -> SerializeResult<()> {
        if self.max_depth == 0 {
            return Err(SerializeError::Config("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = SerializerConfig::default();
        assert_eq!(c.store_mode, StoreMode::ByReference);
        assert_eq!(c.restore_mode, RestoreMode::ByReference);
        assert_eq!(c.format, Format::Binary);
        assert_eq!(c.indent, 2);
        assert_eq!(c.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(c.codec_options(), CodecOptions::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = SerializerConfig::from_toml_str(
            r#"
            store_mode = "by-value"
            format = "text"
            indent = 4
            "#,
        )
        .unwrap();
        assert_eq!(c.store_mode, StoreMode::ByValue);
        assert_eq!(c.format, Format::Text);
        assert_eq!(c.indent, 4);
        assert_eq!(c.restore_mode, RestoreMode::ByReference);
        assert_eq!(c.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn toml_round_trip() {
        let c = SerializerConfig {
            restore_mode: RestoreMode::ByValue,
            max_depth: 12,
            ..SerializerConfig::default()
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(SerializerConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            SerializerConfig::from_toml_str("format = \"yaml\""),
            Err(SerializeError::Config(_))
        ));
        assert!(matches!(
            SerializerConfig::from_toml_str("max_depth = 0"),
            Err(SerializeError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keepsake.toml");
        std::fs::write(&path, "restore_mode = \"by-value\"\n").unwrap();
        let c = SerializerConfig::load(&path).unwrap();
        assert_eq!(c.restore_mode, RestoreMode::ByValue);

        let err = SerializerConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert_eq!(err.kind(), keepsake_tree::ErrorKind::Io);
    }
}
