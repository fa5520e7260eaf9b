//! Permission modes.

use std::fmt;

use serde::Serialize;

use crate::config::ConfigSource;

/// Configuration variable holding the permission mode.
pub const MODE_VAR: &str = "DB_MCP_MODE";

/// Permission level that decides which statements may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Queries only
    #[default]
    Readonly,
    /// Queries plus row-level writes (`INSERT`, `UPDATE`, `CREATE`)
    Readwrite,
    /// Everything
    Admin,
}

impl Mode {
    /// Interpret a configured mode name, case-insensitively.
    ///
    /// Unknown names fall back to `Readonly`.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "readwrite" => Mode::Readwrite,
            "admin" => Mode::Admin,
            _ => Mode::Readonly,
        }
    }

    /// Read the current mode from `config`. Unset means `Readonly`.
    pub fn from_config<S: ConfigSource + ?Sized>(config: &S) -> Self {
        config
            .var(MODE_VAR)
            .map_or(Mode::Readonly, |name| Self::from_name(&name))
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Readonly => "readonly",
            Mode::Readwrite => "readwrite",
            Mode::Admin => "admin",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;

    #[test]
    fn test_names_are_case_insensitive() {
        assert_eq!(Mode::from_name("ADMIN"), Mode::Admin);
        assert_eq!(Mode::from_name("ReadWrite"), Mode::Readwrite);
        assert_eq!(Mode::from_name("readonly"), Mode::Readonly);
    }

    #[test]
    fn test_unknown_or_unset_is_readonly() {
        assert_eq!(Mode::from_name("superuser"), Mode::Readonly);
        assert_eq!(Mode::from_name(""), Mode::Readonly);
        assert_eq!(Mode::from_config(&MapConfig::new()), Mode::Readonly);
        assert_eq!(
            Mode::from_config(&MapConfig::new().with(MODE_VAR, "admin")),
            Mode::Admin
        );
    }

    #[test]
    fn test_display_matches_config_name() {
        assert_eq!(Mode::Readwrite.to_string(), "readwrite");
        assert_eq!(serde_json::to_value(Mode::Admin).unwrap(), "admin");
    }
}
