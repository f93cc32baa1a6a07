use crate::error::QuotaError;
use crate::store::{read_json, write_json, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const THEME_KEY: &str = "theme";

/// Appearance preference; `System` follows the host's dark-mode setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePreference {
    /// Saved preference, or `System` when none (or an unreadable one) is stored
    pub fn load(store: &dyn KeyValueStore) -> Self {
        match read_json::<ThemePreference>(store, THEME_KEY) {
            Ok(theme) => theme.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "could not load theme, using system");
                ThemePreference::System
            }
        }
    }

    pub fn save(self, store: &dyn KeyValueStore) -> Result<(), QuotaError> {
        write_json(store, THEME_KEY, &self)
    }

    pub fn is_dark(self, system_dark: bool) -> bool {
        match self {
            ThemePreference::Light => false,
            ThemePreference::Dark => true,
            ThemePreference::System => system_dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
            ThemePreference::System => "system",
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            "system" => Ok(ThemePreference::System),
            other => Err(format!(
                "Unknown theme: {} (expected light, dark or system)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_default_is_system() {
        let store = MemoryStore::new();
        assert_eq!(ThemePreference::load(&store), ThemePreference::System);
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::new();
        ThemePreference::Dark.save(&store).unwrap();
        assert_eq!(store.get(THEME_KEY).unwrap(), Some(json!("dark")));
        assert_eq!(ThemePreference::load(&store), ThemePreference::Dark);
    }

    #[test]
    fn test_unknown_stored_value_falls_back() {
        let store = MemoryStore::new();
        store.set(THEME_KEY, json!("sepia")).unwrap();
        assert_eq!(ThemePreference::load(&store), ThemePreference::System);
    }

    #[test]
    fn test_is_dark() {
        assert!(ThemePreference::System.is_dark(true));
        assert!(!ThemePreference::System.is_dark(false));
        assert!(ThemePreference::Dark.is_dark(false));
        assert!(!ThemePreference::Light.is_dark(true));
    }

    #[test]
    fn test_parse() {
        assert_eq!("Dark".parse::<ThemePreference>().unwrap(), ThemePreference::Dark);
        assert!("blue".parse::<ThemePreference>().is_err());
    }
}
