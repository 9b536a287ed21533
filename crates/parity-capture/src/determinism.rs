//! Fixed timezone/locale settings threaded through a run.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TZ: &str = "UTC";
pub const DEFAULT_LOCALE: &str = "C.UTF-8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismConfig {
    pub tz: String,
    pub locale: String,
}

impl Default for DeterminismConfig {
    fn default() -> Self {
        Self {
            tz: DEFAULT_TZ.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl DeterminismConfig {
    pub fn new(tz: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            tz: tz.into(),
            locale: locale.into(),
        }
    }

    /// Read `TZ` and `LC_ALL`/`LANG` once; blank values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            tz: non_blank("TZ").unwrap_or_else(|| DEFAULT_TZ.to_string()),
            locale: non_blank("LC_ALL")
                .or_else(|| non_blank("LANG"))
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
        }
    }

    pub fn snapshot(&self) -> DeterminismSnapshot {
        DeterminismSnapshot {
            harness_version: env!("CARGO_PKG_VERSION").to_string(),
            runtime: format!("rust/{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            tz: self.tz.clone(),
            locale: self.locale.clone(),
        }
    }
}

/// Environment facts recorded in every manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminismSnapshot {
    pub harness_version: String,
    pub runtime: String,
    pub tz: String,
    pub locale: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn lookup_precedence_and_defaults() {
        let env: BTreeMap<&str, &str> = [("LANG", "en_US.UTF-8"), ("TZ", " ")].into_iter().collect();
        let config = DeterminismConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.tz, "UTC");
        assert_eq!(config.locale, "en_US.UTF-8");

        let env: BTreeMap<&str, &str> = [("LANG", "en_US.UTF-8"), ("LC_ALL", "C")].into_iter().collect();
        let config = DeterminismConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.locale, "C");

        assert_eq!(DeterminismConfig::from_lookup(|_| None), DeterminismConfig::default());
    }
}
