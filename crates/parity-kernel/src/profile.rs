//! Comparator profiles: the knobs that tune how strictly drifts are detected.

use crate::error::ProfileError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_PROFILE_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorProfile {
    pub profile_id: String,
    /// Tool-order checks without their own `strict_order` use this.
    pub strict_order_default: bool,
    /// Tools excluded from tool-order extraction.
    pub ignore_optional_tools: Vec<String>,
    pub compare_reason_class: bool,
    pub require_handoff_before_complete: bool,
    pub require_confirmation_before_plan_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_handoff_target: Option<String>,
}

impl Default for ComparatorProfile {
    fn default() -> Self {
        Self {
            profile_id: DEFAULT_PROFILE_ID.to_string(),
            strict_order_default: true,
            ignore_optional_tools: Vec::new(),
            compare_reason_class: true,
            require_handoff_before_complete: true,
            require_confirmation_before_plan_update: false,
            required_handoff_target: None,
        }
    }
}

impl ComparatorProfile {
    pub fn ignores_tool(&self, tool: &str) -> bool {
        self.ignore_optional_tools.iter().any(|t| t == tool)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.profile_id.trim().is_empty() {
            return Err(ProfileError::Invalid(
                "profile_id must be a non-empty string".to_string(),
            ));
        }
        if let Some(target) = &self.required_handoff_target
            && target.trim().is_empty()
        {
            return Err(ProfileError::Invalid(
                "required_handoff_target must be non-empty when present".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a profile from `.json` or `.toml` (chosen by extension).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ProfileError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let profile = if is_toml {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
        .map_err(|message| ProfileError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json_str(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let profile = ComparatorProfile::from_json_str(
            r#"{"profile_id": "lenient", "strict_order_default": false}"#,
        )
        .expect("profile should parse");
        assert_eq!(profile.profile_id, "lenient");
        assert!(!profile.strict_order_default);
        assert!(profile.compare_reason_class);
        assert!(profile.require_handoff_before_complete);
    }

    #[test]
    fn toml_profile_parses() {
        let profile = ComparatorProfile::from_toml_str(
            r#"
profile_id = "ci"
ignore_optional_tools = ["optional_tool"]
required_handoff_target = "reviewer"
"#,
        )
        .expect("profile should parse");
        assert!(profile.ignores_tool("optional_tool"));
        assert_eq!(profile.required_handoff_target.as_deref(), Some("reviewer"));
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn blank_profile_id_is_invalid() {
        let profile = ComparatorProfile {
            profile_id: "  ".into(),
            ..ComparatorProfile::default()
        };
        assert!(profile.validate().is_err());
    }
}
