//! Process-wide configuration for the defect reporter.

use serde::{Deserialize, Serialize};

/// Environment variable read by [`BatonConfig::from_env`].
pub const DEFECT_POLICY_ENV: &str = "BATON_DEFECT_POLICY";

/// How the default defect handler reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectPolicy {
    /// Log, then panic. The panic is recorded on the reporter thread and
    /// raised again by the next `reporting::flush()`.
    Assert,
    /// Log only.
    Log,
}

impl Default for DefectPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            DefectPolicy::Assert
        } else {
            DefectPolicy::Log
        }
    }
}

impl DefectPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assert" => Some(DefectPolicy::Assert),
            "log" => Some(DefectPolicy::Log),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatonConfig {
    pub defect_policy: DefectPolicy,

    /// Name of the dedicated reporter thread.
    pub reporter_thread_name: String,
}

impl Default for BatonConfig {
    fn default() -> Self {
        Self {
            defect_policy: DefectPolicy::default(),
            reporter_thread_name: "baton-defect-reporter".to_string(),
        }
    }
}

impl BatonConfig {
    /// Defaults, overridden by `BATON_DEFECT_POLICY` when set to a known value.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(DEFECT_POLICY_ENV) {
            match DefectPolicy::parse(&raw) {
                Some(policy) => config.defect_policy = policy,
                None => tracing::warn!(
                    value = %raw,
                    "ignoring unknown {DEFECT_POLICY_ENV} (expected `assert` or `log`)"
                ),
            }
        }
        config
    }

    pub fn with_defect_policy(mut self, policy: DefectPolicy) -> Self {
        self.defect_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("assert", Some(DefectPolicy::Assert))]
    #[case(" LOG ", Some(DefectPolicy::Log))]
    #[case("panic", None)]
    fn parses_policy(#[case] raw: &str, #[case] expected: Option<DefectPolicy>) {
        assert_eq!(DefectPolicy::parse(raw), expected);
    }

    #[test]
    fn deserializes_partial_config() {
        let c: BatonConfig = serde_json::from_str(r#"{"defect_policy":"log"}"#).unwrap();
        assert_eq!(c.defect_policy, DefectPolicy::Log);
        assert_eq!(c.reporter_thread_name, "baton-defect-reporter");
    }
}
