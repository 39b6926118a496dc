//! Marshalling configuration.
//!
//! [`MarshalConfig::from_env`] reads:
//!
//! - `STLCOUPLE_TIE_POLICY`: `reject` (default) or `declaration-order`
//! - `STLCOUPLE_BULK_FILL`: `0`, `false` or `off` disables the bulk integer path
//! - `STLCOUPLE_PRIORITY`: priority recorded on coupled conversions (default 1)
//!
//! Values that do not parse keep the default and are logged.

use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

/// What to do when two candidates tie on weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiePolicy {
    /// Raise [`AmbiguousConversionError`](crate::AmbiguousConversionError).
    #[default]
    Reject,
    /// Pick the candidate declared first.
    DeclarationOrder,
}

impl TiePolicy {
    pub const fn name(self) -> &'static str {
        match self {
            TiePolicy::Reject => "reject",
            TiePolicy::DeclarationOrder => "declaration-order",
        }
    }
}

/// A tie policy name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tie policy '{0}', expected 'reject' or 'declaration-order'")]
pub struct ParseTiePolicyError(pub String);

impl FromStr for TiePolicy {
    type Err = ParseTiePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(TiePolicy::Reject),
            "declaration-order" | "declaration_order" | "first" => Ok(TiePolicy::DeclarationOrder),
            _ => Err(ParseTiePolicyError(s.to_string())),
        }
    }
}

/// Marshalling configuration shared by the coupler and the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalConfig {
    pub tie_policy: TiePolicy,
    /// Attach the bulk fill/refill hooks to integer vectors.
    pub bulk_fill: bool,
    /// Priority recorded on every coupled conversion record.
    pub conversion_priority: u32,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            tie_policy: TiePolicy::Reject,
            bulk_fill: true,
            conversion_priority: 1,
        }
    }
}

impl MarshalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("STLCOUPLE_TIE_POLICY") {
            match value.parse() {
                Ok(policy) => config.tie_policy = policy,
                Err(err) => warn!(target: "dispatch", %err, "ignoring STLCOUPLE_TIE_POLICY"),
            }
        }

        if let Some(value) = lookup("STLCOUPLE_BULK_FILL") {
            match value.trim().to_ascii_lowercase().as_str() {
                "0" | "false" | "off" | "no" => config.bulk_fill = false,
                "1" | "true" | "on" | "yes" => config.bulk_fill = true,
                other => warn!(target: "coupler", value = other, "ignoring STLCOUPLE_BULK_FILL"),
            }
        }

        if let Some(value) = lookup("STLCOUPLE_PRIORITY") {
            match value.trim().parse::<u32>() {
                Ok(priority) if priority > 0 => config.conversion_priority = priority,
                _ => warn!(target: "coupler", value = %value, "ignoring STLCOUPLE_PRIORITY"),
            }
        }

        config
    }

    pub fn with_tie_policy(mut self, policy: TiePolicy) -> Self {
        self.tie_policy = policy;
        self
    }

    pub fn with_bulk_fill(mut self, enabled: bool) -> Self {
        self.bulk_fill = enabled;
        self
    }

    pub fn with_conversion_priority(mut self, priority: u32) -> Self {
        self.conversion_priority = priority.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults_without_variables() {
        assert_eq!(MarshalConfig::from_lookup(lookup(&[])), MarshalConfig::default());
        assert_eq!(MarshalConfig::default().tie_policy, TiePolicy::Reject);
    }

    #[test]
    fn reads_all_variables() {
        let config = MarshalConfig::from_lookup(lookup(&[
            ("STLCOUPLE_TIE_POLICY", "Declaration-Order"),
            ("STLCOUPLE_BULK_FILL", "off"),
            ("STLCOUPLE_PRIORITY", "3"),
        ]));
        assert_eq!(config.tie_policy, TiePolicy::DeclarationOrder);
        assert!(!config.bulk_fill);
        assert_eq!(config.conversion_priority, 3);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = MarshalConfig::from_lookup(lookup(&[
            ("STLCOUPLE_TIE_POLICY", "coin-flip"),
            ("STLCOUPLE_BULK_FILL", "maybe"),
            ("STLCOUPLE_PRIORITY", "0"),
        ]));
        assert_eq!(config, MarshalConfig::default());
    }

    #[test]
    fn tie_policy_parse_error_names_value() {
        let err = "coin-flip".parse::<TiePolicy>().unwrap_err();
        assert!(err.to_string().contains("coin-flip"));
    }
}
