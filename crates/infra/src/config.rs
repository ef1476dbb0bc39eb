//! Engine configuration loaded from the environment.

use serde::Serialize;

use larder_recipes::NameMatching;

pub const NAME_MATCHING_VAR: &str = "LARDER_SALES_NAME_MATCHING";
pub const DISPLAY_PRECISION_VAR: &str = "LARDER_DISPLAY_PRECISION";
pub const PUBLISH_ALERTS_VAR: &str = "LARDER_PUBLISH_ALERTS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    /// How sales rows find their recipe.
    pub name_matching: NameMatching,
    /// Decimals shown for display values; never applied to stored numbers.
    pub display_precision: u32,
    /// Publish alert events after each committed pass.
    pub publish_alerts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name_matching: NameMatching::Exact,
            display_precision: 2,
            publish_alerts: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Unset keys take the default; invalid
    /// values are logged and take the default too.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let name_matching = match lookup(NAME_MATCHING_VAR) {
            None => defaults.name_matching,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(var = NAME_MATCHING_VAR, value = %raw, "unrecognized value; using exact matching");
                defaults.name_matching
            }),
        };

        let display_precision = match lookup(DISPLAY_PRECISION_VAR) {
            None => defaults.display_precision,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|p| *p <= 10)
                .unwrap_or_else(|| {
                    tracing::warn!(var = DISPLAY_PRECISION_VAR, value = %raw, "invalid precision; using 2");
                    defaults.display_precision
                }),
        };

        let publish_alerts = match lookup(PUBLISH_ALERTS_VAR) {
            None => defaults.publish_alerts,
            Some(raw) => raw.trim().parse::<bool>().unwrap_or_else(|_| {
                tracing::warn!(var = PUBLISH_ALERTS_VAR, value = %raw, "invalid flag; publishing alerts");
                defaults.publish_alerts
            }),
        };

        Self {
            name_matching,
            display_precision,
            publish_alerts,
        }
    }
}
