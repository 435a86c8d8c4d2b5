//! Attack engine tuning

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};

/// Limits on how hard a single attack may push
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Maximum requests in flight at once for one attack
    pub max_in_flight: usize,

    /// Buffered outcomes between the engine and the aggregator
    pub channel_capacity: usize,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 10_000,
            channel_capacity: 1024,
        }
    }
}

impl Validatable for AttackConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_in_flight, "max_in_flight", self.domain_name())?;
        validate_positive(self.channel_capacity, "channel_capacity", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "attack"
    }
}
