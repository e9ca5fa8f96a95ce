use chrono::Duration;

/// Tunables of the coordination core, derived from the application config.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinationSettings {
    /// Samples kept per participant for display. At least one is always kept.
    pub location_history_limit: usize,
    /// How far a device clock may run ahead of the server.
    pub max_future_skew: Duration,
    pub default_checkpoint_radius_m: f64,
    pub grant_ttl: Duration,
    /// Hard ceiling on grant lifetime regardless of `grant_ttl`.
    pub grant_max_ttl: Duration,
}

impl CoordinationSettings {
    pub fn history_limit(&self) -> usize {
        self.location_history_limit.max(1)
    }

    pub fn effective_grant_ttl(&self) -> Duration {
        self.grant_ttl.min(self.grant_max_ttl)
    }
}

impl Default for CoordinationSettings {
    fn default() -> Self {
        Self {
            location_history_limit: 200,
            max_future_skew: Duration::seconds(300),
            default_checkpoint_radius_m: 100.0,
            grant_ttl: Duration::minutes(60),
            grant_max_ttl: Duration::minutes(240),
        }
    }
}
