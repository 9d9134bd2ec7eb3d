//! Router tuning configuration.
//!
//! Every knob of the negotiated-congestion loop and the device work
//! partitioning lives here. Defaults match the sizing the kernel was tuned
//! with; tests and callers with small fabrics shrink the queue and
//! workgroup counts.

use crate::error::{RouteResult, RouterError};
use serde::{Deserialize, Serialize};

/// Tuning parameters for the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Number of device workgroups shared by the in-flight nets.
    pub num_workgroups: u32,
    /// Work-items per workgroup.
    pub workgroup_size: u32,
    /// Near-queue capacity per workgroup (entries).
    pub near_queue_len: u32,
    /// Far-queue capacity per workgroup (entries).
    pub far_queue_len: u32,
    /// Dirtied-node list capacity per workgroup (entries).
    pub dirty_queue_len: u32,
    /// Maximum nets expanded concurrently on the device.
    pub max_nets_in_flight: u32,
    /// Number of nets a wire can carry without being overused.
    pub wire_capacity: u8,
    /// Congestion cost multiplier for the first passes, in picoseconds.
    pub initial_cong_cost: f32,
    /// Growth factor applied to the congestion cost after the second pass.
    pub cong_cost_multiplier: f32,
    /// Slope of the present-congestion cost above capacity.
    pub present_slope: f32,
    /// Picoseconds added to edges into an overused wire, per unit of overuse,
    /// at the end of each pass.
    pub history_factor: f32,
    /// Initial near/far frontier threshold, in picoseconds.
    pub initial_near_far_thresh: i32,
    /// Scale applied to the cheapest deferred cost when raising the
    /// near/far threshold at promotion.
    pub thresh_step_factor: f32,
    /// Base bounding-box slack, in tiles, applied to every net.
    pub bb_margin: u16,
    /// Additional slack per failed routing attempt of a net.
    pub bb_margin_step: u16,
    /// Maximum negotiation passes before giving up.
    pub max_passes: u32,
    /// Maximum relaxation rounds per net per pass.
    pub max_rounds_per_net: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            num_workgroups: 64,
            workgroup_size: 128,
            near_queue_len: 15_000,
            far_queue_len: 100_000,
            dirty_queue_len: 100_000,
            max_nets_in_flight: 32,
            wire_capacity: 1,
            initial_cong_cost: 1_000.0,
            cong_cost_multiplier: 2.0,
            present_slope: 4.0,
            history_factor: 500.0,
            initial_near_far_thresh: 10_000,
            thresh_step_factor: 2.0,
            bb_margin: 1,
            bb_margin_step: 2,
            max_passes: 50,
            max_rounds_per_net: 1024,
        }
    }
}

impl RouterConfig {
    /// Checks the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] if any size is zero, if the workgroup
    /// count is not divisible by the in-flight net count, or if a growth
    /// factor would fail to escalate.
    pub fn validate(&self) -> RouteResult<()> {
        if self.num_workgroups == 0
            || self.workgroup_size == 0
            || self.near_queue_len == 0
            || self.far_queue_len == 0
            || self.dirty_queue_len == 0
            || self.max_nets_in_flight == 0
            || self.max_passes == 0
            || self.max_rounds_per_net == 0
        {
            return Err(RouterError::Config(
                "sizes and iteration limits must be non-zero".to_string(),
            ));
        }
        if self.num_workgroups % self.max_nets_in_flight != 0 {
            return Err(RouterError::Config(format!(
                "num_workgroups ({}) must be a multiple of max_nets_in_flight ({})",
                self.num_workgroups, self.max_nets_in_flight
            )));
        }
        if self.cong_cost_multiplier < 1.0 {
            return Err(RouterError::Config(
                "cong_cost_multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.wire_capacity == 0 {
            return Err(RouterError::Config(
                "wire_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Workgroups assigned to each in-flight net slot.
    pub fn groups_per_slot(&self) -> u32 {
        self.num_workgroups / self.max_nets_in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = RouterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.groups_per_slot(), 2);
    }

    #[test]
    fn zero_size_rejected() {
        let config = RouterConfig {
            near_queue_len: 0,
            ..RouterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn indivisible_workgroups_rejected() {
        let config = RouterConfig {
            num_workgroups: 10,
            max_nets_in_flight: 4,
            ..RouterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn shrinking_multiplier_rejected() {
        let config = RouterConfig {
            cong_cost_multiplier: 0.5,
            ..RouterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let config = RouterConfig {
            max_passes: 8,
            ..RouterConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let restored: RouterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.max_passes, 8);
        assert_eq!(restored.near_queue_len, 15_000);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let restored: RouterConfig = serde_json::from_str(r#"{"max_passes": 3}"#).unwrap();
        assert_eq!(restored.max_passes, 3);
        assert_eq!(restored.num_workgroups, 64);
    }
}
