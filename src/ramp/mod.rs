//! # Throttle Ramp Module
//!
//! Throttle schedule for bringing ESCs up: hold zero throttle so the ESCs
//! arm, then step the throttle up at a fixed interval.

use std::time::Duration;

use crate::config::RampConfig;
use crate::dshot::protocol::DSHOT_THROTTLE_MAX;
use crate::error::{DshotEscError, Result};

/// One scheduled throttle value and how long to hold it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampStep {
    pub throttle: u16,
    pub hold: Duration,
}

/// Iterator over the arming step followed by the ramp steps
#[derive(Debug, Clone)]
pub struct ThrottleRamp {
    arm_duration: Duration,
    armed: bool,
    next: u16,
    end: u16,
    step: u16,
    step_interval: Duration,
}

impl ThrottleRamp {
    /// Create a ramp covering `start, start + step, ...` while below `end`
    ///
    /// # Errors
    ///
    /// Returns [`DshotEscError::Configuration`] if `step` is zero, `start` is
    /// not below `end`, or `end` exceeds the DShot throttle range
    pub fn new(arm_duration: Duration, start: u16, end: u16, step: u16, step_interval: Duration) -> Result<Self> {
        if step == 0 {
            return Err(DshotEscError::Configuration("ramp step must be greater than 0".to_string()));
        }
        if start >= end {
            return Err(DshotEscError::Configuration(format!(
                "ramp start {} must be below end {}",
                start, end
            )));
        }
        if end > DSHOT_THROTTLE_MAX + 1 {
            return Err(DshotEscError::Configuration(format!(
                "ramp end {} exceeds throttle range (max {})",
                end,
                DSHOT_THROTTLE_MAX + 1
            )));
        }

        Ok(Self {
            arm_duration,
            armed: false,
            next: start,
            end,
            step,
            step_interval,
        })
    }

    pub fn from_config(config: &RampConfig) -> Result<Self> {
        Self::new(
            Duration::from_millis(config.arm_duration_ms),
            config.start,
            config.end,
            config.step,
            Duration::from_millis(config.step_interval_ms),
        )
    }
}

impl Iterator for ThrottleRamp {
    type Item = RampStep;

    fn next(&mut self) -> Option<RampStep> {
        if !self.armed {
            self.armed = true;
            return Some(RampStep {
                throttle: 0,
                hold: self.arm_duration,
            });
        }

        if self.next >= self.end {
            return None;
        }

        let throttle = self.next;
        self.next = self.next.saturating_add(self.step);

        Some(RampStep {
            throttle,
            hold: self.step_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_schedule() {
        let ramp = ThrottleRamp::new(
            Duration::from_secs(5),
            100,
            1000,
            10,
            Duration::from_secs(1),
        )
        .unwrap();
        let steps: Vec<RampStep> = ramp.collect();

        assert_eq!(steps.len(), 1 + 90);
        assert_eq!(steps[0], RampStep { throttle: 0, hold: Duration::from_secs(5) });
        assert_eq!(steps[1].throttle, 100);
        assert_eq!(steps[1].hold, Duration::from_secs(1));
        assert_eq!(steps.last().unwrap().throttle, 990);
    }

    #[test]
    fn test_uneven_step_stops_below_end() {
        let steps: Vec<u16> = ThrottleRamp::new(Duration::ZERO, 48, 60, 5, Duration::ZERO)
            .unwrap()
            .map(|step| step.throttle)
            .collect();
        assert_eq!(steps, vec![0, 48, 53, 58]);
    }

    #[test]
    fn test_full_range_does_not_overflow() {
        let last = ThrottleRamp::new(Duration::ZERO, 2000, 2048, 47, Duration::ZERO)
            .unwrap()
            .last()
            .unwrap();
        assert_eq!(last.throttle, 2047);
    }

    #[test]
    fn test_invalid_ramps() {
        assert!(ThrottleRamp::new(Duration::ZERO, 100, 1000, 0, Duration::ZERO).is_err());
        assert!(ThrottleRamp::new(Duration::ZERO, 1000, 1000, 10, Duration::ZERO).is_err());
        assert!(ThrottleRamp::new(Duration::ZERO, 100, 2049, 10, Duration::ZERO).is_err());
    }

    #[test]
    fn test_end_is_exclusive_up_to_2048() {
        assert!(ThrottleRamp::new(Duration::ZERO, 2040, 2048, 1, Duration::ZERO).is_ok());
        assert!(matches!(
            ThrottleRamp::new(Duration::ZERO, 2040, 2049, 1, Duration::ZERO),
            Err(DshotEscError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = RampConfig {
            arm_duration_ms: 2000,
            start: 100,
            end: 120,
            step: 10,
            step_interval_ms: 500,
            telemetry_request: false,
        };
        let steps: Vec<RampStep> = ThrottleRamp::from_config(&config).unwrap().collect();

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].hold, Duration::from_millis(2000));
        assert_eq!(steps[2], RampStep { throttle: 110, hold: Duration::from_millis(500) });
    }
}
