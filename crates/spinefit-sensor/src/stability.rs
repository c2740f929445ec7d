use serde::{Deserialize, Serialize};

use crate::SensorReading;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityParams {
    /// Largest per-channel change between two consecutive readings that
    /// still counts as stable.
    pub threshold: f32,
    /// Readings taken after the first one before giving up.
    pub max_retries: u32,
}

impl Default for StabilityParams {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum StabilityStatus {
    /// Keep sampling on the next tick.
    Settling,
    /// The last two readings agreed.
    Stable { retries: u32 },
    /// Retry budget spent; use the last reading anyway.
    Exhausted { retries: u32 },
}

impl StabilityStatus {
    #[must_use]
    pub fn is_done(self) -> bool {
        !self.is_settling()
    }
}

/// Waits for consecutive readings to converge, with a bounded retry budget.
///
/// Feed it one reading per tick. Running out of retries is not an error: the
/// caller uses [`Self::last`] either way.
///
/// ```
/// use spinefit_sensor::{SensorReading, StabilityFilter, StabilityParams, StabilityStatus};
///
/// let mut filter = StabilityFilter::new(StabilityParams::default());
/// let mut values = [0.0; 8];
/// values[0] = 1.0;
/// assert_eq!(filter.observe(SensorReading::new(values)), StabilityStatus::Settling);
/// values[0] = 1.005;
/// assert_eq!(
///     filter.observe(SensorReading::new(values)),
///     StabilityStatus::Stable { retries: 1 }
/// );
/// ```
#[derive(Debug, Clone)]
pub struct StabilityFilter {
    params: StabilityParams,
    last: Option<SensorReading>,
    retries: u32,
}

impl StabilityFilter {
    #[must_use]
    pub fn new(params: StabilityParams) -> Self {
        Self {
            params,
            last: None,
            retries: 0,
        }
    }

    pub fn observe(&mut self, reading: SensorReading) -> StabilityStatus {
        let Some(previous) = self.last.replace(reading) else {
            if self.params.max_retries == 0 {
                return StabilityStatus::Exhausted { retries: 0 };
            }
            return StabilityStatus::Settling;
        };

        self.retries += 1;
        if reading.max_abs_diff(&previous) < self.params.threshold {
            StabilityStatus::Stable {
                retries: self.retries,
            }
        } else if self.retries >= self.params.max_retries {
            StabilityStatus::Exhausted {
                retries: self.retries,
            }
        } else {
            StabilityStatus::Settling
        }
    }

    /// Most recent reading, stable or not.
    #[must_use]
    pub fn last(&self) -> Option<&SensorReading> {
        self.last.as_ref()
    }

    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(first: f32) -> SensorReading {
        let mut values = [0.0; 8];
        values[0] = first;
        SensorReading::new(values)
    }

    #[test]
    fn test_small_change_is_stable_after_one_retry() {
        let mut filter = StabilityFilter::new(StabilityParams::default());
        assert_eq!(filter.observe(reading(1.0)), StabilityStatus::Settling);
        assert_eq!(
            filter.observe(reading(1.005)),
            StabilityStatus::Stable { retries: 1 }
        );
        assert_eq!(filter.last(), Some(&reading(1.005)));
    }

    #[test]
    fn test_identical_readings_are_stable() {
        let mut filter = StabilityFilter::new(StabilityParams::default());
        filter.observe(reading(1.0));
        assert!(filter.observe(reading(1.0)).is_stable());
    }

    #[test]
    fn test_drifting_readings_exhaust_budget() {
        let mut filter = StabilityFilter::new(StabilityParams::default());
        assert!(filter.observe(reading(0.0)).is_settling());
        assert!(filter.observe(reading(0.1)).is_settling());
        assert!(filter.observe(reading(0.2)).is_settling());
        assert_eq!(
            filter.observe(reading(0.3)),
            StabilityStatus::Exhausted { retries: 3 }
        );
        assert_eq!(filter.last(), Some(&reading(0.3)));
    }

    #[test]
    fn test_zero_retry_budget_takes_first_reading() {
        let mut filter = StabilityFilter::new(StabilityParams {
            max_retries: 0,
            ..StabilityParams::default()
        });
        assert!(filter.observe(reading(4.0)).is_exhausted());
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut filter = StabilityFilter::new(StabilityParams {
            threshold: 0.5,
            max_retries: 3,
        });
        filter.observe(reading(1.0));
        assert!(filter.observe(reading(1.5)).is_settling());
    }
}
