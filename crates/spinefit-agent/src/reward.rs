use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardParams {
    /// Added to every step.
    pub step_penalty: f32,
    pub success_reward: f32,
    pub timeout_penalty: f32,
    /// Stagnation ends an episode with `timeout_penalty * stagnation_factor`.
    pub stagnation_factor: f32,
    pub improvement_scale: f32,
    pub improvement_cap: f32,
    /// Subtracted from the closeness reward on steps without improvement.
    pub no_improvement_penalty: f32,
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            step_penalty: -0.002,
            success_reward: 50.0,
            timeout_penalty: -5.0,
            stagnation_factor: 0.5,
            improvement_scale: 20.0,
            improvement_cap: 10.0,
            no_improvement_penalty: 0.01,
        }
    }
}

impl RewardParams {
    #[must_use]
    pub fn stagnation_penalty(&self) -> f32 {
        self.timeout_penalty * self.stagnation_factor
    }
}

/// Tracks the best error of an episode and turns each new error into a reward.
///
/// - first step: nothing to compare against, only the step penalty
/// - improvement: `min(improvement * scale, cap)`, resets the stagnation counter
/// - otherwise: `1 / (1 + error) - penalty`, bumps the stagnation counter
///
/// ```
/// use spinefit_agent::{RewardParams, RewardShaper};
///
/// let mut shaper = RewardShaper::new(RewardParams::default());
/// assert_eq!(shaper.shape(1.0), -0.002);
/// assert!(shaper.shape(0.5) > 9.9);
/// assert_eq!(shaper.no_improvement(), 0);
/// shaper.shape(0.6);
/// assert_eq!(shaper.no_improvement(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct RewardShaper {
    params: RewardParams,
    best_error: Option<f32>,
    no_improvement: u32,
}

impl RewardShaper {
    #[must_use]
    pub fn new(params: RewardParams) -> Self {
        Self {
            params,
            best_error: None,
            no_improvement: 0,
        }
    }

    #[must_use]
    pub fn params(&self) -> &RewardParams {
        &self.params
    }

    pub fn reset(&mut self) {
        self.best_error = None;
        self.no_improvement = 0;
    }

    #[must_use]
    pub fn best_error(&self) -> Option<f32> {
        self.best_error
    }

    /// Consecutive steps without a new best error.
    #[must_use]
    pub fn no_improvement(&self) -> u32 {
        self.no_improvement
    }

    pub fn shape(&mut self, error: f32) -> f32 {
        let shaped = match self.best_error {
            None => {
                self.best_error = Some(error);
                0.0
            }
            Some(best) if error < best => {
                self.best_error = Some(error);
                self.no_improvement = 0;
                ((best - error) * self.params.improvement_scale)
                    .max(0.0)
                    .min(self.params.improvement_cap)
            }
            Some(_) => {
                self.no_improvement += 1;
                1.0 / (1.0 + error) - self.params.no_improvement_penalty
            }
        };
        sanitize_reward(shaped + self.params.step_penalty)
    }
}

/// Replaces a non-finite reward with zero.
#[must_use]
pub fn sanitize_reward(reward: f32) -> f32 {
    if reward.is_finite() { reward } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_improvement_is_capped() {
        let mut shaper = RewardShaper::new(RewardParams::default());
        shaper.shape(3.0);
        assert_abs_diff_eq!(shaper.shape(2.9), 0.1 * 20.0 - 0.002, epsilon = 1e-4);
        assert_abs_diff_eq!(shaper.shape(0.0), 10.0 - 0.002);
        assert_eq!(shaper.best_error(), Some(0.0));
    }

    #[test]
    fn test_no_improvement_closeness_reward() {
        let mut shaper = RewardShaper::new(RewardParams::default());
        shaper.shape(1.0);
        assert_abs_diff_eq!(shaper.shape(1.0), 0.5 - 0.01 - 0.002);
        assert_abs_diff_eq!(shaper.shape(3.0), 0.25 - 0.01 - 0.002);
        assert_eq!(shaper.no_improvement(), 2);
        shaper.shape(0.9);
        assert_eq!(shaper.no_improvement(), 0);
    }

    #[test]
    fn test_rewards_always_finite() {
        let mut shaper = RewardShaper::new(RewardParams::default());
        for error in [f32::INFINITY, f32::NAN, 1e30, 0.0, f32::INFINITY, f32::NAN] {
            assert!(shaper.shape(error).is_finite());
        }
        shaper.reset();
        assert_eq!(shaper.best_error(), None);
        assert_eq!(shaper.no_improvement(), 0);
    }

    #[test]
    fn test_stagnation_penalty() {
        assert_abs_diff_eq!(RewardParams::default().stagnation_penalty(), -2.5);
    }
}
