//! Decision makers that map an [`Observation`] to joint actions.
//!
//! Actions are written into a caller-provided slice with three entries per
//! controlled joint (x, y, z). Each entry is expected in `[-1, 1]`; the agent
//! clamps anything outside that range and scales it by its rotation window.
//!
//! The learning machinery is deliberately small: [`SearchPolicy`] is a
//! (1+1) evolution strategy that keeps its best joint configuration and
//! perturbs it with Gaussian noise, adapting the step size to its success
//! rate. [`HeuristicPolicy`] samples uniformly and serves as a baseline.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::Observation;

pub trait Policy: fmt::Debug {
    /// Called at the start of every episode.
    fn reset(&mut self) {}

    /// Fills `actions` with the next decision.
    fn act(&mut self, observation: &Observation, actions: &mut [f32]);

    /// Feedback for the most recent decision.
    fn observe(&mut self, _reward: f32) {}
}

/// Uniform random actions in `[-amplitude, amplitude]`.
#[derive(Debug, Clone)]
pub struct HeuristicPolicy {
    rng: Pcg32,
    amplitude: f32,
}

impl HeuristicPolicy {
    #[must_use]
    pub fn new(amplitude: f32, seed: u64) -> Self {
        let amplitude = if amplitude.is_finite() {
            amplitude.abs().min(1.0)
        } else {
            0.0
        };
        Self {
            rng: Pcg32::seed_from_u64(seed),
            amplitude,
        }
    }
}

impl Policy for HeuristicPolicy {
    fn act(&mut self, _observation: &Observation, actions: &mut [f32]) {
        let a = self.amplitude;
        for action in actions {
            *action = if a > 0.0 {
                self.rng.random_range(-a..=a)
            } else {
                0.0
            };
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub initial_sigma: f32,
    pub min_sigma: f32,
    pub max_sigma: f32,
    /// Step size multiplier after an improvement.
    pub grow: f32,
    /// Step size multiplier after a failure.
    pub shrink: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            initial_sigma: 0.3,
            min_sigma: 0.005,
            max_sigma: 1.0,
            grow: 1.5,
            shrink: 0.9,
        }
    }
}

/// (1+1) evolution strategy over the action vector.
///
/// Every decision first scores the previous candidate by the force error in
/// the observation it produced, keeps it when it beats the incumbent, and
/// then proposes a new candidate around the incumbent.
#[derive(Debug, Clone)]
pub struct SearchPolicy {
    rng: Pcg32,
    params: SearchParams,
    sigma: f32,
    best: Vec<f32>,
    best_error: Option<f32>,
    candidate: Vec<f32>,
}

impl SearchPolicy {
    #[must_use]
    pub fn new(params: SearchParams, seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            sigma: params.initial_sigma,
            params,
            best: Vec::new(),
            best_error: None,
            candidate: Vec::new(),
        }
    }

    #[must_use]
    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    #[must_use]
    pub fn best_error(&self) -> Option<f32> {
        self.best_error
    }

    fn score(&mut self, error: f32) {
        match self.best_error {
            Some(best) if error < best => {
                self.best.copy_from_slice(&self.candidate);
                self.best_error = Some(error);
                self.sigma = (self.sigma * self.params.grow).min(self.params.max_sigma);
            }
            Some(_) => {
                self.sigma = (self.sigma * self.params.shrink).max(self.params.min_sigma);
            }
            None => {
                self.best.copy_from_slice(&self.candidate);
                self.best_error = Some(error);
            }
        }
    }
}

impl Policy for SearchPolicy {
    fn reset(&mut self) {
        self.sigma = self.params.initial_sigma;
        self.best.clear();
        self.candidate.clear();
        self.best_error = None;
    }

    fn act(&mut self, observation: &Observation, actions: &mut [f32]) {
        if self.candidate.len() != actions.len() {
            self.best = vec![0.0; actions.len()];
            self.candidate = vec![0.0; actions.len()];
            self.best_error = None;
        }
        self.score(observation.force_error());

        match Normal::new(0.0, self.sigma) {
            Ok(noise) => {
                for (c, b) in self.candidate.iter_mut().zip(&self.best) {
                    *c = (b + noise.sample(&mut self.rng)).clamp(-1.0, 1.0);
                }
            }
            Err(_) => self.candidate.copy_from_slice(&self.best),
        }
        actions.copy_from_slice(&self.candidate);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyKind {
    Heuristic {
        #[serde(default = "default_amplitude")]
        amplitude: f32,
    },
    Search(SearchParams),
}

fn default_amplitude() -> f32 {
    0.2
}

impl Default for PolicyKind {
    fn default() -> Self {
        Self::Search(SearchParams::default())
    }
}

impl PolicyKind {
    #[must_use]
    pub fn build(&self, seed: u64) -> Box<dyn Policy> {
        match self {
            Self::Heuristic { amplitude } => Box::new(HeuristicPolicy::new(*amplitude, seed)),
            Self::Search(params) => Box::new(SearchPolicy::new(params.clone(), seed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use spinefit_sensor::{SensorReading, TargetVector};

    use super::*;

    fn observation(error: f32) -> Observation {
        let current = SensorReading::new([error, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        Observation::new(&current, &TargetVector::default(), std::iter::empty())
    }

    #[test]
    fn test_heuristic_stays_in_amplitude() {
        let mut policy = HeuristicPolicy::new(0.2, 9);
        let mut actions = [0.0; 12];
        for _ in 0..50 {
            policy.act(&observation(0.5), &mut actions);
            assert!(actions.iter().all(|a| (-0.2..=0.2).contains(a)));
        }
    }

    #[test]
    fn test_search_keeps_improving_candidates() {
        let mut policy = SearchPolicy::new(SearchParams::default(), 1);
        let mut actions = [0.0; 6];
        policy.act(&observation(0.5), &mut actions);
        assert_eq!(policy.best_error(), Some(0.5));
        let proposed = actions;

        policy.act(&observation(0.2), &mut actions);
        assert_eq!(policy.best_error(), Some(0.2));
        assert_eq!(policy.best, proposed);
        assert!(policy.sigma() > SearchParams::default().initial_sigma);

        let before = policy.sigma();
        policy.act(&observation(0.9), &mut actions);
        assert_eq!(policy.best, proposed);
        assert!(policy.sigma() < before);
        assert!(actions.iter().all(|a| (-1.0..=1.0).contains(a)));
    }

    #[test]
    fn test_search_reset_forgets_incumbent() {
        let mut policy = SearchPolicy::new(SearchParams::default(), 1);
        let mut actions = [0.0; 3];
        policy.act(&observation(0.5), &mut actions);
        policy.reset();
        assert_eq!(policy.best_error(), None);
        assert_eq!(policy.sigma(), SearchParams::default().initial_sigma);
    }

    #[test]
    fn test_policy_kind_from_json() {
        let kind: PolicyKind = serde_json::from_str(r#"{"kind": "heuristic"}"#).unwrap();
        assert_eq!(kind, PolicyKind::Heuristic { amplitude: 0.2 });
        let kind: PolicyKind =
            serde_json::from_str(r#"{"kind": "search", "initial_sigma": 0.5}"#).unwrap();
        let PolicyKind::Search(params) = kind else {
            panic!("expected search policy");
        };
        assert_eq!(params.initial_sigma, 0.5);
        assert_eq!(params.grow, 1.5);
    }
}
