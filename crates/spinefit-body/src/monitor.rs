//! Regional curvature checks for a spine-shaped joint chain.
//!
//! The chain is split into three consecutive regions (lumbar, thoracic,
//! cervical). A region's bend is the sum of the angles between the local
//! rotations of consecutive joints inside it. When a region stays above its
//! threshold for at least `hold_time` seconds, the matching fault is raised;
//! dropping back under the threshold clears both the timer and the fault.

use serde::{Deserialize, Serialize};

use crate::{JointChain, angle::rotation_from_euler};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorParams {
    pub lumbar_start: usize,
    pub thoracic_start: usize,
    pub cervical_start: usize,
    /// Exclusive end of the cervical region.
    pub end: usize,
    pub max_lumbar_curve: f32,
    pub max_thoracic_curve: f32,
    pub max_cervical_curve: f32,
    /// Seconds a region must stay over its threshold before it is flagged.
    pub hold_time: f32,
}

impl Default for MonitorParams {
    fn default() -> Self {
        Self {
            lumbar_start: 0,
            thoracic_start: 5,
            cervical_start: 17,
            end: 26,
            max_lumbar_curve: 15.0,
            max_thoracic_curve: 20.0,
            max_cervical_curve: 10.0,
            hold_time: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum PostureFault {
    #[display("lordosis")]
    Lordosis,
    #[display("kyphosis")]
    Kyphosis,
    #[display("forward neck")]
    ForwardNeck,
}

/// Summed bend per region, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RegionCurvature {
    pub lumbar: f32,
    pub thoracic: f32,
    pub cervical: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostureAssessment {
    pub curvature: RegionCurvature,
    pub faults: Vec<PostureFault>,
}

impl PostureAssessment {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.faults.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PostureMonitor {
    params: MonitorParams,
    timers: [f32; 3],
}

impl PostureMonitor {
    #[must_use]
    pub fn new(params: MonitorParams) -> Self {
        Self {
            params,
            timers: [0.0; 3],
        }
    }

    #[must_use]
    pub fn params(&self) -> &MonitorParams {
        &self.params
    }

    #[must_use]
    pub fn curvature(&self, chain: &JointChain) -> RegionCurvature {
        let p = &self.params;
        RegionCurvature {
            lumbar: curve_angle(chain, p.lumbar_start, p.thoracic_start),
            thoracic: curve_angle(chain, p.thoracic_start, p.cervical_start),
            cervical: curve_angle(chain, p.cervical_start, p.end),
        }
    }

    /// Advances the hold timers by `dt` seconds and reports active faults.
    pub fn update(&mut self, chain: &JointChain, dt: f32) -> PostureAssessment {
        let curvature = self.curvature(chain);
        let checks = [
            (
                curvature.lumbar,
                self.params.max_lumbar_curve,
                PostureFault::Lordosis,
            ),
            (
                curvature.thoracic,
                self.params.max_thoracic_curve,
                PostureFault::Kyphosis,
            ),
            (
                curvature.cervical,
                self.params.max_cervical_curve,
                PostureFault::ForwardNeck,
            ),
        ];

        let mut faults = vec![];
        for (timer, (bend, limit, fault)) in self.timers.iter_mut().zip(checks) {
            if bend > limit {
                *timer += dt;
                if *timer >= self.params.hold_time {
                    faults.push(fault);
                }
            } else {
                *timer = 0.0;
            }
        }

        PostureAssessment { curvature, faults }
    }

    pub fn reset(&mut self) {
        self.timers = [0.0; 3];
    }
}

fn curve_angle(chain: &JointChain, start: usize, end: usize) -> f32 {
    let joints = chain.joints();
    (start + 1..end.min(joints.len()))
        .map(|i| {
            let prev = rotation_from_euler(&joints[i - 1].rotation);
            let curr = rotation_from_euler(&joints[i].rotation);
            prev.angle_to(&curr).to_degrees()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;
    use crate::TorsoTemplate;

    #[test]
    fn test_params_from_json() {
        let params: MonitorParams = serde_json::from_str(r#"{"hold_time": 2.5}"#).unwrap();
        assert_relative_eq!(params.hold_time, 2.5);
        assert_eq!(params.end, 26);
        assert_eq!(
            serde_json::from_str::<MonitorParams>("{}").unwrap(),
            MonitorParams::default()
        );
    }

    fn straight_chain() -> JointChain {
        let template = TorsoTemplate {
            natural_curve: false,
            ..TorsoTemplate::default()
        };
        template.build().unwrap().0
    }

    #[test]
    fn test_straight_spine_is_healthy() {
        let chain = straight_chain();
        let mut monitor = PostureMonitor::new(MonitorParams::default());
        let assessment = monitor.update(&chain, 10.0);
        assert!(assessment.is_healthy());
        assert_relative_eq!(assessment.curvature.thoracic, 0.0);
    }

    #[test]
    fn test_bend_counts_angle_between_neighbours() {
        let mut chain = straight_chain();
        chain.set_rotation(8, Vector3::new(12.0, 0.0, 0.0)).unwrap();
        let monitor = PostureMonitor::new(MonitorParams::default());
        // Joint 8 differs from both joint 7 and joint 9.
        assert_relative_eq!(monitor.curvature(&chain).thoracic, 24.0, epsilon = 1e-3);
    }

    #[test]
    fn test_fault_needs_hold_time() {
        let mut chain = straight_chain();
        for i in (6..16).step_by(2) {
            chain.set_rotation(i, Vector3::new(10.0, 0.0, 0.0)).unwrap();
        }
        let mut monitor = PostureMonitor::new(MonitorParams::default());

        assert!(monitor.update(&chain, 2.0).is_healthy());
        assert!(monitor.update(&chain, 2.0).is_healthy());
        let assessment = monitor.update(&chain, 1.0);
        assert_eq!(assessment.faults, vec![PostureFault::Kyphosis]);

        chain.reset_to_rest();
        assert!(monitor.update(&chain, 1.0).is_healthy());
        chain.set_rotation(8, Vector3::new(30.0, 0.0, 0.0)).unwrap();
        assert!(monitor.update(&chain, 1.0).is_healthy(), "timer restarted");
    }
}
