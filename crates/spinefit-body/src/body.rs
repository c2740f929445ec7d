use nalgebra::Point3;

use crate::{BodyError, JointChain, SkinnedSurface, SurfaceMesh, TorsoTemplate};

/// A joint chain with its skinned surface.
///
/// Surface geometry does not follow the joints instantly. Each call to
/// [`Self::step_simulation`] moves every surface point a fraction
/// (`settle_rate`) of the way toward the position implied by the current
/// joint rotations. With `settle_rate == 1.0` one simulation tick is enough
/// for the surface to catch up; smaller values model soft tissue that lags
/// behind the skeleton and needs several ticks to settle.
///
/// Joint changes are therefore invisible to anything that reads
/// [`Self::positions`] until the next simulation tick.
#[derive(Debug, Clone)]
pub struct Body {
    chain: JointChain,
    skin: SkinnedSurface,
    rest_positions: Vec<Point3<f32>>,
    positions: Vec<Point3<f32>>,
    target: Vec<Point3<f32>>,
    settle_rate: f32,
}

impl Body {
    pub fn new(chain: JointChain, mesh: &SurfaceMesh, settle_rate: f32) -> Result<Self, BodyError> {
        let skin = SkinnedSurface::bind(mesh, &chain)?;
        let rest_positions = skin.deform(&chain);
        let positions = rest_positions.clone();
        Ok(Self {
            chain,
            skin,
            target: Vec::with_capacity(positions.len()),
            rest_positions,
            positions,
            settle_rate: clamp_settle_rate(settle_rate),
        })
    }

    pub fn from_template(template: &TorsoTemplate, settle_rate: f32) -> Result<Self, BodyError> {
        let (chain, mesh) = template.build()?;
        Self::new(chain, &mesh, settle_rate)
    }

    #[must_use]
    pub fn chain(&self) -> &JointChain {
        &self.chain
    }

    #[must_use]
    pub fn chain_mut(&mut self) -> &mut JointChain {
        &mut self.chain
    }

    /// Current (settled) surface positions.
    #[must_use]
    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    /// Surface positions for the rest pose.
    #[must_use]
    pub fn rest_positions(&self) -> &[Point3<f32>] {
        &self.rest_positions
    }

    #[must_use]
    pub fn settle_rate(&self) -> f32 {
        self.settle_rate
    }

    /// Advances the surface geometry by one simulation tick.
    pub fn step_simulation(&mut self) {
        self.skin.deform_into(&self.chain, &mut self.target);
        let rate = self.settle_rate;
        for (current, target) in self.positions.iter_mut().zip(&self.target) {
            *current = Point3::from(current.coords.lerp(&target.coords, rate));
        }
    }

    /// Moves the surface straight to the pose implied by the joints.
    pub fn snap_to_pose(&mut self) {
        self.skin.deform_into(&self.chain, &mut self.positions);
    }

    /// Largest distance between a surface point and where the joints put it.
    #[must_use]
    pub fn settle_error(&self) -> f32 {
        self.skin
            .deform(&self.chain)
            .iter()
            .zip(&self.positions)
            .map(|(target, current)| nalgebra::distance(target, current))
            .fold(0.0, f32::max)
    }

    #[must_use]
    pub fn is_settled(&self, tolerance: f32) -> bool {
        self.settle_error() <= tolerance
    }
}

fn clamp_settle_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(f32::EPSILON, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;

    fn moved_distance(body: &Body) -> f32 {
        body.positions()
            .iter()
            .zip(body.rest_positions())
            .map(|(p, r)| nalgebra::distance(p, r))
            .sum()
    }

    #[test]
    fn test_joint_changes_apply_on_simulation_tick() {
        let mut body = Body::from_template(&TorsoTemplate::default(), 1.0).unwrap();
        body.chain_mut()
            .set_rotation(2, Vector3::new(15.0, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(moved_distance(&body), 0.0);

        body.step_simulation();
        assert!(moved_distance(&body) > 0.0);
    }

    #[test]
    fn test_partial_settle_converges() {
        let mut body = Body::from_template(&TorsoTemplate::default(), 0.5).unwrap();
        body.chain_mut()
            .set_rotation(0, Vector3::new(0.0, 0.0, 8.0))
            .unwrap();

        let mut snapped = body.clone();
        snapped.snap_to_pose();
        let full = moved_distance(&snapped);

        body.step_simulation();
        let after_one = moved_distance(&body);
        assert!(after_one < full);
        for _ in 0..30 {
            body.step_simulation();
        }
        assert_relative_eq!(moved_distance(&body), full, epsilon = 1e-3);
    }

    #[test]
    fn test_settle_error_tracks_lag() {
        let mut body = Body::from_template(&TorsoTemplate::default(), 0.05).unwrap();
        assert!(body.is_settled(0.0));
        body.chain_mut()
            .set_rotation(0, Vector3::new(20.0, 0.0, 0.0))
            .unwrap();
        let initial = body.settle_error();
        assert!(initial > 0.0);

        body.step_simulation();
        assert_relative_eq!(body.settle_error(), initial * 0.95, max_relative = 1e-3);
        assert!(!body.is_settled(1e-4));

        body.snap_to_pose();
        assert_relative_eq!(body.settle_error(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_settle_rate_is_clamped() {
        let template = TorsoTemplate::default();
        assert_relative_eq!(Body::from_template(&template, 3.0).unwrap().settle_rate(), 1.0);
        assert_relative_eq!(
            Body::from_template(&template, f32::NAN)
                .unwrap()
                .settle_rate(),
            1.0
        );
        assert!(Body::from_template(&template, -1.0).unwrap().settle_rate() > 0.0);
    }
}
