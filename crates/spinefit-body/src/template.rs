use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{BodyError, Joint, JointChain, SKIN_COLOR, SurfaceMesh, SurfaceVertex};

/// Procedural torso: a vertical spine with eight stretch strips on its back.
///
/// Joint 0 is the pelvis end of the spine; each following joint sits
/// `segment_length` above its parent. The back surface lies `back_depth`
/// behind the joint axis (negative z), so flexing a joint forward (positive
/// x rotation) lengthens every strip that crosses it.
///
/// Strips are placed by fraction of the spine height:
///
/// | tag    | span      | lateral position            |
/// |--------|-----------|-----------------------------|
/// | red    | 0-35 %    | left lower back             |
/// | green  | 0-35 %    | right lower back            |
/// | blue   | 30-65 %   | left mid back               |
/// | purple | 30-65 %   | right mid back, top-down    |
/// | orange | 45-80 %   | diagonal, left to right     |
/// | cyan   | 45-80 %   | diagonal, right to left     |
/// | black  | 70-100 %  | left neck                   |
/// | pink   | 70-100 %  | right neck, top-down        |
///
/// Purple and pink are emitted top-down, the opposite vertex order of their
/// left-hand counterparts, so consumers cannot rely on index order to pair
/// them up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorsoTemplate {
    pub joint_count: usize,
    pub segment_length: f32,
    pub back_depth: f32,
    pub samples_per_joint: usize,
    /// Gives the rest pose a mild lordosis/kyphosis/lordosis curve instead
    /// of a straight column.
    pub natural_curve: bool,
}

impl Default for TorsoTemplate {
    fn default() -> Self {
        Self {
            joint_count: 26,
            segment_length: 0.25,
            back_depth: 0.6,
            samples_per_joint: 2,
            natural_curve: true,
        }
    }
}

struct StripSpec {
    color: [f32; 3],
    span: (usize, usize),
    lateral: (f32, f32),
    top_down: bool,
}

const STRIPS: [StripSpec; 8] = [
    StripSpec {
        color: [1.0, 0.0, 0.0],
        span: (0, 35),
        lateral: (-0.4, -0.4),
        top_down: false,
    },
    StripSpec {
        color: [0.0, 1.0, 0.0],
        span: (0, 35),
        lateral: (0.4, 0.4),
        top_down: false,
    },
    StripSpec {
        color: [0.0, 0.0, 1.0],
        span: (30, 65),
        lateral: (-0.5, -0.5),
        top_down: false,
    },
    StripSpec {
        color: [0.6, 0.0, 0.8],
        span: (30, 65),
        lateral: (0.5, 0.5),
        top_down: true,
    },
    StripSpec {
        color: [1.0, 0.55, 0.0],
        span: (45, 80),
        lateral: (-0.7, 0.7),
        top_down: false,
    },
    StripSpec {
        color: [0.0, 1.0, 1.0],
        span: (45, 80),
        lateral: (0.7, -0.7),
        top_down: false,
    },
    StripSpec {
        color: [0.0, 0.0, 0.0],
        span: (70, 100),
        lateral: (-0.3, -0.3),
        top_down: false,
    },
    StripSpec {
        color: [1.0, 0.75, 0.8],
        span: (70, 100),
        lateral: (0.3, 0.3),
        top_down: true,
    },
];

impl TorsoTemplate {
    /// Builds the joint chain and the tagged surface mesh.
    pub fn build(&self) -> Result<(JointChain, SurfaceMesh), BodyError> {
        let chain = JointChain::new(self.joints())?;
        let rest = chain.rest_world_transforms();
        let n = chain.len();
        let samples = self.samples_per_joint.max(1);

        let mut mesh = SurfaceMesh::default();
        for strip in &STRIPS {
            let first = n * strip.span.0 / 100;
            let last = (n * strip.span.1 / 100).max(first + 2).min(n);
            let first = first.min(last.saturating_sub(1));

            let mut points = vec![];
            let total = (last - first) * samples;
            for joint in first..last {
                for s in 0..samples {
                    let k = (joint - first) * samples + s;
                    #[expect(clippy::cast_precision_loss)]
                    let u = if total > 1 {
                        k as f32 / (total - 1) as f32
                    } else {
                        0.0
                    };
                    #[expect(clippy::cast_precision_loss)]
                    let height = self.segment_length * s as f32 / samples as f32;
                    let x = strip.lateral.0 + (strip.lateral.1 - strip.lateral.0) * u;
                    let local = Point3::new(x, height, -self.back_depth);
                    points.push(SurfaceVertex {
                        position: rest[joint] * local,
                        color: strip.color,
                        joint,
                    });
                }
            }
            if strip.top_down {
                points.reverse();
            }
            for vertex in points {
                mesh.push(vertex);
            }
        }

        for (joint, pose) in rest.iter().enumerate() {
            let mid = self.segment_length / 2.0;
            for local in [
                Point3::new(0.0, mid, self.back_depth),
                Point3::new(self.back_depth, mid, 0.0),
                Point3::new(-self.back_depth, mid, 0.0),
            ] {
                mesh.push(SurfaceVertex {
                    position: pose * local,
                    color: SKIN_COLOR,
                    joint,
                });
            }
        }

        Ok((chain, mesh))
    }

    fn joints(&self) -> Vec<Joint> {
        let n = self.joint_count;
        (0..n)
            .map(|i| {
                let offset = if i == 0 {
                    Vector3::zeros()
                } else {
                    Vector3::new(0.0, self.segment_length, 0.0)
                };
                let rotation = if self.natural_curve {
                    Vector3::new(natural_flexion(i, n), 0.0, 0.0)
                } else {
                    Vector3::zeros()
                };
                Joint::new(format!("spine{i:02}"), offset, rotation)
            })
            .collect()
    }
}

fn natural_flexion(index: usize, count: usize) -> f32 {
    let percent = index * 100 / count.max(1);
    match percent {
        0..20 => -1.5,
        20..65 => 1.5,
        _ => -1.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let template: TorsoTemplate =
            serde_json::from_str(r#"{"joint_count": 12, "natural_curve": false}"#).unwrap();
        assert_eq!(template.joint_count, 12);
        assert!(!template.natural_curve);
        assert_eq!(template.samples_per_joint, TorsoTemplate::default().samples_per_joint);

        let json = serde_json::to_string(&template).unwrap();
        assert_eq!(serde_json::from_str::<TorsoTemplate>(&json).unwrap(), template);
    }

    #[test]
    fn test_default_template_builds() {
        let (chain, mesh) = TorsoTemplate::default().build().unwrap();
        assert_eq!(chain.len(), 26);
        assert_eq!(chain.controlled_joints().len(), 13);
        assert!(!mesh.is_empty());
        assert!(mesh.vertices().iter().all(|v| v.joint < chain.len()));
    }

    #[test]
    fn test_every_strip_has_vertices() {
        let (_, mesh) = TorsoTemplate::default().build().unwrap();
        for strip in &STRIPS {
            let count = mesh.colors().filter(|c| *c == strip.color).count();
            assert!(count >= 2, "strip {:?} has {count} vertices", strip.color);
        }
    }

    #[test]
    fn test_mirrored_strips_are_reflections() {
        let template = TorsoTemplate {
            natural_curve: false,
            ..TorsoTemplate::default()
        };
        let (_, mesh) = template.build().unwrap();
        let blue: Vec<_> = mesh
            .vertices()
            .iter()
            .filter(|v| v.color == STRIPS[2].color)
            .collect();
        let purple: Vec<_> = mesh
            .vertices()
            .iter()
            .filter(|v| v.color == STRIPS[3].color)
            .collect();
        assert_eq!(blue.len(), purple.len());
        // Emitted in opposite order: first blue mirrors last purple.
        let b = blue[0].position;
        let p = purple[purple.len() - 1].position;
        assert!((b.x + p.x).abs() < 1e-5);
        assert!((b.y - p.y).abs() < 1e-5);
        assert!((b.z - p.z).abs() < 1e-5);
    }

    #[test]
    fn test_small_chain_still_builds() {
        let template = TorsoTemplate {
            joint_count: 3,
            ..TorsoTemplate::default()
        };
        let (chain, mesh) = template.build().unwrap();
        assert_eq!(chain.len(), 3);
        assert!(mesh.vertices().iter().all(|v| v.joint < 3));
    }

    #[test]
    fn test_zero_joints_is_an_error() {
        let template = TorsoTemplate {
            joint_count: 0,
            ..TorsoTemplate::default()
        };
        assert_eq!(template.build(), Err(BodyError::EmptyChain));
    }
}
