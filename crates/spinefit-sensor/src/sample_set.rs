use nalgebra::Point3;

use crate::{Channel, SensorError};

/// Ordered surface point indices watched by one channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleSet {
    indices: Vec<usize>,
}

impl SampleSet {
    #[must_use]
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sum of distances between consecutive points, in set order.
    ///
    /// Indices missing from `positions` break the path rather than panic.
    #[must_use]
    pub fn path_length(&self, positions: &[Point3<f32>]) -> f32 {
        self.indices
            .windows(2)
            .filter_map(|w| {
                let a = positions.get(w[0])?;
                let b = positions.get(w[1])?;
                Some(nalgebra::distance(a, b))
            })
            .sum()
    }
}

/// Sample sets for all eight channels.
///
/// Built once from colour tags and rest positions and never changed
/// afterwards.
///
/// # Ordering
///
/// Points are kept in surface index order, except for channels with a
/// [mirror reference](Channel::mirror_reference). For those, each point of
/// the reference channel is reflected across the sagittal plane (`x -> -x`)
/// and paired with the nearest unused point of the mirrored channel, so that
/// the i-th point of purple sits opposite the i-th point of blue regardless
/// of how the surface happened to number them. Unpaired leftovers are
/// appended in index order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleSets {
    sets: [SampleSet; Channel::LEN],
}

impl SampleSets {
    pub fn classify<I>(colors: I, rest_positions: &[Point3<f32>]) -> Result<Self, SensorError>
    where
        I: IntoIterator<Item = [f32; 3]>,
    {
        let mut buckets: [Vec<usize>; Channel::LEN] = Default::default();
        for (index, color) in colors.into_iter().enumerate() {
            if let Some(channel) = Channel::classify(color) {
                if index >= rest_positions.len() {
                    return Err(SensorError::VertexOutOfRange {
                        index,
                        len: rest_positions.len(),
                    });
                }
                buckets[channel.index()].push(index);
            }
        }

        for channel in Channel::ALL {
            if let Some(reference) = channel.mirror_reference() {
                let candidates = std::mem::take(&mut buckets[channel.index()]);
                buckets[channel.index()] =
                    mirror_order(&buckets[reference.index()], candidates, rest_positions);
            }
        }

        Ok(Self {
            sets: buckets.map(SampleSet::new),
        })
    }

    #[must_use]
    pub fn get(&self, channel: Channel) -> &SampleSet {
        &self.sets[channel.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &SampleSet)> + '_ {
        Channel::ALL.iter().copied().zip(&self.sets)
    }

    /// `true` when no channel has any point assigned.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.sets.iter().all(SampleSet::is_empty)
    }

    /// Largest point index referenced by any channel.
    #[must_use]
    pub fn max_index(&self) -> Option<usize> {
        self.sets
            .iter()
            .flat_map(|s| s.indices.iter().copied())
            .max()
    }
}

fn mirror_order(
    reference: &[usize],
    mut candidates: Vec<usize>,
    positions: &[Point3<f32>],
) -> Vec<usize> {
    let mut ordered = Vec::with_capacity(candidates.len());
    for &r in reference {
        if candidates.is_empty() {
            break;
        }
        let p = positions[r];
        let mirrored = Point3::new(-p.x, p.y, p.z);
        let nearest = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = nalgebra::distance_squared(&positions[**a], &mirrored);
                let db = nalgebra::distance_squared(&positions[**b], &mirrored);
                da.total_cmp(&db)
            })
            .map(|(i, _)| i);
        if let Some(i) = nearest {
            ordered.push(candidates.remove(i));
        }
    }
    ordered.extend(candidates);
    ordered
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use spinefit_body::TorsoTemplate;

    use super::*;

    const BLUE: [f32; 3] = [0.0, 0.0, 1.0];
    const PURPLE: [f32; 3] = [0.6, 0.0, 0.8];
    const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

    #[test]
    fn test_path_length_of_polyline() {
        let positions = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 0.0),
            Point3::new(4.0, 3.0, 0.0),
        ];
        let set = SampleSet::new(vec![0, 1, 2]);
        assert_relative_eq!(set.path_length(&positions), 7.0);
        assert_relative_eq!(SampleSet::default().path_length(&positions), 0.0);
        assert_relative_eq!(SampleSet::new(vec![1]).path_length(&positions), 0.0);
    }

    #[test]
    fn test_path_length_skips_missing_points() {
        let positions = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let set = SampleSet::new(vec![0, 1, 7]);
        assert_relative_eq!(set.path_length(&positions), 1.0);
    }

    #[test]
    fn test_mirror_pairing_reorders_scrambled_channel() {
        // Blue runs bottom-up on the left; purple is stored top-down (and
        // interleaved with untagged points) on the right.
        let positions = vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
            Point3::new(-1.0, 2.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 5.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let colors = [BLUE, BLUE, BLUE, PURPLE, WHITE, PURPLE, PURPLE];
        let sets = SampleSets::classify(colors, &positions).unwrap();

        assert_eq!(sets.get(Channel::Blue).indices(), &[0, 1, 2]);
        assert_eq!(sets.get(Channel::Purple).indices(), &[5, 6, 3]);
        assert_relative_eq!(
            sets.get(Channel::Purple).path_length(&positions),
            sets.get(Channel::Blue).path_length(&positions)
        );
    }

    #[test]
    fn test_mirror_leftovers_keep_index_order() {
        let positions = vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 9.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 4.0, 0.0),
        ];
        let colors = [BLUE, PURPLE, PURPLE, PURPLE];
        let sets = SampleSets::classify(colors, &positions).unwrap();
        assert_eq!(sets.get(Channel::Purple).indices(), &[2, 1, 3]);
    }

    #[test]
    fn test_classify_rejects_short_positions() {
        let err = SampleSets::classify([BLUE, BLUE], &[Point3::origin()]).unwrap_err();
        assert_eq!(err, SensorError::VertexOutOfRange { index: 1, len: 1 });
    }

    #[test]
    fn test_template_mirrored_strips_have_equal_rest_length() {
        let (_, mesh) = TorsoTemplate::default().build().unwrap();
        let rest = mesh.rest_positions();
        let sets = SampleSets::classify(mesh.colors(), &rest).unwrap();
        for channel in Channel::ALL {
            assert!(!sets.get(channel).is_empty(), "{channel} is empty");
        }
        for (left, right) in [
            (Channel::Blue, Channel::Purple),
            (Channel::Black, Channel::Pink),
        ] {
            assert_relative_eq!(
                sets.get(left).path_length(&rest),
                sets.get(right).path_length(&rest),
                epsilon = 1e-4
            );
        }
    }
}
