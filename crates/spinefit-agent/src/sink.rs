use nalgebra::Vector3;

/// Fixed-size destination for a winning pose, e.g. a visualisation rig.
pub trait PoseSink {
    /// Number of joint slots available.
    fn capacity(&self) -> usize;

    fn set(&mut self, slot: usize, rotation: Vector3<f32>);
}

impl PoseSink for [Vector3<f32>] {
    fn capacity(&self) -> usize {
        self.len()
    }

    fn set(&mut self, slot: usize, rotation: Vector3<f32>) {
        if let Some(dst) = self.get_mut(slot) {
            *dst = rotation;
        }
    }
}

impl PoseSink for Vec<Vector3<f32>> {
    fn capacity(&self) -> usize {
        self.len()
    }

    fn set(&mut self, slot: usize, rotation: Vector3<f32>) {
        self.as_mut_slice().set(slot, rotation);
    }
}

/// Copies `rotations` into `sink`, stopping at whichever runs out first.
///
/// Returns the number of slots written.
///
/// ```
/// use nalgebra::Vector3;
/// use spinefit_agent::copy_pose;
///
/// let mut slots = vec![Vector3::zeros(); 2];
/// let pose = [Vector3::x(), Vector3::y(), Vector3::z()];
/// assert_eq!(copy_pose(&mut slots, &pose), 2);
/// assert_eq!(slots, vec![Vector3::x(), Vector3::y()]);
/// ```
pub fn copy_pose<S>(sink: &mut S, rotations: &[Vector3<f32>]) -> usize
where
    S: PoseSink + ?Sized,
{
    let count = sink.capacity().min(rotations.len());
    for (slot, rotation) in rotations.iter().take(count).enumerate() {
        sink.set(slot, *rotation);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_into_larger_sink() {
        let mut slots = [Vector3::repeat(9.0); 4];
        let written = copy_pose(&mut slots[..], &[Vector3::x()]);
        assert_eq!(written, 1);
        assert_eq!(slots[0], Vector3::x());
        assert_eq!(slots[1], Vector3::repeat(9.0));
    }

    #[test]
    fn test_copy_into_empty_sink() {
        let mut slots: Vec<Vector3<f32>> = Vec::new();
        assert_eq!(copy_pose(&mut slots, &[Vector3::x()]), 0);
    }
}
