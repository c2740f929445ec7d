use nalgebra::{UnitQuaternion, Vector3};

/// Folds an angle in degrees into the half-open range `(-180, 180]`.
///
/// ```
/// use spinefit_body::fold_degrees;
///
/// assert_eq!(fold_degrees(350.0), -10.0);
/// assert_eq!(fold_degrees(180.0), 180.0);
/// assert_eq!(fold_degrees(-180.0), 180.0);
/// ```
#[must_use]
pub fn fold_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Maps each Euler component to `[-1, 1]` by folding and dividing by 180.
#[must_use]
pub fn normalized_rotation(euler: &Vector3<f32>) -> Vector3<f32> {
    euler.map(|a| fold_degrees(a) / 180.0)
}

/// Converts local Euler angles in degrees to a rotation.
///
/// Rotations are applied about z, then x, then y (`q = qy * qx * qz`).
#[must_use]
pub fn rotation_from_euler(euler: &Vector3<f32>) -> UnitQuaternion<f32> {
    let qx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), euler.x.to_radians());
    let qy = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), euler.y.to_radians());
    let qz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), euler.z.to_radians());
    qy * qx * qz
}
