use bevy::math::{DVec2, DVec3};

use crate::math::sign_not_zero;

fn to_snorm(value: f64, range_maximum: f64) -> f64 {
    ((value.clamp(-1.0, 1.0) * 0.5 + 0.5) * range_maximum).round()
}

fn from_snorm(value: f64, range_maximum: f64) -> f64 {
    value.clamp(0.0, range_maximum) / range_maximum * 2.0 - 1.0
}

/// Octahedral encoding of a unit vector into two components in
/// `[0, range_maximum]`.
pub fn oct_encode_in_range(vector: DVec3, range_maximum: f64) -> DVec2 {
    let l1 = vector.x.abs() + vector.y.abs() + vector.z.abs();
    let mut x = vector.x / l1;
    let mut y = vector.y / l1;
    if vector.z < 0.0 {
        let (old_x, old_y) = (x, y);
        x = (1.0 - old_y.abs()) * sign_not_zero(old_x);
        y = (1.0 - old_x.abs()) * sign_not_zero(old_y);
    }
    DVec2::new(to_snorm(x, range_maximum), to_snorm(y, range_maximum))
}

pub fn oct_decode_in_range(x: f64, y: f64, range_maximum: f64) -> DVec3 {
    let mut result = DVec3::new(from_snorm(x, range_maximum), from_snorm(y, range_maximum), 0.0);
    result.z = 1.0 - (result.x.abs() + result.y.abs());
    if result.z < 0.0 {
        let old_x = result.x;
        result.x = (1.0 - result.y.abs()) * sign_not_zero(old_x);
        result.y = (1.0 - old_x.abs()) * sign_not_zero(result.y);
    }
    result.normalize()
}

/// Two bytes per normal.
pub fn oct_encode(vector: DVec3) -> [u8; 2] {
    let encoded = oct_encode_in_range(vector, 255.0);
    [encoded.x as u8, encoded.y as u8]
}

pub fn oct_decode(encoded: [u8; 2]) -> DVec3 {
    oct_decode_in_range(f64::from(encoded[0]), f64::from(encoded[1]), 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn axes_survive_encoding() {
        for axis in [DVec3::X, DVec3::Y, DVec3::Z, DVec3::NEG_X, DVec3::NEG_Y, DVec3::NEG_Z] {
            assert!(oct_decode(oct_encode(axis)).distance(axis) < 0.01);
        }
    }

    #[test]
    fn random_normals_stay_close() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let v = DVec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            if v.length() < 0.1 {
                continue;
            }
            let normal = v.normalize();
            assert!(oct_decode(oct_encode(normal)).dot(normal) > 0.999);
        }
    }
}
