use std::f64::consts::{PI, TAU};

use bevy::math::{DMat3, DVec3};

pub const EPSILON1: f64 = 0.1;
pub const EPSILON2: f64 = 0.01;
pub const EPSILON3: f64 = 0.001;
pub const EPSILON5: f64 = 0.00001;
pub const EPSILON6: f64 = 0.000001;
pub const EPSILON7: f64 = 0.0000001;
pub const EPSILON9: f64 = 0.000000001;
pub const EPSILON10: f64 = 0.0000000001;
pub const EPSILON12: f64 = 0.000000000001;
pub const EPSILON14: f64 = 0.00000000000001;
pub const EPSILON15: f64 = 0.000000000000001;
pub const EPSILON20: f64 = 0.00000000000000000001;

pub fn equals_epsilon(
    left: f64,
    right: f64,
    relative_epsilon: Option<f64>,
    absolute_epsilon: Option<f64>,
) -> bool {
    let relative_epsilon = relative_epsilon.unwrap_or(0.0);
    let absolute_epsilon = absolute_epsilon.unwrap_or(relative_epsilon);
    let diff = (left - right).abs();
    diff <= absolute_epsilon || diff <= relative_epsilon * left.abs().max(right.abs())
}

/// Row-major nine values to the column-major layout glam expects.
pub fn to_col_major(v: &[f64; 9]) -> [f64; 9] {
    [v[0], v[3], v[6], v[1], v[4], v[7], v[2], v[5], v[8]]
}

pub fn sign_not_zero(value: f64) -> f64 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

pub fn negative_pi_to_pi(angle: f64) -> f64 {
    if (-PI..=PI).contains(&angle) {
        return angle;
    }
    zero_to_two_pi(angle + PI) - PI
}

pub fn zero_to_two_pi(angle: f64) -> f64 {
    if (0.0..=TAU).contains(&angle) {
        return angle;
    }
    let modulo = angle.rem_euclid(TAU);
    if modulo.abs() < EPSILON14 && angle.abs() > EPSILON14 {
        return TAU;
    }
    modulo
}

pub struct EigenDecompositionResult {
    pub unitary: DMat3,
    pub diagonal: DMat3,
}

const ROW_VAL: [usize; 3] = [1, 0, 0];
const COL_VAL: [usize; 3] = [2, 2, 1];

/// Jacobi eigenvalue iteration on a symmetric matrix. The columns of
/// `unitary` are the eigenvectors, the diagonal of `diagonal` the eigenvalues.
pub fn compute_eigen_decomposition(matrix: DMat3) -> EigenDecompositionResult {
    let max_sweeps = 10;

    let mut count = 0;
    let mut sweep = 0;

    let mut unitary = DMat3::IDENTITY;
    let mut diagonal = matrix;

    let epsilon = EPSILON20 * compute_frobenius_norm(&diagonal);

    while sweep < max_sweeps && off_diagonal_frobenius_norm(&diagonal) > epsilon {
        let j = shur_decomposition(&diagonal);
        diagonal = j.transpose() * (diagonal * j);
        unitary *= j;

        count += 1;
        if count > 2 {
            sweep += 1;
            count = 0;
        }
    }
    EigenDecompositionResult { unitary, diagonal }
}

fn element(matrix: &DMat3, column: usize, row: usize) -> f64 {
    matrix.col(column)[row]
}

pub fn compute_frobenius_norm(matrix: &DMat3) -> f64 {
    matrix
        .to_cols_array()
        .iter()
        .map(|value| value * value)
        .sum::<f64>()
        .sqrt()
}

fn off_diagonal_frobenius_norm(matrix: &DMat3) -> f64 {
    let mut norm = 0.0;
    for i in 0..3 {
        let value = element(matrix, COL_VAL[i], ROW_VAL[i]);
        norm += 2.0 * value * value;
    }
    norm.sqrt()
}

/// Rotation that zeroes the largest off-diagonal element.
fn shur_decomposition(matrix: &DMat3) -> DMat3 {
    let mut max_diagonal = 0.0;
    let mut rot_axis = 1;

    for i in 0..3 {
        let value = element(matrix, COL_VAL[i], ROW_VAL[i]).abs();
        if value > max_diagonal {
            rot_axis = i;
            max_diagonal = value;
        }
    }

    let mut c = 1.0;
    let mut s = 0.0;

    let p = ROW_VAL[rot_axis];
    let q = COL_VAL[rot_axis];

    if element(matrix, q, p).abs() > EPSILON15 {
        let qq = element(matrix, q, q);
        let pp = element(matrix, p, p);
        let qp = element(matrix, q, p);

        let tau = (qq - pp) / 2.0 / qp;
        let t = if tau < 0.0 {
            -1.0 / (-tau + (1.0 + tau * tau).sqrt())
        } else {
            1.0 / (tau + (1.0 + tau * tau).sqrt())
        };

        c = 1.0 / (1.0 + t * t).sqrt();
        s = t * c;
    }

    let mut cols = DMat3::IDENTITY.to_cols_array();
    cols[p + 3 * p] = c;
    cols[q + 3 * q] = c;
    cols[p + 3 * q] = s;
    cols[q + 3 * p] = -s;
    DMat3::from_cols_array(&cols)
}

pub trait Cartesian3 {
    fn from_radians(longitude: f64, latitude: f64, height: f64, radii_squared: DVec3) -> DVec3;
    fn from_degrees(longitude: f64, latitude: f64, height: f64, radii_squared: DVec3) -> DVec3;
    fn equals_epsilon(
        &self,
        right: DVec3,
        relative_epsilon: Option<f64>,
        absolute_epsilon: Option<f64>,
    ) -> bool;
    fn most_orthogonal_axis(&self) -> DVec3;
}

impl Cartesian3 for DVec3 {
    fn from_radians(longitude: f64, latitude: f64, height: f64, radii_squared: DVec3) -> DVec3 {
        let cos_latitude = latitude.cos();
        let n = DVec3::new(
            cos_latitude * longitude.cos(),
            cos_latitude * longitude.sin(),
            latitude.sin(),
        )
        .normalize();
        let k = radii_squared * n;
        let gamma = n.dot(k).sqrt();
        k / gamma + n * height
    }

    fn from_degrees(longitude: f64, latitude: f64, height: f64, radii_squared: DVec3) -> DVec3 {
        DVec3::from_radians(
            longitude.to_radians(),
            latitude.to_radians(),
            height,
            radii_squared,
        )
    }

    fn equals_epsilon(
        &self,
        right: DVec3,
        relative_epsilon: Option<f64>,
        absolute_epsilon: Option<f64>,
    ) -> bool {
        equals_epsilon(self.x, right.x, relative_epsilon, absolute_epsilon)
            && equals_epsilon(self.y, right.y, relative_epsilon, absolute_epsilon)
            && equals_epsilon(self.z, right.z, relative_epsilon, absolute_epsilon)
    }

    fn most_orthogonal_axis(&self) -> DVec3 {
        let f = self.normalize().abs();
        if f.x <= f.y {
            if f.x <= f.z {
                DVec3::X
            } else {
                DVec3::Z
            }
        } else if f.y <= f.z {
            DVec3::Y
        } else {
            DVec3::Z
        }
    }
}
