//! 16.16 fixed-point math kernel
//!
//! All gameplay math runs on signed 16.16 fixed point (`ONE` = 65536).
//! Angles use a 256-unit circle, also in 16.16: `ANG_256` is a full turn.
//! Everything here is pure, deterministic and allocation-free; trig goes
//! through lookup tables built once at startup.

use std::sync::OnceLock;

use glam::IVec3;

/// 16.16 signed fixed-point value.
pub type Fx = i32;

/// 3-vector of 16.16 components.
pub type FxVec3 = IVec3;

pub const FRAC_BITS: u32 = 16;
pub const ONE: Fx = 1 << FRAC_BITS;

/// Full turn in 256-unit angle space (256.0 in 16.16).
pub const ANG_256: Fx = 256 << FRAC_BITS;
/// Half turn.
pub const ANG_128: Fx = 128 << FRAC_BITS;
/// Quarter turn.
pub const ANG_64: Fx = 64 << FRAC_BITS;

const SIN_LUT_SIZE: usize = 1024;
// ANG_256 / SIN_LUT_SIZE = 2^14 angle units per table step
const SIN_LUT_SHIFT: u32 = 14;

/// Convert a whole number to 16.16.
#[inline]
pub const fn fx(v: i32) -> Fx {
    v << FRAC_BITS
}

/// Fixed-point multiply: (a * b) >> 16, computed in 64-bit.
#[inline]
pub fn mul(a: Fx, b: Fx) -> Fx {
    ((a as i64 * b as i64) >> FRAC_BITS) as Fx
}

/// Fixed-point divide: (a << 16) / b, computed in 64-bit.
///
/// b == 0 is a caller bug; release builds saturate instead of faulting.
#[inline]
pub fn div(a: Fx, b: Fx) -> Fx {
    debug_assert!(b != 0, "fixed-point divide by zero");
    if b == 0 {
        return if a >= 0 { Fx::MAX } else { Fx::MIN };
    }
    (((a as i64) << FRAC_BITS) / b as i64) as Fx
}

/// a * a in fixed point, sign-correct.
#[inline]
pub fn square(a: Fx) -> Fx {
    mul(a, a)
}

/// Fixed-point square root (truncating).
pub fn sqrt(x: Fx) -> Fx {
    if x < 0 {
        log::warn!("sqrt of negative fixed-point value {x}");
        return 0;
    }
    (((x as u64) << FRAC_BITS).isqrt()) as Fx
}

fn sin_lut() -> &'static [Fx; SIN_LUT_SIZE] {
    static LUT: OnceLock<[Fx; SIN_LUT_SIZE]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut table = [0; SIN_LUT_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            let theta = i as f64 / SIN_LUT_SIZE as f64 * std::f64::consts::TAU;
            *entry = (theta.sin() * ONE as f64).round() as Fx;
        }
        table
    })
}

/// Sine of a 256-unit-circle angle.
#[inline]
pub fn sin(angle: Fx) -> Fx {
    sin_lut()[((angle >> SIN_LUT_SHIFT) & (SIN_LUT_SIZE as i32 - 1)) as usize]
}

/// Cosine of a 256-unit-circle angle.
#[inline]
pub fn cos(angle: Fx) -> Fx {
    sin(angle.wrapping_add(ANG_64))
}

/// Arc tangent: the 256-unit-circle angle of the point (x, y), measured
/// from the +x axis.
pub fn atan2(x: Fx, y: Fx) -> Fx {
    let radians = (y as f64).atan2(x as f64);
    ((radians / std::f64::consts::TAU) * ANG_256 as f64).round() as Fx
}

/// Vector a - b.
#[inline]
pub fn vec_sub(a: FxVec3, b: FxVec3) -> FxVec3 {
    a - b
}

/// Dot product of two 16.16 vectors.
#[inline]
pub fn dot(a: FxVec3, b: FxVec3) -> Fx {
    mul(a.x, b.x) + mul(a.y, b.y) + mul(a.z, b.z)
}

/// Cross product of two 16.16 vectors.
pub fn cross(a: FxVec3, b: FxVec3) -> FxVec3 {
    FxVec3::new(
        mul(a.y, b.z) - mul(a.z, b.y),
        mul(a.z, b.x) - mul(a.x, b.z),
        mul(a.x, b.y) - mul(a.y, b.x),
    )
}

/// Euclidean length of a 16.16 vector.
pub fn magnitude(v: FxVec3) -> Fx {
    sqrt(square(v.x) + square(v.y) + square(v.z))
}

/// Normalize in place. A zero-length vector (possible with very small
/// polygons at 16.16 precision) substitutes a unit length instead of
/// dividing by zero.
pub fn normalize(v: &mut FxVec3) {
    let mut len = magnitude(*v);
    if len == 0 {
        len = ONE;
    }
    v.x = div(v.x, len);
    v.y = div(v.y, len);
    v.z = div(v.z, len);
}

/// Squared distance between two points, in 16.16-squared units.
pub fn squared_dist(p1: FxVec3, p2: FxVec3) -> Fx {
    let d = p2 - p1;
    square(d.x) + square(d.y) + square(d.z)
}

/// 3x3 fixed-point matrix, row-major.
pub type Mat3 = [[Fx; 3]; 3];

pub fn identity() -> Mat3 {
    let mut m = [[0; 3]; 3];
    m[0][0] = ONE;
    m[1][1] = ONE;
    m[2][2] = ONE;
    m
}

/// Matrix product a * b.
pub fn mat_mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = mul(a[i][0], b[0][j]) + mul(a[i][1], b[1][j]) + mul(a[i][2], b[2][j]);
        }
    }
    out
}

/// Row-vector times matrix: out[j] = sum_i v[i] * m[i][j].
pub fn transform(v: FxVec3, m: &Mat3) -> FxVec3 {
    FxVec3::new(
        mul(v.x, m[0][0]) + mul(v.y, m[1][0]) + mul(v.z, m[2][0]),
        mul(v.x, m[0][1]) + mul(v.y, m[1][1]) + mul(v.z, m[2][1]),
        mul(v.x, m[0][2]) + mul(v.y, m[1][2]) + mul(v.z, m[2][2]),
    )
}

/// Batched row-vector transform over a vertex slice.
pub fn transform_many(verts: &mut [FxVec3], m: &Mat3) {
    for v in verts {
        *v = transform(*v, m);
    }
}

/// Z-axis rotation matrix for a 256-unit-circle angle.
pub fn rotation_z(angle: Fx) -> Mat3 {
    let cs = cos(angle);
    let sn = sin(angle);
    let mut m = identity();
    m[0][0] = cs;
    m[0][1] = -sn;
    m[1][0] = sn;
    m[1][1] = cs;
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_roundtrip() {
        let a = fx(3) + ONE / 2; // 3.5
        let b = fx(2);
        assert_eq!(mul(a, b), fx(7));
        assert_eq!(div(fx(7), b), a);
    }

    #[test]
    fn test_mul_sign_handling() {
        assert_eq!(mul(-fx(3), fx(2)), -fx(6));
        assert_eq!(mul(-fx(3), -fx(2)), fx(6));
        assert_eq!(div(-fx(6), fx(2)), -fx(3));
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(sqrt(fx(4)), fx(2));
        assert_eq!(sqrt(fx(9)), fx(3));
        // 2.25 -> 1.5
        assert_eq!(sqrt(fx(9) / 4), fx(3) / 2);
        assert_eq!(sqrt(0), 0);
    }

    #[test]
    fn test_trig_cardinal_angles() {
        assert_eq!(sin(0), 0);
        assert_eq!(sin(ANG_64), ONE);
        assert_eq!(cos(0), ONE);
        assert_eq!(cos(ANG_128), -ONE);
        // Negative angles wrap through the table
        assert_eq!(sin(-ANG_64), -ONE);
    }

    #[test]
    fn test_atan2_cardinal_angles() {
        assert_eq!(atan2(ONE, 0), 0);
        assert_eq!(atan2(0, ONE), ANG_64);
        assert_eq!(atan2(-ONE, 0), ANG_128);
        assert_eq!(atan2(0, -ONE), -ANG_64);
    }

    #[test]
    fn test_normalize_unit_length() {
        let mut v = FxVec3::new(fx(3), fx(4), 0);
        normalize(&mut v);
        let len = magnitude(v);
        assert!((len - ONE).abs() < 16, "length {len} not ~ONE");
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = FxVec3::ZERO;
        normalize(&mut v);
        assert_eq!(v, FxVec3::ZERO);
    }

    #[test]
    fn test_dot_cross() {
        let x = FxVec3::new(ONE, 0, 0);
        let y = FxVec3::new(0, ONE, 0);
        assert_eq!(dot(x, y), 0);
        assert_eq!(cross(x, y), FxVec3::new(0, 0, ONE));
    }

    #[test]
    fn test_matrix_identity_transform() {
        let v = FxVec3::new(fx(1), fx(2), fx(3));
        assert_eq!(transform(v, &identity()), v);
        let m = mat_mul(&identity(), &identity());
        assert_eq!(m, identity());
    }

    #[test]
    fn test_rotation_z_quarter_turn() {
        let v = FxVec3::new(ONE, 0, 0);
        let r = transform(v, &rotation_z(ANG_64));
        // x axis rotates onto -y with this matrix orientation
        assert!(r.x.abs() < 16);
        assert!((r.y.abs() - ONE).abs() < 16);
    }

    #[test]
    fn test_squared_dist() {
        let a = FxVec3::new(0, 0, 0);
        let b = FxVec3::new(fx(3), fx(4), 0);
        assert_eq!(squared_dist(a, b), fx(25));
    }
}
