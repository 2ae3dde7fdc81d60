//! Fixed-point scaling shared by the DATA and SYNC_FRAME record layouts.
//!
//! Quaternion components are stored as `i16 = value * 2^14`; accelerometer
//! and gyroscope components as `i16 = value * 100`. Out-of-range values are
//! clamped to `i16` bounds on encode rather than overflowing (§6).

use mash_types::{Quaternion, Vec3};

pub const QUAT_SCALE: f32 = 16384.0; // 2^14
pub const IMU_SCALE: f32 = 100.0;

fn to_fixed(value: f32, scale: f32) -> i16 {
    let scaled = value * scale;
    if scaled >= i16::MAX as f32 {
        i16::MAX
    } else if scaled <= i16::MIN as f32 {
        i16::MIN
    } else {
        scaled.round() as i16
    }
}

fn from_fixed(raw: i16, scale: f32) -> f32 {
    raw as f32 / scale
}

pub fn encode_quaternion(q: &Quaternion) -> [i16; 4] {
    [
        to_fixed(q.0[0], QUAT_SCALE),
        to_fixed(q.0[1], QUAT_SCALE),
        to_fixed(q.0[2], QUAT_SCALE),
        to_fixed(q.0[3], QUAT_SCALE),
    ]
}

pub fn decode_quaternion(raw: [i16; 4]) -> Quaternion {
    Quaternion([
        from_fixed(raw[0], QUAT_SCALE),
        from_fixed(raw[1], QUAT_SCALE),
        from_fixed(raw[2], QUAT_SCALE),
        from_fixed(raw[3], QUAT_SCALE),
    ])
}

pub fn encode_vec3(v: &Vec3) -> [i16; 3] {
    [
        to_fixed(v.0[0], IMU_SCALE),
        to_fixed(v.0[1], IMU_SCALE),
        to_fixed(v.0[2], IMU_SCALE),
    ]
}

pub fn decode_vec3(raw: [i16; 3]) -> Vec3 {
    Vec3([
        from_fixed(raw[0], IMU_SCALE),
        from_fixed(raw[1], IMU_SCALE),
        from_fixed(raw[2], IMU_SCALE),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quaternion_roundtrips_within_tolerance() {
        let q = Quaternion([0.7071, -0.7071, 0.1234, -0.9999]);
        let raw = encode_quaternion(&q);
        let back = decode_quaternion(raw);
        for i in 0..4 {
            assert!((back.0[i] - q.0[i]).abs() <= 1.0 / QUAT_SCALE);
        }
    }

    #[test]
    fn clamps_out_of_range_values() {
        let q = Quaternion([1000.0, -1000.0, 0.0, 0.0]);
        let raw = encode_quaternion(&q);
        assert_eq!(raw[0], i16::MAX);
        assert_eq!(raw[1], i16::MIN);
    }
}
