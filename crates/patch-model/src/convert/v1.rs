//! First calibration of the model/local parameter mapping.
//!
//! The forward direction is a 3x3 linear fit over (scale, squeeze, shear).
//! The reverse direction is not its matrix inverse: squeeze is passed through
//! unchanged, and shear/scale are solved one at a time in a fixed order.

use crate::patch::LocalAttributes;
use crate::remote::RemoteAttributes;

pub const VERSION: u32 = 1;

/// Degrees per model rotation unit.
pub const ROTATION_FACTOR: f64 = 55.6635311;
pub const COLOR_FACTOR: f64 = 256.0;

// Forward fit: local = M * (scale, squeeze, shear).
pub const SCALE_FROM_SCALE: f64 = 0.80003054;
pub const SCALE_FROM_SQUEEZE: f64 = 0.017701143;
pub const SCALE_FROM_SHEAR: f64 = 0.016935179;
pub const SQUEEZE_FROM_SCALE: f64 = 0.064294401;
pub const SQUEEZE_FROM_SQUEEZE: f64 = 0.00870305;
pub const SHEAR_FROM_SQUEEZE: f64 = 0.013955148;
pub const SHEAR_FROM_SHEAR: f64 = 0.939783266;

// Reverse fit.
pub const REVERSE_SHEAR_SCALE: f64 = 0.01693518;
pub const REVERSE_SHEAR_DIVISOR: f64 = 0.93978327;
pub const REVERSE_SCALE_SQUEEZE: f64 = 0.0642944;
pub const REVERSE_SCALE_DIVISOR: f64 = 0.80003054;

pub fn to_local(remote: &RemoteAttributes) -> LocalAttributes {
    let mut local = LocalAttributes {
        rotation: remote.rotation,
        scale: remote.scale,
        squeeze: remote.squeeze,
        shear: remote.shear,
        red: remote.red,
        green: remote.green,
        blue: remote.blue,
        alpha: None,
    };

    if let Some(rotation) = remote.rotation {
        local.rotation = Some(rotation_to_degrees(rotation));
    }

    // All three read the original model values, so order does not matter here.
    if let (Some(scale), Some(squeeze), Some(shear)) = (remote.scale, remote.squeeze, remote.shear)
    {
        local.scale =
            Some(scale * SCALE_FROM_SCALE + squeeze * SCALE_FROM_SQUEEZE + shear * SCALE_FROM_SHEAR);
    }
    if let (Some(scale), Some(squeeze)) = (remote.scale, remote.squeeze) {
        local.squeeze = Some(scale * SQUEEZE_FROM_SCALE + squeeze * SQUEEZE_FROM_SQUEEZE);
    }
    if let (Some(squeeze), Some(shear)) = (remote.squeeze, remote.shear) {
        local.shear = Some(squeeze * SHEAR_FROM_SQUEEZE + shear * SHEAR_FROM_SHEAR);
    }

    local.red = remote.red.map(color_to_local);
    local.green = remote.green.map(color_to_local);
    local.blue = remote.blue.map(color_to_local);
    local
}

/// Approximate inverse of [`to_local`].
///
/// Order matters: shear is solved against the original local scale, squeeze is
/// taken as-is, and scale is solved against the already converted squeeze.
/// `alpha` has no model counterpart and is dropped.
pub fn to_remote(local: &LocalAttributes) -> RemoteAttributes {
    let mut remote = RemoteAttributes {
        rotation: local.rotation,
        scale: local.scale,
        squeeze: local.squeeze,
        shear: local.shear,
        red: local.red,
        green: local.green,
        blue: local.blue,
    };

    if let Some(rotation) = local.rotation {
        remote.rotation = Some(rotation / ROTATION_FACTOR);
    }

    if let (Some(shear), Some(scale)) = (local.shear, local.scale) {
        remote.shear = Some((shear - scale * REVERSE_SHEAR_SCALE) / REVERSE_SHEAR_DIVISOR);
    }

    // Identity. A real inverse would need all three coupled parameters.
    remote.squeeze = local.squeeze;

    if let (Some(scale), Some(squeeze)) = (local.scale, remote.squeeze) {
        remote.scale = Some((scale - squeeze * REVERSE_SCALE_SQUEEZE) / REVERSE_SCALE_DIVISOR);
    }

    remote.red = local.red.map(color_to_remote);
    remote.green = local.green.map(color_to_remote);
    remote.blue = local.blue.map(color_to_remote);
    remote
}

/// Model rotation to degrees in `[0, 360)`.
pub fn rotation_to_degrees(rotation: f64) -> f64 {
    let mut degrees = (rotation * ROTATION_FACTOR) % 360.0;
    if degrees < 0.0 {
        degrees += 360.0;
    }
    // Adding 360 to a tiny negative remainder can round up to exactly 360.
    if degrees >= 360.0 { 0.0 } else { degrees }
}

pub fn color_to_local(channel: f64) -> f64 {
    (channel * COLOR_FACTOR).round().clamp(0.0, 255.0)
}

pub fn color_to_remote(channel: f64) -> f64 {
    channel / COLOR_FACTOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn coupled_scale_needs_all_three_inputs() {
        let only_scale = RemoteAttributes {
            scale: Some(2.0),
            ..Default::default()
        };
        // Passed through in model units.
        assert_eq!(to_local(&only_scale).scale, Some(2.0));

        let full = RemoteAttributes {
            scale: Some(2.0),
            squeeze: Some(1.0),
            shear: Some(0.5),
            ..Default::default()
        };
        let local = to_local(&full);
        let expected_scale = 2.0 * 0.80003054 + 1.0 * 0.017701143 + 0.5 * 0.016935179;
        assert!(approx(local.scale.unwrap(), expected_scale));
        assert!(approx(local.squeeze.unwrap(), 2.0 * 0.064294401 + 0.00870305));
        assert!(approx(local.shear.unwrap(), 0.013955148 + 0.5 * 0.939783266));
    }

    #[test]
    fn squeeze_without_scale_passes_through() {
        let remote = RemoteAttributes {
            squeeze: Some(0.3),
            ..Default::default()
        };
        let local = to_local(&remote);
        assert_eq!(local.squeeze, Some(0.3));
        assert_eq!(local.scale, None);
        assert_eq!(local.shear, None);
    }

    #[test]
    fn reverse_uses_converted_squeeze_for_scale() {
        let local = LocalAttributes {
            scale: Some(1.0),
            squeeze: Some(0.5),
            shear: Some(0.2),
            ..Default::default()
        };
        let remote = to_remote(&local);
        assert_eq!(remote.squeeze, Some(0.5));
        assert!(approx(
            remote.shear.unwrap(),
            (0.2 - 1.0 * 0.01693518) / 0.93978327
        ));
        assert!(approx(
            remote.scale.unwrap(),
            (1.0 - 0.5 * 0.0642944) / 0.80003054
        ));
    }

    #[test]
    fn alpha_is_not_sent_to_the_model() {
        let local = LocalAttributes {
            alpha: Some(0.4),
            ..Default::default()
        };
        assert_eq!(to_remote(&local), RemoteAttributes::default());
    }

    #[test]
    fn rotation_wraps_negative_values() {
        let degrees = rotation_to_degrees(-1.0);
        assert!(approx(degrees, 360.0 - ROTATION_FACTOR));
        assert_eq!(rotation_to_degrees(0.0), 0.0);
    }
}
