//! Conversion between the model's parameter space and the local rendering
//! convention.
//!
//! The scale/squeeze/shear coefficients are empirically fitted and the two
//! directions are fitted independently, so `to_remote(to_local(x))` drifts for
//! those three fields. Rotation and color survive a round trip up to rounding.
//!
//! Calibrations are versioned; [`to_local`] and [`to_remote`] always use
//! [`CURRENT`]. Recalibrating means adding a `v2` module and switching the
//! re-export, leaving `v1` in place for comparison.

use crate::patch::LocalAttributes;
use crate::remote::RemoteAttributes;

pub mod v1;

pub use v1 as current;

/// Calibration version used by [`to_local`] and [`to_remote`].
pub const CURRENT: u32 = current::VERSION;

/// Model convention to local convention. Fields whose inputs are missing are
/// carried over untouched.
pub fn to_local(remote: &RemoteAttributes) -> LocalAttributes {
    current::to_local(remote)
}

/// Local convention to model convention. See [`v1::to_remote`] for the
/// ordering constraints between the coupled fields.
pub fn to_remote(local: &LocalAttributes) -> RemoteAttributes {
    current::to_remote(local)
}
