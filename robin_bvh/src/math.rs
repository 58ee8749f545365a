// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Float functions routed to `std` or `libm`.

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("robin_bvh requires either the `std` or the `libm` feature");

#[cfg(feature = "std")]
mod imp {
    #[inline]
    pub(crate) fn sqrt(x: f32) -> f32 {
        x.sqrt()
    }
    #[inline]
    pub(crate) fn exp(x: f32) -> f32 {
        x.exp()
    }
    #[inline]
    pub(crate) fn acos(x: f32) -> f32 {
        x.acos()
    }
    #[inline]
    pub(crate) fn asin(x: f32) -> f32 {
        x.asin()
    }
    #[inline]
    pub(crate) fn cos(x: f32) -> f32 {
        x.cos()
    }
    #[inline]
    pub(crate) fn sin(x: f32) -> f32 {
        x.sin()
    }
    #[inline]
    pub(crate) fn abs(x: f32) -> f32 {
        x.abs()
    }
}

#[cfg(not(feature = "std"))]
mod imp {
    #[inline]
    pub(crate) fn sqrt(x: f32) -> f32 {
        libm::sqrtf(x)
    }
    #[inline]
    pub(crate) fn exp(x: f32) -> f32 {
        libm::expf(x)
    }
    #[inline]
    pub(crate) fn acos(x: f32) -> f32 {
        libm::acosf(x)
    }
    #[inline]
    pub(crate) fn asin(x: f32) -> f32 {
        libm::asinf(x)
    }
    #[inline]
    pub(crate) fn cos(x: f32) -> f32 {
        libm::cosf(x)
    }
    #[inline]
    pub(crate) fn sin(x: f32) -> f32 {
        libm::sinf(x)
    }
    #[inline]
    pub(crate) fn abs(x: f32) -> f32 {
        libm::fabsf(x)
    }
}

pub(crate) use imp::{abs, acos, asin, cos, exp, sin, sqrt};

/// `acos` with its argument clamped to `[-1, 1]`.
#[inline]
pub(crate) fn acos_clamped(x: f32) -> f32 {
    acos(x.clamp(-1.0, 1.0))
}

/// `asin` with its argument clamped to `[-1, 1]`.
#[inline]
pub(crate) fn asin_clamped(x: f32) -> f32 {
    asin(x.clamp(-1.0, 1.0))
}

/// Inclusive range test.
#[inline]
pub(crate) fn in_range(x: f32, lo: f32, hi: f32) -> bool {
    x >= lo && x <= hi
}
