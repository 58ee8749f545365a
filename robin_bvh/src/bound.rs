// Copyright 2025 the Robin BVH Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Closed-form bounds on the Robin star radius.
//!
//! For a Robin boundary piece seen from a query point at distances in
//! `[r_min, r_max]`, with coefficients in `[min_coeff, max_coeff]` and normal
//! incidence cosines in `[min_cos, max_cos]`, the radius at which the boundary
//! starts to constrain the star-shaped region is bounded from both sides. The
//! bounds come from the free-space Green's function, so their form depends on
//! the dimension: exponential in 2-D, rational in 3-D.

use crate::error::Error;
use crate::math;
use crate::types::UNBOUNDED;

/// Dimension-specific star-radius bound formulas.
///
/// Selected once per tree with [`RadiusBound::for_dimension`] and passed to
/// every function that needs it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RadiusBound {
    /// 2-D (line segments): `r = r0 * exp(cos / (coeff * r1))`.
    Planar,
    /// 3-D (triangles): `r = r0 / (1 - cos / (coeff * r1))`.
    Spatial,
}

impl RadiusBound {
    /// Strategy for a space of dimension `dim`.
    ///
    /// Fails with [`Error::UnsupportedDimension`] for anything but 2 or 3.
    pub const fn for_dimension(dim: usize) -> Result<Self, Error> {
        match dim {
            2 => Ok(Self::Planar),
            3 => Ok(Self::Spatial),
            _ => Err(Error::UnsupportedDimension(dim)),
        }
    }

    /// Dimension this strategy belongs to.
    pub const fn dimension(self) -> usize {
        match self {
            Self::Planar => 2,
            Self::Spatial => 3,
        }
    }

    /// Lower bound on the squared star radius.
    ///
    /// Never exceeds the true value; saturates at [`UNBOUNDED`] when the piece
    /// cannot constrain the region at all.
    pub fn min_squared_star_radius(
        self,
        r_min: f32,
        r_max: f32,
        _min_coeff: f32,
        max_coeff: f32,
        min_cos: f32,
        _max_cos: f32,
    ) -> f32 {
        let bound = match self {
            Self::Planar => planar(r_min, r_max, min_cos, max_coeff),
            Self::Spatial => spatial(r_min, r_max, min_cos, max_coeff),
        };
        if bound.is_nan() {
            r_min * r_min
        } else {
            bound
        }
    }

    /// Upper bound on the squared star radius.
    ///
    /// Never below the true value; [`UNBOUNDED`] when no finite bound exists.
    pub fn max_squared_star_radius(
        self,
        r_min: f32,
        r_max: f32,
        min_coeff: f32,
        _max_coeff: f32,
        _min_cos: f32,
        max_cos: f32,
    ) -> f32 {
        let bound = match self {
            Self::Planar => planar(r_max, r_min, max_cos, min_coeff),
            Self::Spatial => spatial(r_max, r_min, max_cos, min_coeff),
        };
        if bound.is_nan() { UNBOUNDED } else { bound }
    }
}

/// Squares `r`, saturating non-finite results at [`UNBOUNDED`].
fn squared(r: f32) -> f32 {
    let r2 = r * r;
    if r2.is_finite() { r2 } else { UNBOUNDED }
}

/// `(r0 * exp(cos / (coeff * r1)))^2`.
fn planar(r0: f32, r1: f32, cos: f32, coeff: f32) -> f32 {
    let exponent = cos / (coeff * r1);
    if exponent.is_nan() {
        return f32::NAN;
    }
    squared(r0 * math::exp(exponent))
}

/// `(r0 / (1 - (cos / coeff) / r1))^2`, unbounded once `r1 <= cos / coeff`.
fn spatial(r0: f32, r1: f32, cos: f32, coeff: f32) -> f32 {
    let c = cos / coeff;
    if c.is_nan() {
        return f32::NAN;
    }
    if r1 <= c {
        return UNBOUNDED;
    }
    squared(r0 / (1.0 - c / r1))
}
