//! Integer lattice points, real-space vectors and the Born–von Karman
//! neighbourhood enumerator.
//!
//! The two in-plane axes (x, y) wrap periodically; the stacking axis (z) is
//! bounded by the electrodes and does not.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A site coordinate on the integer lattice.
///
/// Points are equality keys for the carrier registries and the event pools.
/// Subtracting two points yields the real-space [`Vector`] between them.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Point {
    /// In-plane coordinate along the first periodic axis.
    pub x: i32,
    /// In-plane coordinate along the second periodic axis.
    pub y: i32,
    /// Coordinate along the stacking axis, 0 at the hole-injecting electrode.
    pub z: i32,
}

impl Point {
    /// Constructor.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl Sub for Point {
    type Output = Vector;

    fn sub(self, other: Self) -> Vector {
        Vector::new(
            f64::from(self.x - other.x),
            f64::from(self.y - other.y),
            f64::from(self.z - other.z),
        )
    }
}

impl Add for Point {
    type Output = Vector;

    fn add(self, other: Self) -> Vector {
        Vector::new(
            f64::from(self.x + other.x),
            f64::from(self.y + other.y),
            f64::from(self.z + other.z),
        )
    }
}

impl Add<f64> for Point {
    type Output = Vector;

    fn add(self, other: f64) -> Vector {
        Vector::new(
            f64::from(self.x) + other,
            f64::from(self.y) + other,
            f64::from(self.z) + other,
        )
    }
}

impl Sub<f64> for Point {
    type Output = Vector;

    fn sub(self, other: f64) -> Vector {
        Vector::new(
            f64::from(self.x) - other,
            f64::from(self.y) - other,
            f64::from(self.z) - other,
        )
    }
}

/// A displacement or field in real space.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Vector {
    /// Component along x.
    pub x: f64,
    /// Component along y.
    pub y: f64,
    /// Component along z.
    pub z: f64,
}

impl Vector {
    /// Constructor.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Scalar product with `other`.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.z.mul_add(other.z, self.x.mul_add(other.x, self.y * other.y))
    }

    /// Euclidean norm.
    #[must_use]
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl Add for Vector {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vector {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vector {
    type Output = Self;

    fn mul(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

impl Mul<Vector> for f64 {
    type Output = Vector;

    fn mul(self, vector: Vector) -> Vector {
        vector * self
    }
}

/// Extent of the lattice along each axis.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Dimensions {
    /// Number of sites along x.
    pub x: usize,
    /// Number of sites along y.
    pub y: usize,
    /// Number of planes along z, electrodes included.
    pub z: usize,
}

impl Dimensions {
    /// Constructor.
    #[must_use]
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Total number of sites.
    #[must_use]
    pub const fn volume(self) -> usize {
        self.x * self.y * self.z
    }

    /// Number of sites in one z-plane.
    #[must_use]
    pub const fn plane(self) -> usize {
        self.x * self.y
    }

    /// Smallest extent over the three axes.
    #[must_use]
    pub fn smallest(self) -> usize {
        self.x.min(self.y).min(self.z)
    }

    /// True when `point` lies inside the lattice.
    #[must_use]
    pub fn contains(self, point: Point) -> bool {
        (0..self.x_i32()).contains(&point.x)
            && (0..self.y_i32()).contains(&point.y)
            && (0..self.z_i32()).contains(&point.z)
    }

    pub(crate) fn x_i32(self) -> i32 {
        // UNWRAP: dimensions are validated to fit i32 at construction
        i32::try_from(self.x).unwrap_or_else(|_| unreachable!())
    }

    pub(crate) fn y_i32(self) -> i32 {
        // UNWRAP: dimensions are validated to fit i32 at construction
        i32::try_from(self.y).unwrap_or_else(|_| unreachable!())
    }

    pub(crate) fn z_i32(self) -> i32 {
        // UNWRAP: dimensions are validated to fit i32 at construction
        i32::try_from(self.z).unwrap_or_else(|_| unreachable!())
    }
}

fn wrap(index: i32, extent: i32) -> i32 {
    if index < 0 {
        index + extent
    } else if index >= extent {
        index - extent
    } else {
        index
    }
}

/// Enumerates the lattice points within a cube of half-width `radius` around
/// `origin`, excluding `origin` itself.
///
/// The x and y offsets wrap around the periodic boundary; z offsets falling
/// outside the stack are omitted, so sites next to an electrode see a
/// truncated neighbourhood.
#[must_use]
pub fn neighbourhood(origin: Point, dimensions: Dimensions, radius: i32) -> Vec<Point> {
    let mut points = Vec::new();
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            for dz in -radius..=radius {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                let z = origin.z + dz;
                if z < 0 || z >= dimensions.z_i32() {
                    continue;
                }
                points.push(Point::new(
                    wrap(origin.x + dx, dimensions.x_i32()),
                    wrap(origin.y + dy, dimensions.y_i32()),
                    z,
                ));
            }
        }
    }
    points
}

/// Displacement from `from` to `to` in lattice units, taking the shortest
/// in-plane image. The z component is never wrapped.
#[must_use]
pub fn displacement(from: Point, to: Point, dimensions: Dimensions) -> Vector {
    let unwrap_axis = |delta: i32, extent: i32| -> f64 {
        if 2 * delta > extent {
            f64::from(delta - extent)
        } else if 2 * delta < -extent {
            f64::from(delta + extent)
        } else {
            f64::from(delta)
        }
    };
    Vector::new(
        unwrap_axis(to.x - from.x, dimensions.x_i32()),
        unwrap_axis(to.y - from.y, dimensions.y_i32()),
        f64::from(to.z - from.z),
    )
}
