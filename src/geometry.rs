//! Core geometry types: Point, Size, Bounds, Transform.
//!
//! Scene coordinates are `f64`. [`Bounds`] is a 3D axis-aligned box with an
//! explicit empty state; [`Transform`] is a 2D affine matrix plus a z offset,
//! which is all the bounds machinery needs to reason about.

use std::ops::{Add, Mul, Sub};

// ---------------------------------------------------------------------------
// Point
// ---------------------------------------------------------------------------

/// A 2D position in scene or local coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// The origin.
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// A 2D extent (width x height).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    /// A zero-sized size.
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    /// The largest representable size, used as the default maximum.
    pub const MAX: Size = Size { width: f64::MAX, height: f64::MAX };

    /// Create a new size.
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Clamp each axis into `min..=max`. `min` wins when the range is inverted.
    #[inline]
    pub fn clamp(self, min: Size, max: Size) -> Size {
        Size {
            width: self.width.min(max.width).max(min.width),
            height: self.height.min(max.height).max(min.height),
        }
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// An axis-aligned 3D box stored as min/max extents.
///
/// A box is empty when any max is smaller than its min. Empty boxes are
/// absorbed by [`Bounds::union`] and survive every transform unchanged.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds {
    /// The canonical empty box.
    pub const EMPTY: Bounds = Bounds {
        min_x: 0.0,
        min_y: 0.0,
        min_z: 0.0,
        max_x: -1.0,
        max_y: -1.0,
        max_z: -1.0,
    };

    /// Create a box from all six extents.
    #[inline]
    pub const fn new(min_x: f64, min_y: f64, min_z: f64, max_x: f64, max_y: f64, max_z: f64) -> Self {
        Self { min_x, min_y, min_z, max_x, max_y, max_z }
    }

    /// Create a flat box (z = 0) from its 2D extents.
    #[inline]
    pub const fn new_2d(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(min_x, min_y, 0.0, max_x, max_y, 0.0)
    }

    /// Create a flat box from an origin and a size.
    #[inline]
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new_2d(x, y, x + width, y + height)
    }

    /// Whether the box contains no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y || self.max_z < self.min_z
    }

    #[inline]
    pub fn width(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max_x - self.min_x }
    }

    #[inline]
    pub fn height(&self) -> f64 {
        if self.is_empty() { 0.0 } else { self.max_y - self.min_y }
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Bounds) -> Bounds {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            min_z: self.min_z.min(other.min_z),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
            max_z: self.max_z.max(other.max_z),
        }
    }

    /// Offset every extent. Empty boxes stay empty.
    pub fn translate(&self, dx: f64, dy: f64, dz: f64) -> Bounds {
        if self.is_empty() {
            return *self;
        }
        Bounds {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            min_z: self.min_z + dz,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
            max_z: self.max_z + dz,
        }
    }

    /// Inclusive 2D containment test.
    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        !self.is_empty()
            && p.x >= self.min_x
            && p.x <= self.max_x
            && p.y >= self.min_y
            && p.y <= self.max_y
    }

    /// Whether the two boxes overlap in 2D.
    pub fn intersects(&self, other: &Bounds) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// A 2D affine transform with an additional z translation.
///
/// ```text
/// | mxx mxy tx |
/// | myx myy ty |   z' = z + tz
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub mxx: f64,
    pub mxy: f64,
    pub tx: f64,
    pub myx: f64,
    pub myy: f64,
    pub ty: f64,
    pub tz: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        mxx: 1.0,
        mxy: 0.0,
        tx: 0.0,
        myx: 0.0,
        myy: 1.0,
        ty: 0.0,
        tz: 0.0,
    };

    #[inline]
    pub const fn translation(tx: f64, ty: f64) -> Self {
        Self::translation_3d(tx, ty, 0.0)
    }

    #[inline]
    pub const fn translation_3d(tx: f64, ty: f64, tz: f64) -> Self {
        Transform { tx, ty, tz, ..Self::IDENTITY }
    }

    #[inline]
    pub const fn scale(sx: f64, sy: f64) -> Self {
        Transform { mxx: sx, myy: sy, ..Self::IDENTITY }
    }

    /// Rotation about the origin, in degrees.
    pub fn rotation(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Transform { mxx: cos, mxy: -sin, myx: sin, myy: cos, ..Self::IDENTITY }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// True when the linear part is the identity matrix.
    #[inline]
    pub fn is_translate_or_identity(&self) -> bool {
        self.mxx == 1.0 && self.mxy == 0.0 && self.myx == 0.0 && self.myy == 1.0
    }

    /// `self * rhs`: applies `rhs` first, then `self`.
    pub fn concat(&self, rhs: &Transform) -> Transform {
        Transform {
            mxx: self.mxx * rhs.mxx + self.mxy * rhs.myx,
            mxy: self.mxx * rhs.mxy + self.mxy * rhs.myy,
            tx: self.mxx * rhs.tx + self.mxy * rhs.ty + self.tx,
            myx: self.myx * rhs.mxx + self.myy * rhs.myx,
            myy: self.myx * rhs.mxy + self.myy * rhs.myy,
            ty: self.myx * rhs.tx + self.myy * rhs.ty + self.ty,
            tz: self.tz + rhs.tz,
        }
    }

    #[inline]
    pub fn transform_point(&self, p: Point) -> Point {
        Point {
            x: self.mxx * p.x + self.mxy * p.y + self.tx,
            y: self.myx * p.x + self.myy * p.y + self.ty,
        }
    }

    /// Map a point back through the transform. `None` when the matrix is singular.
    pub fn inverse_transform_point(&self, p: Point) -> Option<Point> {
        let det = self.mxx * self.myy - self.mxy * self.myx;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let x = p.x - self.tx;
        let y = p.y - self.ty;
        Some(Point {
            x: (self.myy * x - self.mxy * y) / det,
            y: (self.mxx * y - self.myx * x) / det,
        })
    }

    /// Axis-aligned bounds of the transformed box.
    ///
    /// Translations are applied directly; any other transform maps the four
    /// corners and takes their extent.
    pub fn transform_bounds(&self, b: &Bounds) -> Bounds {
        if b.is_empty() {
            return *b;
        }
        if self.is_translate_or_identity() {
            return b.translate(self.tx, self.ty, self.tz);
        }
        let corners = [
            self.transform_point(Point::new(b.min_x, b.min_y)),
            self.transform_point(Point::new(b.max_x, b.min_y)),
            self.transform_point(Point::new(b.min_x, b.max_y)),
            self.transform_point(Point::new(b.max_x, b.max_y)),
        ];
        let mut out = Bounds::new(
            f64::INFINITY,
            f64::INFINITY,
            b.min_z + self.tz,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            b.max_z + self.tz,
        );
        for c in corners {
            out.min_x = out.min_x.min(c.x);
            out.min_y = out.min_y.min(c.y);
            out.max_x = out.max_x.max(c.x);
            out.max_y = out.max_y.max(c.y);
        }
        out
    }
}

impl Mul for Transform {
    type Output = Transform;
    #[inline]
    fn mul(self, rhs: Transform) -> Transform {
        self.concat(&rhs)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
