use derive_more::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use serde::{Deserialize, Serialize};
use std::ops;

/// Below this length a vector is considered degenerate
pub const EPSILON: f32 = 1e-6;

/// 2D vector with f32 coordinates
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Default,
    Serialize,
    Deserialize,
    Add,
    AddAssign,
    Sub,
    SubAssign,
    Neg,
    Mul,
    Div,
)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// Create a new vector
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Create a zero vector
    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Return the component-wise maximum of two vectors
    pub fn max(self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
        }
    }

    /// Return the sum of x and y components
    pub fn sum(self) -> f32 {
        self.x + self.y
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 3D cross product
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Unit vector in the same direction, or zero for a degenerate vector
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len < EPSILON {
            Self::zero()
        } else {
            self / len
        }
    }

    /// Counter-clockwise perpendicular
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// 2D point with f32 coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn to_vec(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Linear interpolation, `t = 0` is `self` and `t = 1` is `other`
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl ops::Sub for Point {
    type Output = Vec2;

    fn sub(self, rhs: Self) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl ops::Add<Vec2> for Point {
    type Output = Point;

    fn add(self, rhs: Vec2) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl ops::AddAssign<Vec2> for Point {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl ops::SubAssign<Vec2> for Point {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl ops::Sub<Vec2> for Point {
    type Output = Point;

    fn sub(self, rhs: Vec2) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Axis aligned rectangle, `(x, y)` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_position(position: Point, size: Vec2) -> Self {
        Self::new(position.x, position.y, size.x, size.y)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Grow the rectangle by `dx` on the left and right and `dy` on the top and bottom
    pub fn inflate(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// Overlap depth along each axis, `None` when the rectangles are disjoint
    pub fn overlap(&self, other: &Self) -> Option<Vec2> {
        let dx = self.right().min(other.right()) - self.left().max(other.left());
        let dy = self.bottom().min(other.bottom()) - self.top().max(other.top());
        (dx > 0.0 && dy > 0.0).then(|| Vec2::new(dx, dy))
    }

    pub fn union(&self, other: &Self) -> Self {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::new(left, top, right - left, bottom - top)
    }

    /// Clamp a point inside the rectangle
    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.left(), self.right()),
            point.y.clamp(self.top(), self.bottom()),
        )
    }

    /// Point where a ray starting inside the rectangle leaves it
    ///
    /// Returns `origin` unchanged for a degenerate direction.
    pub fn exit_point(&self, origin: Point, direction: Vec2) -> Point {
        let mut t = f32::INFINITY;
        if direction.x > EPSILON {
            t = t.min((self.right() - origin.x) / direction.x);
        } else if direction.x < -EPSILON {
            t = t.min((self.left() - origin.x) / direction.x);
        }
        if direction.y > EPSILON {
            t = t.min((self.bottom() - origin.y) / direction.y);
        } else if direction.y < -EPSILON {
            t = t.min((self.top() - origin.y) / direction.y);
        }

        if t.is_finite() {
            origin + direction * t.max(0.0)
        } else {
            origin
        }
    }

    /// Point where a ray starting inside the inscribed circle leaves it
    pub fn circle_exit_point(&self, origin: Point, direction: Vec2) -> Point {
        let radius = self.width.min(self.height) / 2.0;
        let dir = direction.normalized();
        if dir == Vec2::zero() {
            return origin;
        }

        // |origin + dir * t - center| = radius
        let offset = origin - self.center();
        let b = offset.dot(dir);
        let c = offset.length_squared() - radius * radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return origin;
        }
        let t = -b + discriminant.sqrt();
        origin + dir * t.max(0.0)
    }
}

/// Angle of the vector from `from` to `to`, in radians
pub fn angle(from: Point, to: Point) -> f32 {
    let v = to - from;
    v.y.atan2(v.x)
}

/// Intersection of the infinite lines through `(a1, a2)` and `(b1, b2)`
pub fn line_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denominator = r.cross(s);
    if denominator.abs() < EPSILON {
        return None;
    }
    let t = (b1 - a1).cross(s) / denominator;
    Some(a1 + r * t)
}

/// Intersection of the segments `[a1, a2]` and `[b1, b2]`
pub fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denominator = r.cross(s);
    if denominator.abs() < EPSILON {
        return None;
    }
    let t = (b1 - a1).cross(s) / denominator;
    let u = (b1 - a1).cross(r) / denominator;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then(|| a1 + r * t)
}

/// Smallest rectangle containing all the given rectangles
pub fn bounding_rect<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
    rects.into_iter().fold(None, |acc, rect| match acc {
        None => Some(*rect),
        Some(acc) => Some(acc.union(rect)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-4
    }

    #[test]
    fn test_rect_exit_point_from_center() {
        let rect = Rect::new(0.0, 0.0, 20.0, 20.0);
        let exit = rect.exit_point(rect.center(), Vec2::new(100.0, 0.0));
        assert!(close(exit, Point::new(20.0, 10.0)));

        let exit = rect.exit_point(rect.center(), Vec2::new(10.0, 10.0));
        assert!(close(exit, Point::new(20.0, 20.0)));

        let exit = rect.exit_point(rect.center(), Vec2::new(0.0, -3.0));
        assert!(close(exit, Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_degenerate_direction_stays_put() {
        let rect = Rect::new(0.0, 0.0, 20.0, 20.0);
        assert_eq!(rect.exit_point(rect.center(), Vec2::zero()), rect.center());
        assert_eq!(
            rect.circle_exit_point(rect.center(), Vec2::zero()),
            rect.center()
        );
    }

    #[test]
    fn test_circle_exit_point() {
        let rect = Rect::new(0.0, 0.0, 20.0, 40.0);
        let exit = rect.circle_exit_point(rect.center(), Vec2::new(1.0, 0.0));
        assert!(close(exit, Point::new(20.0, 20.0)));
        let exit = rect.circle_exit_point(rect.center(), Vec2::new(0.0, 1.0));
        assert!(close(exit, Point::new(10.0, 30.0)));
    }

    #[test]
    fn test_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 8.0, 10.0, 10.0);
        assert_eq!(a.overlap(&b), Some(Vec2::new(5.0, 2.0)));
        let c = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(a.overlap(&c), None);
    }

    #[test]
    fn test_segment_intersection() {
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        );
        assert!(close(hit.unwrap(), Point::new(5.0, 5.0)));

        let miss = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        );
        assert!(miss.is_none());

        let parallel = line_intersection(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
        );
        assert!(parallel.is_none());
    }

    #[test]
    fn test_angle_and_midpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 10.0);
        assert!((angle(a, b) - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(a.midpoint(b), Point::new(0.0, 5.0));
        assert!((a.distance(b) - 10.0).abs() < 1e-6);
    }
}
