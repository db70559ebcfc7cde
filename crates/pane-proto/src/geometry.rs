//! Integer screen-space geometry shared by both ends of the protocol.

/// A point in screen or window-local coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn offset_from(self, other: Point) -> Point {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }
}

/// Axis-aligned rectangle. `right()` and `bottom()` are inclusive edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub location: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            location: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub const fn from_parts(location: Point, size: Size) -> Self {
        Self { location, size }
    }

    pub fn x(&self) -> i32 {
        self.location.x
    }

    pub fn y(&self) -> i32 {
        self.location.y
    }

    pub fn width(&self) -> i32 {
        self.size.width
    }

    pub fn height(&self) -> i32 {
        self.size.height
    }

    pub fn left(&self) -> i32 {
        self.location.x
    }

    pub fn top(&self) -> i32 {
        self.location.y
    }

    pub fn right(&self) -> i32 {
        self.location.x + self.size.width - 1
    }

    pub fn bottom(&self) -> i32 {
        self.location.y + self.size.height - 1
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.location.x + self.size.width / 2,
            self.location.y + self.size.height / 2,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    pub fn set_width(&mut self, width: i32) {
        self.size.width = width;
    }

    pub fn set_height(&mut self, height: i32) {
        self.size.height = height;
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        !other.is_empty()
            && other.left() >= self.left()
            && other.right() <= self.right()
            && other.top() >= self.top()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left() <= other.right()
            && other.left() <= self.right()
            && self.top() <= other.bottom()
            && other.top() <= self.bottom()
    }

    /// Intersection of both rects, empty (zero-sized) when they do not overlap
    pub fn intersected(&self, other: &Rect) -> Rect {
        if !self.intersects(other) {
            return Rect::default();
        }
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect::new(left, top, right - left + 1, bottom - top + 1)
    }

    /// Smallest rect containing both. An empty rect contributes nothing.
    pub fn united(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left + 1, bottom - top + 1)
    }

    /// Grow by `w` horizontally and `h` vertically, keeping the rect centred.
    pub fn inflated(&self, w: i32, h: i32) -> Rect {
        Rect::new(
            self.x() - w / 2,
            self.y() - h / 2,
            self.width() + w,
            self.height() + h,
        )
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::from_parts(self.location.translated(dx, dy), self.size)
    }

    pub fn translated_by(&self, offset: Point) -> Rect {
        self.translated(offset.x, offset.y)
    }

    pub fn center_vertically_within(&mut self, other: &Rect) {
        self.location.y = other.center().y - self.height() / 2;
    }

    pub fn center_within(&mut self, other: &Rect) {
        let center = other.center();
        self.location = Point::new(center.x - self.width() / 2, center.y - self.height() / 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_are_inclusive() {
        let r = Rect::new(10, 20, 5, 4);
        assert_eq!(r.right(), 14);
        assert_eq!(r.bottom(), 23);
        assert!(r.contains(Point::new(14, 23)));
        assert!(!r.contains(Point::new(15, 23)));
    }

    #[test]
    fn test_intersect_and_unite() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersected(&b), Rect::new(5, 5, 5, 5));
        assert_eq!(a.united(&b), Rect::new(0, 0, 15, 15));
        assert!(a.intersected(&Rect::new(20, 20, 1, 1)).is_empty());
        assert_eq!(Rect::default().united(&b), b);
    }

    #[test]
    fn test_inflate_is_centred() {
        assert_eq!(Rect::new(10, 10, 4, 4).inflated(2, 2), Rect::new(9, 9, 6, 6));
    }

    #[test]
    fn test_center_vertically_within() {
        let mut button = Rect::new(0, 0, 15, 15);
        button.center_vertically_within(&Rect::new(20, 2, 100, 17));
        assert_eq!(button.y(), 3);
    }
}
