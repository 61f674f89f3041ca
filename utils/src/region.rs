// Region tracking helpers

use std::cmp::PartialOrd;
use std::ops::Sub;

/// A rectangular region
///
/// This can be used to track crops, display frames, damage
/// boxes, etc. It is determined by its edges:
///   left/top:     the upper left corner
///   right/bottom: the lower right corner, exclusive
#[derive(Debug, PartialEq, Copy, Clone, Default)]
pub struct Rect<T: PartialOrd + Copy + Sub<Output = T>> {
    pub left: T,
    pub top: T,
    pub right: T,
    pub bottom: T,
}

impl<T: PartialOrd + Copy + Sub<Output = T>> Rect<T> {
    pub fn new(left: T, top: T, right: T, bottom: T) -> Rect<T> {
        Rect {
            left: left,
            top: top,
            right: right,
            bottom: bottom,
        }
    }

    pub fn width(&self) -> T {
        self.right - self.left
    }

    pub fn height(&self) -> T {
        self.bottom - self.top
    }

    /// Checks if the point (x,y) is contained within this
    /// Rectangle.
    pub fn contains(&self, x: T, y: T) -> bool {
        x >= self.left && y >= self.top && x < self.right && y < self.bottom
    }
}

/// A set of rectangles
///
/// Surface damage is reported as a list of boxes rather
/// than one bounding rectangle.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Region {
    pub r_rects: Vec<Rect<i32>>,
}

impl Region {
    pub fn new() -> Self {
        Self {
            r_rects: Vec::new(),
        }
    }

    pub fn from_rect(rect: Rect<i32>) -> Self {
        Self {
            r_rects: vec![rect],
        }
    }

    pub fn add(&mut self, rect: Rect<i32>) {
        self.r_rects.push(rect);
    }

    pub fn is_empty(&self) -> bool {
        self.r_rects.is_empty()
    }
}
