//! Module to contain some simple math primitives for working with pixel and tile coordinates.

use std::ops;

macro_rules! define_vector {
    ($name:ident $T:ty) => {
        #[derive(Debug, PartialEq, Copy, Clone, Default)]
        #[allow(non_camel_case_types)]
        pub struct $name {
            pub x: $T,
            pub y: $T,
        }

        impl $name {
            pub fn new(x: $T, y: $T) -> Self { Self { x, y } }
        }

        impl_op_ex!{+ |a: &$name, b: &$name| -> $name { $name::new(a.x + b.x, a.y + b.y )}}
        impl_op_ex!{* |a: &$name, b: &$name| -> $name { $name::new(a.x * b.x, a.y * b.y )}}
        impl_op_ex!{/ |a: &$name, b: &$name| -> $name { $name::new(a.x / b.x, a.y / b.y )}}
    };
}

// Pixel and tile sizes are never negative
define_vector!{uvec2 u32}
impl_op_ex_commutative!{* |a: &uvec2, f: &u32| -> uvec2 { uvec2::new(a.x * f, a.y * f )}}
impl Eq for uvec2 {}

impl uvec2 {
    /// Number of cells in a grid of this size.
    pub fn area(&self) -> u64 {
        self.x as u64 * self.y as u64
    }
}

/// Struct that defines a rectangle given by its upper left corner and extends.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Rect {
    pub upper_left: uvec2,
    pub size: uvec2,
}

impl Rect {
    pub fn new(upper_left: uvec2, size: uvec2) -> Self { Self { upper_left, size } }

    /// First row below the rectangle.
    pub fn bottom(&self) -> u32 {
        self.upper_left.y + self.size.y
    }
}
