//! Utilities related to numbers.

use std::fmt;

/// Floating point marker trait for easier control over trait bounds.
///
/// Field values must be plain old data so that halo slabs can be
/// shipped between processes as raw bytes.
pub trait BFloat:
    Sync + Send + num::Float + num::cast::FromPrimitive + bytemuck::Pod + fmt::Debug
{
}

impl BFloat for f32 {}
impl BFloat for f64 {}
