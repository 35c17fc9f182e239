//! Geometry of the ghost-layer slabs exchanged with neighboring subdomains.

use crate::{
    error::{FieldError, Result},
    field::layout::{ArrayLayout3, CoordLocation},
    geometry::{
        Dim2,
        Dim3::{self, X, Y, Z},
        Idx3, In2D, In3D, Side,
    },
};
use std::{fmt, ops::Range};

/// A box-shaped block of points in the index space of a padded array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slab3 {
    start: Idx3<isize>,
    extent: In3D<usize>,
}

impl Slab3 {
    /// Creates a new slab starting at the given index with the given extent.
    pub fn new(start: Idx3<isize>, extent: In3D<usize>) -> Self {
        Self { start, extent }
    }

    /// Returns the index of the first point in the slab.
    pub fn start(&self) -> &Idx3<isize> {
        &self.start
    }

    /// Returns the number of points along each dimension.
    pub fn extent(&self) -> &In3D<usize> {
        &self.extent
    }

    /// Returns the total number of points.
    pub fn len(&self) -> usize {
        self.extent[X] * self.extent[Y] * self.extent[Z]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the zero-based array index ranges covered by the slab
    /// in an array with the given layout.
    pub fn array_ranges(&self, layout: &ArrayLayout3) -> [Range<usize>; 3] {
        [X, Y, Z].map(|dim| {
            let start = layout.array_index_along(dim, self.start[dim]);
            start..(start + self.extent[dim])
        })
    }
}

impl fmt::Display for Slab3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} points from {}", self.extent, self.start)
    }
}

/// The slab sent to a neighbor and the slab received from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlabPair {
    pub send: Slab3,
    pub receive: Slab3,
}

/// Send and receive slabs for both sides along both decomposed dimensions.
///
/// Along the exchanged dimension, exactly `padding` layers are exchanged on
/// each side. Received slabs cover the ghost layers just outside the core
/// region. Sent slabs cover the outermost core layers, except that for
/// face-located values the boundary face is shared with the neighbor and
/// therefore skipped. Along the other two dimensions slabs span the whole
/// allocated extent, so that exchanging x before y also fills the corners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HaloGeometry {
    slabs: In2D<[SlabPair; 2]>,
}

impl HaloGeometry {
    /// Derives the slab geometry for an array with the given layout,
    /// ghost layer widths and value locations.
    pub fn new(
        layout: &ArrayLayout3,
        padding: &In3D<usize>,
        locations: &In3D<CoordLocation>,
    ) -> Result<Self> {
        for dim in Dim2::slice() {
            Self::check_room_for_padding(layout, dim.to_dim3(), padding, locations)?;
        }
        let slabs = In2D::with_each_component(|dim| {
            let dim = dim.to_dim3();
            [
                Self::slab_pair(layout, dim, padding[dim], locations[dim], Side::Lower),
                Self::slab_pair(layout, dim, padding[dim], locations[dim], Side::Upper),
            ]
        });
        Ok(Self { slabs })
    }

    /// Returns the send and receive slabs on the given side along the given dimension.
    pub fn slabs(&self, dim: Dim2, side: Side) -> &SlabPair {
        &self.slabs[dim][side as usize]
    }

    /// Returns the slab sent to the neighbor on the given side.
    pub fn send_slab(&self, dim: Dim2, side: Side) -> &Slab3 {
        &self.slabs(dim, side).send
    }

    /// Returns the slab of ghost layers received from the neighbor on the given side.
    pub fn receive_slab(&self, dim: Dim2, side: Side) -> &Slab3 {
        &self.slabs(dim, side).receive
    }

    fn check_room_for_padding(
        layout: &ArrayLayout3,
        dim: Dim3,
        padding: &In3D<usize>,
        locations: &In3D<CoordLocation>,
    ) -> Result<()> {
        let pad = padding[dim];
        if pad == 0 {
            return Ok(());
        }
        let pad_isize = pad as isize;
        let core_lower = layout.core_lower_bounds()[dim];
        let core_upper = layout.core_upper_bounds()[dim];

        if layout.lower_bounds()[dim] > core_lower - pad_isize
            || layout.upper_bound(dim) < core_upper + pad_isize
        {
            return Err(FieldError::InvalidLayout(format!(
                "array bounds [{}, {}] along {} cannot hold {} ghost layers around core [{}, {}]",
                layout.lower_bounds()[dim],
                layout.upper_bound(dim),
                dim,
                pad,
                core_lower,
                core_upper
            )));
        }

        let required_core_points = match locations[dim] {
            CoordLocation::Center => pad,
            CoordLocation::Face => pad + 1,
        };
        if layout.core_shape()[dim] < required_core_points {
            return Err(FieldError::InvalidLayout(format!(
                "{} core points along {} are too few to fill {} ghost layers of {}-located values",
                layout.core_shape()[dim],
                dim,
                pad,
                locations[dim]
            )));
        }
        Ok(())
    }

    fn slab_pair(
        layout: &ArrayLayout3,
        exchange_dim: Dim3,
        pad: usize,
        location: CoordLocation,
        side: Side,
    ) -> SlabPair {
        let pad_isize = pad as isize;
        let core_lower = layout.core_lower_bounds()[exchange_dim];
        let core_upper = layout.core_upper_bounds()[exchange_dim];
        let shared_face = match location {
            CoordLocation::Center => 0,
            CoordLocation::Face => 1,
        };

        let (send_start, receive_start) = match side {
            Side::Lower => (core_lower + shared_face, core_lower - pad_isize),
            Side::Upper => (core_upper - pad_isize + 1 - shared_face, core_upper + 1),
        };

        let slab_starting_at = |start: isize| {
            let mut start_indices = *layout.lower_bounds();
            start_indices[exchange_dim] = start;
            let mut extent = *layout.shape();
            extent[exchange_dim] = pad;
            Slab3::new(start_indices, extent)
        };

        SlabPair {
            send: slab_starting_at(send_start),
            receive: slab_starting_at(receive_start),
        }
    }
}
