//! Shape and index bounds of padded field arrays.

use crate::{
    domain::Domain,
    error::{FieldError, Result},
    geometry::{
        Dim3::{self, X, Y, Z},
        Idx3, In3D,
    },
};
use std::fmt;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Location in the grid cell where values are defined along one dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum CoordLocation {
    /// Values sit at cell centers.
    Center = 0,
    /// Values sit on cell faces, including both faces bounding the subdomain.
    Face = 1,
}

impl CoordLocation {
    /// Returns the locations of the given velocity-like component: on the
    /// faces normal to its own dimension and at cell centers along the others.
    pub fn for_component(component: Dim3) -> In3D<Self> {
        In3D::with_each_component(|dim| {
            if dim == component {
                Self::Face
            } else {
                Self::Center
            }
        })
    }

    /// Returns the number of core points along a dimension holding the given number of cells.
    pub fn point_count(self, cell_count: usize) -> usize {
        match self {
            Self::Center => cell_count,
            Self::Face => cell_count + 1,
        }
    }
}

impl fmt::Display for CoordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Center => "center",
            Self::Face => "face",
        })
    }
}

/// Allocated shape and index bounds of a padded 3D array.
///
/// Indices run from `lower_bounds` to `upper_bounds` inclusive along each
/// dimension. The core region, owned and updated by the local process, runs
/// from `core_lower_bounds` to `core_upper_bounds`; everything else is ghost
/// cells.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ArrayLayout3 {
    shape: In3D<usize>,
    lower_bounds: Idx3<isize>,
    core_lower_bounds: Idx3<isize>,
    core_upper_bounds: Idx3<isize>,
}

impl ArrayLayout3 {
    /// Creates a new layout, verifying that it is non-degenerate and that the
    /// core region lies inside the allocated bounds.
    pub fn new(
        shape: In3D<usize>,
        lower_bounds: Idx3<isize>,
        core_lower_bounds: Idx3<isize>,
        core_upper_bounds: Idx3<isize>,
    ) -> Result<Self> {
        let layout = Self {
            shape,
            lower_bounds,
            core_lower_bounds,
            core_upper_bounds,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Creates the layout of an array whose core region starts at index zero,
    /// has the given shape, and is surrounded by the given number of ghost layers.
    pub fn padded(core_shape: In3D<usize>, padding: &In3D<usize>) -> Result<Self> {
        Self::new(
            In3D::with_each_component(|dim| core_shape[dim] + 2 * padding[dim]),
            Idx3::with_each_component(|dim| -(padding[dim] as isize)),
            Idx3::origin(),
            Idx3::with_each_component(|dim| core_shape[dim] as isize - 1),
        )
    }

    /// Creates the layout of a field with the given locations on a subdomain
    /// holding the given number of cells, padded as the domain specifies.
    pub fn for_locations(
        domain: &Domain,
        cell_counts: &In3D<usize>,
        locations: &In3D<CoordLocation>,
    ) -> Result<Self> {
        Self::padded(
            In3D::with_each_component(|dim| locations[dim].point_count(cell_counts[dim])),
            domain.padding(),
        )
    }

    fn validate(&self) -> Result<()> {
        for dim in Dim3::slice() {
            if self.shape[dim] == 0 {
                return Err(FieldError::InvalidLayout(format!(
                    "array has zero extent along {}",
                    dim
                )));
            }
            if self.core_lower_bounds[dim] > self.core_upper_bounds[dim] {
                return Err(FieldError::InvalidLayout(format!(
                    "core region is empty along {}: [{}, {}]",
                    dim, self.core_lower_bounds[dim], self.core_upper_bounds[dim]
                )));
            }
            if self.core_lower_bounds[dim] < self.lower_bounds[dim]
                || self.core_upper_bounds[dim] > self.upper_bound(dim)
            {
                return Err(FieldError::InvalidLayout(format!(
                    "core region [{}, {}] exceeds array bounds [{}, {}] along {}",
                    self.core_lower_bounds[dim],
                    self.core_upper_bounds[dim],
                    self.lower_bounds[dim],
                    self.upper_bound(dim),
                    dim
                )));
            }
        }
        Ok(())
    }

    /// Returns the allocated shape, ghost cells included.
    pub fn shape(&self) -> &In3D<usize> {
        &self.shape
    }

    /// Returns the `(x, y, z)` shape tuple, for allocating arrays.
    pub fn shape_tuple(&self) -> (usize, usize, usize) {
        self.shape.to_tuple()
    }

    /// Returns the total number of allocated points.
    pub fn len(&self) -> usize {
        self.shape[X] * self.shape[Y] * self.shape[Z]
    }

    /// Whether the layout holds no points. Never true for a validated layout.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the index of the first allocated point, which is the index origin.
    pub fn lower_bounds(&self) -> &Idx3<isize> {
        &self.lower_bounds
    }

    /// Returns the highest valid index along the given dimension.
    pub fn upper_bound(&self, dim: Dim3) -> isize {
        self.lower_bounds[dim] + self.shape[dim] as isize - 1
    }

    /// Returns the index of the last allocated point.
    pub fn upper_bounds(&self) -> Idx3<isize> {
        Idx3::with_each_component(|dim| self.upper_bound(dim))
    }

    /// Returns the index of the first core point.
    pub fn core_lower_bounds(&self) -> &Idx3<isize> {
        &self.core_lower_bounds
    }

    /// Returns the index of the last core point.
    pub fn core_upper_bounds(&self) -> &Idx3<isize> {
        &self.core_upper_bounds
    }

    /// Returns the number of core points along each dimension.
    pub fn core_shape(&self) -> In3D<usize> {
        In3D::with_each_component(|dim| {
            (self.core_upper_bounds[dim] - self.core_lower_bounds[dim] + 1) as usize
        })
    }

    /// Whether the given index lies inside the allocated bounds.
    pub fn contains(&self, indices: &Idx3<isize>) -> bool {
        Dim3::slice().iter().all(|&dim| {
            indices[dim] >= self.lower_bounds[dim] && indices[dim] <= self.upper_bound(dim)
        })
    }

    /// Converts an index in the layout's index space into a zero-based array
    /// index, or returns `None` if it lies outside the allocated bounds.
    pub fn array_indices(&self, indices: &Idx3<isize>) -> Option<[usize; 3]> {
        if self.contains(indices) {
            Some([X, Y, Z].map(|dim| (indices[dim] - self.lower_bounds[dim]) as usize))
        } else {
            None
        }
    }

    /// Converts a single index along one dimension into a zero-based array index.
    ///
    /// The index must lie inside the allocated bounds.
    pub fn array_index_along(&self, dim: Dim3, index: isize) -> usize {
        debug_assert!(index >= self.lower_bounds[dim] && index <= self.upper_bound(dim));
        (index - self.lower_bounds[dim]) as usize
    }
}

impl fmt::Display for ArrayLayout3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shape {} from {} with core {} to {}",
            self.shape, self.lower_bounds, self.core_lower_bounds, self.core_upper_bounds
        )
    }
}
