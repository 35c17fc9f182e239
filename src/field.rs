//! Scalar and vector fields on padded subdomain arrays.

pub mod layout;
pub mod plain;

use crate::{
    comm::Communicator,
    domain::Domain,
    error::{FieldError, Result},
    geometry::{
        Dim3::{self, X, Y, Z},
        Idx3, In3D,
    },
    halo::HaloExchange,
    num::BFloat,
};
use log::debug;
use ndarray::prelude::*;
use rayon::prelude::*;
use std::{cmp::Ordering, sync::Arc};

pub use layout::{ArrayLayout3, CoordLocation};
pub use plain::{PlainField3, PlainVectorField3};

/// Returns the largest magnitude among the given values, ignoring NaN.
///
/// Returns `None` if every value is NaN.
pub(crate) fn find_max_abs_value<F: BFloat>(values: &Array3<F>) -> Option<F> {
    values
        .par_iter()
        .copied()
        .filter(|value| !value.is_nan())
        .map(|value| value.abs())
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
}

/// Returns a view of the core region of an array with the given layout.
pub(crate) fn core_view<'a, F>(layout: &ArrayLayout3, values: &'a Array3<F>) -> ArrayView3<'a, F> {
    let core_shape = layout.core_shape();
    let [x_range, y_range, z_range] = [X, Y, Z].map(|dim| {
        let start = layout.array_index_along(dim, layout.core_lower_bounds()[dim]);
        start..(start + core_shape[dim])
    });
    values.slice(s![x_range, y_range, z_range])
}

/// Returns the value at the given index in the layout's index space,
/// or `None` if it lies outside the allocated bounds.
pub(crate) fn value_in<F: BFloat>(
    layout: &ArrayLayout3,
    values: &Array3<F>,
    indices: &Idx3<isize>,
) -> Option<F> {
    layout
        .array_indices(indices)
        .map(|array_indices| values[array_indices])
}

/// Returns the 3D shape of the given array.
pub(crate) fn shape_of<F>(values: &Array3<F>) -> In3D<usize> {
    let (nx, ny, nz) = values.dim();
    In3D::new(nx, ny, nz)
}

/// Verifies that the arrays of the three components share the same index origin
/// and core lower bounds, so that a given index refers to the same cell in each.
fn check_component_consistency(layouts: In3D<&ArrayLayout3>) -> Result<()> {
    for dim in [Y, Z] {
        if layouts[dim].lower_bounds() != layouts[X].lower_bounds()
            || layouts[dim].core_lower_bounds() != layouts[X].core_lower_bounds()
        {
            return Err(FieldError::InvalidLayout(format!(
                "{}-component with {} is inconsistent with x-component with {}",
                dim, layouts[dim], layouts[X]
            )));
        }
    }
    Ok(())
}

/// A 3D scalar field on the local subdomain.
///
/// Holds the padded array of values together with its layout and the
/// coordinate locations specifying where in the grid cell the values are
/// defined. The array is laid out in column-major order in memory and is
/// bound to its own halo exchange handle.
#[derive(Debug)]
pub struct ScalarField3<F> {
    name: String,
    layout: ArrayLayout3,
    locations: In3D<CoordLocation>,
    halo: HaloExchange,
    values: Array3<F>,
}

impl<F: BFloat> ScalarField3<F> {
    /// Creates a new scalar field given a name, the domain, the layout and
    /// locations of the values, and the values.
    pub fn new(
        name: String,
        domain: &Domain,
        layout: ArrayLayout3,
        locations: In3D<CoordLocation>,
        values: Array3<F>,
    ) -> Result<Self> {
        let halo = HaloExchange::new(domain, &values, &layout, &locations)?;
        Ok(Self {
            name,
            layout,
            locations,
            halo,
            values,
        })
    }

    /// Creates a new zero-valued scalar field with the given layout and locations.
    pub fn zeros(
        name: String,
        domain: &Domain,
        layout: ArrayLayout3,
        locations: In3D<CoordLocation>,
    ) -> Result<Self> {
        let values = Array3::zeros(layout.shape_tuple().f());
        Self::new(name, domain, layout, locations, values)
    }

    /// Returns a reference to the name of the field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a reference to the layout of the array of values.
    pub fn layout(&self) -> &ArrayLayout3 {
        &self.layout
    }

    /// Returns a reference to the coordinate locations specifying
    /// where in the grid cell the values are defined.
    pub fn locations(&self) -> &In3D<CoordLocation> {
        &self.locations
    }

    /// Returns a reference to the 3D array of field values.
    pub fn values(&self) -> &Array3<F> {
        &self.values
    }

    /// Returns a mutable view of the 3D array of field values.
    pub fn values_mut(&mut self) -> ArrayViewMut3<'_, F> {
        self.values.view_mut()
    }

    /// Returns the allocated 3D shape, ghost cells included.
    pub fn shape(&self) -> &In3D<usize> {
        self.layout.shape()
    }

    /// Returns the field value at the given index, or `None` if it lies
    /// outside the allocated bounds.
    pub fn value_at(&self, indices: &Idx3<isize>) -> Option<F> {
        value_in(&self.layout, &self.values, indices)
    }

    /// Returns a view of the values in the core region.
    pub fn core_values(&self) -> ArrayView3<'_, F> {
        core_view(&self.layout, &self.values)
    }

    /// Computes the largest magnitude of the local values, ghost cells included.
    ///
    /// NaN values are ignored.
    pub fn find_max_abs(&self) -> Option<F> {
        find_max_abs_value(&self.values)
    }

    /// Returns a reference to the halo exchange handle bound to the values.
    pub fn halo(&self) -> &HaloExchange {
        &self.halo
    }

    /// Refreshes the ghost cells from the neighboring subdomains.
    pub fn sync<C: Communicator>(&mut self, comm: &C) -> Result<()> {
        self.halo.sync(&mut self.values, comm)
    }
}

/// A 3D vector field on the local subdomain.
///
/// Each component is a separate scalar field, typically face-located along
/// its own dimension and cell-centered along the others.
#[derive(Debug)]
pub struct VectorField3<F> {
    name: String,
    domain: Arc<Domain>,
    components: In3D<ScalarField3<F>>,
}

impl<F: BFloat> VectorField3<F> {
    /// Creates a new vector field given a name, the domain, and the scalar
    /// fields representing the component values.
    pub fn new(name: String, domain: Arc<Domain>, components: In3D<ScalarField3<F>>) -> Result<Self> {
        check_component_consistency(In3D::with_each_component(|dim| components[dim].layout()))?;
        debug!(
            "Created vector field {} with component shapes {}, {} and {} on {}",
            name,
            components[X].shape(),
            components[Y].shape(),
            components[Z].shape(),
            domain
        );
        Ok(Self {
            name,
            domain,
            components,
        })
    }

    /// Creates a new zero-valued vector field on a subdomain holding the given
    /// number of cells, with each component face-located along its own dimension.
    pub fn zeros(name: String, domain: Arc<Domain>, cell_counts: &In3D<usize>) -> Result<Self> {
        let create_component = |dim: Dim3| -> Result<ScalarField3<F>> {
            let locations = CoordLocation::for_component(dim);
            let layout = ArrayLayout3::for_locations(&domain, cell_counts, &locations)?;
            ScalarField3::zeros(format!("{}{}", name, dim), &domain, layout, locations)
        };
        let components = In3D::new(
            create_component(X)?,
            create_component(Y)?,
            create_component(Z)?,
        );
        Self::new(name, domain, components)
    }

    /// Returns a reference to the name of the field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a reference to the domain.
    pub fn domain(&self) -> &Domain {
        self.domain.as_ref()
    }

    /// Returns a new atomic reference counted pointer to the domain.
    pub fn arc_with_domain(&self) -> Arc<Domain> {
        Arc::clone(&self.domain)
    }

    /// Returns a reference to the scalar field representing the specified
    /// vector field component.
    pub fn component(&self, dim: Dim3) -> &ScalarField3<F> {
        &self.components[dim]
    }

    /// Returns a reference to the layout of the specified component.
    pub fn layout(&self, dim: Dim3) -> &ArrayLayout3 {
        self.components[dim].layout()
    }

    /// Returns a reference to the 3D array of field values for the
    /// specified component.
    pub fn values(&self, dim: Dim3) -> &Array3<F> {
        self.components[dim].values()
    }

    /// Returns a mutable view of the 3D array of field values
    /// for the specified component.
    pub fn values_mut(&mut self, dim: Dim3) -> ArrayViewMut3<'_, F> {
        self.components[dim].values_mut()
    }

    /// Returns a reference to the 3D array of field values for each component.
    pub fn all_values(&self) -> In3D<&Array3<F>> {
        In3D::with_each_component(|dim| self.values(dim))
    }

    /// Returns a reference to the coordinate locations specifying
    /// where in the grid cell the values of the given component are defined.
    pub fn locations(&self, dim: Dim3) -> &In3D<CoordLocation> {
        self.components[dim].locations()
    }

    /// Refreshes the ghost cells of all components from the neighboring subdomains.
    pub fn sync<C: Communicator>(&mut self, comm: &C) -> Result<()> {
        for dim in Dim3::slice() {
            self.components[dim].sync(comm)?;
        }
        Ok(())
    }
}
