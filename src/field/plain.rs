//! Vector fields laid out like a staggered reference field, without stagger metadata.
//!
//! A plain vector field is a work array for intermediate quantities such as
//! right-hand sides and tentative velocities. Each component copies the
//! shape and index bounds of the matching component of a reference
//! [`VectorField3`], so that the two can be combined positionally. All
//! arithmetic acts on whole padded arrays, ghost cells included, and never
//! communicates. Ghost cells are refreshed only by an explicit [`sync`].
//!
//! [`sync`]: PlainVectorField3::sync

use super::{
    core_view, find_max_abs_value, shape_of, value_in,
    ArrayLayout3, CoordLocation, VectorField3,
};
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
use ndarray::Zip;
use std::sync::Arc;

/// One component of a plain vector field.
#[derive(Debug)]
pub struct PlainField3<F> {
    layout: ArrayLayout3,
    halo: HaloExchange,
    values: Array3<F>,
}

impl<F: BFloat> PlainField3<F> {
    /// Allocates a zero-valued array with the given layout and binds a halo
    /// exchange handle to it, using the given locations for the slab geometry.
    pub fn zeros(
        domain: &Domain,
        layout: ArrayLayout3,
        locations: &In3D<CoordLocation>,
    ) -> Result<Self> {
        let values = Array3::zeros(layout.shape_tuple().f());
        let halo = HaloExchange::new(domain, &values, &layout, locations)?;
        Ok(Self {
            layout,
            halo,
            values,
        })
    }

    /// Returns a reference to the layout of the array of values.
    pub fn layout(&self) -> &ArrayLayout3 {
        &self.layout
    }

    /// Returns a reference to the 3D array of values.
    pub fn values(&self) -> &Array3<F> {
        &self.values
    }

    /// Returns a mutable view of the 3D array of values.
    pub fn values_mut(&mut self) -> ArrayViewMut3<'_, F> {
        self.values.view_mut()
    }

    /// Returns the allocated 3D shape, ghost cells included.
    pub fn shape(&self) -> &In3D<usize> {
        self.layout.shape()
    }

    /// Returns the value at the given index, or `None` if it lies outside
    /// the allocated bounds.
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

/// A 3D vector field mirroring the memory layout of a staggered reference field.
///
/// Transforming operations return the field again so that they can be
/// chained, while assignments are terminal. Every operation with a field
/// operand verifies the shapes of all three components before modifying any.
#[derive(Debug)]
pub struct PlainVectorField3<F> {
    domain: Arc<Domain>,
    components: In3D<PlainField3<F>>,
}

impl<F: BFloat> PlainVectorField3<F> {
    /// Creates a new zero-valued plain vector field whose components have the
    /// same layouts as the components of the given reference field.
    ///
    /// Each component gets its own halo exchange handle, with slab geometry
    /// derived from the domain padding and the locations of the matching
    /// reference component. No communication takes place.
    pub fn new(domain: Arc<Domain>, reference: &VectorField3<F>) -> Result<Self> {
        let create_component = |dim: Dim3| {
            PlainField3::zeros(
                &domain,
                reference.layout(dim).clone(),
                reference.locations(dim),
            )
        };
        let components = In3D::new(
            create_component(X)?,
            create_component(Y)?,
            create_component(Z)?,
        );

        debug!(
            "Created plain vector field mirroring {} with handles {}, {} and {}",
            reference.name(),
            components[X].halo().id(),
            components[Y].halo().id(),
            components[Z].halo().id()
        );
        Ok(Self { domain, components })
    }

    /// Returns a reference to the domain.
    pub fn domain(&self) -> &Domain {
        self.domain.as_ref()
    }

    /// Returns a new atomic reference counted pointer to the domain.
    pub fn arc_with_domain(&self) -> Arc<Domain> {
        Arc::clone(&self.domain)
    }

    /// Returns a reference to the specified component.
    pub fn component(&self, dim: Dim3) -> &PlainField3<F> {
        &self.components[dim]
    }

    /// Returns a reference to the layout of the specified component.
    pub fn layout(&self, dim: Dim3) -> &ArrayLayout3 {
        self.components[dim].layout()
    }

    /// Returns a reference to the 3D array of values for the specified component.
    pub fn values(&self, dim: Dim3) -> &Array3<F> {
        self.components[dim].values()
    }

    /// Returns a mutable view of the 3D array of values for the specified component.
    pub fn values_mut(&mut self, dim: Dim3) -> ArrayViewMut3<'_, F> {
        self.components[dim].values_mut()
    }

    /// Returns a reference to the 3D array of values for each component.
    pub fn all_values(&self) -> In3D<&Array3<F>> {
        In3D::with_each_component(|dim| self.values(dim))
    }

    /// Returns a reference to the halo exchange handle of the specified component.
    pub fn halo(&self, dim: Dim3) -> &HaloExchange {
        self.components[dim].halo()
    }

    /// Returns the value of the specified component at the given index.
    pub fn value_at(&self, dim: Dim3, indices: &Idx3<isize>) -> Option<F> {
        self.components[dim].value_at(indices)
    }

    /// Returns a view of the core region of the specified component.
    pub fn core_values(&self, dim: Dim3) -> ArrayView3<'_, F> {
        self.components[dim].core_values()
    }

    /// Computes the largest local magnitude of the specified component.
    pub fn find_max_abs(&self, dim: Dim3) -> Option<F> {
        self.components[dim].find_max_abs()
    }

    /// Adds the values of the given plain field to this one.
    pub fn add_in_place(&mut self, other: &Self) -> Result<&mut Self> {
        self.combine_with(other.all_values(), |value, operand| *value = *value + operand)?;
        Ok(self)
    }

    /// Subtracts the values of the given plain field from this one.
    pub fn subtract_in_place(&mut self, other: &Self) -> Result<&mut Self> {
        self.combine_with(other.all_values(), |value, operand| *value = *value - operand)?;
        Ok(self)
    }

    /// Adds the values of the given staggered field to this one.
    ///
    /// Only the array shapes have to agree; the locations of the staggered
    /// field are ignored.
    pub fn add_staggered_in_place(&mut self, other: &VectorField3<F>) -> Result<&mut Self> {
        self.combine_with(other.all_values(), |value, operand| *value = *value + operand)?;
        Ok(self)
    }

    /// Subtracts the values of the given staggered field from this one.
    ///
    /// Only the array shapes have to agree; the locations of the staggered
    /// field are ignored.
    pub fn subtract_staggered_in_place(&mut self, other: &VectorField3<F>) -> Result<&mut Self> {
        self.combine_with(other.all_values(), |value, operand| *value = *value - operand)?;
        Ok(self)
    }

    /// Multiplies all values by the given factor.
    pub fn scale_in_place(&mut self, factor: F) -> &mut Self {
        for dim in Dim3::slice() {
            self.components[dim]
                .values
                .par_mapv_inplace(|value| value * factor);
        }
        self
    }

    /// Overwrites all values with those of the given plain field.
    pub fn assign_from(&mut self, other: &Self) -> Result<()> {
        self.combine_with(other.all_values(), |value, operand| *value = operand)
    }

    /// Overwrites all values with those of the given staggered field.
    pub fn assign_from_staggered(&mut self, other: &VectorField3<F>) -> Result<()> {
        self.combine_with(other.all_values(), |value, operand| *value = operand)
    }

    /// Sets every value of every component, ghost cells included, to the given value.
    pub fn fill(&mut self, value: F) {
        for dim in Dim3::slice() {
            self.components[dim].values.fill(value);
        }
    }

    /// Refreshes the ghost cells of all components from the neighboring subdomains.
    pub fn sync<C: Communicator>(&mut self, comm: &C) -> Result<()> {
        for dim in Dim3::slice() {
            self.components[dim].sync(comm)?;
        }
        Ok(())
    }

    fn check_operand_shapes(&self, operands: &In3D<&Array3<F>>) -> Result<()> {
        for dim in Dim3::slice() {
            let found = shape_of(operands[dim]);
            let expected = self.components[dim].shape();
            if &found != expected {
                return Err(FieldError::ShapeMismatch {
                    component: dim,
                    expected: *expected,
                    found,
                });
            }
        }
        Ok(())
    }

    fn combine_with<O>(&mut self, operands: In3D<&Array3<F>>, operation: O) -> Result<()>
    where
        O: Fn(&mut F, F) + Sync + Send,
    {
        self.check_operand_shapes(&operands)?;
        for dim in Dim3::slice() {
            Zip::from(&mut self.components[dim].values)
                .and(operands[dim])
                .par_for_each(|value, &operand| operation(value, operand));
        }
        Ok(())
    }
}
