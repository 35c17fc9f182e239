//! Halo exchange handles for padded field arrays.
//!
//! A handle is created for exactly one array and holds everything needed to
//! refresh that array's ghost layers from neighboring subdomains: the slab
//! geometry and the neighbor ranks. Creating a handle never communicates.
//! Ghost layers are only refreshed when [`HaloExchange::sync`] is called.

pub mod slab;

use crate::{
    comm::Communicator,
    domain::Domain,
    error::{FieldError, Result},
    field::layout::{ArrayLayout3, CoordLocation},
    geometry::{Dim2, In2D, In3D, Side},
    num::BFloat,
};
use atomic_counter::{AtomicCounter, RelaxedCounter};
use lazy_static::lazy_static;
use log::{debug, trace};
use ndarray::prelude::*;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

pub use slab::{HaloGeometry, Slab3, SlabPair};

lazy_static! {
    static ref NEXT_HANDLE_ID: RelaxedCounter = RelaxedCounter::new(1);

    /// Maps the buffer address of every bound array to the id of its handle.
    static ref BOUND_ARRAYS: Mutex<HashMap<usize, usize>> = Mutex::new(HashMap::new());
}

fn bound_arrays() -> MutexGuard<'static, HashMap<usize, usize>> {
    BOUND_ARRAYS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn buffer_address<F>(values: &Array3<F>) -> usize {
    values.as_ptr() as usize
}

/// Returns the tag of messages sent towards the given side along the given dimension.
fn message_tag(dim: Dim2, side: Side) -> u16 {
    (2 * dim.num() + side as usize) as u16
}

/// Exclusive handle for exchanging the ghost layers of one array.
///
/// The array is bound to the handle on creation and released when the
/// handle is dropped. An array can be bound to at most one live handle.
#[derive(Debug)]
pub struct HaloExchange {
    id: usize,
    address: usize,
    layout: ArrayLayout3,
    geometry: HaloGeometry,
    neighbors: In2D<[Option<usize>; 2]>,
}

impl HaloExchange {
    /// Creates a handle for the given array, which must have the given layout.
    ///
    /// The slab geometry is derived from the domain's padding and the given
    /// value locations. The owner must drop the handle before the array, so
    /// handles are only created by the field types that own both.
    pub(crate) fn new<F: BFloat>(
        domain: &Domain,
        values: &Array3<F>,
        layout: &ArrayLayout3,
        locations: &In3D<CoordLocation>,
    ) -> Result<Self> {
        if values.shape() != layout.shape().as_array() {
            return Err(FieldError::InvalidLayout(format!(
                "array of shape {:?} does not match layout {}",
                values.shape(),
                layout
            )));
        }
        let geometry = HaloGeometry::new(layout, domain.padding(), locations)?;
        let neighbors = In2D::with_each_component(|dim| {
            [
                domain.neighbor(dim, Side::Lower),
                domain.neighbor(dim, Side::Upper),
            ]
        });

        let address = buffer_address(values);
        let id = {
            let mut bound = bound_arrays();
            if let Some(owner) = bound.get(&address) {
                return Err(FieldError::ResourceOwnership(format!(
                    "array at {:#x} is already bound to halo exchange handle {}",
                    address, owner
                )));
            }
            let id = NEXT_HANDLE_ID.inc();
            bound.insert(address, id);
            id
        };

        debug!(
            "Created halo exchange handle {} for array with {} on {}",
            id, layout, domain
        );
        Ok(Self {
            id,
            address,
            layout: layout.clone(),
            geometry,
            neighbors,
        })
    }

    /// Whether the given array is currently bound to a live handle.
    pub fn is_bound<F>(values: &Array3<F>) -> bool {
        bound_arrays().contains_key(&buffer_address(values))
    }

    /// Returns the process-wide unique id of the handle.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the layout of the bound array.
    pub fn layout(&self) -> &ArrayLayout3 {
        &self.layout
    }

    /// Returns the slab geometry.
    pub fn geometry(&self) -> &HaloGeometry {
        &self.geometry
    }

    /// Returns the rank of the neighbor on the given side along the given dimension.
    pub fn neighbor(&self, dim: Dim2, side: Side) -> Option<usize> {
        self.neighbors[dim][side as usize]
    }

    /// Refreshes the ghost layers of the bound array from the neighboring subdomains.
    ///
    /// The x-dimension is exchanged before the y-dimension. For each, the
    /// lower send slab goes to the lower neighbor while the upper ghost layers
    /// are filled from the upper neighbor, and then the other way around.
    /// Sides without a neighbor are left untouched.
    pub fn sync<F, C>(&self, values: &mut Array3<F>, comm: &C) -> Result<()>
    where
        F: BFloat,
        C: Communicator,
    {
        if buffer_address(values) != self.address {
            return Err(FieldError::ResourceOwnership(format!(
                "halo exchange handle {} used with an array it is not bound to",
                self.id
            )));
        }
        for dim in Dim2::slice() {
            for direction in Side::slice() {
                self.exchange_step(values, comm, dim, direction)?;
            }
        }
        trace!("Synchronized ghost layers for handle {}", self.id);
        Ok(())
    }

    fn exchange_step<F, C>(
        &self,
        values: &mut Array3<F>,
        comm: &C,
        dim: Dim2,
        direction: Side,
    ) -> Result<()>
    where
        F: BFloat,
        C: Communicator,
    {
        let send_slab = self.geometry.send_slab(dim, direction);
        let receive_slab = self.geometry.receive_slab(dim, direction.opposite());
        if send_slab.is_empty() {
            return Ok(());
        }
        let destination = self.neighbor(dim, direction);
        let source = self.neighbor(dim, direction.opposite());
        if destination.is_none() && source.is_none() {
            return Ok(());
        }

        let send_buffer: Option<Vec<F>> = destination.map(|_| self.pack(values, send_slab));
        let mut receive_buffer = vec![F::zero(); receive_slab.len()];

        trace!(
            "Handle {} sending {} towards {} {} neighbor {:?}, receiving {} from {:?}",
            self.id,
            send_slab,
            direction,
            dim,
            destination,
            receive_slab,
            source
        );
        comm.send_receive(
            destination
                .zip(send_buffer.as_deref())
                .map(|(rank, buf)| (rank, bytemuck::cast_slice::<F, u8>(buf))),
            source.map(|rank| {
                (
                    rank,
                    bytemuck::cast_slice_mut::<F, u8>(receive_buffer.as_mut_slice()),
                )
            }),
            message_tag(dim, direction),
        )?;

        if source.is_some() {
            self.unpack(values, receive_slab, &receive_buffer)?;
        }
        Ok(())
    }

    fn pack<F: BFloat>(&self, values: &Array3<F>, slab: &Slab3) -> Vec<F> {
        let [x_range, y_range, z_range] = slab.array_ranges(&self.layout);
        values
            .slice(s![x_range, y_range, z_range])
            .iter()
            .copied()
            .collect()
    }

    fn unpack<F: BFloat>(&self, values: &mut Array3<F>, slab: &Slab3, buffer: &[F]) -> Result<()> {
        let received = ArrayView3::from_shape(slab.extent().to_tuple(), buffer)
            .map_err(|err| FieldError::Communication(err.to_string()))?;
        let [x_range, y_range, z_range] = slab.array_ranges(&self.layout);
        values
            .slice_mut(s![x_range, y_range, z_range])
            .assign(&received);
        Ok(())
    }
}

impl Drop for HaloExchange {
    fn drop(&mut self) {
        let mut bound = bound_arrays();
        if bound.get(&self.address) == Some(&self.id) {
            bound.remove(&self.address);
        }
        trace!("Released halo exchange handle {}", self.id);
    }
}
