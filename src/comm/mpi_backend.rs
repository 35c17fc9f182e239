//! MPI backend for inter-process message passing.

use super::Communicator;
use crate::error::{FieldError, Result};
use mpi::{
    environment::Universe,
    topology::SimpleCommunicator,
    traits::{Communicator as MpiCommunicator, Destination, Source},
};

/// Communicator wrapping the MPI world communicator.
///
/// MPI is finalized when this value is dropped.
pub struct MpiComm {
    world: SimpleCommunicator,
    _universe: Universe,
}

impl MpiComm {
    /// Initializes MPI and wraps the world communicator.
    pub fn initialize() -> Result<Self> {
        let universe = mpi::initialize().ok_or_else(|| {
            FieldError::Communication("MPI has already been initialized".to_string())
        })?;
        let world = universe.world();
        Ok(Self {
            world,
            _universe: universe,
        })
    }

    fn process_rank(peer: usize) -> mpi::Rank {
        peer as mpi::Rank
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn send_receive(
        &self,
        send: Option<(usize, &[u8])>,
        receive: Option<(usize, &mut [u8])>,
        tag: u16,
    ) -> Result<()> {
        let tag = mpi::Tag::from(tag);
        match (send, receive) {
            (Some((destination, send_buf)), Some((source, receive_buf))) => {
                let destination = self.world.process_at_rank(Self::process_rank(destination));
                let source = self.world.process_at_rank(Self::process_rank(source));
                mpi::point_to_point::send_receive_into_with_tags(
                    send_buf,
                    &destination,
                    tag,
                    receive_buf,
                    &source,
                    tag,
                );
            }
            (Some((destination, send_buf)), None) => {
                self.world
                    .process_at_rank(Self::process_rank(destination))
                    .send_with_tag(send_buf, tag);
            }
            (None, Some((source, receive_buf))) => {
                self.world
                    .process_at_rank(Self::process_rank(source))
                    .receive_into_with_tag(receive_buf, tag);
            }
            (None, None) => {}
        }
        Ok(())
    }
}
