//! Domain decomposition descriptor.
//!
//! The global grid is split between processes along the x- and y-dimensions
//! only, in a rectangular grid of processes. Each process owns one local
//! subdomain whose arrays are padded with ghost layers of a fixed width along
//! every dimension. The descriptor is immutable once created and is meant to
//! be shared by reference between all fields of a run.

use crate::{
    comm::Communicator,
    error::{FieldError, Result},
    geometry::{Dim2, In2D, In3D, Side},
};
use log::debug;
use std::fmt;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Configuration parameters for a domain decomposition.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct DomainConfig {
    /// Number of processes along the x- and y-dimensions.
    pub process_counts: In2D<usize>,
    /// Whether the global domain wraps around along the x- and y-dimensions.
    pub periodicity: In2D<bool>,
    /// Number of ghost layers padding the local arrays along each dimension.
    pub padding: In3D<usize>,
}

impl DomainConfig {
    pub const DEFAULT_PADDING: usize = 1;

    /// Returns the configuration with the given number of processes along x and y.
    pub fn with_process_counts(mut self, x_count: usize, y_count: usize) -> Self {
        self.process_counts = In2D::new(x_count, y_count);
        self
    }

    /// Returns the configuration with the given periodicity along x and y.
    pub fn with_periodicity(mut self, x_periodic: bool, y_periodic: bool) -> Self {
        self.periodicity = In2D::new(x_periodic, y_periodic);
        self
    }

    /// Returns the configuration with the given ghost layer widths.
    pub fn with_padding(mut self, padding: In3D<usize>) -> Self {
        self.padding = padding;
        self
    }

    /// Returns the total number of processes the configuration describes.
    pub fn process_count(&self) -> usize {
        self.process_counts[Dim2::X] * self.process_counts[Dim2::Y]
    }

    /// Parses a configuration from a JSON document.
    #[cfg(feature = "json")]
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| FieldError::InvalidConfig(err.to_string()))
    }

    fn validate(&self) -> Result<()> {
        for dim in Dim2::slice() {
            if self.process_counts[dim] == 0 {
                return Err(FieldError::InvalidConfig(format!(
                    "number of processes along {} must be positive",
                    dim
                )));
            }
        }
        Ok(())
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            process_counts: In2D::same(1),
            periodicity: In2D::same(false),
            padding: In3D::same(Self::DEFAULT_PADDING),
        }
    }
}

/// Position of one process in the process grid, and its neighbors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankTopology {
    rank: usize,
    size: usize,
    coords: In2D<usize>,
    neighbors: In2D<[Option<usize>; 2]>,
}

impl RankTopology {
    fn new(config: &DomainConfig, rank: usize) -> Self {
        let counts = &config.process_counts;
        let coords = In2D::new(rank % counts[Dim2::X], rank / counts[Dim2::X]);

        let rank_at = |dim: Dim2, coord: usize| {
            let mut neighbor_coords = coords;
            neighbor_coords[dim] = coord;
            neighbor_coords[Dim2::X] + counts[Dim2::X] * neighbor_coords[Dim2::Y]
        };

        let neighbors = In2D::with_each_component(|dim| {
            let count = counts[dim];
            let coord = coords[dim];
            let periodic = config.periodicity[dim];

            let lower = if coord > 0 {
                Some(rank_at(dim, coord - 1))
            } else if periodic {
                Some(rank_at(dim, count - 1))
            } else {
                None
            };
            let upper = if coord + 1 < count {
                Some(rank_at(dim, coord + 1))
            } else if periodic {
                Some(rank_at(dim, 0))
            } else {
                None
            };
            [lower, upper]
        });

        Self {
            rank,
            size: config.process_count(),
            coords,
            neighbors,
        }
    }

    /// Returns the rank of this process.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Returns the total number of processes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the position of this process in the process grid.
    pub fn coords(&self) -> &In2D<usize> {
        &self.coords
    }

    /// Returns the rank of the neighboring process on the given side along the
    /// given dimension, or `None` if the subdomain lies at a non-periodic boundary.
    pub fn neighbor(&self, dim: Dim2, side: Side) -> Option<usize> {
        self.neighbors[dim][side as usize]
    }
}

/// Describes the local subdomain of one process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    config: DomainConfig,
    topology: RankTopology,
}

impl Domain {
    /// Creates the descriptor for the process with the given rank.
    pub fn new(config: DomainConfig, rank: usize) -> Result<Self> {
        config.validate()?;
        if rank >= config.process_count() {
            return Err(FieldError::InvalidConfig(format!(
                "rank {} out of range for {} processes",
                rank,
                config.process_count()
            )));
        }
        let topology = RankTopology::new(&config, rank);
        debug!(
            "Created domain for rank {} of {} at process coordinates {} with padding {}",
            rank,
            topology.size(),
            topology.coords(),
            config.padding
        );
        Ok(Self { config, topology })
    }

    /// Creates the descriptor for the process represented by the given communicator.
    pub fn for_communicator<C: Communicator>(config: DomainConfig, comm: &C) -> Result<Self> {
        if comm.size() != config.process_count() {
            return Err(FieldError::InvalidConfig(format!(
                "communicator holds {} processes but the process grid needs {}",
                comm.size(),
                config.process_count()
            )));
        }
        Self::new(config, comm.rank())
    }

    /// Creates the descriptor for a single undecomposed process.
    pub fn serial(padding: In3D<usize>) -> Self {
        let config = DomainConfig::default().with_padding(padding);
        let topology = RankTopology::new(&config, 0);
        Self { config, topology }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    /// Returns a reference to the rank topology.
    pub fn topology(&self) -> &RankTopology {
        &self.topology
    }

    /// Returns the rank of this process.
    pub fn rank(&self) -> usize {
        self.topology.rank()
    }

    /// Returns the rank of the neighbor on the given side along the given dimension.
    pub fn neighbor(&self, dim: Dim2, side: Side) -> Option<usize> {
        self.topology.neighbor(dim, side)
    }

    /// Returns the ghost layer widths along each dimension.
    pub fn padding(&self) -> &In3D<usize> {
        &self.config.padding
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rank {}/{} at {} of {}",
            self.rank(),
            self.topology.size(),
            self.topology.coords(),
            self.config.process_counts
        )
    }
}
