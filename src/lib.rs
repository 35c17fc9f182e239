//! The `halofield` crate provides distributed field storage for finite-difference
//! flow solvers on staggered grids.
//!
//! Fields live on the local subdomain of a process, padded with ghost layers
//! that mirror the boundary values of neighboring subdomains. Arithmetic on
//! fields is purely local; ghost layers are refreshed explicitly through
//! halo exchange handles and a [`comm::Communicator`].

pub mod comm;
pub mod domain;
pub mod error;
pub mod field;
pub mod geometry;
pub mod halo;
pub mod num;

pub use error::{FieldError, Result};
