#![allow(dead_code)]

use halofield::{
    domain::{Domain, DomainConfig},
    field::{ArrayLayout3, CoordLocation, ScalarField3, VectorField3},
    geometry::{Dim3, In3D},
};
use ndarray::prelude::*;
use std::sync::Arc;

pub fn serial_domain(padding: In3D<usize>) -> Arc<Domain> {
    Arc::new(Domain::serial(padding))
}

pub fn decomposed_domain(config: DomainConfig, rank: usize) -> Arc<Domain> {
    Arc::new(Domain::new(config, rank).unwrap())
}

/// Creates a staggered reference field whose component values encode their
/// component number and array indices, so that misplaced values are detectable.
pub fn patterned_reference(domain: Arc<Domain>, cell_counts: In3D<usize>) -> VectorField3<f64> {
    let mut field = VectorField3::zeros("u".to_string(), domain, &cell_counts).unwrap();
    for dim in Dim3::slice() {
        field
            .values_mut(dim)
            .indexed_iter_mut()
            .for_each(|((i, j, k), value)| *value = pattern_value(dim, i, j, k));
    }
    field
}

pub fn pattern_value(dim: Dim3, i: usize, j: usize, k: usize) -> f64 {
    (1000 * (dim as usize + 1) + 100 * i + 10 * j + k) as f64
}

/// Creates a reference field where every component is cell-centered and
/// has the given core shape, padded as the domain specifies.
pub fn centered_reference(domain: Arc<Domain>, core_shape: In3D<usize>) -> VectorField3<f64> {
    reference_with_locations(domain, core_shape, In3D::same(In3D::same(CoordLocation::Center)))
}

/// Creates a reference field whose components all have the given core shape
/// but the given per-component locations.
pub fn reference_with_locations(
    domain: Arc<Domain>,
    core_shape: In3D<usize>,
    locations: In3D<In3D<CoordLocation>>,
) -> VectorField3<f64> {
    let layout = ArrayLayout3::padded(core_shape, domain.padding()).unwrap();
    let components = In3D::with_each_component(|dim| {
        ScalarField3::zeros(
            format!("v{}", dim),
            &domain,
            layout.clone(),
            locations[dim],
        )
        .unwrap()
    });
    VectorField3::new("v".to_string(), domain, components).unwrap()
}

pub fn assert_all_equal(values: &Array3<f64>, expected: f64) {
    assert!(
        values.iter().all(|&value| value == expected),
        "Not all values equal {}",
        expected
    );
}
