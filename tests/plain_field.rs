mod common;

use approx::{abs_diff_eq, relative_eq};
use common::{
    assert_all_equal, centered_reference, decomposed_domain, pattern_value, patterned_reference,
    reference_with_locations, serial_domain,
};
use halofield::{
    domain::DomainConfig,
    field::{ArrayLayout3, CoordLocation, PlainVectorField3, ScalarField3, VectorField3},
    geometry::{
        Dim3::{self, X, Y, Z},
        Idx3, In3D,
    },
    halo::HaloExchange,
    FieldError,
};
use ndarray::prelude::*;
use proptest::prelude::*;
use std::{collections::HashSet, sync::Arc};

fn assign_flat_values(field: &mut PlainVectorField3<f64>, flat_values: &[f64]) {
    let mut offset = 0;
    for dim in Dim3::slice() {
        let shape = field.layout(dim).shape_tuple();
        let len = field.layout(dim).len();
        let values =
            Array3::from_shape_vec(shape.f(), flat_values[offset..offset + len].to_vec()).unwrap();
        field.values_mut(dim).assign(&values);
        offset += len;
    }
}

fn total_len(field: &VectorField3<f64>) -> usize {
    Dim3::slice()
        .iter()
        .map(|&dim| field.layout(dim).len())
        .sum()
}

fn all_close<F>(a: &PlainVectorField3<f64>, b: &PlainVectorField3<f64>, close: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    Dim3::slice().iter().all(|&dim| {
        a.values(dim)
            .iter()
            .zip(b.values(dim).iter())
            .all(|(&x, &y)| close(x, y))
    })
}

#[test]
fn fill_reaches_every_padding_cell_of_decomposed_block() {
    let config = DomainConfig::default()
        .with_process_counts(2, 1)
        .with_padding(In3D::new(2, 0, 0));
    let domain = decomposed_domain(config, 0);
    let reference = reference_with_locations(
        Arc::clone(&domain),
        In3D::same(4),
        In3D::with_each_component(CoordLocation::for_component),
    );
    assert_eq!(reference.layout(X).shape(), &In3D::new(8, 4, 4));

    let mut plain = PlainVectorField3::new(domain, &reference).unwrap();
    for dim in Dim3::slice() {
        assert_eq!(plain.values(dim).dim(), (8, 4, 4));
    }

    plain.fill(5.0);
    for dim in Dim3::slice() {
        assert_eq!(plain.values(dim).len(), 128);
        assert_all_equal(plain.values(dim), 5.0);
    }
}

#[test]
fn two_fields_from_one_reference_own_six_distinct_handles() {
    let reference = patterned_reference(serial_domain(In3D::same(1)), In3D::same(3));
    let first = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
    let second = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();

    let ids: HashSet<usize> = Dim3::slice()
        .iter()
        .flat_map(|&dim| [first.halo(dim).id(), second.halo(dim).id()])
        .collect();
    assert_eq!(ids.len(), 6);
}

#[test]
fn live_field_binds_each_component_array() {
    let reference = patterned_reference(serial_domain(In3D::same(1)), In3D::same(2));
    let plain = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
    for dim in Dim3::slice() {
        assert!(HaloExchange::is_bound(plain.values(dim)));
        assert!(HaloExchange::is_bound(reference.values(dim)));
    }
}

#[test]
fn fresh_arrays_are_never_reported_as_bound() {
    let domain = serial_domain(In3D::same(1));
    let layout = ArrayLayout3::padded(In3D::same(2), domain.padding()).unwrap();
    let locations = In3D::same(CoordLocation::Center);
    for _ in 0..200 {
        let values = Array3::<f64>::zeros(layout.shape_tuple().f());
        let field =
            ScalarField3::new("p".to_string(), &domain, layout.clone(), locations, values).unwrap();
        drop(field);

        let fresh = Array3::<f64>::zeros(layout.shape_tuple().f());
        assert!(!HaloExchange::is_bound(&fresh));
        let rebound =
            ScalarField3::new("q".to_string(), &domain, layout.clone(), locations, fresh).unwrap();
        assert!(HaloExchange::is_bound(rebound.values()));
    }
}

#[test]
fn dropping_plain_field_releases_its_arrays() {
    let reference = patterned_reference(serial_domain(In3D::same(1)), In3D::same(2));
    for _ in 0..50 {
        let plain = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
        drop(plain);
        let fresh = Array3::<f64>::zeros(reference.layout(X).shape_tuple().f());
        assert!(!HaloExchange::is_bound(&fresh));
    }
}

#[test]
fn staggered_operand_locations_are_ignored() {
    let domain = serial_domain(In3D::same(1));
    let centered = centered_reference(Arc::clone(&domain), In3D::same(3));
    let mut staggered = reference_with_locations(
        Arc::clone(&domain),
        In3D::same(3),
        In3D::with_each_component(CoordLocation::for_component),
    );
    for dim in Dim3::slice() {
        staggered.values_mut(dim).fill(dim as usize as f64 + 1.0);
    }

    let mut plain = PlainVectorField3::new(domain, &centered).unwrap();
    plain
        .add_staggered_in_place(&staggered)
        .unwrap()
        .add_staggered_in_place(&staggered)
        .unwrap()
        .subtract_staggered_in_place(&staggered)
        .unwrap();
    assert_all_equal(plain.values(X), 1.0);
    assert_all_equal(plain.values(Y), 2.0);
    assert_all_equal(plain.values(Z), 3.0);
}

#[test]
fn reference_with_misaligned_components_is_rejected() {
    let domain = serial_domain(In3D::same(1));
    let component = |padding: usize| {
        let layout = ArrayLayout3::padded(In3D::same(3), &In3D::same(padding)).unwrap();
        ScalarField3::<f64>::zeros(
            "v".to_string(),
            &domain,
            layout,
            In3D::same(CoordLocation::Center),
        )
        .unwrap()
    };
    let components = In3D::new(component(1), component(1), component(2));
    assert!(matches!(
        VectorField3::new("v".to_string(), Arc::clone(&domain), components),
        Err(FieldError::InvalidLayout(_))
    ));

    // Face-located components differ in shape but share the index origin
    let staggered = patterned_reference(Arc::clone(&domain), In3D::same(3));
    assert_ne!(staggered.layout(X).shape(), staggered.layout(Y).shape());
    let plain = PlainVectorField3::new(domain, &staggered).unwrap();
    for dim in Dim3::slice() {
        assert_eq!(plain.layout(dim), staggered.layout(dim));
    }
}

#[test]
fn mismatch_in_last_component_leaves_field_untouched() {
    let domain = serial_domain(In3D::same(1));
    let reference = centered_reference(Arc::clone(&domain), In3D::same(3));
    let mut plain = PlainVectorField3::new(Arc::clone(&domain), &reference).unwrap();
    plain.fill(-2.0);

    let create_component = |core_shape: In3D<usize>| {
        let layout = ArrayLayout3::padded(core_shape, domain.padding()).unwrap();
        let mut component = ScalarField3::<f64>::zeros(
            "w".to_string(),
            &domain,
            layout,
            In3D::same(CoordLocation::Center),
        )
        .unwrap();
        component.values_mut().fill(9.0);
        component
    };
    let operand = VectorField3::new(
        "w".to_string(),
        Arc::clone(&domain),
        In3D::new(
            create_component(In3D::same(3)),
            create_component(In3D::same(3)),
            create_component(In3D::new(3, 3, 4)),
        ),
    )
    .unwrap();

    for result in [
        plain.add_staggered_in_place(&operand).map(|_| ()),
        plain.subtract_staggered_in_place(&operand).map(|_| ()),
        plain.assign_from_staggered(&operand),
    ] {
        assert_eq!(
            result,
            Err(FieldError::ShapeMismatch {
                component: Z,
                expected: In3D::new(5, 5, 5),
                found: In3D::new(5, 5, 6),
            })
        );
    }
    for dim in Dim3::slice() {
        assert_all_equal(plain.values(dim), -2.0);
    }
}

#[test]
fn plain_fields_from_different_references_do_not_mix() {
    let domain = serial_domain(In3D::same(1));
    let small = patterned_reference(Arc::clone(&domain), In3D::new(2, 3, 4));
    let large = patterned_reference(Arc::clone(&domain), In3D::new(3, 3, 4));
    let mut a = PlainVectorField3::new(Arc::clone(&domain), &small).unwrap();
    let b = PlainVectorField3::new(domain, &large).unwrap();

    assert!(matches!(
        a.add_in_place(&b),
        Err(FieldError::ShapeMismatch { component: X, .. })
    ));
    assert!(matches!(
        a.assign_from(&b),
        Err(FieldError::ShapeMismatch { component: X, .. })
    ));
    assert!(a.values(Y).iter().all(|&value| value == 0.0));
}

#[test]
fn staggered_assignment_copies_ghost_cells_verbatim() {
    let reference = patterned_reference(serial_domain(In3D::new(2, 1, 1)), In3D::new(3, 2, 2));
    let mut plain = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
    plain.assign_from_staggered(&reference).unwrap();
    for dim in Dim3::slice() {
        assert_eq!(plain.values(dim), reference.values(dim));
    }
    assert_eq!(
        plain.value_at(Y, &Idx3::new(-2, -1, -1)),
        Some(pattern_value(Y, 0, 0, 0))
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn layouts_follow_reference_for_any_block(
        nx in 2_usize..6,
        ny in 2_usize..6,
        nz in 1_usize..4,
        pad in 0_usize..3,
    ) {
        let reference = patterned_reference(serial_domain(In3D::same(pad)), In3D::new(nx, ny, nz));
        let plain = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
        for dim in Dim3::slice() {
            prop_assert_eq!(plain.layout(dim), reference.layout(dim));
            prop_assert_eq!(plain.values(dim).shape(), reference.values(dim).shape());
            prop_assert_eq!(plain.core_values(dim).dim(), reference.component(dim).core_values().dim());
        }
    }

    #[test]
    fn adding_then_subtracting_restores_values(
        a_values in prop::collection::vec(-1e3_f64..1e3, 240),
        b_values in prop::collection::vec(-1e3_f64..1e3, 240),
    ) {
        let reference = patterned_reference(serial_domain(In3D::same(1)), In3D::same(2));
        prop_assume!(total_len(&reference) == 240);

        let mut a = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
        let mut original = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
        let mut b = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
        assign_flat_values(&mut a, &a_values);
        assign_flat_values(&mut original, &a_values);
        assign_flat_values(&mut b, &b_values);

        a.add_in_place(&b).unwrap().subtract_in_place(&b).unwrap();
        prop_assert!(all_close(&a, &original, |x, y| abs_diff_eq!(x, y, epsilon = 1e-9)));
    }

    #[test]
    fn successive_scaling_equals_scaling_by_product(
        k1 in -10.0_f64..10.0,
        k2 in -10.0_f64..10.0,
    ) {
        let reference = patterned_reference(serial_domain(In3D::same(1)), In3D::same(2));
        let mut twice = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
        let mut once = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
        twice.assign_from_staggered(&reference).unwrap();
        once.assign_from_staggered(&reference).unwrap();

        twice.scale_in_place(k1).scale_in_place(k2);
        once.scale_in_place(k1 * k2);
        prop_assert!(all_close(&twice, &once, |x, y| relative_eq!(
            x,
            y,
            epsilon = 1e-12,
            max_relative = 1e-12
        )));
    }

    #[test]
    fn broadcast_overwrites_every_cell(value in -1e6_f64..1e6) {
        let reference = patterned_reference(serial_domain(In3D::new(2, 2, 1)), In3D::new(3, 2, 2));
        let mut plain = PlainVectorField3::new(reference.arc_with_domain(), &reference).unwrap();
        plain.assign_from_staggered(&reference).unwrap();
        plain.fill(value);
        for dim in Dim3::slice() {
            prop_assert!(plain.values(dim).iter().all(|&x| x == value));
        }
    }
}
