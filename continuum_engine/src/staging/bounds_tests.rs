use super::*;
use crate::error::Error;

// ============================================================================
// CANONICAL BOUNDS
// ============================================================================

#[test]
fn test_sphere_bounds_are_symmetric() {
    for radius in [0.0, 0.5, 1.0, 2.0, 1234.5] {
        let aabb = to_canonical_bounds(&BoundingVolume::sphere(radius)).unwrap();
        assert_eq!(aabb.min, Vec3::splat(-radius));
        assert_eq!(aabb.max, Vec3::splat(radius));
        assert_eq!(aabb.min, -aabb.max);
    }
}

#[test]
fn test_sphere_bounds_are_deterministic() {
    let volume = BoundingVolume::sphere(1.0);
    assert_eq!(
        to_canonical_bounds(&volume).unwrap(),
        to_canonical_bounds(&volume).unwrap()
    );
}

#[test]
fn test_unknown_style_is_invalid_shape() {
    let volume = BoundingVolume { extent: 1.0, style: 3 };
    match to_canonical_bounds(&volume) {
        Err(Error::InvalidShape { style }) => assert_eq!(style, 3),
        other => panic!("expected InvalidShape, got {:?}", other),
    }
}

#[test]
fn test_style_roundtrip_through_tag() {
    assert_eq!(BoundingVolume::sphere(1.0).style, 0);
    assert_eq!(BoundingVolume::sphere(1.0).style().unwrap(), BoundingVolumeStyle::Sphere);
    assert!(BoundingVolumeStyle::try_from(255u8).is_err());
}

// ============================================================================
// APPROXIMATE EQUALITY
// ============================================================================

#[test]
fn test_approx_eq_is_strict() {
    assert!(approx_eq(1.0, 1.0, 1e-4));
    assert!(approx_eq(1.0, 1.00001, 1e-4));
    assert!(!approx_eq(0.0, 1e-4, 1e-4));
    assert!(!approx_eq(0.0, 2e-4, 1e-4));
}

#[test]
fn test_aabb_approx_eq_checks_every_axis() {
    let base = Aabb::cube(1.0);
    assert!(base.approx_eq(&base, 1e-4));

    let mut moved = base;
    moved.max.z += 0.5;
    assert!(!base.approx_eq(&moved, 1e-4));

    let mut nudged = base;
    nudged.min.y -= 1e-5;
    assert!(base.approx_eq(&nudged, 1e-4));
}

// ============================================================================
// WIRE LAYOUT
// ============================================================================

#[test]
fn test_aabb_is_24_bytes_min_then_max() {
    assert_eq!(AABB_STRIDE, 24);

    let aabb = Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(4.0, 5.0, 6.0));
    let floats: &[f32] = bytemuck::cast_slice(aabb.as_bytes());
    assert_eq!(floats, &[-1.0, -2.0, -3.0, 4.0, 5.0, 6.0]);
}
