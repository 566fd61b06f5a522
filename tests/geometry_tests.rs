use approx::assert_relative_eq;

use labelprep::geometry::{
    assign_by_containment, Assignment, BBox, CropRegion, Expansion, ImageFrame, NormalizedBox,
    ParentRegion, Point, Validity,
};
use labelprep::merge::{merge_flat_segments, merge_segments, nearest_pair};
use labelprep::Error;

fn bbox(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> BBox {
    BBox::new(x_min, y_min, x_max, y_max).unwrap()
}

fn frame(width: u32, height: u32) -> ImageFrame {
    ImageFrame::new(width, height).unwrap()
}

fn points(coords: &[(f64, f64)]) -> Vec<Point> {
    coords.iter().map(|&p| Point::from(p)).collect()
}

#[test]
fn test_normalize_box() {
    let b = bbox(10.0, 10.0, 30.0, 50.0)
        .normalize(0, frame(100, 200), Validity::Lenient)
        .unwrap();
    assert_relative_eq!(b.cx, 0.20);
    assert_relative_eq!(b.cy, 0.15);
    assert_relative_eq!(b.w, 0.20);
    assert_relative_eq!(b.h, 0.20);
}

#[test]
fn test_normalize_discards_degenerate() {
    let f = frame(100, 100);
    assert!(bbox(10.0, 10.0, 10.0, 40.0)
        .normalize(0, f, Validity::Lenient)
        .is_none());
    assert!(bbox(10.0, 40.0, 30.0, 40.0)
        .normalize(0, f, Validity::Strict)
        .is_none());
}

#[test]
fn test_strict_validity_rejects_out_of_range() {
    let f = frame(100, 100);
    let partly_outside = bbox(-20.0, 10.0, 10.0, 30.0);
    assert!(partly_outside.normalize(1, f, Validity::Lenient).is_some());
    assert!(partly_outside.normalize(1, f, Validity::Strict).is_none());

    let too_wide = bbox(-10.0, 10.0, 190.0, 30.0);
    assert!(too_wide.normalize(1, f, Validity::Strict).is_none());

    let full = bbox(0.0, 0.0, 100.0, 100.0);
    assert!(full.normalize(1, f, Validity::Strict).is_some());
}

#[test]
fn test_normalize_denormalize_round_trip() {
    let f = frame(640, 480);
    for original in [
        bbox(10.0, 10.0, 30.0, 50.0),
        bbox(0.5, 0.25, 639.5, 479.75),
        bbox(123.4, 56.7, 300.1, 222.2),
    ] {
        let back = original
            .normalize(3, f, Validity::Lenient)
            .unwrap()
            .denormalize(f)
            .unwrap();
        assert_relative_eq!(back.x_min(), original.x_min(), epsilon = 1e-9);
        assert_relative_eq!(back.y_min(), original.y_min(), epsilon = 1e-9);
        assert_relative_eq!(back.x_max(), original.x_max(), epsilon = 1e-9);
        assert_relative_eq!(back.y_max(), original.y_max(), epsilon = 1e-9);
    }
}

#[test]
fn test_normalize_is_idempotent() {
    let f = frame(100, 200);
    let once = bbox(10.0, 10.0, 30.0, 50.0)
        .normalize(2, f, Validity::Lenient)
        .unwrap();
    let twice = once
        .denormalize(f)
        .unwrap()
        .normalize(2, f, Validity::Lenient)
        .unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_expand_scenario() {
    let expansion = Expansion::new(2.0, 1.5).unwrap();
    let expanded = bbox(10.0, 10.0, 30.0, 50.0).expand(expansion, frame(100, 200));
    assert_eq!(expanded, bbox(0.0, 0.0, 40.0, 60.0));
}

#[test]
fn test_expand_identity() {
    let original = bbox(12.5, 7.0, 40.0, 90.0);
    assert_eq!(original.expand(Expansion::IDENTITY, frame(100, 100)), original);
}

#[test]
fn test_expand_preserves_center() {
    let original = bbox(40.0, 40.0, 60.0, 60.0);
    let expanded = original.expand(Expansion::uniform(1.2).unwrap(), frame(100, 100));
    assert_eq!(expanded.center(), original.center());
    assert_relative_eq!(expanded.width(), 24.0, epsilon = 1e-12);
    assert_relative_eq!(expanded.height(), 24.0, epsilon = 1e-12);
}

#[test]
fn test_expand_clamps_one_edge() {
    // Expanded x range is -5..35; only the left edge is cut.
    let expanded = bbox(5.0, 40.0, 25.0, 60.0).expand(Expansion::new(2.0, 1.0).unwrap(), frame(100, 100));
    assert_eq!(expanded.x_min(), 0.0);
    assert_eq!(expanded.x_max(), 35.0);
    assert_eq!(expanded.y_min(), 40.0);
    assert_eq!(expanded.y_max(), 60.0);
}

#[test]
fn test_expansion_rejects_non_positive_factors() {
    assert!(matches!(Expansion::new(0.0, 1.0), Err(Error::InvalidGeometry(_))));
    assert!(matches!(Expansion::new(1.0, -2.0), Err(Error::InvalidGeometry(_))));
    assert!(Expansion::new(f64::NAN, 1.0).is_err());
}

#[test]
fn test_translate_and_inverse() {
    let region = CropRegion::new(bbox(10.0, 10.0, 60.0, 60.0));
    let child = bbox(15.0, 15.0, 25.0, 25.0);
    let local = child.translate_into(&region);
    assert_eq!(local, bbox(5.0, 5.0, 15.0, 15.0));
    assert_eq!(local.translate_from(&region), child);
}

#[test]
fn test_translate_does_not_clip() {
    let region = CropRegion::new(bbox(50.0, 50.0, 80.0, 80.0));
    let local = bbox(40.0, 45.0, 60.0, 90.0).translate_into(&region);
    assert_eq!(local, bbox(-10.0, -5.0, 10.0, 40.0));

    let crop_frame = region.frame().unwrap();
    assert!(local.normalize(0, crop_frame, Validity::Strict).is_none());
}

#[test]
fn test_crop_region_snapped_frame() {
    let region = CropRegion::snapped(bbox(10.7, 3.2, 50.9, 40.5));
    assert_eq!(region.origin(), Point::new(10.0, 3.0));
    assert_eq!(region.frame().unwrap(), frame(40, 37));
    assert_eq!(region.pixel_rect().unwrap(), (10, 3, 40, 37));
}

#[test]
fn test_empty_crop_region_has_no_frame() {
    let region = CropRegion::new(bbox(10.0, 10.0, 10.0, 30.0));
    assert!(matches!(region.frame(), Err(Error::InvalidGeometry(_))));
}

#[test]
fn test_assign_by_containment() {
    let parents = [
        ParentRegion {
            original: bbox(10.0, 10.0, 30.0, 50.0),
            region: CropRegion::new(bbox(0.0, 0.0, 40.0, 60.0)),
        },
        ParentRegion {
            original: bbox(60.0, 100.0, 80.0, 140.0),
            region: CropRegion::new(bbox(60.0, 100.0, 80.0, 140.0)),
        },
    ];

    match assign_by_containment(&bbox(15.0, 15.0, 25.0, 25.0), &parents) {
        Assignment::Contained { parent, local } => {
            assert_eq!(parent, 0);
            assert_relative_eq!(local.x_min(), 10.0);
            assert_relative_eq!(local.y_min(), 7.5);
            assert_relative_eq!(local.x_max(), 30.0);
            assert_relative_eq!(local.y_max(), 22.5);
        }
        other => panic!("expected containment, got {:?}", other),
    }

    match assign_by_containment(&bbox(65.0, 110.0, 70.0, 120.0), &parents) {
        Assignment::Contained { parent, local } => {
            assert_eq!(parent, 1);
            assert_eq!(local, bbox(5.0, 10.0, 10.0, 20.0));
        }
        other => panic!("expected containment, got {:?}", other),
    }

    let outside = bbox(90.0, 180.0, 95.0, 190.0);
    assert_eq!(
        assign_by_containment(&outside, &parents),
        Assignment::Unassigned(outside)
    );
}

#[test]
fn test_bbox_from_points() {
    let b = BBox::from_points(&points(&[(30.0, 5.0), (10.0, 50.0), (20.0, 10.0)])).unwrap();
    assert_eq!(b, bbox(10.0, 5.0, 30.0, 50.0));
    assert!(matches!(
        BBox::from_points(&points(&[(1.0, 1.0)])),
        Err(Error::InvalidGeometry(_))
    ));
    assert!(BBox::new(5.0, 0.0, 1.0, 1.0).is_err());
}

#[test]
fn test_image_frame_rejects_zero() {
    assert!(matches!(ImageFrame::new(0, 10), Err(Error::InvalidAnnotation(_))));
    assert!(ImageFrame::new(10, 0).is_err());
}

#[test]
fn test_nearest_pair_tie_keeps_first() {
    let a = points(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
    let b = points(&[(20.0, 0.0), (20.0, 10.0)]);
    // (10,0)-(20,0) and (10,10)-(20,10) are equally close.
    assert_eq!(nearest_pair(&a, &b), Some((1, 0)));
    assert_eq!(nearest_pair(&a, &[]), None);
}

#[test]
fn test_merge_two_segments() {
    let a = points(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
    let b = points(&[(20.0, 0.0), (30.0, 0.0), (30.0, 10.0), (20.0, 10.0)]);
    let merged = merge_segments(&[a.clone(), b.clone()]).unwrap();

    assert_eq!(merged.len(), a.len() + 1 + b.len() + 1);
    assert_eq!(merged[0], merged[a.len()]);
    assert_eq!(merged[a.len() + 1], merged[merged.len() - 1]);
    assert_eq!(
        merged,
        points(&[
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 0.0),
            (10.0, 0.0),
            (20.0, 0.0),
            (30.0, 0.0),
            (30.0, 10.0),
            (20.0, 10.0),
            (20.0, 0.0),
        ])
    );
}

#[test]
fn test_merge_interior_segment_walks_out_and_back() {
    let a = points(&[(0.0, 0.0), (1.0, 0.0)]);
    let b = points(&[(5.0, 0.0), (6.0, 0.0), (6.0, 1.0), (5.0, 1.0)]);
    let c = points(&[(10.0, 0.0), (11.0, 0.0)]);
    let merged = merge_segments(&[a, b, c]).unwrap();
    assert_eq!(
        merged,
        points(&[
            (1.0, 0.0),
            (0.0, 0.0),
            (1.0, 0.0),
            (5.0, 0.0),
            (6.0, 0.0),
            (10.0, 0.0),
            (11.0, 0.0),
            (10.0, 0.0),
            (6.0, 0.0),
            (6.0, 1.0),
            (5.0, 1.0),
            (5.0, 0.0),
        ])
    );
}

#[test]
fn test_merge_reverses_interior_segment() {
    // Bridge to the previous segment (index 2) comes after the bridge to the
    // next one (index 0), so the interior segment is walked reversed.
    let a = points(&[(0.0, 10.0), (1.0, 10.0)]);
    let b = points(&[(6.0, 0.0), (5.0, 0.0), (5.0, 10.0)]);
    let c = points(&[(10.0, 0.0), (11.0, 0.0)]);
    let merged = merge_segments(&[a, b, c]).unwrap();
    assert_eq!(
        merged,
        points(&[
            (1.0, 10.0),
            (0.0, 10.0),
            (1.0, 10.0),
            (5.0, 10.0),
            (5.0, 0.0),
            (6.0, 0.0),
            (10.0, 0.0),
            (11.0, 0.0),
            (10.0, 0.0),
            (6.0, 0.0),
            (5.0, 10.0),
        ])
    );
}

#[test]
fn test_merge_single_and_invalid() {
    let single = points(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
    assert_eq!(merge_segments(&[single.clone()]).unwrap(), single);
    assert!(matches!(merge_segments(&[]), Err(Error::InvalidGeometry(_))));
    assert!(matches!(
        merge_segments(&[single, points(&[(3.0, 3.0)])]),
        Err(Error::InvalidGeometry(_))
    ));
}

#[test]
fn test_merge_flat_segments() {
    let merged = merge_flat_segments(&[
        vec![0.0, 0.0, 10.0, 0.0],
        vec![20.0, 0.0, 30.0, 0.0],
    ])
    .unwrap();
    assert_eq!(
        merged,
        vec![10.0, 0.0, 0.0, 0.0, 10.0, 0.0, 20.0, 0.0, 30.0, 0.0, 20.0, 0.0]
    );
    assert!(matches!(
        merge_flat_segments(&[vec![0.0, 0.0, 1.0]]),
        Err(Error::InvalidGeometry(_))
    ));
}

#[test]
fn test_normalized_box_fields() {
    let b = NormalizedBox {
        class_id: 4,
        cx: 0.5,
        cy: 0.5,
        w: 1.0,
        h: 1.0,
    };
    assert!(Validity::Strict.accepts(&b));
    assert_eq!(b.denormalize(frame(10, 20)).unwrap(), bbox(0.0, 0.0, 10.0, 20.0));
}
