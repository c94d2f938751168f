#![allow(clippy::float_cmp, clippy::cast_precision_loss)]
use approx::assert_abs_diff_eq;
use cubespex_core::{
    footprint, ApertureSync, CoordinateTransform, Cube, ImagePayload, Instrument, PixelShape,
    Session, View, Wcs, WorldShape,
};

const N: usize = 31;

// Cube on a 1"/px grid centred on (10°, 20°); channel c holds c + 1 everywhere.
fn cube() -> Cube {
    let plane = N * N;
    let flux: Vec<f64> = (0..3 * plane).map(|i| (i / plane + 1) as f64).collect();
    Cube::new(
        flux,
        (3, N, N),
        vec![100.0, 101.0, 102.0],
        Wcs::north_up((15.0, 15.0), (10.0, 20.0), 1.0),
        Instrument::Generic,
    )
    .unwrap()
}

// Comparison image at 0.5"/px centred on the same sky position.
fn fine_payload() -> ImagePayload {
    ImagePayload {
        name: "fine".into(),
        image: vec![0.0; 61 * 61],
        nx: 61,
        ny: 61,
        wcs: Wcs::north_up((30.0, 30.0), (10.0, 20.0), 0.5),
    }
}

fn rotated_payload() -> ImagePayload {
    ImagePayload {
        name: "rotated".into(),
        image: vec![0.0; 40 * 40],
        nx: 40,
        ny: 40,
        wcs: Wcs::from_cdelt(
            (20.0, 20.0),
            (10.0, 20.0),
            (-2.0 / 3600.0, 2.0 / 3600.0),
            35.0,
        ),
    }
}

fn session() -> Session {
    let mut s = Session::new(cube()).unwrap();
    s.add_view(fine_payload()).unwrap();
    s.add_view(rotated_payload()).unwrap();
    s
}

fn circle_radius(shape: &PixelShape) -> f64 {
    match shape {
        PixelShape::Circle { radius, .. } => *radius,
        other => panic!("expected a circle, got {other:?}"),
    }
}

fn assert_views_match_world(s: &Session, skip: Option<usize>) {
    for (id, world) in s.apertures().rois().iter() {
        for (i, view) in s.views().iter().enumerate() {
            if Some(i) == skip {
                continue;
            }
            let expected = world.to_pixel(view.transform());
            let actual = view.interactor(id).unwrap().shape();
            assert!(
                expected.max_deviation(actual) < 1e-9,
                "view {i} aperture {id}: {expected:?} vs {actual:?}"
            );
        }
    }
}

#[test]
fn test_sizes_scale_with_pixel_scale_in_every_view() {
    let s = {
        let mut s = session();
        s.create_aperture(WorldShape::Ellipse {
            center: (10.0, 20.0),
            width: 12.0,
            height: 6.0,
            angle: 15.0,
        });
        s
    };
    for view in s.views() {
        let scale = view.transform().pixel_scale();
        match view.interactor(0).unwrap().shape() {
            PixelShape::Ellipse { width, height, .. } => {
                assert_abs_diff_eq!(*width, 12.0 / scale, epsilon = 1e-9);
                assert_abs_diff_eq!(*height, 6.0 / scale, epsilon = 1e-9);
            }
            other => panic!("expected an ellipse, got {other:?}"),
        }
    }
}

#[test]
fn test_modification_reprojects_other_views() {
    let mut s = session();
    s.create_aperture(WorldShape::Rectangle {
        center: (10.0, 20.0),
        width: 30.0,
        height: 20.0,
        angle: 0.0,
    });
    // drag the rectangle in the rotated view
    let center = s.views()[2].interactor(0).unwrap().shape().center();
    assert!(s.pointer_pressed(2, center).unwrap());
    assert!(s.pointer_moved((center.0 + 1.5, center.1 - 0.5)).unwrap());
    s.pointer_released();

    assert_views_match_world(&s, Some(2));
    let moved = s.views()[2].interactor(0).unwrap().shape().center();
    assert_abs_diff_eq!(moved.0, center.0 + 1.5, epsilon = 1e-12);
}

#[test]
fn test_delete_cascades_and_compacts() {
    let mut s = session();
    for (i, lon) in [9.999, 10.0, 10.001].into_iter().enumerate() {
        let id = s.create_aperture(WorldShape::Circle {
            center: (lon, 20.0),
            radius: 1.0 + i as f64,
        });
        assert_eq!(id, i);
    }
    let middle = s.views()[1].interactor(1).unwrap().shape().center();
    assert_eq!(s.delete_at(1, middle).unwrap(), Some(1));

    assert_eq!(s.apertures().len(), 2);
    assert_eq!(s.apertures().spectra().len(), 2);
    for view in s.views() {
        assert_eq!(view.interactors().len(), 2);
        assert!(view.interactor(2).is_err());
    }
    // former aperture 2 is now 1
    let radius = circle_radius(s.views()[0].interactor(1).unwrap().shape());
    assert_abs_diff_eq!(radius, 3.0, epsilon = 1e-9);
    assert_views_match_world(&s, None);
}

#[test]
fn test_reprojection_is_idempotent() {
    let world = WorldShape::Polygon {
        vertices: vec![(10.0, 20.0), (9.998, 20.001), (9.999, 20.002)],
    };
    let wcs = Wcs::from_cdelt((20.0, 20.0), (10.0, 20.0), (-2.0 / 3600.0, 2.0 / 3600.0), 35.0);
    assert_eq!(world.to_pixel(&wcs), world.to_pixel(&wcs));

    let cube = cube();
    let mut views = vec![View::from_payload(rotated_payload()).unwrap()];
    let mut sync = ApertureSync::default();
    sync.create_from_world(&mut views, &cube, world);
    let first = views[0].interactor(0).unwrap().shape().clone();
    sync.reproject_all(&mut views);
    sync.reproject_all(&mut views);
    assert_eq!(views[0].interactor(0).unwrap().shape(), &first);
}

#[test]
fn test_aperture_outside_cube_gives_nan_spectrum() {
    let mut s = session();
    let id = s.create_aperture(WorldShape::Circle {
        center: (10.0, 20.1),
        radius: 3.0,
    });
    let spectrum = s.apertures().spectrum(id).unwrap();
    assert_eq!(spectrum.n_pixels, 0);
    assert_eq!(spectrum.flux.len(), 3);
    assert!(spectrum.flux.iter().all(|v| v.is_nan()));
}

#[test]
fn test_circle_scenario_create_then_resize_in_fine_view() {
    let mut s = session();
    let id = s.create_aperture(WorldShape::Circle {
        center: (10.0, 20.0),
        radius: 5.0,
    });

    let reference = s.views()[0].interactor(id).unwrap().shape().clone();
    assert_abs_diff_eq!(circle_radius(&reference), 5.0, epsilon = 1e-9);
    let fine = s.views()[1].interactor(id).unwrap().shape().clone();
    assert_abs_diff_eq!(circle_radius(&fine), 10.0, epsilon = 1e-9);

    // spectrum sums the flux over the reference-grid footprint
    let pixels = footprint(&reference, N, N);
    assert!(pixels.len() >= 69 && pixels.len() <= 81);
    let spectrum = s.apertures().spectrum(id).unwrap();
    assert_eq!(spectrum.n_pixels, pixels.len());
    for (c, value) in spectrum.flux.iter().enumerate() {
        assert_abs_diff_eq!(*value, (c + 1) as f64 * pixels.len() as f64);
    }

    // grab the border in the fine view and pull it out by 6 px (3")
    s.set_active_view(1).unwrap();
    let center = fine.center();
    assert!(s.pointer_pressed(1, (center.0 + 9.0, center.1)).unwrap());
    assert!(s.pointer_moved((center.0 + 15.0, center.1)).unwrap());
    s.pointer_released();

    let fine_after = s.views()[1].interactor(id).unwrap().shape();
    assert_abs_diff_eq!(circle_radius(fine_after), 16.0, epsilon = 1e-9);
    assert_eq!(fine_after.center(), center);
    match s.apertures().rois().get(id).unwrap() {
        WorldShape::Circle { radius, .. } => assert_abs_diff_eq!(*radius, 8.0, epsilon = 1e-9),
        other => panic!("expected a circle, got {other:?}"),
    }
    let reference_after = s.views()[0].interactor(id).unwrap().shape();
    assert_abs_diff_eq!(circle_radius(reference_after), 8.0, epsilon = 1e-9);
    assert!(s.apertures().spectrum(id).unwrap().n_pixels > pixels.len());
}
