use ar4maps::config::RenderConfig;
use ar4maps::projector::CoordinateProjector;
use ar4maps::render::Compositor;
use ar4maps::types::{Homography, translation};
use ar4maps::vector::{FeatureId, FeatureSet, GeometryKind};
use glam::DVec2;
use image::{Rgb, RgbImage};
use serde_json::json;

/// Feature `[lat, lon]` lands on marker pixel `(lon, lat)`.
fn unit_projector() -> CoordinateProjector {
    CoordinateProjector::from_correspondences(
        &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
        &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
    )
    .unwrap()
}

fn layer() -> FeatureSet {
    let data = json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "title": "Dock" },
              "geometry": { "type": "Point", "coordinates": [50.0, 50.0] } },
            { "type": "Feature", "properties": { "title": "River" },
              "geometry": { "type": "LineString", "coordinates": [[10.0, 150.0], [90.0, 150.0]] } },
            { "type": "Feature", "properties": { "title": "Park", "fill": "#00ff00" },
              "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], [0.0, 100.0], [100.0, 100.0], [100.0, 0.0], [0.0, 0.0]]] } }
        ]
    });
    FeatureSet::from_geojson(&data, &unit_projector()).unwrap()
}

fn rendered(h: &Homography) -> Compositor {
    let mut compositor = Compositor::new(RenderConfig::default(), (200, 200));
    compositor.set_features(layer());
    let mut frame = RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]));
    compositor.render(Some(h), &mut frame);
    compositor
}

fn title_at(compositor: &Compositor, x: f64, y: f64) -> Option<String> {
    compositor
        .hit_test(DVec2::new(x, y))
        .and_then(|f| f.properties.title().map(str::to_string))
}

#[test]
fn test_storage_order_puts_points_last() {
    let kinds: Vec<_> = layer().iter().map(|f| f.kind()).collect();
    assert_eq!(
        kinds,
        [GeometryKind::Polygon, GeometryKind::LineString, GeometryKind::Point]
    );
}

#[test]
fn test_point_over_polygon_wins() {
    let compositor = rendered(&Homography::identity());
    assert_eq!(title_at(&compositor, 50.0, 50.0).as_deref(), Some("Dock"));
    assert_eq!(title_at(&compositor, 20.0, 20.0).as_deref(), Some("Park"));
}

#[test]
fn test_hit_boundaries_are_exclusive() {
    let compositor = rendered(&Homography::identity());
    // exactly one radius away: the point misses, the polygon still hits
    assert_eq!(title_at(&compositor, 55.0, 50.0).as_deref(), Some("Park"));
    assert_eq!(title_at(&compositor, 54.9, 50.0).as_deref(), Some("Dock"));
    // on the polygon edge
    assert_eq!(title_at(&compositor, 0.0, 50.0), None);
    assert_eq!(title_at(&compositor, 100.0, 100.0), None);
    // lines are never selectable
    assert_eq!(title_at(&compositor, 150.0, 50.0), None);
}

#[test]
fn test_hit_test_follows_homography() {
    let compositor = rendered(&translation(40.0, 30.0));
    assert_eq!(title_at(&compositor, 90.0, 80.0).as_deref(), Some("Dock"));
    assert_eq!(title_at(&compositor, 50.0, 50.0).as_deref(), Some("Park"));
    assert_eq!(title_at(&compositor, 20.0, 20.0), None);
}

#[test]
fn test_render_draws_and_highlights() {
    let mut compositor = Compositor::new(RenderConfig::default(), (200, 200));
    compositor.set_features(layer());
    let h = Homography::identity();

    let mut frame = RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]));
    compositor.render(Some(&h), &mut frame);
    // 0.6 * fill over black
    assert_eq!(*frame.get_pixel(20, 20), Rgb([0, 153, 0]));
    assert_eq!(*frame.get_pixel(250, 200), Rgb([0, 0, 0]));

    let park = compositor.hit_test(DVec2::new(20.0, 20.0)).map(|f| f.id);
    compositor.set_highlighted(park);
    let mut frame = RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]));
    compositor.render(Some(&h), &mut frame);
    assert_eq!(*frame.get_pixel(20, 20), Rgb([0, 255, 0]));
}

#[test]
fn test_lost_frame_is_untouched() {
    let mut compositor = Compositor::new(RenderConfig::default(), (200, 200));
    compositor.set_features(layer());
    compositor.set_highlighted(Some(FeatureId::next()));
    let original = RgbImage::from_pixel(64, 48, Rgb([7, 8, 9]));
    let mut frame = original.clone();
    compositor.render(None, &mut frame);
    assert_eq!(frame, original);
    assert!(compositor.hit_test(DVec2::new(20.0, 20.0)).is_none());
}

fn render_features(features: serde_json::Value, highlight_title: Option<&str>) -> RgbImage {
    let data = json!({ "type": "FeatureCollection", "features": features });
    let set = FeatureSet::from_geojson(&data, &unit_projector()).unwrap();
    let highlighted = highlight_title.and_then(|title| {
        set.iter()
            .find(|f| f.properties.title() == Some(title))
            .map(|f| f.id)
    });
    let mut compositor = Compositor::new(RenderConfig::default(), (320, 240));
    compositor.set_features(set);
    compositor.set_highlighted(highlighted);
    let mut frame = RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]));
    compositor.render(Some(&Homography::identity()), &mut frame);
    frame
}

/// Thin lines may land on either side of their centre row.
fn near_column(frame: &RgbImage, x: u32, y: u32, color: Rgb<u8>) -> bool {
    (x - 1..=x + 1).any(|xx| *frame.get_pixel(xx, y) == color)
}

#[test]
fn test_multi_geometries_use_line_color() {
    let frame = render_features(
        json!([
            { "type": "Feature", "properties": {},
              "geometry": { "type": "MultiPoint", "coordinates": [[100.0, 200.0], [100.0, 250.0]] } },
            { "type": "Feature", "properties": {},
              "geometry": { "type": "MultiLineString",
                            "coordinates": [[[150.0, 40.0], [230.0, 40.0]], [[150.0, 80.0], [230.0, 80.0]]] } }
        ]),
        None,
    );
    // 0.6 * (255, 215, 0) over black
    let dimmed = Rgb([153, 129, 0]);
    assert_eq!(*frame.get_pixel(200, 100), dimmed);
    assert_eq!(*frame.get_pixel(250, 100), dimmed);
    assert!(near_column(&frame, 40, 190, dimmed));
    assert!(near_column(&frame, 80, 190, dimmed));
}

#[test]
fn test_filled_multipolygon_has_no_border() {
    let squares = json!([
        [[[10.0, 10.0], [10.0, 50.0], [50.0, 50.0], [50.0, 10.0], [10.0, 10.0]]],
        [[[10.0, 60.0], [10.0, 100.0], [50.0, 100.0], [50.0, 60.0], [10.0, 60.0]]]
    ]);
    let filled = render_features(
        json!([{ "type": "Feature", "properties": { "fill": "#0000ff" },
                 "geometry": { "type": "MultiPolygon", "coordinates": squares } }]),
        None,
    );
    assert_eq!(*filled.get_pixel(30, 10), Rgb([0, 0, 153]));
    assert_eq!(*filled.get_pixel(80, 10), Rgb([0, 0, 153]));
    assert_eq!(*filled.get_pixel(80, 30), Rgb([0, 0, 153]));

    let plain = render_features(
        json!([{ "type": "Feature", "properties": {},
                 "geometry": { "type": "MultiPolygon", "coordinates": squares } }]),
        None,
    );
    assert_eq!(*plain.get_pixel(30, 10), Rgb([153, 0, 0]));
    assert_eq!(*plain.get_pixel(80, 10), Rgb([153, 0, 0]));
}

#[test]
fn test_highlighted_line_is_redrawn_on_frame() {
    let river = json!([{ "type": "Feature", "properties": { "title": "River" },
                         "geometry": { "type": "LineString", "coordinates": [[10.0, 150.0], [90.0, 150.0]] } }]);
    let plain = render_features(river.clone(), None);
    assert!(near_column(&plain, 150, 50, Rgb([153, 129, 0])));
    assert!(!near_column(&plain, 150, 50, Rgb([255, 215, 0])));

    let highlighted = render_features(river, Some("River"));
    assert!(near_column(&highlighted, 150, 50, Rgb([255, 215, 0])));
}
