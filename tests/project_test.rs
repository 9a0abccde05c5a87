use std::path::Path;

use ar4maps::Error;
use ar4maps::data_loader::{PROJECT_FILE, Project};
use ar4maps::synthetic::textured_image;
use ar4maps::vector::Geometry;
use glam::DVec2;
use serde_json::json;

fn write_project(dir: &Path) {
    let config = json!({
        "target": "marker.png",
        "coords": { "src": [[20, 10], [30, 10], [20, 20]], "dst": [[100, 200], [200, 200], [100, 300]] },
        "layers": [
            { "name": "Monuments", "description": "Old stones", "file": "monuments.geojson" },
            { "name": "Orphan", "file": "missing.geojson" }
        ],
        "render": { "point_radius": 8 }
    });
    std::fs::write(dir.join(PROJECT_FILE), config.to_string()).unwrap();
    textured_image(64, 48, 1).save(dir.join("marker.png")).unwrap();

    let layer = json!({
        "type": "FeatureCollection",
        "features": [
            { "type": "Feature", "properties": { "title": "Tower", "photos": ["a.jpg", "b.jpg"] },
              "geometry": { "type": "Point", "coordinates": [10, 20] } },
            { "type": "Feature", "properties": {}, "geometry": null },
            { "type": "Feature", "properties": {},
              "geometry": { "type": "Point", "coordinates": ["north", 3] } },
            { "type": "Feature", "properties": {},
              "geometry": { "type": "Circle", "coordinates": [1, 2] } },
            { "type": "Feature",
              "geometry": { "type": "Polygon", "coordinates": [[[10, 20], [10, 30], [20, 30], [10, 20]]] } }
        ]
    });
    std::fs::write(dir.join("monuments.geojson"), layer.to_string()).unwrap();
}

#[test]
fn test_open_project_and_load_layer() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());

    let project = Project::open(dir.path()).unwrap();
    assert_eq!(project.config.render.point_radius, 8);
    assert_eq!(project.config.render.opacity, 0.6);
    assert_eq!(project.load_marker().unwrap().dimensions(), (64, 48));

    let layer = project.load_layer_by_name("Monuments").unwrap();
    assert_eq!(layer.len(), 2);
    let tower = &layer.features()[1];
    assert_eq!(tower.properties.title(), Some("Tower"));
    assert_eq!(tower.properties.photos(), ["a.jpg", "b.jpg"]);
    match &tower.geometry {
        Geometry::Point(p) => assert!((*p - DVec2::new(100.0, 200.0)).length() < 1e-9),
        other => panic!("expected a point, got {:?}", other),
    }
    assert!(matches!(layer.features()[0].geometry, Geometry::Polygon(_)));
    assert_ne!(layer.features()[0].id, tower.id);
}

#[test]
fn test_layer_errors() {
    let dir = tempfile::tempdir().unwrap();
    write_project(dir.path());
    let mut project = Project::open(dir.path()).unwrap();

    assert!(matches!(
        project.load_layer_by_name("Rivers"),
        Err(Error::UnknownLayer(name)) if name == "Rivers"
    ));
    assert!(matches!(
        project.load_layer_by_name("Orphan"),
        Err(Error::Io { .. })
    ));

    project.config.coords = None;
    assert!(matches!(
        project.load_layer_by_name("Monuments"),
        Err(Error::MissingTransform { layer }) if layer == "Monuments"
    ));
}

#[test]
fn test_missing_project() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(Project::open(dir.path()), Err(Error::Io { .. })));
    std::fs::write(dir.path().join(PROJECT_FILE), "{ not json").unwrap();
    assert!(matches!(Project::open(dir.path()), Err(Error::Json(_))));
}
