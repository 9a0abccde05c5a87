//! Overlay compositor: draws a layer through the tracked homography and
//! answers which feature lies under a click.

mod draw;

use glam::DVec2;
use image::{Rgb, RgbImage};
use log::trace;
use rayon::prelude::*;

use crate::config::RenderConfig;
use crate::types::{Homography, is_valid_homography, project_point};
use crate::vector::{Feature, FeatureId, FeatureSet, Geometry};

pub struct Compositor {
    config: RenderConfig,
    marker_size: (u32, u32),
    homography: Option<Homography>,
    features: Option<FeatureSet>,
    highlighted: Option<FeatureId>,
}

/// Where a feature is drawn: the blended overlay, and the frame itself when
/// highlighted.
struct Targets<'a> {
    overlay: &'a mut RgbImage,
    frame: Option<&'a mut RgbImage>,
}

impl Compositor {
    pub fn new(config: RenderConfig, marker_size: (u32, u32)) -> Compositor {
        Compositor {
            config,
            marker_size,
            homography: None,
            features: None,
            highlighted: None,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Replaces the active layer wholesale.
    pub fn set_features(&mut self, features: FeatureSet) {
        self.features = Some(features);
    }

    pub fn features(&self) -> Option<&FeatureSet> {
        self.features.as_ref()
    }

    /// No check that `id` belongs to the active layer.
    pub fn set_highlighted(&mut self, id: Option<FeatureId>) {
        self.highlighted = id;
    }

    pub fn highlighted(&self) -> Option<FeatureId> {
        self.highlighted
    }

    /// Homography of the last rendered frame.
    pub fn homography(&self) -> Option<&Homography> {
        self.homography.as_ref()
    }

    /// Composites the active layer onto `frame`. Does nothing to the frame
    /// without a homography or a layer.
    pub fn render(&mut self, homography: Option<&Homography>, frame: &mut RgbImage) {
        self.homography = homography.copied();
        let (Some(h), Some(features)) = (self.homography.as_ref(), self.features.as_ref()) else {
            return;
        };
        if !is_valid_homography(h) {
            return;
        }

        if self.config.draw_marker_border {
            self.draw_marker_border(h, frame);
        }

        let mut overlay = frame.clone();
        for feature in features {
            let highlighted = self.highlighted == Some(feature.id);
            let mut targets = Targets {
                overlay: &mut overlay,
                frame: if highlighted { Some(&mut *frame) } else { None },
            };
            if !self.draw_feature(h, feature, &mut targets) {
                trace!("feature {:?} not drawable this frame", feature.id);
            }
        }
        blend(&overlay, frame, self.config.opacity);
    }

    /// Feature under a frame pixel, by the last-rendered homography. When
    /// several features match, the last one in storage order wins.
    pub fn hit_test(&self, position: DVec2) -> Option<&Feature> {
        let h = self.homography.as_ref()?;
        let features = self.features.as_ref()?;
        let p = project_point(&h.try_inverse()?, position)?;
        hit_test::last_hit(features, p, self.config.point_radius as f64)
    }

    fn draw_marker_border(&self, h: &Homography, frame: &mut RgbImage) {
        let (w, hgt) = (self.marker_size.0 as f64, self.marker_size.1 as f64);
        let corners = [
            DVec2::ZERO,
            DVec2::new(w, 0.0),
            DVec2::new(w, hgt),
            DVec2::new(0.0, hgt),
        ];
        if let Some(pts) = draw::to_canvas(h, &corners, frame) {
            draw::polyline(frame, &pts, true, 3, Rgb(self.config.marker_border_color));
        }
    }

    /// Returns false when the projection of the feature is unusable.
    fn draw_feature(&self, h: &Homography, feature: &Feature, t: &mut Targets<'_>) -> bool {
        let cfg = &self.config;
        let fill = feature.properties.fill();
        match &feature.geometry {
            Geometry::Point(p) => self.draw_points(h, &[*p], Rgb(fill.unwrap_or(cfg.point_color)), t),
            Geometry::MultiPoint(ps) => self.draw_points(h, ps, Rgb(fill.unwrap_or(cfg.line_color)), t),
            Geometry::LineString(line) => {
                self.draw_lines(h, std::slice::from_ref(line), Rgb(fill.unwrap_or(cfg.line_color)), t)
            }
            Geometry::MultiLineString(lines) => {
                self.draw_lines(h, lines, Rgb(fill.unwrap_or(cfg.line_color)), t)
            }
            Geometry::Polygon(rings) => self.draw_polygons(h, std::slice::from_ref(rings), fill, t),
            Geometry::MultiPolygon(polygons) => self.draw_polygons(h, polygons, fill, t),
        }
    }

    fn draw_points(&self, h: &Homography, pts: &[DVec2], color: Rgb<u8>, t: &mut Targets<'_>) -> bool {
        let Some(pts) = draw::to_canvas(h, pts, t.overlay) else {
            return false;
        };
        let r = self.config.point_radius;
        for &p in &pts {
            draw::disc(t.overlay, p, r, color);
            if let Some(frame) = t.frame.as_deref_mut() {
                draw::disc(frame, p, r, color);
                draw::ring(
                    frame,
                    p,
                    r + self.config.highlight_ring_offset,
                    self.config.highlight_ring_thickness,
                    color,
                );
            }
        }
        true
    }

    fn draw_lines(&self, h: &Homography, lines: &[Vec<DVec2>], color: Rgb<u8>, t: &mut Targets<'_>) -> bool {
        let mut drawn = true;
        for line in lines {
            let Some(pts) = draw::to_canvas(h, line, t.overlay) else {
                drawn = false;
                continue;
            };
            draw::polyline(t.overlay, &pts, false, self.config.line_thickness, color);
            if let Some(frame) = t.frame.as_deref_mut() {
                draw::polyline(frame, &pts, false, self.config.line_thickness, color);
            }
        }
        drawn
    }

    /// Fills each polygon's outer ring. Only polygons without an explicit
    /// colour get a border.
    fn draw_polygons(
        &self,
        h: &Homography,
        polygons: &[Vec<Vec<DVec2>>],
        fill: Option<[u8; 3]>,
        t: &mut Targets<'_>,
    ) -> bool {
        let color = Rgb(fill.unwrap_or(self.config.polygon_color));
        let border = Rgb(self.config.polygon_border_color);
        let mut drawn = true;
        for outer in polygons.iter().filter_map(|rings| rings.first()) {
            let Some(pts) = draw::to_canvas(h, outer, t.overlay) else {
                drawn = false;
                continue;
            };
            draw::filled_polygon(t.overlay, &pts, color);
            if fill.is_none() {
                draw::polyline(t.overlay, &pts, true, self.config.line_thickness, border);
            }
            if let Some(frame) = t.frame.as_deref_mut() {
                draw::filled_polygon(frame, &pts, color);
            }
        }
        drawn
    }
}

/// `frame = opacity * overlay + (1 - opacity) * frame`, per channel.
fn blend(overlay: &RgbImage, frame: &mut RgbImage, opacity: f32) {
    let a = opacity.clamp(0.0, 1.0);
    let b = 1.0 - a;
    let dst: &mut [u8] = frame;
    dst.par_iter_mut()
        .zip(overlay.as_raw().par_iter())
        .for_each(|(f, &o)| {
            *f = (a * o as f32 + b * *f as f32).round().clamp(0.0, 255.0) as u8;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Properties;

    fn frame() -> RgbImage {
        RgbImage::from_pixel(60, 60, Rgb([100, 100, 100]))
    }

    fn point_set() -> FeatureSet {
        FeatureSet::new(vec![Feature::new(
            Geometry::Point(DVec2::new(30.0, 30.0)),
            Properties::default(),
        )])
    }

    #[test]
    fn test_noop_without_homography_or_layer() {
        let mut compositor = Compositor::new(RenderConfig::default(), (60, 60));
        let mut img = frame();
        compositor.render(Some(&Homography::identity()), &mut img);
        assert_eq!(img, frame());

        compositor.set_features(point_set());
        compositor.render(None, &mut img);
        assert_eq!(img, frame());
        assert!(compositor.hit_test(DVec2::new(30.0, 30.0)).is_none());
    }

    #[test]
    fn test_blend_weights() {
        let mut compositor = Compositor::new(RenderConfig::default(), (60, 60));
        compositor.set_features(point_set());
        let mut img = frame();
        compositor.render(Some(&Homography::identity()), &mut img);
        // 0.6 * (255, 60, 0) + 0.4 * 100
        assert_eq!(*img.get_pixel(30, 30), Rgb([193, 76, 40]));
        assert_eq!(*img.get_pixel(5, 5), Rgb([100, 100, 100]));
    }

    #[test]
    fn test_highlight_is_drawn_undimmed() {
        let mut compositor = Compositor::new(RenderConfig::default(), (60, 60));
        let set = point_set();
        let id = set.features()[0].id;
        compositor.set_features(set);
        compositor.set_highlighted(Some(id));
        let mut img = frame();
        compositor.render(Some(&Homography::identity()), &mut img);
        assert_eq!(*img.get_pixel(30, 30), Rgb([255, 60, 0]));
        // ring at radius 18 is only on the frame: 0.6 * 100 + 0.4 * colour
        assert_eq!(*img.get_pixel(48, 30), Rgb([162, 84, 60]));
    }

    #[test]
    fn test_unknown_highlight_is_harmless() {
        let mut compositor = Compositor::new(RenderConfig::default(), (60, 60));
        compositor.set_features(point_set());
        compositor.set_highlighted(Some(FeatureId::next()));
        let mut img = frame();
        compositor.render(Some(&Homography::identity()), &mut img);
        assert_eq!(*img.get_pixel(30, 30), Rgb([193, 76, 40]));
    }

    #[test]
    fn test_explicit_fill_and_default_border() {
        let square = vec![vec![
            DVec2::new(10.0, 10.0),
            DVec2::new(50.0, 10.0),
            DVec2::new(50.0, 50.0),
            DVec2::new(10.0, 50.0),
        ]];
        let mut props = Properties::default();
        props.0.insert("fill".into(), "#0000ff".into());
        let mut compositor = Compositor::new(RenderConfig::default(), (60, 60));
        compositor.set_features(FeatureSet::new(vec![Feature::new(
            Geometry::Polygon(square.clone()),
            props,
        )]));
        let mut img = frame();
        compositor.render(Some(&Homography::identity()), &mut img);
        assert_eq!(*img.get_pixel(30, 30), Rgb([40, 40, 193]));
        assert_eq!(*img.get_pixel(30, 10), Rgb([40, 40, 193]));

        compositor.set_features(FeatureSet::new(vec![Feature::new(
            Geometry::Polygon(square),
            Properties::default(),
        )]));
        let mut img = frame();
        compositor.render(Some(&Homography::identity()), &mut img);
        assert_eq!(*img.get_pixel(30, 30), Rgb([193, 123, 40]));
        assert_eq!(*img.get_pixel(30, 10), Rgb([193, 40, 40]));
    }

    #[test]
    fn test_hit_test_through_homography() {
        let mut compositor = Compositor::new(RenderConfig::default(), (60, 60));
        compositor.set_features(point_set());
        let h = crate::types::translation(100.0, 50.0);
        let mut img = RgbImage::new(200, 200);
        compositor.render(Some(&h), &mut img);
        let hit = compositor.hit_test(DVec2::new(132.0, 81.0)).map(|f| f.id);
        assert_eq!(hit, Some(compositor.features().unwrap().features()[0].id));
        assert_eq!(
            compositor.hit_test(DVec2::new(132.0, 81.0)).map(|f| f.id),
            hit,
            "hit test is idempotent"
        );
        assert!(compositor.hit_test(DVec2::new(30.0, 30.0)).is_none());
    }
}
