//! Marker tracking: re-acquisition by feature matching, then frame-to-frame
//! propagation by optical flow until too few points survive.

use glam::Vec2;
use image::RgbImage;
use log::{debug, trace};

use crate::config::TrackerConfig;
use crate::detected_points::{FrameFeature, to_dvec2};
use crate::detection::{FeatureExtractor, OrbExtractor};
use crate::matching::RatioMatcher;
use crate::optical_flow::{FlowPropagator, LucasKanade};
use crate::optimization::RansacHomography;
use crate::types::{Homography, is_valid_homography, normalize_homography};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackingState {
    Lost,
    Tracking { homography: Homography },
}

impl TrackingState {
    pub fn homography(&self) -> Option<Homography> {
        match self {
            TrackingState::Lost => None,
            TrackingState::Tracking { homography } => Some(*homography),
        }
    }
}

pub struct Tracker<E = OrbExtractor, F = LucasKanade> {
    config: TrackerConfig,
    extractor: E,
    flow: F,
    matcher: RatioMatcher,
    estimator: RansacHomography,
    marker: FrameFeature,
    prev: Option<FrameFeature>,
    state: TrackingState,
    frame_count: u64,
}

impl Tracker {
    /// Tracker with the ORB extractor and Lucas-Kanade flow described by
    /// `config`.
    pub fn new(marker: &RgbImage, config: TrackerConfig) -> Tracker {
        let extractor = OrbExtractor::new(config.orb.clone());
        let flow = LucasKanade::new(config.lk.clone());
        Tracker::with_components(marker, config, extractor, flow)
    }
}

impl<E: FeatureExtractor, F: FlowPropagator> Tracker<E, F> {
    pub fn with_components(
        marker: &RgbImage,
        config: TrackerConfig,
        extractor: E,
        flow: F,
    ) -> Tracker<E, F> {
        let mut marker = FrameFeature::new(marker);
        marker.detect_and_compute(&extractor);
        debug!("marker reference has {} keypoints", marker.keypoints.len());
        Tracker {
            matcher: RatioMatcher::new(config.lowe_ratio),
            estimator: RansacHomography::new(config.ransac.clone()),
            config,
            extractor,
            flow,
            marker,
            prev: None,
            state: TrackingState::Lost,
            frame_count: 0,
        }
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    /// Number of frames consumed so far; the first frame is frame 1.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn marker(&self) -> &FrameFeature {
        &self.marker
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The most recent frame with its flow and matched points.
    pub fn last_frame(&self) -> Option<&FrameFeature> {
        self.prev.as_ref()
    }

    /// Consumes one frame and returns the marker-to-frame homography, or
    /// `None` while the marker is lost.
    pub fn update(&mut self, image: &RgbImage) -> Option<Homography> {
        self.frame_count += 1;
        let mut frame = FrameFeature::new(image);
        let prev = self.prev.take();

        if let TrackingState::Tracking { homography } = self.state {
            let propagated = prev
                .as_ref()
                .and_then(|prev| self.propagate(prev, &mut frame, &homography));
            self.state = match propagated {
                Some(homography) => TrackingState::Tracking { homography },
                None => TrackingState::Lost,
            };
        }

        if self.state == TrackingState::Lost
            && self.frame_count % self.config.reacquire_period.max(1) == 0
        {
            if let Some(homography) = self.reacquire(&mut frame) {
                self.state = TrackingState::Tracking { homography };
            }
        }

        self.prev = Some(frame);
        self.state.homography()
    }

    /// Moves `prev.points` into `frame` and composes the frame-to-frame
    /// motion with `prior`.
    fn propagate(
        &self,
        prev: &FrameFeature,
        frame: &mut FrameFeature,
        prior: &Homography,
    ) -> Option<Homography> {
        let results = self.flow.propagate(&prev.gray, &frame.gray, &prev.points);
        let (from, to): (Vec<Vec2>, Vec<Vec2>) = prev
            .points
            .iter()
            .zip(&results)
            .filter(|(_, r)| r.valid)
            .map(|(p, r)| (*p, r.position))
            .unzip();

        trace!("frame {}: {} of {} flow points survived", self.frame_count, to.len(), prev.points.len());
        if to.len() < self.config.min_flow_survivors() {
            debug!(
                "frame {}: lost marker, {} flow survivors < {}",
                self.frame_count,
                to.len(),
                self.config.min_flow_survivors()
            );
            return None;
        }

        let Some(candidate) = self.estimator.estimate(&to_dvec2(&from), &to_dvec2(&to)) else {
            debug!("frame {}: lost marker, no frame-to-frame homography", self.frame_count);
            return None;
        };
        let homography = normalize_homography(&(candidate.h * prior));
        if !is_valid_homography(&homography) {
            debug!("frame {}: lost marker, degenerate homography", self.frame_count);
            return None;
        }
        frame.matched_points = to.clone();
        frame.points = to;
        Some(homography)
    }

    /// Full detection and matching against the marker reference.
    fn reacquire(&self, frame: &mut FrameFeature) -> Option<Homography> {
        frame.detect_and_compute(&self.extractor);
        let matches = self
            .matcher
            .match_descriptors(&self.marker.descriptors, &frame.descriptors);
        trace!(
            "frame {}: {} keypoints, {} ratio-test matches",
            self.frame_count,
            frame.keypoints.len(),
            matches.len()
        );
        if matches.len() <= self.config.min_matches {
            return None;
        }

        let (src, dst): (Vec<Vec2>, Vec<Vec2>) = matches
            .iter()
            .map(|m| {
                (
                    self.marker.keypoints[m.query_idx].pt,
                    frame.keypoints[m.train_idx].pt,
                )
            })
            .unzip();
        let estimate = self.estimator.estimate(&to_dvec2(&src), &to_dvec2(&dst))?;
        debug!(
            "frame {}: acquired marker, {} matches, {} inliers",
            self.frame_count,
            matches.len(),
            estimate.inlier_count()
        );
        frame.matched_points = dst;
        frame.points = frame.keypoint_positions();
        Some(estimate.h)
    }
}
