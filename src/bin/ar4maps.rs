use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use ar4maps::camera::CameraIntrinsics;
use ar4maps::capture::{FrameSource, SequenceSource};
use ar4maps::data_loader::{Project, frame_paths};
use ar4maps::io::{load_rgb, save_frame};
use ar4maps::render::Compositor;
use ar4maps::tracker::Tracker;
use ar4maps::vector::Feature;
use clap::Parser;
use glam::DVec2;
use image::RgbImage;
use indicatif::ProgressBar;
use log::{debug, info, warn};

/// A click at pixel `x,y` applied after frame `frame` (1-based) is rendered.
#[derive(Debug, Clone, Copy)]
struct Click {
    position: DVec2,
    frame: u64,
}

impl FromStr for Click {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (xy, frame) = s
            .split_once('@')
            .ok_or_else(|| format!("expected x,y@frame, got `{}`", s))?;
        let (x, y) = xy
            .split_once(',')
            .ok_or_else(|| format!("expected x,y before @, got `{}`", xy))?;
        let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("`{}`: {}", v, e));
        Ok(Click {
            position: DVec2::new(parse(x)?, parse(y)?),
            frame: frame.trim().parse().map_err(|e| format!("`{}`: {}", frame, e))?,
        })
    }
}

#[derive(Parser)]
#[command(version, about, author)]
struct Ar4MapsCli {
    /// project folder containing config.json
    project: PathBuf,

    /// folder of video frames (png / jpg), played in file-name order
    frames: PathBuf,

    /// layer to overlay, defaults to the first layer of the project
    #[arg(short, long)]
    layer: Option<String>,

    /// simulated click, e.g. `320,240@15`; may be repeated
    #[arg(long)]
    click: Vec<Click>,

    /// write composited frames here
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// playback rate for --realtime
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// capture frames on a background thread at --fps, dropping frames the
    /// pipeline cannot keep up with
    #[arg(long)]
    realtime: bool,

    /// save a rerun recording of frames, tracked points and marker outline
    #[cfg(feature = "visualization")]
    #[arg(long)]
    record: Option<PathBuf>,
}

struct Session {
    tracker: Tracker,
    compositor: Compositor,
    camera: CameraIntrinsics,
    clicks: Vec<Click>,
    output: Option<PathBuf>,
    frames: u64,
    tracked: u64,
    #[cfg(feature = "visualization")]
    recording: Option<rerun::RecordingStream>,
}

impl Session {
    fn process(&mut self, mut frame: RgbImage) -> anyhow::Result<()> {
        let homography = self.tracker.update(&frame);
        self.frames += 1;
        if let Some(h) = &homography {
            self.tracked += 1;
            if let Some(pose) = self.camera.plane_pose(h) {
                debug!(
                    "frame {}: marker at t = {:.1?}",
                    self.frames,
                    pose.translation.vector.as_slice()
                );
            }
        }
        self.compositor.render(homography.as_ref(), &mut frame);
        #[cfg(feature = "visualization")]
        self.log_to_rerun(homography.as_ref(), &frame);

        let frame_idx = self.tracker.frame_count();
        for click in self.clicks.iter().filter(|c| c.frame == frame_idx) {
            let hit = self.compositor.hit_test(click.position);
            match hit {
                Some(feature) => describe(feature),
                None => info!("click at {:?}: nothing selected", click.position),
            }
            let id = hit.map(|f| f.id);
            self.compositor.set_highlighted(id);
        }

        if let Some(dir) = &self.output {
            save_frame(dir, self.frames as usize, &frame)
                .with_context(|| format!("writing frame {}", self.frames))?;
        }
        Ok(())
    }

    #[cfg(feature = "visualization")]
    fn log_to_rerun(&self, homography: Option<&ar4maps::types::Homography>, frame: &RgbImage) {
        use ar4maps::visualization::*;
        let Some(recording) = &self.recording else {
            return;
        };
        set_frame(recording, self.frames);
        let marker_size = self.tracker.marker().img_w_h();
        let logged = log_image_as_compressed(recording, "/cam0", frame, image::ImageFormat::Jpeg)
            .and_then(|_| log_marker_outline(recording, "/cam0", marker_size, homography));
        let logged = match (logged, self.tracker.last_frame()) {
            (Ok(()), Some(tracked)) => log_tracked_points(recording, "/cam0", tracked),
            (other, _) => other,
        };
        if let Err(e) = logged {
            warn!("rerun logging failed: {}", e);
        }
    }
}

fn describe(feature: &Feature) {
    let props = &feature.properties;
    info!(
        "selected {} #{}: {}",
        feature.kind().name(),
        feature.id.value(),
        props.title().unwrap_or("(untitled)")
    );
    if let Some(description) = props.description() {
        info!("  {}", description);
    }
    for (label, link) in [("website", props.website()), ("video", props.video())] {
        if let Some(link) = link {
            info!("  {}: {}", label, link);
        }
    }
    for photo in props.photos() {
        info!("  photo: {}", photo);
    }
}

fn run_offline(session: &mut Session, paths: &[PathBuf]) -> anyhow::Result<()> {
    let pb = ProgressBar::new(paths.len() as u64);
    for path in paths {
        match load_rgb(path) {
            Ok(frame) => session.process(frame)?,
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

fn run_realtime(session: &mut Session, paths: Vec<PathBuf>, fps: f64) -> anyhow::Result<()> {
    let mut source = SequenceSource::from_paths(paths, fps, false);
    let mut seen = 0;
    loop {
        let captured = source.captured();
        if captured == seen {
            if source.is_finished() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
            continue;
        }
        seen = captured;
        if let Some(frame) = source.read() {
            session.process(frame.as_ref().clone())?;
        }
    }
    source.stop();
    info!("captured {} frames, processed {}", seen, session.frames);
    Ok(())
}

fn open_session(cli: &Ar4MapsCli, project_dir: &Path) -> anyhow::Result<Session> {
    let project = Project::open(project_dir)
        .with_context(|| format!("opening project {}", project_dir.display()))?;
    let marker = project.load_marker().context("loading marker image")?;

    let mut compositor = Compositor::new(project.config.render.clone(), marker.dimensions());
    let layer = match &cli.layer {
        Some(name) => Some(project.config.layer(name)?),
        None => project.config.layers.first(),
    };
    match layer {
        Some(layer) => {
            let features = project
                .load_layer(layer)
                .with_context(|| format!("loading layer `{}`", layer.name))?;
            compositor.set_features(features);
        }
        None => warn!("project has no layers, only tracking"),
    }

    Ok(Session {
        tracker: Tracker::new(&marker, project.config.tracker.clone()),
        compositor,
        camera: CameraIntrinsics::default(),
        clicks: cli.click.clone(),
        output: cli.output.clone(),
        frames: 0,
        tracked: 0,
        #[cfg(feature = "visualization")]
        recording: match &cli.record {
            Some(path) => Some(
                rerun::RecordingStreamBuilder::new("ar4maps")
                    .save(path)
                    .with_context(|| format!("creating recording {}", path.display()))?,
            ),
            None => None,
        },
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Ar4MapsCli::parse();
    if cli.fps <= 0.0 {
        bail!("--fps must be positive");
    }

    let mut session = open_session(&cli, &cli.project)?;
    let paths = frame_paths(&cli.frames).context("listing frames")?;
    info!("replaying {} frames", paths.len());

    let now = Instant::now();
    if cli.realtime {
        run_realtime(&mut session, paths, cli.fps)?;
    } else {
        run_offline(&mut session, &paths)?;
    }
    let duration_sec = now.elapsed().as_secs_f64();

    info!(
        "{} frames, {} tracked, {:.3} sec, {:.1} fps",
        session.frames,
        session.tracked,
        duration_sec,
        session.frames as f64 / duration_sec.max(1e-9)
    );
    Ok(())
}
