//! Choosing which moments of the animation become frames, and rendering them

use crate::error::{CatResult, Error};
use crate::progress::ProgressReporter;
use crate::render::{resized, ImgVec, Render, RGBA8};
use crate::source::AnimationInfo;
use crate::{Settings, MAX_DIMENSION, MAX_FPS};
use imgref::ImgRef;
use log::{debug, info};
use std::iter::FusedIterator;

/// Absorbs float noise in `duration * fps` (e.g. 0.1 × 30 = 3.0000000000000004)
const FRAME_COUNT_EPSILON: f64 = 1e-6;

/// How many frames to render, when, and how fast to play them
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FramePlan {
    frame_count: usize,
    fps: f64,
    source_duration: f64,
}

impl FramePlan {
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[inline]
    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Length of the source animation in seconds
    #[inline]
    #[must_use]
    pub fn source_duration(&self) -> f64 {
        self.source_duration
    }

    /// How long the output plays. Equals the source duration when timing is preserved.
    #[inline]
    #[must_use]
    pub fn playback_duration(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }

    /// Time in the source animation (seconds) sampled for frame `index`.
    /// Frames are spread evenly over `[0, source_duration)`.
    #[inline]
    #[must_use]
    pub fn offset(&self, index: usize) -> f64 {
        index as f64 * self.source_duration / self.frame_count as f64
    }
}

/// Decides the frame count and frame rate.
///
/// With `preserve_timing` the native frames are kept (up to the cap), and the frame rate is
/// adjusted so that the output lasts as long as the source. Long animations get subsampled,
/// never sped up or slowed down.
///
/// Otherwise `settings.fps` is used, and the frame count is whatever that rate needs to cover
/// the source, up to the cap. If the cap cuts it short, the output plays faster than the source.
pub fn plan(info: &AnimationInfo, settings: &Settings) -> CatResult<FramePlan> {
    let native_frames = info.total_frames();
    if native_frames == 0 {
        return Err(Error::InvalidSource(format!("the animation has no frames (in point {}, out point {})", info.in_point, info.out_point)));
    }
    if !info.frame_rate.is_finite() || info.frame_rate <= 0. {
        return Err(Error::InvalidSource(format!("frame rate {} can't be used", info.frame_rate)));
    }
    let source_duration = info.duration();
    if source_duration <= 0. {
        return Err(Error::InvalidSource("the animation has no duration".into()));
    }

    let (frame_count, fps) = if settings.preserve_timing {
        let frame_count = settings.frame_cap.apply(native_frames).min(frame_limit(source_duration));
        (frame_count, frame_count as f64 / source_duration)
    } else {
        let fps = f64::from(settings.fps);
        let needed = (source_duration * fps - FRAME_COUNT_EPSILON).ceil().max(0.) as u64;
        (settings.frame_cap.apply(needed), fps)
    };
    if frame_count == 0 {
        return Err(Error::InvalidSource(format!("{source_duration:.3}s at {fps} fps gives no frames")));
    }

    let frame_count = usize::try_from(frame_count)?;
    if frame_count as u64 != native_frames || !settings.preserve_timing {
        info!("Rendering {frame_count} of {native_frames} frames at {fps:.2} fps ({source_duration:.2}s source)");
    } else {
        debug!("Keeping all {frame_count} frames at {fps:.2} fps");
    }
    Ok(FramePlan { frame_count, fps, source_duration })
}

/// Most frames that can be shown in `duration` seconds without going over [`MAX_FPS`]. At least 1.
#[must_use]
pub fn frame_limit(duration: f64) -> u64 {
    (duration * f64::from(MAX_FPS) + FRAME_COUNT_EPSILON).floor().max(1.) as u64
}

/// Output size: explicit, derived from one side and the aspect ratio, or the native canvas
pub fn output_size(info: &AnimationInfo, settings: &Settings) -> CatResult<(u32, u32)> {
    let scale = |a: u32, b: u32, c: u32| -> u32 {
        let c = u64::from(c.max(1));
        ((u64::from(a) * u64::from(b) + c / 2) / c).clamp(1, u32::MAX.into()) as u32
    };
    let size = match (settings.width, settings.height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale(info.height, w, info.width)),
        (None, Some(h)) => (scale(info.width, h, info.height), h),
        (None, None) => (info.width, info.height),
    };
    if size.0 == 0 || size.1 == 0 {
        return Err(Error::InvalidConfig(format!("output size {}×{} is empty", size.0, size.1)));
    }
    if size.0 > MAX_DIMENSION || size.1 > MAX_DIMENSION {
        return Err(Error::InvalidConfig(format!("output size {}×{} is larger than WebP allows ({MAX_DIMENSION})", size.0, size.1)));
    }
    Ok(size)
}

/// Lazily rendered frames, in order
pub struct Frames<'plan, R> {
    renderer: R,
    plan: &'plan FramePlan,
    width: u32,
    height: u32,
    next_index: usize,
}

impl<'plan, R: Render> Frames<'plan, R> {
    pub fn new(renderer: R, plan: &'plan FramePlan, width: u32, height: u32) -> Self {
        Self { renderer, plan, width, height, next_index: 0 }
    }
}

impl<R: Render> Iterator for Frames<'_, R> {
    type Item = CatResult<ImgVec<RGBA8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.plan.frame_count {
            return None;
        }
        let offset = self.plan.offset(self.next_index);
        self.next_index += 1;
        Some(self.renderer.render_frame(offset, self.width, self.height)
            .and_then(|img| resized(img, self.width, self.height)))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.plan.frame_count.saturating_sub(self.next_index);
        (left, Some(left))
    }
}

impl<R: Render> ExactSizeIterator for Frames<'_, R> {}
impl<R: Render> FusedIterator for Frames<'_, R> {}

/// Rendered frames that play at a constant rate
pub struct FrameSequence {
    frames: Vec<ImgVec<RGBA8>>,
    fps: f64,
    duration: f64,
}

impl FrameSequence {
    /// `duration` is the playback length in seconds
    pub fn new(frames: Vec<ImgVec<RGBA8>>, fps: f64, duration: f64) -> Self {
        Self { frames, fps, duration }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[inline]
    #[must_use]
    pub fn frames(&self) -> &[ImgVec<RGBA8>] {
        &self.frames
    }

    #[must_use]
    pub fn as_refs(&self) -> Vec<ImgRef<'_, RGBA8>> {
        self.frames.iter().map(|f| f.as_ref()).collect()
    }
}

/// Renders every frame of the plan.
///
/// `ProgressReporter::increase()` is called after each frame, and may abort by returning `false`.
pub fn extract<R: Render>(renderer: R, plan: &FramePlan, width: u32, height: u32, reporter: &mut dyn ProgressReporter) -> CatResult<FrameSequence> {
    let mut frames = Vec::new();
    frames.try_reserve_exact(plan.frame_count)?;
    for frame in Frames::new(renderer, plan, width, height) {
        frames.push(frame?);
        if !reporter.increase() {
            return Err(Error::Aborted);
        }
    }
    Ok(FrameSequence::new(frames, plan.fps, plan.playback_duration()))
}
