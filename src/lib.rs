/*
 tgs2webp Telegram animated sticker to WebP converter

 This program is free software: you can redistribute it and/or modify
 it under the terms of the GNU Affero General Public License as
 published by the Free Software Foundation, either version 3 of the
 License, or (at your option) any later version.

 This program is distributed in the hope that it will be useful,
 but WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 GNU Affero General Public License for more details.

 You should have received a copy of the GNU Affero General Public License
 along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
//! Converts Telegram animated stickers (`.tgs`, gzipped Lottie) to animated WebP.
//!
//! ```no_run
//! let ok = tgs2webp::convert_tgs_to_webp("sticker.tgs", "sticker.webp", None, None, 80, 30., true);
//! ```
//!
//! For converting many files with the same settings, create a [`Converter`] once.

use log::{error, info, warn};
use std::path::Path;

mod error;
pub use crate::error::*;
pub mod budget;
pub mod c_api;
pub mod encode;
pub mod extract;
pub mod output;
pub mod progress;
pub mod render;
pub mod source;

use crate::budget::Budget;
use crate::encode::Encoder;
use crate::extract::FrameSequence;
use crate::progress::{NoProgress, ProgressReporter};
use crate::render::Render;
use crate::source::{AnimationInfo, AnimationSource};

/// WebP quality used when none is given
pub const DEFAULT_QUALITY: u8 = 80;
/// Playback rate used when timing isn't preserved
pub const DEFAULT_FPS: f32 = 30.;
/// Default limit on the number of rendered frames
pub const DEFAULT_FRAME_CAP: u32 = 60;
/// Lowest quality the file size search may go down to
pub const DEFAULT_MIN_QUALITY: u8 = 1;
/// WebP can't be larger than this in either dimension
pub const MAX_DIMENSION: u32 = 16383;
/// WebP frame durations are in milliseconds
pub const MAX_FPS: f32 = 1000.;

/// Upper bound on how many frames are rendered
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameCap {
    Limited(u32),
    /// All native frames are rendered. Memory and time grow with the length of the animation,
    /// so callers that accept arbitrary files should prefer a limit.
    Unlimited,
}

impl FrameCap {
    #[inline]
    #[must_use]
    pub fn apply(self, frames: u64) -> u64 {
        match self {
            Self::Limited(cap) => frames.min(cap.into()),
            Self::Unlimited => frames,
        }
    }
}

/// How many times the animation plays
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Repeat {
    Infinite,
    /// Number of additional plays after the first one
    Finite(u16),
}

#[derive(Copy, Clone, Debug)]
pub struct Settings {
    /// Output width. Derived from the height and aspect ratio if not set.
    pub width: Option<u32>,
    /// Output height. Note that if both are set, aspect ratio is not preserved.
    pub height: Option<u32>,
    /// 0-100
    pub quality: u8,
    /// Playback rate, used only when `preserve_timing` is off
    pub fps: f32,
    /// Pick the frame rate so that the output plays as long as the source
    pub preserve_timing: bool,
    pub frame_cap: FrameCap,
    /// If set, frames and quality are reduced until the file is at most this big
    pub max_bytes: Option<u64>,
    /// Quality floor for the file size search
    pub min_quality: u8,
    pub repeat: Repeat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            quality: DEFAULT_QUALITY,
            fps: DEFAULT_FPS,
            preserve_timing: true,
            frame_cap: FrameCap::Limited(DEFAULT_FRAME_CAP),
            max_bytes: None,
            min_quality: DEFAULT_MIN_QUALITY,
            repeat: Repeat::Infinite,
        }
    }
}

impl Settings {
    /// Checks everything that can be checked without opening the file
    pub fn validate(&self) -> CatResult<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            match value {
                Some(0) => return Err(Error::InvalidConfig(format!("{name} must be at least 1"))),
                Some(v) if v > MAX_DIMENSION => {
                    return Err(Error::InvalidConfig(format!("{name} {v} is larger than WebP allows ({MAX_DIMENSION})")))
                },
                _ => {},
            }
        }
        if self.quality > 100 {
            return Err(Error::InvalidConfig(format!("quality {} is over 100", self.quality)));
        }
        if !self.fps.is_finite() || self.fps <= 0. {
            return Err(Error::InvalidConfig(format!("fps {} must be a positive number", self.fps)));
        }
        if self.fps > MAX_FPS {
            return Err(Error::InvalidConfig(format!("{MAX_FPS} fps is maximum")));
        }
        if self.frame_cap == FrameCap::Limited(0) {
            return Err(Error::InvalidConfig("frame limit must be at least 1".into()));
        }
        if let Some(max_bytes) = self.max_bytes {
            if max_bytes == 0 {
                return Err(Error::InvalidConfig("size limit must be at least 1 byte".into()));
            }
            if self.min_quality > self.quality {
                return Err(Error::InvalidConfig(format!("minimum quality {} is above quality {}", self.min_quality, self.quality)));
            }
        }
        Ok(())
    }
}

/// What was written
#[derive(Debug, Clone)]
pub struct Conversion {
    /// The WebP file
    pub data: Vec<u8>,
    pub frames: usize,
    pub fps: f64,
    pub quality: u8,
}

/// Converts any number of files with the same settings
#[derive(Debug, Clone)]
pub struct Converter {
    settings: Settings,
}

impl Converter {
    /// Fails if the settings are invalid
    pub fn new(settings: Settings) -> CatResult<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns `false` on any error. Details of the error are logged.
    ///
    /// On failure nothing is written to `output`.
    pub fn convert(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> bool {
        let (input, output) = (input.as_ref(), output.as_ref());
        match self.try_convert(input, output, &mut NoProgress {}) {
            Ok(res) => {
                info!("{} → {}: {} frames at {:.2} fps, Q={}, {} bytes", input.display(), output.display(), res.frames, res.fps, res.quality, res.data.len());
                true
            },
            Err(err) => {
                error!("Can't convert {}: {}", input.display(), err);
                false
            },
        }
    }

    /// Converts and writes the file. The output file is replaced only when everything succeeded.
    pub fn try_convert(&self, input: &Path, output: &Path, reporter: &mut dyn ProgressReporter) -> CatResult<Conversion> {
        let res = self.convert_to_vec(input, reporter)?;
        output::write_atomically(output, &res.data)?;
        Ok(res)
    }

    /// Converts without writing anything
    pub fn convert_to_vec(&self, input: &Path, reporter: &mut dyn ProgressReporter) -> CatResult<Conversion> {
        let source = AnimationSource::load(input)?;
        self.convert_animation(&source, reporter)
    }

    /// Renders an already loaded animation with rlottie and encodes it
    #[cfg(feature = "lottie")]
    pub fn convert_animation(&self, source: &AnimationSource, reporter: &mut dyn ProgressReporter) -> CatResult<Conversion> {
        // rlottie allocates its surface up front
        extract::output_size(source.info(), &self.settings)?;
        let renderer = render::LottieRenderer::new(source)?;
        self.convert_source(source.info(), renderer, &mut encode::WebpEncoder::new(self.settings.repeat), reporter)
    }

    /// Always fails with [`Error::RendererUnavailable`] in builds without the `lottie` feature
    #[cfg(not(feature = "lottie"))]
    #[cold]
    pub fn convert_animation(&self, _: &AnimationSource, _: &mut dyn ProgressReporter) -> CatResult<Conversion> {
        Err(Error::RendererUnavailable)
    }

    /// Runs the conversion with a custom renderer and encoder
    pub fn convert_source<R: Render, E: Encoder>(&self, info: &AnimationInfo, renderer: R, encoder: &mut E, reporter: &mut dyn ProgressReporter) -> CatResult<Conversion> {
        let settings = &self.settings;
        let (width, height) = extract::output_size(info, settings)?;
        let plan = extract::plan(info, settings)?;
        if !settings.preserve_timing && (plan.playback_duration() - plan.source_duration()).abs() > 0.001 {
            warn!("Animation of {:.2}s will play in {:.2}s at {} fps", plan.source_duration(), plan.playback_duration(), plan.fps());
        }

        let frames = extract::extract(renderer, &plan, width, height, reporter)?;
        match settings.max_bytes {
            None => Self::encode_all(&frames, settings.quality, encoder),
            Some(max_bytes) => {
                let budget = Budget::new(max_bytes, settings.min_quality, settings.quality);
                let fit = budget::encode_with_budget(&frames, &budget, encoder, reporter)?;
                Ok(Conversion {
                    data: fit.data,
                    frames: fit.frames,
                    fps: fit.fps,
                    quality: fit.quality,
                })
            },
        }
    }

    fn encode_all<E: Encoder>(frames: &FrameSequence, quality: u8, encoder: &mut E) -> CatResult<Conversion> {
        let data = encoder.encode(&frames.as_refs(), frames.fps(), quality)?;
        Ok(Conversion {
            data,
            frames: frames.len(),
            fps: frames.fps(),
            quality,
        })
    }
}

/// Converts a TGS file to animated WebP. Returns `false` on failure (the reason is logged).
///
/// `width`/`height` default to the sticker's own size. `fps` is used only if `preserve_timing` is `false`.
pub fn convert_tgs_to_webp(input: impl AsRef<Path>, output: impl AsRef<Path>, width: Option<u32>, height: Option<u32>, quality: u8, fps: f32, preserve_timing: bool) -> bool {
    let settings = Settings {
        width,
        height,
        quality,
        fps,
        preserve_timing,
        ..Settings::default()
    };
    match Converter::new(settings) {
        Ok(converter) => converter.convert(input, output),
        Err(err) => {
            error!("{err}");
            false
        },
    }
}
