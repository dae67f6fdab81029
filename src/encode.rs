//! Assembling frames into an animated WebP

use crate::error::{CatResult, Error};
use crate::Repeat;
use imgref::ImgRef;
use rgb::RGBA8;
use webp_animation::{AnimParams, EncoderOptions, EncodingConfig, EncodingType, LossyEncodingConfig};

/// libwebp's speed/size tradeoff, 0 (fast) to 6 (small)
const WEBP_METHOD: usize = 4;

/// Turns same-sized frames, shown at a constant rate, into an animated image
pub trait Encoder {
    /// `quality` is 0-100. Returns the complete file.
    fn encode(&mut self, frames: &[ImgRef<'_, RGBA8>], fps: f64, quality: u8) -> CatResult<Vec<u8>>;
}

impl<E: Encoder + ?Sized> Encoder for &mut E {
    #[inline]
    fn encode(&mut self, frames: &[ImgRef<'_, RGBA8>], fps: f64, quality: u8) -> CatResult<Vec<u8>> {
        (**self).encode(frames, fps, quality)
    }
}

/// Lossy animated WebP via libwebp
pub struct WebpEncoder {
    repeat: Repeat,
}

impl WebpEncoder {
    #[must_use]
    pub fn new(repeat: Repeat) -> Self {
        Self { repeat }
    }

    fn loop_count(&self) -> i32 {
        match self.repeat {
            Repeat::Infinite => 0,
            Repeat::Finite(n) => i32::from(n) + 1,
        }
    }
}

impl Encoder for WebpEncoder {
    fn encode(&mut self, frames: &[ImgRef<'_, RGBA8>], fps: f64, quality: u8) -> CatResult<Vec<u8>> {
        let first = frames.first().ok_or(Error::NoFrames)?;
        let dimensions = (u32::try_from(first.width())?, u32::try_from(first.height())?);

        let options = EncoderOptions {
            anim_params: AnimParams { loop_count: self.loop_count() },
            encoding_config: Some(EncodingConfig {
                encoding_type: EncodingType::Lossy(LossyEncodingConfig::default()),
                quality: f32::from(quality.min(100)),
                method: WEBP_METHOD,
            }),
            ..Default::default()
        };
        let mut encoder = webp_animation::Encoder::new_with_options(dimensions, options)?;

        let mut last_timestamp = 0;
        for (i, frame) in frames.iter().enumerate() {
            if frame.width() != first.width() || frame.height() != first.height() {
                return Err(Error::WrongSize(format!("Frame {} has wrong size ({}×{}, expected {}×{})", i + 1,
                    frame.width(), frame.height(), first.width(), first.height())));
            }
            last_timestamp = timestamp_ms(i, fps)?;
            let (pixels, _, _) = frame.to_contiguous_buf();
            encoder.add_frame(rgb::bytemuck::cast_slice::<RGBA8, u8>(&pixels), last_timestamp)?;
        }
        // the last frame is shown for at least 1ms
        let end = timestamp_ms(frames.len(), fps)?.max(last_timestamp + 1);
        let webp = encoder.finalize(end)?;
        Ok(webp.to_vec())
    }
}

/// When frame `index` is shown, in milliseconds.
///
/// Each timestamp is rounded on its own, so rounding errors don't add up over the animation
/// (same idea as telecine pulldown).
pub fn timestamp_ms(index: usize, fps: f64) -> CatResult<i32> {
    if !fps.is_finite() || fps <= 0. {
        return Err(Error::InvalidConfig(format!("can't time frames at {fps} fps")));
    }
    let ms = (index as f64 * 1000. / fps).round();
    if ms > f64::from(i32::MAX) {
        return Err(Error::InvalidSource("the animation is too long".into()));
    }
    Ok(ms as i32)
}
