//! Drawing animation frames
//!
//! Rasterization itself is done by a library (rlottie, behind the `lottie` feature).
//! Anything that can draw a frame at a given time can be plugged in via [`Render`].

pub use imgref::ImgVec;
pub use rgb::RGBA8;

use crate::error::CatResult;
#[cfg(feature = "lottie")]
use crate::error::Error;
#[cfg(feature = "lottie")]
use crate::source::AnimationSource;

/// Produces bitmaps of an animation
pub trait Render {
    /// Draw the frame shown `offset` seconds after the start.
    ///
    /// The image should be `width`×`height` with straight (not premultiplied) alpha.
    /// Images of other sizes get resized, at some cost in quality.
    fn render_frame(&mut self, offset: f64, width: u32, height: u32) -> CatResult<ImgVec<RGBA8>>;
}

impl<R: Render + ?Sized> Render for &mut R {
    #[inline]
    fn render_frame(&mut self, offset: f64, width: u32, height: u32) -> CatResult<ImgVec<RGBA8>> {
        (**self).render_frame(offset, width, height)
    }
}

/// Lanczos3 resize to exactly the given size. Aspect ratio is not preserved.
pub fn resized(image: ImgVec<RGBA8>, width: u32, height: u32) -> CatResult<ImgVec<RGBA8>> {
    let dst_width = usize::try_from(width)?;
    let dst_height = usize::try_from(height)?;
    if image.width() == dst_width && image.height() == dst_height {
        return Ok(image);
    }
    let (buf, src_width, src_height) = image.into_contiguous_buf();
    let mut r = resize::new(src_width, src_height, dst_width, dst_height, resize::Pixel::RGBA8P, resize::Type::Lanczos3)?;
    let mut dst = vec![RGBA8::new(0, 0, 0, 0); dst_width * dst_height];
    r.resize(&buf, &mut dst)?;
    Ok(ImgVec::new(dst, dst_width, dst_height))
}

/// rlottie draws with premultiplied alpha
#[cfg_attr(not(feature = "lottie"), allow(dead_code))]
#[inline]
pub(crate) fn unpremultiplied(r: u8, g: u8, b: u8, a: u8) -> RGBA8 {
    match a {
        0 => RGBA8::new(0, 0, 0, 0),
        255 => RGBA8::new(r, g, b, 255),
        a => {
            let a16 = u16::from(a);
            let un = |c: u8| ((u16::from(c) * 255 + a16 / 2) / a16).min(255) as u8;
            RGBA8::new(un(r), un(g), un(b), a)
        },
    }
}

/// Renders Lottie with rlottie, drawing the vectors directly at the requested size.
#[cfg(feature = "lottie")]
pub struct LottieRenderer {
    animation: rlottie::Animation,
    /// Reused while the requested size stays the same
    surface: Option<rlottie::Surface>,
    duration: f64,
}

#[cfg(feature = "lottie")]
impl LottieRenderer {
    pub fn new(source: &AnimationSource) -> CatResult<Self> {
        let animation = rlottie::Animation::from_data(source.json().to_vec(), "", "")
            .ok_or_else(|| Error::Parse("rlottie rejected the animation".into()))?;
        Ok(Self {
            animation,
            surface: None,
            duration: source.info().duration(),
        })
    }
}

#[cfg(feature = "lottie")]
impl Render for LottieRenderer {
    fn render_frame(&mut self, offset: f64, width: u32, height: u32) -> CatResult<ImgVec<RGBA8>> {
        let (dst_width, dst_height) = (usize::try_from(width)?, usize::try_from(height)?);
        if self.surface.as_ref().is_some_and(|s| s.width() != dst_width || s.height() != dst_height) {
            self.surface = None;
        }
        let surface = self.surface.get_or_insert_with(|| rlottie::Surface::new(rlottie::Size::new(dst_width, dst_height)));

        let pos = if self.duration > 0. { (offset / self.duration).clamp(0., 1.) } else { 0. };
        let frame_num = self.animation.frame_at_pos(pos as f32);
        self.animation.render(frame_num, surface);

        let (w, h) = (surface.width(), surface.height());
        let pixels: Vec<RGBA8> = surface.data().iter().map(|px| unpremultiplied(px.r, px.g, px.b, px.a)).collect();
        if pixels.len() != w * h {
            return Err(Error::Render(offset, format!("rlottie returned {} pixels for {w}×{h}", pixels.len())));
        }
        resized(ImgVec::new(pixels, w, h), width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_size_is_untouched() {
        let img = ImgVec::new(vec![RGBA8::new(1, 2, 3, 4); 6], 3, 2);
        let out = resized(img, 3, 2).unwrap();
        assert_eq!((out.width(), out.height()), (3, 2));
        assert!(out.pixels().all(|px| px == RGBA8::new(1, 2, 3, 4)));
    }

    #[test]
    fn resizes_to_exact_size() {
        let img = ImgVec::new(vec![RGBA8::new(200, 100, 50, 255); 64 * 32], 64, 32);
        let out = resized(img, 16, 16).unwrap();
        assert_eq!((out.width(), out.height()), (16, 16));
        let px = out.buf()[8 * 16 + 8];
        assert_eq!(px.a, 255);
        assert!((i32::from(px.r) - 200).abs() <= 1);
    }

    #[cfg(feature = "lottie")]
    #[test]
    fn lottie_draws_at_requested_size() {
        let source = AnimationSource::from_json(br#"{"v":"5.5.2","fr":30,"ip":0,"op":30,"w":512,"h":512,"layers":[]}"#.to_vec()).unwrap();
        let mut renderer = LottieRenderer::new(&source).unwrap();
        let frame = renderer.render_frame(0.5, 32, 16).unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 16));
        let surface = renderer.surface.as_ref().unwrap();
        assert_eq!((surface.width(), surface.height()), (32, 16));

        renderer.render_frame(0.6, 64, 64).unwrap();
        assert_eq!(renderer.surface.as_ref().unwrap().width(), 64);
    }

    #[test]
    fn unpremultiplies() {
        assert_eq!(unpremultiplied(9, 9, 9, 0), RGBA8::new(0, 0, 0, 0));
        assert_eq!(unpremultiplied(10, 20, 30, 255), RGBA8::new(10, 20, 30, 255));
        assert_eq!(unpremultiplied(64, 32, 0, 128), RGBA8::new(128, 64, 0, 128));
        assert_eq!(unpremultiplied(255, 255, 255, 1).r, 255);
    }
}
