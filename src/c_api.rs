#![allow(clippy::missing_safety_doc)]
//! How to use from C
//!
//! ```c
//! Tgs2WebpSettings settings = tgs2webp_default_settings();
//! settings.width = 256;
//! settings.height = 256;
//!
//! TGS2WEBPError res = tgs2webp_convert("sticker.tgs", "sticker.webp", &settings);
//! if (res != TGS2WEBP_OK) return;
//! ```
//!
//! Conversion is synchronous. To cancel it, use `tgs2webp_convert_with_progress` and make the callback return 0.
//!
//! To build as a library:
//!
//! ```bash
//! cargo build --release --lib --features=lottie
//! ```
//!
//! it will create `target/release/libtgs2webp.a` (static library)
//! and `target/release/libtgs2webp.so`/`dylib` or `tgs2webp.dll` (dynamic library)

use super::*;
use crate::progress::ProgressCallback;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::path::PathBuf;
mod c_api_error;
pub use self::c_api_error::Tgs2WebpError;
use std::panic::catch_unwind;

/// Settings for a conversion. See `tgs2webp_default_settings`
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Tgs2WebpSettings {
    /// Output width. 0 keeps the sticker's own width (or follows the aspect ratio if height is set).
    pub width: u32,
    /// Output height. 0 keeps the sticker's own height (or follows the aspect ratio if width is set).
    pub height: u32,
    /// 0-100. Recommended to set to 80.
    pub quality: u8,
    /// Frame rate used when `preserve_timing` is false.
    pub fps: f32,
    /// Adjust the frame rate so that the output plays as long as the sticker.
    pub preserve_timing: bool,
    /// Maximum number of frames to render. 0 for no limit.
    pub max_frames: u32,
    /// Maximum file size in bytes. 0 for no limit.
    pub max_bytes: u64,
    /// Lowest quality allowed when fitting into `max_bytes`.
    pub min_quality: u8,
    /// If negative, looping is disabled. The number of times the sequence is repeated. 0 to loop forever.
    pub repeat: i16,
}

impl From<&Tgs2WebpSettings> for Settings {
    fn from(s: &Tgs2WebpSettings) -> Self {
        Self {
            width: if s.width > 0 { Some(s.width) } else { None },
            height: if s.height > 0 { Some(s.height) } else { None },
            quality: s.quality,
            fps: s.fps,
            preserve_timing: s.preserve_timing,
            frame_cap: if s.max_frames > 0 { FrameCap::Limited(s.max_frames) } else { FrameCap::Unlimited },
            max_bytes: if s.max_bytes > 0 { Some(s.max_bytes) } else { None },
            min_quality: s.min_quality,
            repeat: if s.repeat == -1 { Repeat::Finite(0) } else if s.repeat == 0 { Repeat::Infinite } else { Repeat::Finite(s.repeat.unsigned_abs()) },
        }
    }
}

/// Settings matching the defaults of the command-line tool
#[no_mangle]
pub extern "C" fn tgs2webp_default_settings() -> Tgs2WebpSettings {
    let d = Settings::default();
    Tgs2WebpSettings {
        width: 0,
        height: 0,
        quality: d.quality,
        fps: d.fps,
        preserve_timing: d.preserve_timing,
        max_frames: DEFAULT_FRAME_CAP,
        max_bytes: 0,
        min_quality: d.min_quality,
        repeat: 0,
    }
}

/// Converts the file at `input_path` and writes WebP to `output_path` (both UTF-8).
///
/// On error `output_path` is not modified.
#[no_mangle]
pub unsafe extern "C" fn tgs2webp_convert(input_path: *const c_char, output_path: *const c_char, settings: *const Tgs2WebpSettings) -> Tgs2WebpError {
    convert_from_c(input_path, output_path, settings, &mut NoProgress {})
}

/// Same as `tgs2webp_convert`, but calls `cb(user_data)` after each rendered frame and each attempt
/// of the file size search. If the callback returns 0, the conversion is aborted.
#[no_mangle]
pub unsafe extern "C" fn tgs2webp_convert_with_progress(
    input_path: *const c_char,
    output_path: *const c_char,
    settings: *const Tgs2WebpSettings,
    cb: Option<unsafe extern "C" fn(*mut c_void) -> c_int>,
    user_data: *mut c_void,
) -> Tgs2WebpError {
    let Some(cb) = cb else { return Tgs2WebpError::NULL_ARG };
    convert_from_c(input_path, output_path, settings, &mut ProgressCallback::new(cb, user_data))
}

unsafe fn convert_from_c(input_path: *const c_char, output_path: *const c_char, settings: *const Tgs2WebpSettings, reporter: &mut dyn ProgressReporter) -> Tgs2WebpError {
    let Some(settings) = settings.as_ref() else {
        return Tgs2WebpError::NULL_ARG;
    };
    let (Some(input), Some(output)) = (path_from_c(input_path), path_from_c(output_path)) else {
        return if input_path.is_null() || output_path.is_null() { Tgs2WebpError::NULL_ARG } else { Tgs2WebpError::INVALID_INPUT };
    };
    let settings = Settings::from(settings);

    catch_unwind(std::panic::AssertUnwindSafe(move || {
        let res = Converter::new(settings).and_then(|c| c.try_convert(&input, &output, reporter));
        res.map(drop).into()
    }))
    .unwrap_or(Tgs2WebpError::OTHER)
}

unsafe fn path_from_c(path: *const c_char) -> Option<PathBuf> {
    if path.is_null() {
        return None;
    }
    CStr::from_ptr(path).to_str().ok().map(PathBuf::from)
}

#[test]
fn c_null_args() {
    let s = tgs2webp_default_settings();
    unsafe {
        assert_eq!(Tgs2WebpError::NULL_ARG, tgs2webp_convert(std::ptr::null(), c"out.webp".as_ptr(), &s));
        assert_eq!(Tgs2WebpError::NULL_ARG, tgs2webp_convert(c"in.tgs".as_ptr(), c"out.webp".as_ptr(), std::ptr::null()));
        assert_eq!(Tgs2WebpError::NULL_ARG, tgs2webp_convert_with_progress(c"in.tgs".as_ptr(), c"out.webp".as_ptr(), &s, None, std::ptr::null_mut()));
    }
}

#[test]
fn c_invalid_settings() {
    let mut s = tgs2webp_default_settings();
    s.quality = 101;
    unsafe {
        assert_eq!(Tgs2WebpError::INVALID_CONFIG, tgs2webp_convert(c"in.tgs".as_ptr(), c"out.webp".as_ptr(), &s));
    }
}

#[test]
fn c_missing_file() {
    let s = tgs2webp_default_settings();
    let res = unsafe { tgs2webp_convert(c"/nonexistent/in.tgs".as_ptr(), c"/nonexistent/out.webp".as_ptr(), &s) };
    assert_eq!(Tgs2WebpError::NOT_FOUND, res);
}

#[test]
fn c_settings_mapping() {
    let mut c = tgs2webp_default_settings();
    let s = Settings::from(&c);
    assert_eq!((s.width, s.height, s.quality), (None, None, 80));
    assert_eq!(s.frame_cap, FrameCap::Limited(DEFAULT_FRAME_CAP));
    assert_eq!(s.repeat, Repeat::Infinite);
    assert!(s.max_bytes.is_none());

    c.max_frames = 0;
    c.max_bytes = 500 * 1024;
    c.repeat = -1;
    let s = Settings::from(&c);
    assert_eq!(s.frame_cap, FrameCap::Unlimited);
    assert_eq!(s.max_bytes, Some(500 * 1024));
    assert_eq!(s.repeat, Repeat::Finite(0));
}
