//! Loading TGS stickers
//!
//! A TGS file is Lottie JSON compressed with gzip. Plain (uncompressed) Lottie JSON is accepted too.
//! Only the header is interpreted here; drawing is left to a [`Render`][crate::render::Render] implementation.

use crate::error::{CatResult, Error};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decompressed JSON bigger than this is refused
const MAX_JSON_BYTES: u64 = 64 << 20;

/// Timing and canvas size from the animation header
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AnimationInfo {
    /// Native frames per second
    pub frame_rate: f64,
    /// First frame (in native frames)
    pub in_point: f64,
    /// Frame after the last one (in native frames)
    pub out_point: f64,
    pub width: u32,
    pub height: u32,
}

impl AnimationInfo {
    /// Number of native frames. Fractional frames at the end are dropped.
    #[must_use]
    pub fn total_frames(&self) -> u64 {
        let frames = self.out_point - self.in_point;
        if frames.is_finite() && frames > 0. {
            frames.floor() as u64
        } else {
            0
        }
    }

    /// Length in seconds. 0 when the frame rate is unusable.
    #[must_use]
    pub fn duration(&self) -> f64 {
        if self.frame_rate.is_finite() && self.frame_rate > 0. {
            self.total_frames() as f64 / self.frame_rate
        } else {
            0.
        }
    }
}

/// Only the fields needed for timing. The rest of the document is skipped.
#[derive(Deserialize)]
struct Header {
    fr: f64,
    ip: f64,
    op: f64,
    w: f64,
    h: f64,
}

/// A parsed animation, ready to be handed to a renderer
pub struct AnimationSource {
    info: AnimationInfo,
    json: Vec<u8>,
}

impl AnimationSource {
    /// Reads a `.tgs` (or plain Lottie `.json`) file
    pub fn load(path: &Path) -> CatResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Gzipped data is decompressed first
    pub fn from_bytes(data: &[u8]) -> CatResult<Self> {
        let json = if data.starts_with(&GZIP_MAGIC) {
            let mut json = Vec::new();
            GzDecoder::new(data)
                .take(MAX_JSON_BYTES + 1)
                .read_to_end(&mut json)
                .map_err(|e| Error::Parse(format!("gzip: {e}")))?;
            if json.len() as u64 > MAX_JSON_BYTES {
                return Err(Error::Parse("decompressed animation is too large".into()));
            }
            json
        } else {
            data.to_vec()
        };
        Self::from_json(json)
    }

    pub fn from_json(json: Vec<u8>) -> CatResult<Self> {
        let header: Header = serde_json::from_slice(&json)?;
        let info = AnimationInfo {
            frame_rate: header.fr,
            in_point: header.ip,
            out_point: header.op,
            width: canvas_dimension(header.w, "width")?,
            height: canvas_dimension(header.h, "height")?,
        };
        Ok(Self { info, json })
    }

    #[inline]
    #[must_use]
    pub fn info(&self) -> &AnimationInfo {
        &self.info
    }

    /// Decompressed Lottie JSON
    #[inline]
    #[must_use]
    pub fn json(&self) -> &[u8] {
        &self.json
    }
}

fn canvas_dimension(value: f64, what: &str) -> CatResult<u32> {
    if value.is_finite() && value >= 1. && value <= f64::from(u16::MAX) {
        Ok(value.round() as u32)
    } else {
        Err(Error::Parse(format!("canvas {what} {value} is out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const STICKER: &str = r#"{"v":"5.5.2","fr":60,"ip":0,"op":180,"w":512,"h":512,"nm":"s","ddd":0,"assets":[],"layers":[{"ty":4,"ks":{}}]}"#;

    fn gzipped(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn reads_gzipped_header() {
        let src = AnimationSource::from_bytes(&gzipped(STICKER.as_bytes())).unwrap();
        let info = src.info();
        assert_eq!(info.frame_rate, 60.);
        assert_eq!(info.total_frames(), 180);
        assert_eq!((info.width, info.height), (512, 512));
        assert!((info.duration() - 3.).abs() < 1e-9);
        assert_eq!(src.json(), STICKER.as_bytes());
    }

    #[test]
    fn reads_plain_json() {
        let src = AnimationSource::from_bytes(STICKER.as_bytes()).unwrap();
        assert_eq!(src.info().total_frames(), 180);
    }

    #[test]
    fn offset_in_point() {
        let src = AnimationSource::from_bytes(br#"{"fr":30,"ip":10,"op":70.5,"w":100,"h":50.0}"#).unwrap();
        assert_eq!(src.info().total_frames(), 60);
        assert!((src.info().duration() - 2.).abs() < 1e-9);
        assert_eq!(src.info().height, 50);
    }

    #[test]
    fn degenerate_timing_has_no_duration() {
        let src = AnimationSource::from_bytes(br#"{"fr":0,"ip":0,"op":60,"w":10,"h":10}"#).unwrap();
        assert_eq!(src.info().duration(), 0.);
        let src = AnimationSource::from_bytes(br#"{"fr":30,"ip":60,"op":60,"w":10,"h":10}"#).unwrap();
        assert_eq!(src.info().total_frames(), 0);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(AnimationSource::from_bytes(b"not lottie"), Err(Error::Parse(_))));
        assert!(matches!(AnimationSource::from_bytes(&[0x1f, 0x8b, 0, 1, 2]), Err(Error::Parse(_))));
        assert!(matches!(AnimationSource::from_bytes(br#"{"fr":30,"ip":0,"op":60,"w":0,"h":10}"#), Err(Error::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let res = AnimationSource::load(Path::new("/nonexistent/sticker.tgs"));
        assert!(matches!(res, Err(Error::Io(_))));
    }
}
