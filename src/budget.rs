//! Fitting the output into a file size limit
//!
//! Frames are rendered once. The search only picks subsets of them and re-encodes at various qualities.
//!
//! The search prefers keeping frames over keeping quality: it first finds the largest number
//! of frames that fits at the lowest allowed quality, and only then raises the quality for that
//! frame count. Both steps are bisections, so they assume that the size grows with the number of
//! frames and with quality. The order of attempts depends only on the sizes produced, so the
//! same input always gives the same result.

use crate::encode::Encoder;
use crate::error::{CatResult, Error};
use crate::extract::{self, FrameSequence};
use crate::progress::ProgressReporter;
use imgref::ImgRef;
use log::{debug, info};

/// The search stops early when a result is at most this fraction below the limit
const SLACK_DIVISOR: u64 = 5;

/// Limits of the search
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Budget {
    /// The file must not be bigger than this
    pub max_bytes: u64,
    /// A result in `max_bytes - slack ..= max_bytes` is good enough to stop searching
    pub slack: u64,
    pub min_quality: u8,
    /// The quality tried first
    pub max_quality: u8,
}

impl Budget {
    /// Accepts anything within 20% under the limit
    #[must_use]
    pub fn new(max_bytes: u64, min_quality: u8, max_quality: u8) -> Self {
        Self {
            max_bytes,
            slack: max_bytes / SLACK_DIVISOR,
            min_quality: min_quality.min(max_quality),
            max_quality,
        }
    }

    #[must_use]
    pub fn with_slack(self, slack: u64) -> Self {
        Self { slack, ..self }
    }

    #[inline]
    fn is_close_enough(&self, size: u64) -> bool {
        size <= self.max_bytes && size >= self.max_bytes.saturating_sub(self.slack)
    }
}

/// An encoded file that fits the budget
#[derive(Debug, Clone)]
pub struct Fitted {
    pub data: Vec<u8>,
    pub frames: usize,
    pub quality: u8,
    pub fps: f64,
}

/// Indices of `count` frames spread evenly over `len`, always including the first and the last one
#[must_use]
pub fn evenly_spaced(len: usize, count: usize) -> Vec<usize> {
    if count >= len {
        return (0..len).collect();
    }
    match count {
        0 => Vec::new(),
        1 => vec![0],
        _ => (0..count).map(|i| i * (len - 1) / (count - 1)).collect(),
    }
}

struct Search<'a, E> {
    frames: &'a FrameSequence,
    budget: &'a Budget,
    encoder: E,
    reporter: &'a mut dyn ProgressReporter,
    smallest: u64,
}

impl<E: Encoder> Search<'_, E> {
    /// Encodes `n` frames at quality `q`. `None` if too big.
    fn attempt(&mut self, n: usize, q: u8) -> CatResult<Option<Fitted>> {
        let all = self.frames.frames();
        let subset: Vec<ImgRef<'_, _>> = evenly_spaced(all.len(), n).into_iter().map(|i| all[i].as_ref()).collect();
        // fewer frames over the same duration
        let fps = subset.len() as f64 / self.frames.duration();
        let data = self.encoder.encode(&subset, fps, q)?;
        let size = data.len() as u64;
        self.smallest = self.smallest.min(size);
        debug!("{n} frames @ Q={q}: {size} bytes{}", if size > self.budget.max_bytes { " (too big)" } else { "" });

        if !self.reporter.increase() {
            return Err(Error::Aborted);
        }
        Ok((size <= self.budget.max_bytes).then(|| Fitted { data, frames: subset.len(), quality: q, fps }))
    }

    /// Largest frame count in `lo..=hi` that fits at `q`
    fn bisect_frames(&mut self, mut lo: usize, mut hi: usize, q: u8) -> CatResult<Option<Fitted>> {
        let mut best = None;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            if let Some(fit) = self.attempt(mid, q)? {
                lo = mid + 1;
                best = Some(fit);
            } else {
                if mid == 0 {
                    break;
                }
                hi = mid - 1;
            }
        }
        Ok(best)
    }

    /// Highest quality in `lo..=hi` for `n` frames. `best` already fits at a lower quality.
    fn bisect_quality(&mut self, n: usize, lo: u8, hi: u8, mut best: Fitted) -> CatResult<Fitted> {
        let (mut lo, mut hi) = (i16::from(lo), i16::from(hi));
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let Ok(q) = u8::try_from(mid) else { break };
            if let Some(fit) = self.attempt(n, q)? {
                let close_enough = self.budget.is_close_enough(fit.data.len() as u64);
                lo = mid + 1;
                best = fit;
                if close_enough {
                    break;
                }
            } else {
                hi = mid - 1;
            }
        }
        Ok(best)
    }
}

/// Picks the number of frames and quality that fit in `budget.max_bytes`.
///
/// Fails with [`Error::BudgetUnsatisfiable`] if even a single frame at the minimum quality is too big.
pub fn encode_with_budget<E: Encoder>(frames: &FrameSequence, budget: &Budget, encoder: E, reporter: &mut dyn ProgressReporter) -> CatResult<Fitted> {
    if frames.is_empty() {
        return Err(Error::NoFrames);
    }
    // subsets play over the same duration, so more frames can mean a rate WebP can't time
    let len = usize::try_from(extract::frame_limit(frames.duration())).map_or(frames.len(), |limit| frames.len().min(limit));
    let (min_q, max_q) = (budget.min_quality.min(budget.max_quality), budget.max_quality);
    let mut search = Search { frames, budget, encoder, reporter, smallest: u64::MAX };

    if let Some(fit) = search.attempt(len, max_q)? {
        info!("{len} frames @ Q={max_q} fit without reducing anything ({} bytes)", fit.data.len());
        return Ok(fit);
    }

    let floor = if min_q < max_q {
        search.attempt(len, min_q)?
    } else {
        None
    };
    let floor = match floor {
        Some(fit) => fit,
        None => match search.bisect_frames(1, len - 1, min_q)? {
            Some(fit) => fit,
            None => return Err(Error::BudgetUnsatisfiable(budget.max_bytes, search.smallest)),
        },
    };

    let n = floor.frames;
    let fit = if budget.is_close_enough(floor.data.len() as u64) || min_q >= max_q {
        floor
    } else {
        // all frames at max_q has been tried already
        let hi = if n == len { max_q - 1 } else { max_q };
        search.bisect_quality(n, min_q + 1, hi, floor)?
    };
    info!("Fitted {} of {len} frames @ Q={} in {} bytes (limit {})", fit.frames, fit.quality, fit.data.len(), budget.max_bytes);
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::render::{ImgVec, RGBA8};

    /// File size = per-frame cost × frames, where the cost grows with quality
    struct SizeModel {
        base: usize,
        per_quality: usize,
        attempts: Vec<(usize, u8, f64)>,
    }

    impl SizeModel {
        fn new(base: usize, per_quality: usize) -> Self {
            Self { base, per_quality, attempts: Vec::new() }
        }

        fn size(&self, n: usize, q: u8) -> usize {
            n * (self.base + self.per_quality * q as usize)
        }
    }

    impl Encoder for SizeModel {
        fn encode(&mut self, frames: &[ImgRef<'_, RGBA8>], fps: f64, quality: u8) -> CatResult<Vec<u8>> {
            self.attempts.push((frames.len(), quality, fps));
            Ok(vec![0; self.size(frames.len(), quality)])
        }
    }

    fn sequence(n: usize) -> FrameSequence {
        let frames = (0..n).map(|i| ImgVec::new(vec![RGBA8::new(i as u8, 0, 0, 255)], 1, 1)).collect();
        // 4 seconds
        FrameSequence::new(frames, n as f64 / 4., 4.)
    }

    #[test]
    fn spacing() {
        assert_eq!(evenly_spaced(10, 1), [0]);
        assert_eq!(evenly_spaced(10, 4), [0, 3, 6, 9]);
        assert_eq!(evenly_spaced(5, 3), [0, 2, 4]);
        assert_eq!(evenly_spaced(5, 5), [0, 1, 2, 3, 4]);
        assert_eq!(evenly_spaced(3, 7), [0, 1, 2]);
        assert!(evenly_spaced(3, 0).is_empty());
    }

    #[test]
    fn fits_right_away() {
        let mut enc = SizeModel::new(100, 10);
        let fit = encode_with_budget(&sequence(30), &Budget::new(1_000_000, 1, 80), &mut enc, &mut NoProgress {}).unwrap();
        assert_eq!((fit.frames, fit.quality), (30, 80));
        assert_eq!(enc.attempts.len(), 1);
    }

    #[test]
    fn lowers_quality_before_dropping_frames() {
        let mut enc = SizeModel::new(100, 10);
        // 30 frames fit up to q=56 (30 × 660 = 19800)
        let budget = Budget::new(20_000, 1, 80).with_slack(0);
        let fit = encode_with_budget(&sequence(30), &budget, &mut enc, &mut NoProgress {}).unwrap();
        assert_eq!(fit.frames, 30);
        assert_eq!(fit.quality, 56);
        assert!(fit.data.len() as u64 <= 20_000);
    }

    #[test]
    fn drops_frames_when_quality_floor_is_too_big() {
        let mut enc = SizeModel::new(100, 10);
        // at q=1 each frame is 110 bytes: 9 frames fit in 1000
        let budget = Budget::new(1000, 1, 80).with_slack(0);
        let fit = encode_with_budget(&sequence(30), &budget, &mut enc, &mut NoProgress {}).unwrap();
        assert_eq!(fit.frames, 9);
        // 9 × (100 + 10q) <= 1000 → q = 1
        assert_eq!(fit.quality, 1);
        // duration is kept
        assert!((fit.fps - 9. / 4.).abs() < 1e-9);
    }

    #[test]
    fn raises_quality_after_dropping_frames() {
        // quality is cheap here: 30 frames @ q=1 = 3030 is too big, 29 frames fit up to q=3
        let mut enc = SizeModel::new(100, 1);
        let budget = Budget::new(3000, 1, 80).with_slack(0);
        let fit = encode_with_budget(&sequence(30), &budget, &mut enc, &mut NoProgress {}).unwrap();
        assert_eq!((fit.frames, fit.quality), (29, 3));
        assert_eq!(fit.data.len(), 29 * 103);
    }

    #[test]
    fn frame_count_wins_over_quality() {
        let mut enc = SizeModel::new(100, 10);
        // 11 frames @ q=1 = 1210 beats 10 frames @ q=3 = 1300
        let budget = Budget::new(1300, 1, 80).with_slack(0);
        let fit = encode_with_budget(&sequence(30), &budget, &mut enc, &mut NoProgress {}).unwrap();
        assert_eq!((fit.frames, fit.quality), (11, 1));
    }

    #[test]
    fn never_returns_oversized_results() {
        for max_bytes in [120, 500, 999, 3000, 12_345, 40_000] {
            let mut enc = SizeModel::new(100, 10);
            let fit = encode_with_budget(&sequence(30), &Budget::new(max_bytes, 1, 80), &mut enc, &mut NoProgress {}).unwrap();
            assert!(fit.data.len() as u64 <= max_bytes, "{max_bytes}");
            assert_eq!(fit.data.len(), enc.size(fit.frames, fit.quality));
        }
    }

    #[test]
    fn unsatisfiable() {
        let mut enc = SizeModel::new(100, 10);
        let err = encode_with_budget(&sequence(30), &Budget::new(100, 1, 80), &mut enc, &mut NoProgress {}).unwrap_err();
        assert!(matches!(err, Error::BudgetUnsatisfiable(100, 110)), "{err}");
        assert!(enc.attempts.iter().any(|&(n, q, _)| n == 1 && q == 1));
    }

    #[test]
    fn deterministic() {
        let run = || {
            let mut enc = SizeModel::new(37, 13);
            let fit = encode_with_budget(&sequence(45), &Budget::new(7777, 5, 90), &mut enc, &mut NoProgress {}).unwrap();
            (fit.frames, fit.quality, enc.attempts.iter().map(|&(n, q, _)| (n, q)).collect::<Vec<_>>())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn stops_when_close_enough() {
        let mut enc = SizeModel::new(100, 10);
        // 30 frames @ q=1 = 3300, which is within 50% of 5000
        let budget = Budget::new(5000, 1, 80).with_slack(2500);
        let fit = encode_with_budget(&sequence(30), &budget, &mut enc, &mut NoProgress {}).unwrap();
        assert_eq!((fit.frames, fit.quality), (30, 1));
        assert_eq!(enc.attempts.len(), 2);
    }

    #[test]
    fn subsets_never_exceed_millisecond_timing() {
        let mut enc = SizeModel::new(100, 10);
        // 30 frames in 10ms is 3000 fps, at most 10 of them can be shown
        let frames = (0..30).map(|i| ImgVec::new(vec![RGBA8::new(i as u8, 0, 0, 255)], 1, 1)).collect();
        let seq = FrameSequence::new(frames, 3000., 0.01);
        let fit = encode_with_budget(&seq, &Budget::new(1_000_000, 1, 80), &mut enc, &mut NoProgress {}).unwrap();
        assert_eq!(fit.frames, 10);
        assert!(enc.attempts.iter().all(|&(_, _, fps)| fps <= 1000. + 1e-6));
    }

    #[test]
    fn single_quality() {
        let mut enc = SizeModel::new(100, 0);
        let fit = encode_with_budget(&sequence(30), &Budget::new(1000, 50, 50), &mut enc, &mut NoProgress {}).unwrap();
        assert_eq!((fit.frames, fit.quality), (10, 50));
    }
}
