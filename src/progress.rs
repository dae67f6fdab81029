//! For tracking conversion progress and aborting early

use std::os::raw::{c_int, c_void};

/// A trait that is used to report progress to some consumer.
pub trait ProgressReporter {
    /// Called after each frame has been rendered, and after each attempt of the file size search.
    ///
    /// This method may return `false` to abort processing.
    fn increase(&mut self) -> bool;

    /// Called once the output has been written
    fn done(&mut self, _msg: &str) {}
}

/// No-op progress reporter
pub struct NoProgress {}

/// For C
pub struct ProgressCallback {
    callback: unsafe extern "C" fn(*mut c_void) -> c_int,
    arg: *mut c_void,
}

impl ProgressCallback {
    pub fn new(callback: unsafe extern "C" fn(*mut c_void) -> c_int, arg: *mut c_void) -> Self {
        Self { callback, arg }
    }
}

impl ProgressReporter for NoProgress {
    fn increase(&mut self) -> bool {
        true
    }
}

impl ProgressReporter for ProgressCallback {
    fn increase(&mut self) -> bool {
        unsafe { (self.callback)(self.arg) != 0 }
    }
}

/// Forwards only the first `frames` calls, which are the rendered frames.
///
/// Later calls (attempts of the file size search) always continue, so a bar sized
/// to the frame count never goes past its total.
pub struct RenderedFrames<'a> {
    inner: &'a mut dyn ProgressReporter,
    left: usize,
}

impl<'a> RenderedFrames<'a> {
    pub fn new(inner: &'a mut dyn ProgressReporter, frames: usize) -> Self {
        Self { inner, left: frames }
    }
}

impl ProgressReporter for RenderedFrames<'_> {
    fn increase(&mut self) -> bool {
        if self.left == 0 {
            return true;
        }
        self.left -= 1;
        self.inner.increase()
    }

    fn done(&mut self, msg: &str) {
        self.inner.done(msg);
    }
}

/// Implement the progress reporter trait for a progress bar,
/// to make it usable for frame processing reporting.
#[cfg(feature = "pbr")]
impl<T> ProgressReporter for pbr::ProgressBar<T> where T: std::io::Write {
    fn increase(&mut self) -> bool {
        self.inc();
        true
    }

    fn done(&mut self, msg: &str) {
        self.finish_print(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(usize);

    impl ProgressReporter for Counter {
        fn increase(&mut self) -> bool {
            self.0 += 1;
            true
        }
    }

    #[test]
    fn search_attempts_are_not_counted() {
        let mut counter = Counter(0);
        let mut frames = RenderedFrames::new(&mut counter, 3);
        for _ in 0..10 {
            assert!(frames.increase());
        }
        assert_eq!(counter.0, 3);
    }

    #[test]
    fn frames_can_still_abort() {
        struct Stop;
        impl ProgressReporter for Stop {
            fn increase(&mut self) -> bool {
                false
            }
        }
        let mut stop = Stop;
        let mut frames = RenderedFrames::new(&mut stop, 2);
        assert!(!frames.increase());
    }
}
