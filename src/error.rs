use std::io;
use std::num::TryFromIntError;
use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Settings that can't be used, reported before any rendering
        InvalidConfig(msg: String) {
            display("Invalid settings: {}", msg)
        }
        /// The animation has no frames or no duration
        InvalidSource(msg: String) {
            display("Unusable animation: {}", msg)
        }
        Parse(msg: String) {
            display("Can't read the animation: {}", msg)
            from(err: serde_json::Error) -> (err.to_string())
        }
        Render(offset: f64, msg: String) {
            display("Can't render the frame at {:.3}s: {}", offset, msg)
        }
        Encode(msg: String) {
            display("WebP encoding error: {}", msg)
            from(err: webp_animation::Error) -> (format!("{err:?}"))
        }
        BudgetUnsatisfiable(max_bytes: u64, smallest: u64) {
            display("Can't fit the animation in {} bytes (the smallest attempt was {} bytes)", max_bytes, smallest)
        }
        NoFrames {
            display("Found no usable frames to encode")
        }
        RendererUnavailable {
            display("Lottie rendering is disabled in this build. Rebuild with --features=lottie")
        }
        WrongSize(msg: String) {
            display("{}", msg)
            from(e: TryFromIntError) -> (e.to_string())
            from(e: resize::Error) -> (e.to_string())
        }
        Io(err: io::Error) {
            from()
            from(_oom: std::collections::TryReserveError) -> (io::ErrorKind::OutOfMemory.into())
            from(err: tempfile::PersistError) -> (err.error)
            display("I/O: {}", err)
        }
        Aborted {
            display("aborted")
        }
    }
}

pub type CatResult<T, E = Error> = Result<T, E>;
