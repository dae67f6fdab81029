use crate::CatResult;
use std::fmt;
use std::io;
use std::os::raw::c_int;

#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(non_camel_case_types)]
#[allow(clippy::upper_case_acronyms)]
pub enum Tgs2WebpError {
    OK = 0,
    NULL_ARG,
    INVALID_CONFIG,
    INVALID_SOURCE,
    PARSE,
    RENDER,
    ENCODE,
    BUDGET_UNSATISFIABLE,
    RENDERER_UNAVAILABLE,
    NOT_FOUND,
    PERMISSION_DENIED,
    ALREADY_EXISTS,
    INVALID_INPUT,
    WRITE_ZERO,
    INTERRUPTED,
    UNEXPECTED_EOF,
    OUT_OF_MEMORY,
    ABORTED,
    OTHER,
}

impl From<Tgs2WebpError> for io::Error {
    #[cold]
    fn from(g: Tgs2WebpError) -> Self {
        use std::io::ErrorKind as EK;
        use Tgs2WebpError::*;
        match g {
            NOT_FOUND => EK::NotFound,
            PERMISSION_DENIED => EK::PermissionDenied,
            ALREADY_EXISTS => EK::AlreadyExists,
            INVALID_INPUT => EK::InvalidInput,
            WRITE_ZERO => EK::WriteZero,
            INTERRUPTED => EK::Interrupted,
            UNEXPECTED_EOF => EK::UnexpectedEof,
            OUT_OF_MEMORY => EK::OutOfMemory,
            _ => return io::Error::new(EK::Other, g),
        }.into()
    }
}

impl From<c_int> for Tgs2WebpError {
    #[cold]
    fn from(res: c_int) -> Self {
        use Tgs2WebpError::*;
        [
            OK, NULL_ARG, INVALID_CONFIG, INVALID_SOURCE, PARSE, RENDER, ENCODE, BUDGET_UNSATISFIABLE,
            RENDERER_UNAVAILABLE, NOT_FOUND, PERMISSION_DENIED, ALREADY_EXISTS, INVALID_INPUT, WRITE_ZERO,
            INTERRUPTED, UNEXPECTED_EOF, OUT_OF_MEMORY, ABORTED,
        ]
        .into_iter()
        .find(|&e| e as c_int == res)
        .unwrap_or(OTHER)
    }
}

impl From<CatResult<()>> for Tgs2WebpError {
    #[cold]
    fn from(res: CatResult<()>) -> Self {
        use crate::error::Error::*;
        match res {
            Ok(()) => Tgs2WebpError::OK,
            Err(err) => match err {
                InvalidConfig(_) => Tgs2WebpError::INVALID_CONFIG,
                InvalidSource(_) | NoFrames => Tgs2WebpError::INVALID_SOURCE,
                Parse(_) => Tgs2WebpError::PARSE,
                Render(..) => Tgs2WebpError::RENDER,
                Encode(_) => Tgs2WebpError::ENCODE,
                BudgetUnsatisfiable(..) => Tgs2WebpError::BUDGET_UNSATISFIABLE,
                RendererUnavailable => Tgs2WebpError::RENDERER_UNAVAILABLE,
                WrongSize(_) => Tgs2WebpError::INVALID_INPUT,
                Io(ref err) => err.kind().into(),
                Aborted => Tgs2WebpError::ABORTED,
            },
        }
    }
}

impl From<io::ErrorKind> for Tgs2WebpError {
    #[cold]
    fn from(res: io::ErrorKind) -> Self {
        use std::io::ErrorKind as EK;
        match res {
            EK::NotFound => Tgs2WebpError::NOT_FOUND,
            EK::PermissionDenied => Tgs2WebpError::PERMISSION_DENIED,
            EK::AlreadyExists => Tgs2WebpError::ALREADY_EXISTS,
            EK::InvalidInput | EK::InvalidData => Tgs2WebpError::INVALID_INPUT,
            EK::WriteZero => Tgs2WebpError::WRITE_ZERO,
            EK::Interrupted => Tgs2WebpError::INTERRUPTED,
            EK::UnexpectedEof => Tgs2WebpError::UNEXPECTED_EOF,
            EK::OutOfMemory => Tgs2WebpError::OUT_OF_MEMORY,
            _ => Tgs2WebpError::OTHER,
        }
    }
}

impl std::error::Error for Tgs2WebpError {}

impl fmt::Display for Tgs2WebpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[test]
fn codes_round_trip_through_c_int() {
    assert_eq!(Tgs2WebpError::from(0), Tgs2WebpError::OK);
    assert_eq!(Tgs2WebpError::from(Tgs2WebpError::BUDGET_UNSATISFIABLE as c_int), Tgs2WebpError::BUDGET_UNSATISFIABLE);
    assert_eq!(Tgs2WebpError::from(-1), Tgs2WebpError::OTHER);
    assert_eq!(Tgs2WebpError::from(9999), Tgs2WebpError::OTHER);
}

#[test]
fn errors_map_to_codes() {
    use crate::Error;
    assert_eq!(Tgs2WebpError::from(Err(Error::BudgetUnsatisfiable(10, 20))), Tgs2WebpError::BUDGET_UNSATISFIABLE);
    assert_eq!(Tgs2WebpError::from(Err(Error::Parse("x".into()))), Tgs2WebpError::PARSE);
    let not_found = io::Error::from(io::ErrorKind::NotFound);
    assert_eq!(Tgs2WebpError::from(Err(Error::Io(not_found))), Tgs2WebpError::NOT_FOUND);
}
