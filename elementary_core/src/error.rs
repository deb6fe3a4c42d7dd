//! Dense numeric error codes (spec §7) and their `thiserror`-backed `Display`.
//!
//! The realtime thread never produces these: out-of-range audio-rate inputs
//! are clamped and missing inputs are zero-filled, silently, inside
//! `process`. `ErrorCode` only ever crosses the control-thread API surface.

use thiserror::Error;

/// One of the dense error codes from spec §7. `#[repr(i32)]` so a host can
/// read it straight off as the FFI-facing integer without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[repr(i32)]
pub enum ErrorCode {
    #[error("unknown node kind")]
    UnknownKind = 1,
    #[error("node not found")]
    NodeNotFound = 2,
    #[error("node already exists")]
    NodeAlreadyExists = 3,
    #[error("node kind already registered")]
    KindAlreadyRegistered = 4,
    #[error("invalid property type")]
    InvalidPropertyType = 5,
    #[error("invalid property value")]
    InvalidPropertyValue = 6,
    #[error("invariant violation")]
    InvariantViolation = 7,
    #[error("invalid instruction format")]
    InvalidInstructionFormat = 8,
}

impl ErrorCode {
    /// The numeric code as specified in spec §7. `Ok` (0) has no variant here
    /// since fallible runtime calls return `Result<(), ErrorCode>` instead of
    /// a bare integer; callers that need the literal wire code can use
    /// [`ErrorCode::code`] together with `0` for success.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Convert a `Result<(), ErrorCode>` into the dense integer the wire API
/// (spec §6.2) returns: `0` on success, the error's code otherwise.
pub fn result_to_wire_code(result: Result<(), ErrorCode>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}
