//! The mongodb crate doesn't provide error code constants, so the ones
//! we react to live here.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

/// Server error code for a unique index violation.
pub const DUPLICATE_KEY: i32 = 11000;

/// Classification helpers for driver errors.
pub trait DbErrorExt {
    /// True if this error was caused by a unique index rejecting a write.
    fn is_duplicate_key(&self) -> bool;
}

impl DbErrorExt for DbError {
    fn is_duplicate_key(&self) -> bool {
        match *self.kind {
            ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
            ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY,
            _ => false,
        }
    }
}
