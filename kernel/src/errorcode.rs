// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Standard error enum for hardware operations.

use core::fmt;

/// Standard errors.
///
/// Chip drivers map their failure conditions onto these codes:
///
/// - `INVAL` for a malformed slot, mask or divider value,
/// - `ALREADY` for a vector slot that is still bound to another source,
/// - `FAIL` for a refused state change (stopping the clock the core runs on),
/// - `BUSY` for a ready flag that did not assert within its iteration bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL = 0,
    /// Underlying system is busy; retry
    BUSY = 1,
    /// The state requested is already set
    ALREADY = 2,
    /// The component is powered down
    OFF = 3,
    /// An invalid parameter was passed
    INVAL = 5,
    /// Parameter passed was too large
    SIZE = 6,
    /// Operation or command is unsupported
    NOSUPPORT = 9,
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::FAIL => "generic failure",
            ErrorCode::BUSY => "busy",
            ErrorCode::ALREADY => "already in use",
            ErrorCode::OFF => "powered off",
            ErrorCode::INVAL => "invalid parameter",
            ErrorCode::SIZE => "value too large",
            ErrorCode::NOSUPPORT => "unsupported",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;

    #[test]
    fn codes_keep_their_numeric_values() {
        assert_eq!(usize::from(ErrorCode::FAIL), 0);
        assert_eq!(usize::from(ErrorCode::BUSY), 1);
        assert_eq!(usize::from(ErrorCode::ALREADY), 2);
        assert_eq!(usize::from(ErrorCode::INVAL), 5);
    }

    #[test]
    fn display_names() {
        assert_eq!(ErrorCode::INVAL.to_string(), "invalid parameter");
        assert_eq!(ErrorCode::BUSY.to_string(), "busy");
    }
}
