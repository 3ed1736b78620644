// Copyright (c) 2021, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use snafu::Snafu;
use std::io;

/// Top level Result type in tally
pub type TallyResult<T> = std::result::Result<T, Error>;

/// Every failure in tally is scoped to a single request, event or setup call.
///
/// None of them leave the store in an inconsistent state.
#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum Error {
    /// A range query where the end precedes the start
    #[snafu(display("Invalid range: from {} is after to {}", from, to))]
    InvalidRange { from: u64, to: u64 },
    /// An event that cannot be aggregated, e.g. one with an empty key
    #[snafu(display("Invalid event: {}", msg))]
    InvalidEvent { msg: String },
    /// A window whose length differs from the one the store was created with
    #[snafu(display(
        "Window length {} does not match the store window length {}",
        actual,
        expected
    ))]
    WindowMismatch { expected: u64, actual: u64 },
    /// A configuration that the engine cannot run with
    #[snafu(display("Invalid configuration: {}", msg))]
    InvalidConf { msg: String },
    /// A read or write error has happened when interacting with files or sockets.
    #[snafu(display("An IO error occured {}", error))]
    Io { error: io::Error },
}

impl Error {
    /// Returns true if the error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidRange { .. } | Error::InvalidEvent { .. }
        )
    }

    /// HTTP-equivalent status for transports sitting in front of the engine
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        Error::Io { error: io_error }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> io::Error {
        use self::Error::*;
        use std::io::ErrorKind;
        match error {
            Io { error } => error,
            InvalidRange { from, to } => io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid range: from {} is after to {}", from, to),
            ),
            InvalidEvent { msg } => {
                io::Error::new(ErrorKind::InvalidData, format!("invalid event: {}", msg))
            }
            WindowMismatch { expected, actual } => io::Error::new(
                ErrorKind::InvalidInput,
                format!("window length {} != {}", actual, expected),
            ),
            InvalidConf { msg } => {
                io::Error::new(ErrorKind::InvalidInput, format!("invalid conf: {}", msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_bad_request() {
        let range = Error::InvalidRange { from: 10, to: 5 };
        assert!(range.is_client_error());
        assert_eq!(range.status_code(), 400);
        assert_eq!(
            range.to_string(),
            "Invalid range: from 10 is after to 5".to_string()
        );

        let event = Error::InvalidEvent {
            msg: "empty key".into(),
        };
        assert_eq!(event.status_code(), 400);
    }

    #[test]
    fn internal_errors_map_to_server_error() {
        let conf = Error::InvalidConf {
            msg: "window_size must be positive".into(),
        };
        assert!(!conf.is_client_error());
        assert_eq!(conf.status_code(), 500);

        let io_err: io::Error = Error::WindowMismatch {
            expected: 10,
            actual: 5,
        }
        .into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
    }
}
