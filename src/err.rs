//! Error values for startup and fatal server conditions.
//!
//! Per-request protocol errors (bad commands, missing files, bad slices)
//! are not modeled here -- they are wire-visible [`crate::handlers::HandlerResult`]
//! values, never a Rust `Result::Err`.  This type exists for conditions
//! that abort the process before the event loop starts, not a request.

use std::fmt;
use std::io;

/// `fileslice` error values.
#[derive(Debug)]
pub enum Error {
  /// A `std::io` error occurred outside of the per-request `FileStore` path.
  Io(io::Error),

  /// Failed to bind or listen on the configured address/port.
  Bind(io::Error),

  /// The CLI configuration is invalid (e.g. the shared directory doesn't
  /// exist or isn't a directory).
  Config(String)
}

impl Error {
  pub fn config<S: ToString>(e: S) -> Self {
    Self::Config(e.to_string())
  }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Error::Io(e) => write!(f, "I/O error; {}", e),
      Error::Bind(e) => write!(f, "Failed to bind listening socket; {}", e),
      Error::Config(s) => write!(f, "Invalid configuration; {}", s)
    }
  }
}

impl From<io::Error> for Error {
  fn from(err: io::Error) -> Self {
    Error::Io(err)
  }
}

// vim: set ft=rust et sw=2 ts=2 sts=2 cinoptions=2 tw=79 :
