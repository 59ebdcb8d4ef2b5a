//! CLI configuration surface.
//!
//! `spec.md` §6 treats bind address, port, and shared directory as an
//! out-of-scope external collaborator with defaults that aren't part of the
//! protocol contract. This mirrors the original Python lab's `optparse`
//! flags (`-a`/`-p`/`-d`) using `clap`'s derive API.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::err::Error;

const DEFAULT_ADDR: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 9999;
const DEFAULT_DIR: &str = "./data";

/// A small, single-threaded TCP server for a line-oriented file retrieval
/// protocol.
#[derive(Debug, Parser)]
#[command(name = "fileslice-server", about)]
pub struct Cli {
  /// Address to listen on.
  #[arg(short = 'a', long = "address", default_value = DEFAULT_ADDR)]
  pub address: IpAddr,

  /// TCP port to listen on.
  #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
  pub port: u16,

  /// Directory shared with clients.
  #[arg(short = 'd', long = "datadir", default_value = DEFAULT_DIR)]
  pub datadir: PathBuf,
}

impl Cli {
  /// The socket address derived from `address`/`port`.
  pub fn bind_addr(&self) -> SocketAddr {
    SocketAddr::new(self.address, self.port)
  }

  /// Validate that `datadir` exists and is a directory.
  pub fn validate(&self) -> Result<(), Error> {
    let meta = std::fs::metadata(&self.datadir)
      .map_err(|e| Error::config(format!("{}: {}", self.datadir.display(), e)))?;
    if !meta.is_dir() {
      return Err(Error::config(format!("{} is not a directory", self.datadir.display())));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn cli_parses_defaults() {
    let cli = Cli::parse_from(["fileslice-server"]);
    assert_eq!(cli.port, DEFAULT_PORT);
    assert_eq!(cli.datadir, PathBuf::from(DEFAULT_DIR));
  }

  #[test]
  fn cli_parses_overrides() {
    let cli = Cli::parse_from([
      "fileslice-server",
      "-a",
      "127.0.0.1",
      "-p",
      "1234",
      "-d",
      "/tmp",
    ]);
    assert_eq!(cli.bind_addr().to_string(), "127.0.0.1:1234");
    assert_eq!(cli.datadir, PathBuf::from("/tmp"));
  }

  #[test]
  fn cli_definition_is_valid() {
    Cli::command().debug_assert();
  }

  #[test]
  fn validate_rejects_missing_directory() {
    let cli = Cli::parse_from(["fileslice-server", "-d", "/does/not/exist/at/all"]);
    assert!(cli.validate().is_err());
  }

  #[test]
  fn validate_rejects_file_as_datadir() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let cli = Cli::parse_from([
      "fileslice-server",
      "-d",
      tmp.path().to_str().unwrap(),
    ]);
    assert!(cli.validate().is_err());
  }

  #[test]
  fn validate_accepts_existing_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let cli = Cli::parse_from([
      "fileslice-server",
      "-d",
      tmp.path().to_str().unwrap(),
    ]);
    assert!(cli.validate().is_ok());
  }
}

// vim: set ft=rust et sw=2 ts=2 sts=2 cinoptions=2 tw=79 :
