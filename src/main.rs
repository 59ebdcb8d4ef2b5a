//! Binary entry point: parse CLI flags, build a [`fileslice::store::DirStore`],
//! bind the listening socket, and run the readiness dispatcher forever.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use fileslice::config::Cli;
use fileslice::server::Server;
use fileslice::store::DirStore;

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();
  if let Err(e) = cli.validate() {
    error!(error = %e, "invalid configuration");
    return ExitCode::FAILURE;
  }

  let store = Arc::new(DirStore::new(cli.datadir.clone()));
  let mut server = match Server::bind(cli.bind_addr(), store) {
    Ok(server) => server,
    Err(e) => {
      error!(error = %e, "failed to start server");
      return ExitCode::FAILURE;
    }
  };

  if let Err(e) = server.run() {
    error!(error = %e, "server loop exited");
    return ExitCode::FAILURE;
  }

  ExitCode::SUCCESS
}

// vim: set ft=rust et sw=2 ts=2 sts=2 cinoptions=2 tw=79 :
