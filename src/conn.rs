//! The per-connection state machine (C3): owns the receive accumulator and
//! send buffer, consumes readiness events, drives the codec and handlers,
//! and decides when a connection should close.

use std::io::{self, Read, Write};
use std::sync::Arc;

use bytes::{Buf, BytesMut};

use crate::codec::{self, LineOutcome};
use crate::handlers::HandlerResult;
use crate::store::FileStore;

/// Receive accumulator cap (see `spec.md` §5).  Exceeding this is treated
/// as the fatal framing error path.
const MAX_RECV_ACC: usize = 64 * 1024;

/// Size of the scratch buffer used for each non-blocking `recv` call in the
/// drain-to-`WouldBlock` loop.
const SCRATCH_LEN: usize = 4096;

/// One accepted client connection.
pub struct Connection {
  peer: String,
  store: Arc<dyn FileStore>,
  recv_acc: BytesMut,
  send_buf: BytesMut,
  quit_requested: bool,
  peer_closed: bool,
  fatal: bool
}

impl Connection {
  pub fn new(peer: String, store: Arc<dyn FileStore>) -> Self {
    Connection {
      peer,
      store,
      recv_acc: BytesMut::new(),
      send_buf: BytesMut::new(),
      quit_requested: false,
      peer_closed: false,
      fatal: false
    }
  }

  pub fn peer(&self) -> &str {
    &self.peer
  }

  /// True iff there are bytes waiting to be written to the socket.
  pub fn wants_write(&self) -> bool {
    !self.send_buf.is_empty()
  }

  /// Bytes currently queued in `send_buf`, awaiting a write-ready event.
  /// Used by the dispatcher to cap how much pipelined request processing
  /// it does in one scheduling slot before yielding to the writer.
  pub fn send_buf_len(&self) -> usize {
    self.send_buf.len()
  }

  /// True iff this connection is fully finished and may be torn down: all
  /// pending output has drained, and either the peer closed, a fatal error
  /// occurred, or a `quit` was processed.
  pub fn is_done(&self) -> bool {
    self.send_buf.is_empty() && (self.peer_closed || self.fatal || self.quit_requested)
  }

  fn enqueue(&mut self, result: &HandlerResult) {
    let framed = codec::encode_response(result);
    self.send_buf.extend_from_slice(&framed);
  }

  /// Extract at most one complete line from `recv_acc` and dispatch it.
  /// Processes **at most one request** per call, per `spec.md` §4.3 -- if
  /// `recv_acc` still contains a terminator afterwards, the caller (the
  /// dispatcher) is responsible for re-invoking this once the connection is
  /// next scheduled, so other connections aren't starved.
  fn process_one_line(&mut self) {
    let pos = match self.recv_acc.iter().position(|&b| b == b'\n') {
      Some(pos) => pos,
      None => return
    };

    let raw = self.recv_acc.split_to(pos + 1);

    let result = match codec::classify_line(&raw) {
      LineOutcome::BadEol => HandlerResult::err(100, "Bad EOL"),
      LineOutcome::Normal(content) => codec::dispatch(&content, self.store.as_ref())
    };

    let quit = result.quit;
    self.enqueue(&result);
    if quit {
      self.quit_requested = true;
    }
  }

  /// True iff `recv_acc` still holds a complete, not-yet-dispatched line.
  pub fn has_pending_line(&self) -> bool {
    self.recv_acc.iter().any(|&b| b == b'\n')
  }

  /// Dispatch one more already-buffered line without performing any I/O.
  /// Used by the dispatcher to re-arm processing for a connection whose
  /// `recv_acc` still holds a complete line after the last readiness event
  /// (`spec.md` §4.3/§4.4), without waiting for another notification.
  pub fn drain_pending_line(&mut self) {
    self.process_one_line();
  }

  /// Handle a read-readiness event: drain the socket with non-blocking
  /// `recv` calls until it reports `WouldBlock`, then, if a complete line
  /// is now buffered, dispatch exactly one request.
  ///
  /// `mio` registers file descriptors edge-triggered, not level-triggered,
  /// so a single `recv` per wake is unsafe here: if a request doesn't fit
  /// in one `recv`'s worth of bytes and the peer sends nothing further, no
  /// later readiness event will ever fire to pick up the rest. Draining to
  /// `WouldBlock` every wake is what makes the edge-triggered primitive
  /// behave like the level-triggered one the protocol is specified against
  /// (mirrors `Server::accept_all`'s `accept`-until-`WouldBlock` loop).
  pub fn on_readable<S: Read>(&mut self, stream: &mut S) {
    if self.fatal || self.peer_closed {
      return;
    }

    loop {
      let mut scratch = [0u8; SCRATCH_LEN];
      match stream.read(&mut scratch) {
        Ok(0) => {
          self.peer_closed = true;
          break;
        }
        Ok(n) => {
          let chunk = &scratch[..n];
          if !chunk.is_ascii() {
            self.enqueue(&HandlerResult::err(101, "Message contains non-ascii"));
            self.fatal = true;
            break;
          }

          self.recv_acc.extend_from_slice(chunk);

          if self.recv_acc.len() > MAX_RECV_ACC {
            self.enqueue(&HandlerResult::err(101, "Request too large"));
            self.fatal = true;
            break;
          }
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
        Err(_) => {
          self.fatal = true;
          break;
        }
      }
    }

    self.process_one_line();
  }

  /// Handle a write-readiness event: attempt to drain `send_buf` into the
  /// socket, honoring partial writes and would-block.
  pub fn on_writable<S: Write>(&mut self, stream: &mut S) {
    if self.send_buf.is_empty() {
      return;
    }

    match stream.write(&self.send_buf) {
      Ok(0) => {
        self.fatal = true;
      }
      Ok(n) => {
        self.send_buf.advance(n);
      }
      Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
      Err(_) => {
        self.fatal = true;
      }
    }
  }
}


// vim: set ft=rust et sw=2 ts=2 sts=2 cinoptions=2 tw=79 :
