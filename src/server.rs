//! The readiness dispatcher (C4): owns the listening endpoint and the map
//! of live connections, registers/reregisters/deregisters interest with
//! `mio`'s (edge-triggered) readiness primitive, and routes events to
//! connections. Because `mio` is edge- not level-triggered,
//! [`crate::conn::Connection::on_readable`] drains every non-blocking
//! `recv` to `WouldBlock` on each wake rather than issuing just one, the
//! same way [`Server::accept_all`] drains `accept` to `WouldBlock`.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};

use tracing::{debug, info, warn};

use crate::conn::Connection;
use crate::err::Error;
use crate::store::FileStore;

const LISTENER: Token = Token(0);

/// High-water mark on a connection's `send_buf` while draining pipelined
/// requests in a single scheduling slot (`spec.md` §4.3: the machine "must
/// not loop while `send_buf` has grown beyond a high-water mark without
/// yielding to the writer"). Once crossed, the remaining buffered line(s)
/// are left for the next time this connection is scheduled, so one client
/// pipelining many large `get_slice` requests can't starve the others.
const SEND_BUF_HIGH_WATER: usize = 256 * 1024;

struct ConnEntry {
  stream: TcpStream,
  conn: Connection,
  interest: Interest
}

/// The server: a single-threaded, readiness-driven event loop.
pub struct Server {
  poll: Poll,
  listener: TcpListener,
  connections: HashMap<Token, ConnEntry>,
  next_token: usize,
  store: Arc<dyn FileStore>
}

impl Server {
  /// Bind the listening socket at `addr` and prepare the event loop.  Does
  /// not start serving; call [`Server::run`] for that.
  pub fn bind(addr: SocketAddr, store: Arc<dyn FileStore>) -> Result<Self, Error> {
    let mut listener = TcpListener::bind(addr).map_err(Error::Bind)?;
    let poll = Poll::new().map_err(Error::Bind)?;
    poll
      .registry()
      .register(&mut listener, LISTENER, Interest::READABLE)
      .map_err(Error::Bind)?;

    info!(%addr, "listening");

    Ok(Server {
      poll,
      listener,
      connections: HashMap::new(),
      next_token: 1,
      store
    })
  }

  /// The address the listening socket is actually bound to (useful when
  /// `bind` was called with port `0`).
  pub fn local_addr(&self) -> io::Result<SocketAddr> {
    self.listener.local_addr()
  }

  fn alloc_token(&mut self) -> Token {
    let token = Token(self.next_token);
    self.next_token += 1;
    token
  }

  /// Run the event loop forever.  Only returns on an unrecoverable error
  /// polling for readiness.
  pub fn run(&mut self) -> Result<(), Error> {
    let mut events = Events::with_capacity(1024);
    loop {
      self.poll.poll(&mut events, None).map_err(Error::Io)?;

      let tokens: Vec<Token> = events.iter().map(|e| e.token()).collect();
      for token in tokens {
        if token == LISTENER {
          self.accept_all();
          continue;
        }

        // Within a single readiness batch, drain pending writes before
        // admitting new reads for the same client (spec.md §4.4 step 3).
        self.service_write(token);
        self.service_read(token);
        self.reconcile_interest(token);
      }
    }
  }

  fn accept_all(&mut self) {
    loop {
      match self.listener.accept() {
        Ok((mut stream, addr)) => {
          let token = self.alloc_token();
          if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
            warn!(error = %e, "failed to register accepted connection");
            continue;
          }
          let conn = Connection::new(addr.to_string(), Arc::clone(&self.store));
          debug!(peer = %addr, "accepted connection");
          self.connections.insert(
            token,
            ConnEntry { stream, conn, interest: Interest::READABLE }
          );
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
        Err(e) => {
          warn!(error = %e, "accept failed");
          break;
        }
      }
    }
  }

  fn service_write(&mut self, token: Token) {
    if let Some(entry) = self.connections.get_mut(&token) {
      entry.conn.on_writable(&mut entry.stream);
    }
  }

  fn service_read(&mut self, token: Token) {
    if let Some(entry) = self.connections.get_mut(&token) {
      entry.conn.on_readable(&mut entry.stream);
      while entry.conn.has_pending_line()
        && !entry.conn.is_done()
        && entry.conn.send_buf_len() < SEND_BUF_HIGH_WATER
      {
        // Re-arm for fairness: spec.md §4.3 allows looping here as long as
        // we don't starve other connections by growing send_buf unbounded.
        // We process the remaining queued line(s) for this connection now
        // rather than waiting for another readiness notification, since
        // the bytes are already in recv_acc and no further I/O is needed.
        // The high-water check is what makes this a yield-to-the-writer
        // loop rather than an unbounded one: once send_buf crosses it, any
        // line still pending in recv_acc waits for this connection's next
        // scheduling slot instead of growing the buffer further.
        entry.conn.drain_pending_line();
      }
    }
  }

  fn reconcile_interest(&mut self, token: Token) {
    let done = match self.connections.get(&token) {
      Some(entry) => entry.conn.is_done(),
      None => return
    };

    if done {
      if let Some(mut entry) = self.connections.remove(&token) {
        let peer = entry.conn.peer().to_string();
        if let Err(e) = self.poll.registry().deregister(&mut entry.stream) {
          warn!(error = %e, %peer, "failed to deregister connection");
        }
        debug!(%peer, "connection closed");
      }
      return;
    }

    let entry = match self.connections.get_mut(&token) {
      Some(entry) => entry,
      None => return
    };
    let wanted = if entry.conn.wants_write() {
      Interest::READABLE | Interest::WRITABLE
    } else {
      Interest::READABLE
    };
    if wanted != entry.interest {
      if let Err(e) = self.poll.registry().reregister(&mut entry.stream, token, wanted) {
        warn!(error = %e, "failed to reregister connection");
        return;
      }
      entry.interest = wanted;
    }
  }
}

// vim: set ft=rust et sw=2 ts=2 sts=2 cinoptions=2 tw=79 :
