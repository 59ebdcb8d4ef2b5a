//! Command handlers (C2): pure functions of `(args, FileStore)` that never
//! touch sockets.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::codec::Command;
use crate::store::{FileStore, StoreError};

pub const OK: u32 = 0;
pub const BAD_EOL: u32 = 100;
pub const BAD_REQUEST: u32 = 101;
pub const INTERNAL_ERROR: u32 = 199;
pub const INVALID_COMMAND: u32 = 200;
pub const INVALID_ARGUMENTS: u32 = 201;
pub const FILE_NOT_FOUND: u32 = 202;
pub const BAD_OFFSET: u32 = 203;

/// The response body, in the two shapes the wire codec can frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Body {
  None,
  Blob(Vec<u8>),
  List(Vec<Vec<u8>>)
}

/// The result of handling one request: a status code, a human-readable
/// (not load-bearing) description, an optional body, and whether this
/// response should cause the connection to close once fully drained.
#[derive(Debug, PartialEq, Eq)]
pub struct HandlerResult {
  pub code: u32,
  pub desc: String,
  pub body: Body,
  pub quit: bool
}

impl HandlerResult {
  pub fn err<S: Into<String>>(code: u32, desc: S) -> Self {
    HandlerResult { code, desc: desc.into(), body: Body::None, quit: false }
  }

  pub fn ok_blob(blob: Vec<u8>) -> Self {
    HandlerResult { code: OK, desc: "OK".to_string(), body: Body::Blob(blob), quit: false }
  }

  pub fn ok_list(items: Vec<Vec<u8>>) -> Self {
    HandlerResult { code: OK, desc: "OK".to_string(), body: Body::List(items), quit: false }
  }

  pub fn ok_quit() -> Self {
    HandlerResult { code: OK, desc: "OK".to_string(), body: Body::None, quit: true }
  }
}

/// Dispatch a parsed [`Command`] to its handler.
pub fn handle(cmd: Command, store: &dyn FileStore) -> HandlerResult {
  match cmd {
    Command::GetFileListing => get_file_listing(store),
    Command::GetMetadata(name) => get_metadata(&name, store),
    Command::GetSlice(name, offset, size) => get_slice(&name, offset, size, store),
    Command::Quit => quit()
  }
}

fn get_file_listing(store: &dyn FileStore) -> HandlerResult {
  match store.list() {
    Ok(names) => {
      let ascii_names: Vec<Vec<u8>> = names.into_iter().filter(|n| n.is_ascii()).collect();
      HandlerResult::ok_list(ascii_names)
    }
    Err(_) => HandlerResult::err(INTERNAL_ERROR, "Internal error")
  }
}

fn get_metadata(name: &[u8], store: &dyn FileStore) -> HandlerResult {
  match store.size(name) {
    Ok(size) => HandlerResult::ok_blob(size.to_string().into_bytes()),
    Err(StoreError::NotFound) | Err(StoreError::NameTooLong) => {
      HandlerResult::err(FILE_NOT_FOUND, "File not found")
    }
    Err(StoreError::IsDirectory) => HandlerResult::err(FILE_NOT_FOUND, "File not found"),
    Err(StoreError::Other(_)) => HandlerResult::err(INTERNAL_ERROR, "Internal error")
  }
}

fn get_slice(name: &[u8], offset: u64, size: u64, store: &dyn FileStore) -> HandlerResult {
  let file_size = match store.size(name) {
    Ok(sz) => sz,
    Err(StoreError::NotFound) | Err(StoreError::NameTooLong) | Err(StoreError::IsDirectory) => {
      return HandlerResult::err(FILE_NOT_FOUND, "File not found");
    }
    Err(StoreError::Other(_)) => {
      return HandlerResult::err(INTERNAL_ERROR, "Internal error");
    }
  };

  let end = match offset.checked_add(size) {
    Some(end) => end,
    None => return HandlerResult::err(BAD_OFFSET, "Invalid file slice")
  };
  if end > file_size {
    return HandlerResult::err(BAD_OFFSET, "Invalid file slice");
  }

  match store.read(name, offset, size) {
    Ok(bytes) => HandlerResult::ok_blob(BASE64.encode(bytes).into_bytes()),
    Err(StoreError::NotFound) | Err(StoreError::NameTooLong) | Err(StoreError::IsDirectory) => {
      HandlerResult::err(FILE_NOT_FOUND, "File not found")
    }
    Err(StoreError::Other(_)) => HandlerResult::err(INTERNAL_ERROR, "Internal error")
  }
}

fn quit() -> HandlerResult {
  HandlerResult::ok_quit()
}


// vim: set ft=rust et sw=2 ts=2 sts=2 cinoptions=2 tw=79 :
