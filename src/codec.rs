//! The wire codec: parses one request line into a command, and frames one
//! [`HandlerResult`](crate::handlers::HandlerResult) into response bytes.
//!
//! Argument character classes are hand-rolled bounded ASCII scanners rather
//! than compiled regular expressions, so there's nothing to recompile per
//! request.

use crate::handlers::{Body, HandlerResult};
use crate::store::FileStore;

/// A single decoded request.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
  GetFileListing,
  GetMetadata(Vec<u8>),
  GetSlice(Vec<u8>, u64, u64),
  Quit
}

/// Outcome of extracting one line from a connection's receive accumulator.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
  /// A well-formed `...\r\n`-terminated line; content excludes the terminator.
  Normal(Vec<u8>),

  /// The line ended in a bare `\n`, or contained an embedded `\n` that
  /// wasn't part of a `\r\n` terminator.
  BadEol
}

/// Classify one line, `raw`, which is guaranteed to end with exactly one
/// `\n` byte (the caller extracts up to and including the first `\n` found
/// in the accumulator, so `raw` can contain at most one `\n`, at its last
/// position).
pub fn classify_line(raw: &[u8]) -> LineOutcome {
  let len = raw.len();
  if len >= 2 && raw[len - 2] == b'\r' {
    LineOutcome::Normal(raw[..len - 2].to_vec())
  } else {
    LineOutcome::BadEol
  }
}

fn is_cmd_char(b: u8) -> bool {
  b.is_ascii_lowercase() || b == b'_'
}

fn is_filename_char(b: u8) -> bool {
  b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-'
}

fn is_digit_char(b: u8) -> bool {
  b.is_ascii_digit()
}

/// Scan `buf` from the start for the longest run of bytes matching `pred`,
/// returning the length of that run.
fn scan_while(buf: &[u8], pred: fn(u8) -> bool) -> usize {
  let mut i = 0;
  while i < buf.len() && pred(buf[i]) {
    i += 1;
  }
  i
}

fn arg_err() -> (u32, String) {
  (201, "Invalid arguments".to_string())
}

/// Parse a `\r\n`-stripped request line into a [`Command`], or a
/// `(code, desc)` error response per the parse-outcome priority order.
pub fn parse_request(line: &[u8]) -> Result<Command, (u32, String)> {
  let cmd_len = scan_while(line, is_cmd_char);
  if cmd_len == 0 {
    return Err((101, "Bad request".to_string()));
  }
  let cmd = &line[..cmd_len];
  let rest = &line[cmd_len..];

  match cmd {
    b"get_file_listing" => {
      parse_no_args(rest)?;
      Ok(Command::GetFileListing)
    }
    b"get_metadata" => {
      let name = parse_one_filename_arg(rest)?;
      Ok(Command::GetMetadata(name))
    }
    b"get_slice" => {
      let (name, offset, size) = parse_slice_args(rest)?;
      Ok(Command::GetSlice(name, offset, size))
    }
    b"quit" => {
      parse_no_args(rest)?;
      Ok(Command::Quit)
    }
    _ => Err((
      200,
      format!("Invalid command '{}'", String::from_utf8_lossy(cmd))
    ))
  }
}

fn parse_no_args(rest: &[u8]) -> Result<(), (u32, String)> {
  if rest.is_empty() {
    Ok(())
  } else {
    Err(arg_err())
  }
}

fn parse_one_filename_arg(rest: &[u8]) -> Result<Vec<u8>, (u32, String)> {
  if rest.first() != Some(&b' ') {
    return Err(arg_err());
  }
  let arg = &rest[1..];
  let n = scan_while(arg, is_filename_char);
  if n == 0 || n != arg.len() {
    return Err(arg_err());
  }
  Ok(arg.to_vec())
}

fn parse_decimal_u64(digits: &[u8]) -> Result<u64, (u32, String)> {
  std::str::from_utf8(digits)
    .ok()
    .and_then(|s| s.parse::<u64>().ok())
    .ok_or_else(arg_err)
}

fn parse_slice_args(rest: &[u8]) -> Result<(Vec<u8>, u64, u64), (u32, String)> {
  if rest.first() != Some(&b' ') {
    return Err(arg_err());
  }
  let mut p = &rest[1..];

  let n = scan_while(p, is_filename_char);
  if n == 0 {
    return Err(arg_err());
  }
  let name = p[..n].to_vec();
  p = &p[n..];

  if p.first() != Some(&b' ') {
    return Err(arg_err());
  }
  p = &p[1..];
  let n = scan_while(p, is_digit_char);
  if n == 0 {
    return Err(arg_err());
  }
  let offset = parse_decimal_u64(&p[..n])?;
  p = &p[n..];

  if p.first() != Some(&b' ') {
    return Err(arg_err());
  }
  p = &p[1..];
  let n = scan_while(p, is_digit_char);
  if n == 0 {
    return Err(arg_err());
  }
  let size = parse_decimal_u64(&p[..n])?;
  p = &p[n..];

  if !p.is_empty() {
    return Err(arg_err());
  }

  Ok((name, offset, size))
}

/// Dispatch a decoded request line through parsing and handling, producing
/// the `HandlerResult` to frame into the response.
pub fn dispatch(line: &[u8], store: &dyn FileStore) -> HandlerResult {
  match parse_request(line) {
    Ok(cmd) => crate::handlers::handle(cmd, store),
    Err((code, desc)) => HandlerResult::err(code, desc)
  }
}

/// Frame a `HandlerResult` into the bytes that go on the wire.
pub fn encode_response(result: &HandlerResult) -> Vec<u8> {
  let mut out = Vec::new();
  out.extend_from_slice(format!("{} {}\r\n", result.code, result.desc).as_bytes());

  match &result.body {
    Body::None => {}
    Body::Blob(b) => {
      out.extend_from_slice(b);
      out.extend_from_slice(b"\r\n");
    }
    Body::List(items) => {
      for item in items {
        out.extend_from_slice(item);
        out.extend_from_slice(b"\r\n");
      }
      out.extend_from_slice(b"\r\n");
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classify_normal_line() {
    assert_eq!(
      classify_line(b"quit\r\n"),
      LineOutcome::Normal(b"quit".to_vec())
    );
  }

  #[test]
  fn classify_bare_lf_is_bad_eol() {
    assert_eq!(classify_line(b"quit\n"), LineOutcome::BadEol);
  }

  #[test]
  fn classify_lone_lf_is_bad_eol() {
    assert_eq!(classify_line(b"\n"), LineOutcome::BadEol);
  }

  #[test]
  fn parses_get_file_listing() {
    assert_eq!(parse_request(b"get_file_listing").unwrap(), Command::GetFileListing);
  }

  #[test]
  fn rejects_get_file_listing_with_args() {
    assert_eq!(
      parse_request(b"get_file_listing foo").unwrap_err(),
      (201, "Invalid arguments".to_string())
    );
  }

  #[test]
  fn parses_get_metadata() {
    assert_eq!(
      parse_request(b"get_metadata a.txt").unwrap(),
      Command::GetMetadata(b"a.txt".to_vec())
    );
  }

  #[test]
  fn rejects_get_metadata_missing_arg() {
    assert_eq!(
      parse_request(b"get_metadata").unwrap_err(),
      (201, "Invalid arguments".to_string())
    );
  }

  #[test]
  fn parses_get_slice() {
    assert_eq!(
      parse_request(b"get_slice a.txt 1 3").unwrap(),
      Command::GetSlice(b"a.txt".to_vec(), 1, 3)
    );
  }

  #[test]
  fn rejects_get_slice_bad_digits() {
    assert_eq!(
      parse_request(b"get_slice a.txt x 3").unwrap_err(),
      (201, "Invalid arguments".to_string())
    );
  }

  #[test]
  fn rejects_get_slice_trailing_bytes() {
    assert_eq!(
      parse_request(b"get_slice a.txt 1 3 extra").unwrap_err(),
      (201, "Invalid arguments".to_string())
    );
  }

  #[test]
  fn parses_quit() {
    assert_eq!(parse_request(b"quit").unwrap(), Command::Quit);
  }

  #[test]
  fn rejects_empty_line() {
    assert_eq!(
      parse_request(b"").unwrap_err(),
      (101, "Bad request".to_string())
    );
  }

  #[test]
  fn rejects_unknown_command() {
    assert_eq!(
      parse_request(b"foo").unwrap_err(),
      (200, "Invalid command 'foo'".to_string())
    );
  }

  #[test]
  fn encodes_blob_response() {
    let result = HandlerResult::ok_blob(b"5".to_vec());
    assert_eq!(encode_response(&result), b"0 OK\r\n5\r\n".to_vec());
  }

  #[test]
  fn encodes_empty_list_response() {
    let result = HandlerResult::ok_list(vec![]);
    assert_eq!(encode_response(&result), b"0 OK\r\n\r\n".to_vec());
  }

  #[test]
  fn encodes_nonempty_list_response() {
    let result = HandlerResult::ok_list(vec![b"a.txt".to_vec(), b"b.txt".to_vec()]);
    assert_eq!(
      encode_response(&result),
      b"0 OK\r\na.txt\r\nb.txt\r\n\r\n".to_vec()
    );
  }

  #[test]
  fn encodes_bodyless_response() {
    let result = HandlerResult::ok_quit();
    assert_eq!(encode_response(&result), b"0 OK\r\n".to_vec());
  }
}

// vim: set ft=rust et sw=2 ts=2 sts=2 cinoptions=2 tw=79 :
