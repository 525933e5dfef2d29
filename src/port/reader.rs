//! Splitting the byte stream from the arm into lines.

use crate::backend::Backend;
use std::{
	io,
	time::{Duration, Instant},
};

/// The ASCII line feed, which ends every line.
const LINE_FEED: u8 = b'\n';
/// The ASCII carriage return, optionally preceding [`LINE_FEED`].
const CARRIAGE_RETURN: u8 = b'\r';
/// Consecutive zero-byte reads after which the link is considered closed.
const ZERO_READ_LIMIT: u32 = 3;
/// The size of the buffer used for each read.
const READ_CHUNK: usize = 256;

/// One line of text received from the arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
	/// The line without its terminator.
	pub text: String,
	/// When the line was completed.
	pub received: Instant,
}

/// Why [`LineReader::next_line`] did not produce a line.
#[derive(Debug)]
pub(crate) enum ReadError {
	/// The deadline passed without a complete line.
	Timeout,
	/// The link is closed. This is reported for every call once it happens.
	Closed,
	/// Any other I/O error.
	Io(io::Error),
}

/// Whether an I/O error means the other end of the link is gone.
pub(crate) fn is_disconnect(kind: io::ErrorKind) -> bool {
	use io::ErrorKind as K;
	matches!(
		kind,
		K::BrokenPipe | K::ConnectionReset | K::ConnectionAborted | K::NotConnected | K::UnexpectedEof
	)
}

/// Buffers bytes from a [`Backend`] and hands them out a line at a time.
///
/// Lines that span several reads are reassembled and no bytes are dropped
/// or reordered. Lines that are empty once their terminator is removed carry
/// no content and are skipped.
#[derive(Debug)]
pub(crate) struct LineReader<B> {
	backend: B,
	/// Bytes received but not yet returned as lines.
	buffer: Vec<u8>,
	/// How many bytes may accumulate without a terminator.
	max_line_len: usize,
	/// The number of consecutive reads that returned zero bytes.
	zero_reads: u32,
	/// Whether the link has closed. Once set it is never cleared.
	closed: bool,
}

impl<B: Backend> LineReader<B> {
	pub(crate) fn new(backend: B, max_line_len: usize) -> Self {
		LineReader {
			backend,
			buffer: Vec::new(),
			max_line_len: max_line_len.max(1),
			zero_reads: 0,
			closed: false,
		}
	}

	pub(crate) fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	/// Whether the link has closed.
	pub(crate) fn is_closed(&self) -> bool {
		self.closed
	}

	/// Record that the link has closed, e.g., because a write failed.
	pub(crate) fn mark_closed(&mut self) {
		if !self.closed {
			log::info!("{} link closed", self.name());
		}
		self.closed = true;
	}

	fn name(&self) -> String {
		self.backend
			.name()
			.unwrap_or_else(|| crate::backend::UNKNOWN_BACKEND_NAME.to_string())
	}

	/// Return the next line, waiting at most `timeout` for it to arrive.
	///
	/// Lines already buffered are returned even if `timeout` is zero.
	pub(crate) fn next_line(&mut self, timeout: Duration) -> Result<Line, ReadError> {
		let deadline = Instant::now().checked_add(timeout);
		loop {
			if let Some(line) = self.take_line() {
				return Ok(line);
			}
			if self.closed {
				return Err(ReadError::Closed);
			}
			let remaining = match deadline {
				Some(deadline) => deadline.saturating_duration_since(Instant::now()),
				None => Duration::MAX,
			};
			if remaining.is_zero() {
				return Err(ReadError::Timeout);
			}
			self.fill(remaining)?;
		}
	}

	/// Read whatever is available, waiting at most `timeout`.
	fn fill(&mut self, timeout: Duration) -> Result<(), ReadError> {
		self.backend
			.set_read_timeout(Some(timeout))
			.map_err(ReadError::Io)?;
		let mut chunk = [0u8; READ_CHUNK];
		match self.backend.read(&mut chunk) {
			Ok(0) => {
				self.zero_reads += 1;
				if self.zero_reads >= ZERO_READ_LIMIT {
					self.mark_closed();
				}
				Ok(())
			}
			Ok(n) => {
				self.zero_reads = 0;
				self.buffer.extend_from_slice(&chunk[..n]);
				Ok(())
			}
			Err(e) => match e.kind() {
				io::ErrorKind::TimedOut
				| io::ErrorKind::WouldBlock
				| io::ErrorKind::Interrupted => Ok(()),
				kind if is_disconnect(kind) => {
					self.mark_closed();
					Ok(())
				}
				_ => Err(ReadError::Io(e)),
			},
		}
	}

	/// Remove the next non-empty line from the buffer, if there is one.
	fn take_line(&mut self) -> Option<Line> {
		loop {
			let end = match self.buffer.iter().position(|b| *b == LINE_FEED) {
				Some(index) => index + 1,
				None if self.buffer.len() >= self.max_line_len => {
					log::warn!(
						"{} no line terminator after {} bytes, splitting the line",
						self.name(),
						self.buffer.len()
					);
					self.max_line_len
				}
				// Once the link is closed nothing will complete the final line.
				None if self.closed && !self.buffer.is_empty() => self.buffer.len(),
				None => return None,
			};
			let mut bytes: Vec<u8> = self.buffer.drain(..end).collect();
			if bytes.last() == Some(&LINE_FEED) {
				bytes.pop();
				if bytes.last() == Some(&CARRIAGE_RETURN) {
					bytes.pop();
				}
			}
			if bytes.iter().all(u8::is_ascii_whitespace) {
				log::trace!("{} skipping blank line", self.name());
				continue;
			}
			return Some(Line {
				text: String::from_utf8_lossy(&bytes).into_owned(),
				received: Instant::now(),
			});
		}
	}

	/// Drop everything received but not yet read, returning the complete
	/// lines that were dropped.
	pub(crate) fn discard_pending(&mut self) -> Result<Vec<String>, io::Error> {
		let mut discarded: Vec<String> = Vec::new();
		while let Some(line) = self.take_line_if_complete() {
			discarded.push(line);
		}
		if !self.buffer.is_empty() {
			discarded.push(String::from_utf8_lossy(&self.buffer).into_owned());
			self.buffer.clear();
		}
		if !self.closed {
			self.backend.clear_input()?;
		}
		Ok(discarded)
	}

	fn take_line_if_complete(&mut self) -> Option<String> {
		if self.buffer.contains(&LINE_FEED) {
			self.take_line().map(|line| line.text)
		} else {
			None
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::Mock;

	const WAIT: Duration = Duration::from_millis(20);

	fn reader() -> (LineReader<Mock>, Mock) {
		let mock = Mock::new();
		(LineReader::new(mock.clone(), 1024), mock)
	}

	fn text(result: Result<Line, ReadError>) -> String {
		match result {
			Ok(line) => line.text,
			Err(e) => panic!("expected a line, got {e:?}"),
		}
	}

	#[test]
	fn splits_lines() {
		let (mut reader, mock) = reader();
		mock.append_data(b"ok\r\nfirst\nsecond\r\n");
		assert_eq!(text(reader.next_line(WAIT)), "ok");
		assert_eq!(text(reader.next_line(WAIT)), "first");
		assert_eq!(text(reader.next_line(WAIT)), "second");
		assert!(matches!(reader.next_line(WAIT), Err(ReadError::Timeout)));
	}

	#[test]
	fn reassembles_partial_reads() {
		let (mut reader, mock) = reader();
		mock.chunk_size(Some(3));
		mock.append_data(b"Using reset pos!\r\nok\r\n");
		assert_eq!(text(reader.next_line(WAIT)), "Using reset pos!");
		assert_eq!(text(reader.next_line(WAIT)), "ok");
	}

	#[test]
	fn incomplete_line_waits_for_terminator() {
		let (mut reader, mock) = reader();
		mock.append_data(b"<Idle,");
		assert!(matches!(reader.next_line(WAIT), Err(ReadError::Timeout)));
		mock.append_data(b"rest>\r\n");
		assert_eq!(text(reader.next_line(WAIT)), "<Idle,rest>");
	}

	#[test]
	fn buffered_lines_are_returned_with_zero_timeout() {
		let (mut reader, mock) = reader();
		mock.append_data(b"a\nb\n");
		assert_eq!(text(reader.next_line(WAIT)), "a");
		assert_eq!(text(reader.next_line(Duration::ZERO)), "b");
		assert!(matches!(
			reader.next_line(Duration::ZERO),
			Err(ReadError::Timeout)
		));
	}

	#[test]
	fn blank_lines_are_skipped() {
		let (mut reader, mock) = reader();
		mock.append_data(b"\r\n\n \r\nok\r\n");
		assert_eq!(text(reader.next_line(WAIT)), "ok");
	}

	#[test]
	fn invalid_utf8_is_replaced() {
		let (mut reader, mock) = reader();
		mock.append_data(b"bad \xff byte\n");
		assert_eq!(text(reader.next_line(WAIT)), "bad \u{fffd} byte");
	}

	#[test]
	fn long_lines_are_split() {
		let mock = Mock::new();
		let mut reader = LineReader::new(mock.clone(), 4);
		mock.append_data(b"abcdefgh");
		assert_eq!(text(reader.next_line(WAIT)), "abcd");
		assert_eq!(text(reader.next_line(WAIT)), "efgh");
	}

	#[test]
	fn closed_is_sticky() {
		let (mut reader, mock) = reader();
		mock.append_data(b"ok\r\npartial");
		mock.unplug();
		assert_eq!(text(reader.next_line(WAIT)), "ok");
		// The unterminated tail is still delivered.
		assert_eq!(text(reader.next_line(WAIT)), "partial");
		assert!(matches!(reader.next_line(WAIT), Err(ReadError::Closed)));
		assert!(reader.is_closed());
		mock.append_data(b"ok\r\n");
		assert!(matches!(reader.next_line(WAIT), Err(ReadError::Closed)));
	}

	#[test]
	fn disconnect_errors_close_the_link() {
		let (mut reader, mock) = reader();
		mock.read_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
		assert!(matches!(reader.next_line(WAIT), Err(ReadError::Closed)));
		assert!(reader.is_closed());
	}

	#[test]
	fn other_errors_are_reported() {
		let (mut reader, mock) = reader();
		mock.read_error(Some(io::Error::new(io::ErrorKind::Other, "oops")));
		assert!(matches!(reader.next_line(WAIT), Err(ReadError::Io(_))));
		// The reader is still usable.
		mock.append_data(b"ok\n");
		assert_eq!(text(reader.next_line(WAIT)), "ok");
	}

	#[test]
	fn interrupted_reads_are_retried() {
		let (mut reader, mock) = reader();
		mock.read_error(Some(io::Error::new(io::ErrorKind::Interrupted, "signal")));
		mock.append_data(b"ok\n");
		assert_eq!(text(reader.next_line(WAIT)), "ok");
	}

	#[test]
	fn discard_pending() {
		let (mut reader, mock) = reader();
		mock.append_data(b"late\r\nok\r\npart");
		// Pull everything into the reader's buffer.
		assert_eq!(text(reader.next_line(WAIT)), "late");
		mock.append_data(b"unread\r\n");
		assert_eq!(
			reader.discard_pending().unwrap(),
			vec!["ok".to_string(), "part".to_string()]
		);
		assert!(mock.is_empty());
		assert!(matches!(reader.next_line(WAIT), Err(ReadError::Timeout)));
	}
}
