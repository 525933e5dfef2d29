//! Types that can exchange (read/write) bytes with a connected arm.
//!
//! The [`Backend`] trait represents all such types.

use std::io;
use std::time::Duration;

use serialport as sp;

#[cfg(windows)]
use sp::COMPort as ExternSerial;
use sp::SerialPort;
#[cfg(unix)]
use sp::TTYPort as ExternSerial;

/// The placeholder name for a backend that doesn't have a name.
pub(crate) const UNKNOWN_BACKEND_NAME: &str = "<unknown backend>";

/// Types that allow reading and writing bytes with a connected arm.
///
/// A [`Session`](crate::Session) takes exclusive ownership of its backend, so
/// an already-open link of any kind can be handed to
/// [`OpenOptions::open_backend`](crate::OpenOptions::open_backend).
pub trait Backend: io::Read + io::Write {
	/// Set the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error>;

	/// Get the "name" of the backend.
	///
	/// This can be in any format, but should uniquely identify the backend
	/// instance.
	fn name(&self) -> Option<String>;

	/// Discard any bytes that have been received but not yet read.
	fn clear_input(&mut self) -> Result<(), io::Error>;
}

impl<C: Backend + ?Sized> Backend for Box<C> {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
	fn clear_input(&mut self) -> Result<(), io::Error> {
		(**self).clear_input()
	}
}

impl<C: Backend + ?Sized> Backend for &mut C {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
	fn clear_input(&mut self) -> Result<(), io::Error> {
		(**self).clear_input()
	}
}

/// A platform agnostic serial port backend.
//
// `serialport` exposes `COMPort` and `TTYPort` for windows and unix,
// respectively. A platform only ever uses one of them, so wrap whichever one
// applies in a new type rather than making every consumer generic over it.
#[derive(Debug)]
pub struct Serial(pub(crate) ExternSerial);

impl io::Read for Serial {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read(buf)
	}
}

impl io::Write for Serial {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.0.flush()
	}
}

impl Backend for Serial {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		// The serialport API does not support infinite timeouts, so use the
		// largest possible duration instead.
		Ok(self.0.set_timeout(timeout.unwrap_or(Duration::MAX))?)
	}
	fn name(&self) -> Option<String> {
		self.0.name()
	}
	fn clear_input(&mut self) -> Result<(), io::Error> {
		Ok(self.0.clear(sp::ClearBuffer::Input)?)
	}
}

#[cfg(any(test, feature = "mock"))]
pub use mock::Mock;

#[cfg(any(test, feature = "mock"))]
mod mock {
	use super::Backend;
	use std::collections::VecDeque;
	use std::io;
	use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
	use std::time::Duration;

	/// The longest a read on an empty [`Mock`] will sleep before timing out.
	const MAX_SIMULATED_WAIT: Duration = Duration::from_millis(5);

	/// A mock backend for use in testing.
	///
	/// It has the following features:
	///   * It records all data written to it.
	///   * It can be filled with data for reading, either immediately or as a
	///     reply released by the next written line.
	///   * Specific errors can be inserted for calls to `read`, `write`, `flush`,
	///     and `set_read_timeout`.
	///   * It can be "unplugged", after which reads return zero bytes and
	///     writes fail.
	///
	/// Clones share the same state, so a test can keep a handle to a mock that
	/// has been moved into a [`Session`](crate::Session).
	#[derive(Debug, Clone, Default)]
	pub struct Mock {
		inner: Arc<Mutex<Inner>>,
	}

	#[derive(Debug, Default)]
	struct Inner {
		/// The bytes available for reading.
		buffer: VecDeque<u8>,
		/// Replies appended to `buffer`, one per written line.
		replies: VecDeque<Vec<u8>>,
		/// Everything written so far.
		written: Vec<u8>,
		/// The error to surface on the next read, if any. It is only surfaced once.
		read_error: Option<io::Error>,
		/// The error to surface on the next write, if any. It is only surfaced once.
		write_error: Option<io::Error>,
		/// The error to surface on the next flush, if any. It is only surfaced once.
		flush_error: Option<io::Error>,
		/// The error to surface on the next set_read_timeout, if any. It is only surfaced once.
		set_read_timeout_error: Option<io::Error>,
		/// The most recent read timeout.
		read_timeout: Option<Duration>,
		/// Whether the mock has been unplugged.
		closed: bool,
		/// The most bytes a single read will return.
		chunk_size: Option<usize>,
		/// If set, every line ending written releases a reply, falling back
		/// to these bytes when none is queued.
		line_ending_ack: Option<Vec<u8>>,
	}

	impl Mock {
		/// Create a new Mock backend.
		pub fn new() -> Self {
			Mock::default()
		}
		fn lock(&self) -> MutexGuard<'_, Inner> {
			self.inner.lock().unwrap_or_else(PoisonError::into_inner)
		}
		/// Append data to the read buffer.
		///
		/// The data is not validated in any way.
		pub fn append_data<T: AsRef<[u8]>>(&self, bytes: T) {
			self.lock().buffer.extend(bytes.as_ref());
		}
		/// Queue data that is appended to the read buffer once the next line has
		/// been written.
		pub fn queue_reply<T: AsRef<[u8]>>(&self, bytes: T) {
			self.lock().replies.push_back(bytes.as_ref().to_vec());
		}
		/// Clear the read buffer.
		pub fn clear_buffer(&self) {
			self.lock().buffer.clear();
		}
		/// Whether the mock has any data available or not
		pub fn is_empty(&self) -> bool {
			self.lock().buffer.is_empty()
		}
		/// All bytes written to the mock so far.
		pub fn written(&self) -> Vec<u8> {
			self.lock().written.clone()
		}
		/// All lines written to the mock so far, without their terminators.
		pub fn written_lines(&self) -> Vec<String> {
			String::from_utf8_lossy(&self.lock().written)
				.lines()
				.map(str::to_string)
				.collect()
		}
		/// Limit the number of bytes a single read returns.
		pub fn chunk_size(&self, size: Option<usize>) {
			self.lock().chunk_size = size;
		}
		/// Answer every `\r` and `\n` written, as GRBL firmware does.
		///
		/// Each line ending releases the next queued reply, or `ack` if none is
		/// queued. With `None`, only a written chunk containing `\n` releases a
		/// reply and nothing is sent when the queue is empty.
		pub fn ack_line_endings<T: AsRef<[u8]>>(&self, ack: Option<T>) {
			self.lock().line_ending_ack = ack.map(|ack| ack.as_ref().to_vec());
		}
		/// Simulate the device being unplugged.
		pub fn unplug(&self) {
			self.lock().closed = true;
		}
		/// Set the error for the next `read`, if any.
		pub fn read_error(&self, err: Option<io::Error>) {
			self.lock().read_error = err;
		}
		/// Set the error for the next `write`, if any.
		pub fn write_error(&self, err: Option<io::Error>) {
			self.lock().write_error = err;
		}
		/// Set the error for the next `flush`, if any.
		pub fn flush_error(&self, err: Option<io::Error>) {
			self.lock().flush_error = err;
		}
		/// Set the error for the next `set_read_timeout`, if any.
		pub fn set_read_timeout_error(&self, err: Option<io::Error>) {
			self.lock().set_read_timeout_error = err;
		}
	}

	impl Backend for Mock {
		fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
			let mut inner = self.lock();
			if let Some(err) = inner.set_read_timeout_error.take() {
				Err(err)
			} else {
				inner.read_timeout = timeout;
				Ok(())
			}
		}

		fn name(&self) -> Option<String> {
			Some(format!("<mock 0x{:x}>", Arc::as_ptr(&self.inner) as usize))
		}

		fn clear_input(&mut self) -> Result<(), io::Error> {
			self.lock().buffer.clear();
			Ok(())
		}
	}

	impl io::Read for Mock {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			let wait = {
				let mut inner = self.lock();
				if let Some(err) = inner.read_error.take() {
					return Err(err);
				}
				if !inner.buffer.is_empty() {
					let limit = inner.chunk_size.unwrap_or(usize::MAX).max(1);
					let count = buf.len().min(limit).min(inner.buffer.len());
					for (dst, src) in buf.iter_mut().zip(inner.buffer.drain(..count)) {
						*dst = src;
					}
					return Ok(count);
				}
				if inner.closed {
					return Ok(0);
				}
				inner
					.read_timeout
					.unwrap_or(MAX_SIMULATED_WAIT)
					.min(MAX_SIMULATED_WAIT)
			};
			// A real device would block until the timeout expires. Sleep
			// briefly, without holding the lock, to let other threads feed data.
			std::thread::sleep(wait);
			Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"Simulated timeout error",
			))
		}
	}

	impl io::Write for Mock {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			let mut inner = self.lock();
			if let Some(err) = inner.write_error.take() {
				return Err(err);
			}
			if inner.closed {
				return Err(io::Error::new(
					io::ErrorKind::BrokenPipe,
					"Simulated disconnection",
				));
			}
			inner.written.extend_from_slice(buf);
			if let Some(ack) = inner.line_ending_ack.clone() {
				for _ in buf.iter().filter(|b| matches!(b, b'\r' | b'\n')) {
					let reply = inner.replies.pop_front().unwrap_or_else(|| ack.clone());
					inner.buffer.extend(reply);
				}
			} else if buf.contains(&b'\n') {
				if let Some(reply) = inner.replies.pop_front() {
					inner.buffer.extend(reply);
				}
			}
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			if let Some(err) = self.lock().flush_error.take() {
				Err(err)
			} else {
				Ok(())
			}
		}
	}

	#[cfg(test)]
	mod test {
		use super::*;
		use std::io::{Read, Write};

		#[test]
		fn replies_are_released_by_written_lines() {
			let mut mock = Mock::new();
			mock.queue_reply(b"ok\r\n");
			let mut buf = [0u8; 16];
			assert!(mock.read(&mut buf).is_err());

			mock.write_all(b"M50").unwrap();
			assert!(mock.is_empty());
			mock.write_all(b"\r\n").unwrap();
			let n = mock.read(&mut buf).unwrap();
			assert_eq!(&buf[..n], b"ok\r\n");
			assert_eq!(mock.written_lines(), vec!["M50".to_string()]);
		}

		#[test]
		fn chunked_reads() {
			let mut mock = Mock::new();
			mock.chunk_size(Some(2));
			mock.append_data(b"abcde");
			let mut buf = [0u8; 16];
			assert_eq!(mock.read(&mut buf).unwrap(), 2);
			assert_eq!(mock.read(&mut buf).unwrap(), 2);
			assert_eq!(mock.read(&mut buf).unwrap(), 1);
			assert_eq!(&buf[..1], b"e");
		}

		#[test]
		fn unplugged_mock() {
			let mut mock = Mock::new();
			mock.append_data(b"x");
			mock.unplug();
			let mut buf = [0u8; 4];
			// Buffered data is still delivered.
			assert_eq!(mock.read(&mut buf).unwrap(), 1);
			assert_eq!(mock.read(&mut buf).unwrap(), 0);
			let err = mock.write(b"M50\r\n").unwrap_err();
			assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
		}

		#[test]
		fn every_line_ending_is_acknowledged() {
			let mut mock = Mock::new();
			mock.ack_line_endings(Some(b"ok\r\n"));
			mock.queue_reply(b"error:20\r\n");
			mock.write_all(b"M50\r\n").unwrap();
			let mut buf = [0u8; 32];
			let n = mock.read(&mut buf).unwrap();
			assert_eq!(&buf[..n], b"error:20\r\nok\r\n");

			mock.ack_line_endings(None::<&[u8]>);
			mock.write_all(b"M50\n").unwrap();
			assert!(mock.is_empty());
		}

		#[test]
		fn clones_share_state() {
			let mock = Mock::new();
			let mut other = mock.clone();
			other.write_all(b"?\r\n").unwrap();
			assert_eq!(mock.written(), b"?\r\n");
			assert_eq!(mock.name(), other.name());
		}
	}
}
