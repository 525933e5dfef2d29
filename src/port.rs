//! Pairing each command with the reply that resolves it.
//!
//! The wire protocol carries no request identifiers, so a reply can only be
//! attributed to a command by ensuring exactly one command is in flight at a
//! time. [`Port`] owns the link and enforces that: a second caller is turned
//! away with [`BusyError`] rather than queued, and replies are consumed strictly
//! in the order they are received.

mod reader;
#[cfg(test)]
mod test;

use crate::{
	backend::{Backend, UNKNOWN_BACKEND_NAME},
	command::{self, Command, Counter, Outcome},
	error::{BusyError, Error, LinkClosedError, ProtocolError, TimeoutError},
	in_flight::InFlightGuard,
	reply::{Classifier, DeviceStatus, Payload, Reply, ReplyKind},
};
use reader::{is_disconnect, LineReader, ReadError};
use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Mutex, MutexGuard, PoisonError,
	},
	time::{Duration, Instant},
};

/// The placeholder command text used while waiting for the startup banner.
pub(crate) const BANNER: &str = "<startup banner>";

/// Everything guarded by the port's lock.
#[derive(Debug)]
struct Link<B> {
	/// The line reader, or `None` once the port has been closed.
	reader: Option<LineReader<B>>,
	sequence: Counter,
	/// The most recent status report.
	last_status: Option<DeviceStatus>,
	/// Set when a wait ended without a terminal reply, so a late reply may
	/// still be on its way.
	desynchronized: bool,
}

/// The command/response synchronizer.
#[derive(Debug)]
pub(crate) struct Port<B> {
	link: Mutex<Link<B>>,
	in_flight: AtomicBool,
	classifier: Classifier,
	/// Written after every command.
	terminator: Box<str>,
	/// The backend's name, for logging.
	name: String,
}

impl<B: Backend> Port<B> {
	pub(crate) fn new(
		backend: B,
		classifier: Classifier,
		terminator: &str,
		max_line_len: usize,
	) -> Self {
		let name = backend
			.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string());
		Port {
			link: Mutex::new(Link {
				reader: Some(LineReader::new(backend, max_line_len)),
				sequence: Counter::default(),
				last_status: None,
				desynchronized: false,
			}),
			in_flight: AtomicBool::new(false),
			classifier,
			terminator: terminator.into(),
			name,
		}
	}

	fn lock(&self) -> MutexGuard<'_, Link<B>> {
		// Poisoning is ignored. The worst a panic can leave behind is unread
		// input, which is the same state a timeout leaves.
		self.link.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub(crate) fn name(&self) -> &str {
		&self.name
	}

	/// Whether the link is open and has not failed.
	pub(crate) fn is_open(&self) -> bool {
		self.lock()
			.reader
			.as_ref()
			.is_some_and(|reader| !reader.is_closed())
	}

	pub(crate) fn is_in_flight(&self) -> bool {
		self.in_flight.load(Ordering::Acquire)
	}

	pub(crate) fn last_status(&self) -> Option<DeviceStatus> {
		self.lock().last_status.clone()
	}

	/// Release the backend. Returns whether it was still held.
	///
	/// Blocks until any in-flight command resolves.
	pub(crate) fn close(&self) -> bool {
		let mut link = self.lock();
		let was_open = link.reader.take().is_some();
		link.last_status = None;
		if was_open {
			log::info!("{} closed", self.name);
		}
		was_open
	}

	/// Send `text` and wait at most `timeout` for its terminal reply.
	pub(crate) fn execute(&self, text: &str, timeout: Duration) -> Result<Outcome, Error> {
		let text = command::validate(text)?;
		let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
			log::debug!("{} BUSY: {}", self.name, text);
			return Err(BusyError::new(text).into());
		};
		let mut guard = self.lock();
		let link = &mut *guard;
		if !link.reader.as_ref().is_some_and(|reader| !reader.is_closed()) {
			return Err(LinkClosedError::before_write(text).into());
		}
		if link.desynchronized {
			self.discard_stale(link)?;
		}

		let command = Command::new(text, link.sequence.next_sequence());
		self.write(link, &command)?;
		let deadline = command.issued().checked_add(timeout);
		let mut observations = Vec::new();
		loop {
			let (reply, received) = match self.receive(link, deadline) {
				Ok(received) => received,
				Err(ReadError::Timeout) => {
					link.desynchronized = true;
					log::debug!("{} TIMEOUT: {}", self.name, command);
					return Err(TimeoutError::new(command, timeout, observations).into());
				}
				Err(ReadError::Closed) => {
					return Err(LinkClosedError::after_write(command, observations).into());
				}
				Err(ReadError::Io(e)) => {
					link.desynchronized = true;
					return Err(e.into());
				}
			};
			match reply.kind() {
				ReplyKind::Ack => {
					return Ok(Outcome::new(command, reply, observations, received));
				}
				ReplyKind::Error => {
					let outcome = Outcome::new(command, reply, observations, received);
					return Err(ProtocolError::new(outcome).into());
				}
				ReplyKind::Warning => {
					match reply.payload() {
						Payload::Alarm(message) => log::warn!("{} ALARM: {}", self.name, message),
						_ => log::warn!("{} unexpected reset while waiting on `{}`", self.name, command),
					}
					observations.push(reply);
				}
				ReplyKind::Status | ReplyKind::Info => observations.push(reply),
			}
		}
	}

	/// Wait for the banner the arm prints once it has reset, without sending
	/// anything. Returns every reply received, ending with the banner.
	pub(crate) fn await_banner(&self, timeout: Duration) -> Result<Vec<Reply>, Error> {
		let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
			return Err(BusyError::new(BANNER).into());
		};
		let mut guard = self.lock();
		let link = &mut *guard;
		let deadline = Instant::now().checked_add(timeout);
		let mut replies = Vec::new();
		loop {
			match self.receive(link, deadline) {
				Ok((reply, _)) => {
					let done = reply.is_reset() || reply.kind() == ReplyKind::Ack;
					replies.push(reply);
					if done {
						log::info!("{} ready", self.name);
						return Ok(replies);
					}
				}
				Err(ReadError::Timeout) => {
					link.desynchronized = true;
					let command = Command::new(BANNER, 0);
					return Err(TimeoutError::new(command, timeout, replies).into());
				}
				Err(ReadError::Closed) => {
					return Err(LinkClosedError::after_write(Command::new(BANNER, 0), replies).into());
				}
				Err(ReadError::Io(e)) => return Err(e.into()),
			}
		}
	}

	/// Read and classify one line, updating the last known status.
	fn receive(
		&self,
		link: &mut Link<B>,
		deadline: Option<Instant>,
	) -> Result<(Reply, Instant), ReadError> {
		let reader = link.reader.as_mut().ok_or(ReadError::Closed)?;
		let remaining = deadline.map_or(Duration::MAX, |deadline| {
			deadline.saturating_duration_since(Instant::now())
		});
		let line = reader.next_line(remaining)?;
		log::debug!("{} RECV: {}", self.name, line.text);
		let reply = self.classifier.classify(&line.text);
		if let Some(status) = reply.status() {
			link.last_status = Some(status.clone());
		}
		Ok((reply, line.received))
	}

	/// Write the command and its terminator.
	fn write(&self, link: &mut Link<B>, command: &Command) -> Result<(), Error> {
		let Some(reader) = link.reader.as_mut() else {
			return Err(LinkClosedError::before_write(command.text()).into());
		};
		log::debug!("{} TX:   {}", self.name, command);
		let mut bytes = Vec::with_capacity(command.text().len() + self.terminator.len());
		bytes.extend_from_slice(command.text().as_bytes());
		bytes.extend_from_slice(self.terminator.as_bytes());

		let backend = reader.backend_mut();
		let (result, written) = match backend.write_all(&bytes) {
			Ok(()) => (backend.flush(), true),
			Err(e) => (Err(e), false),
		};
		match result {
			Ok(()) => Ok(()),
			Err(e) if is_disconnect(e.kind()) => {
				reader.mark_closed();
				Err(if written {
					LinkClosedError::after_write(command.clone(), Vec::new())
				} else {
					LinkClosedError::write_failed(command)
				}
				.into())
			}
			Err(e) => {
				link.desynchronized = true;
				Err(e.into())
			}
		}
	}

	/// Drop input left over from a command that did not resolve in time.
	fn discard_stale(&self, link: &mut Link<B>) -> Result<(), Error> {
		if let Some(reader) = link.reader.as_mut() {
			for line in reader.discard_pending()? {
				log::warn!("{} discarding stale reply: {}", self.name, line);
			}
		}
		link.desynchronized = false;
		Ok(())
	}
}
