//! Errors related to the link itself.

use crate::{command::Command, reply::Reply};

/// The link to the arm could not be opened.
#[derive(Debug)]
pub struct LinkUnavailableError(Box<Unavailable>);

#[derive(Debug)]
struct Unavailable {
	/// The path that was opened.
	path: String,
	/// Why the link could not be opened.
	description: String,
	/// Whether the device is missing or owned by another process.
	no_device: bool,
}

impl LinkUnavailableError {
	pub(crate) fn new(path: &str, error: serialport::Error) -> Self {
		let no_device = error.kind() == serialport::ErrorKind::NoDevice;
		LinkUnavailableError(Box::new(Unavailable {
			path: path.to_string(),
			description: error.description,
			no_device,
		}))
	}
	/// The path that could not be opened.
	pub fn path(&self) -> &str {
		&self.0.path
	}
	/// The reason given by the operating system.
	pub fn description(&self) -> &str {
		&self.0.description
	}
	/// Whether the device is either disconnected or already in use by
	/// another process.
	pub fn is_no_device(&self) -> bool {
		self.0.no_device
	}
}

impl_error_display! {
	LinkUnavailableError,
	self => "cannot open {}{}: {}",
	self.0.path,
	if self.0.no_device { " (disconnected or in use by another process)" } else { "" },
	self.0.description
}

/// The link closed, either because the arm disconnected or because the
/// session was closed.
///
/// Once a link has closed every further command fails with this error
/// without anything being written.
#[derive(Debug)]
pub struct LinkClosedError(Box<Closed>);

#[derive(Debug)]
struct Closed {
	/// The command that was being sent.
	command: String,
	/// The command's sequence number, if it was assigned one.
	sequence: Option<u64>,
	/// Whether the command was written in full.
	written: bool,
	/// Non-terminal replies received before the link closed.
	observations: Vec<Reply>,
}

impl LinkClosedError {
	/// The link was already closed, so `command` was never written.
	pub(crate) fn before_write(command: &str) -> Self {
		LinkClosedError(Box::new(Closed {
			command: command.to_string(),
			sequence: None,
			written: false,
			observations: Vec::new(),
		}))
	}
	/// The link closed while `command` was being written.
	pub(crate) fn write_failed(command: &Command) -> Self {
		LinkClosedError(Box::new(Closed {
			command: command.text().to_string(),
			sequence: Some(command.sequence()),
			written: false,
			observations: Vec::new(),
		}))
	}
	/// The link closed after `command` was written.
	pub(crate) fn after_write(command: Command, observations: Vec<Reply>) -> Self {
		LinkClosedError(Box::new(Closed {
			sequence: Some(command.sequence()),
			command: command.text().to_string(),
			written: true,
			observations,
		}))
	}
	/// The command that was being sent.
	pub fn command(&self) -> &str {
		&self.0.command
	}
	/// The command's sequence number, if it got as far as being assigned one.
	pub fn sequence(&self) -> Option<u64> {
		self.0.sequence
	}
	/// Whether the command was written before the link closed.
	pub fn was_written(&self) -> bool {
		self.0.written
	}
	/// Non-terminal replies received before the link closed.
	pub fn observations(&self) -> &[Reply] {
		&self.0.observations
	}
}

impl_error_display! {
	LinkClosedError,
	self => "the link is closed{} `{}`",
	if self.was_written() { ", no reply was received for" } else { ", could not send" },
	self.0.command
}
