//! Errors related to a single command exchange.

use crate::{
	command::{Command, Outcome},
	reply::{Fault, Reply},
};
use std::time::Duration;

/// Implement `AsRef<Outcome>` and `From<Error> for Outcome` to give users
/// access to the underlying outcome.
macro_rules! impl_traits_to_access_outcome {
	($name:ident) => {
		impl $name {
			pub(crate) fn new(outcome: Outcome) -> Self {
				$name(Box::new(outcome))
			}
			/// The command that failed.
			pub fn command(&self) -> &Command {
				self.0.command()
			}
		}

		impl AsRef<Outcome> for $name {
			/// Get access to the outcome associated with this error.
			fn as_ref(&self) -> &Outcome {
				&self.0
			}
		}

		impl From<$name> for Outcome {
			/// Take the outcome associated with this error.
			fn from(other: $name) -> Outcome {
				*other.0
			}
		}
	};
}

/// No terminal reply arrived before the deadline.
///
/// The session stays open and usable. Any input still pending when the next
/// command is sent is discarded, so a late reply is never attributed to it.
#[derive(Debug)]
pub struct TimeoutError(Box<Expired>);

#[derive(Debug)]
struct Expired {
	command: Command,
	/// How long the session waited.
	timeout: Duration,
	/// Non-terminal replies received before the deadline.
	observations: Vec<Reply>,
}

impl TimeoutError {
	pub(crate) fn new(command: Command, timeout: Duration, observations: Vec<Reply>) -> Self {
		TimeoutError(Box::new(Expired {
			command,
			timeout,
			observations,
		}))
	}
	/// The command that timed out.
	pub fn command(&self) -> &Command {
		&self.0.command
	}
	/// How long the session waited.
	pub fn timeout(&self) -> Duration {
		self.0.timeout
	}
	/// Non-terminal replies received before the deadline.
	pub fn observations(&self) -> &[Reply] {
		&self.0.observations
	}
}

impl_error_display! {
	TimeoutError,
	self => "no reply to `{}` within {:?}",
	self.0.command,
	self.0.timeout
}

/// The arm replied to a command with an error.
///
/// The terminal reply and everything observed before it are available
/// through the [`Outcome`].
#[derive(Debug)]
pub struct ProtocolError(Box<Outcome>);

impl_traits_to_access_outcome!(ProtocolError);

impl ProtocolError {
	/// The failure reported by the arm.
	pub fn fault(&self) -> Option<&Fault> {
		self.0.reply().fault()
	}
}

impl_error_display! {
	ProtocolError,
	self => "the arm rejected `{}`: {}",
	self.0.command(),
	self.0.reply()
}

/// A status query was acknowledged but no status report could be parsed.
#[derive(Debug)]
pub struct MissingStatusError(Box<Outcome>);

impl_traits_to_access_outcome!(MissingStatusError);

impl_error_display! {
	MissingStatusError,
	self => "`{}` did not produce a status report",
	self.0.command()
}

/// A command was sent while another was in flight.
///
/// Nothing was written to the link.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct BusyError(Box<str>);

impl BusyError {
	pub(crate) fn new(command: &str) -> Self {
		BusyError(command.into())
	}
	/// The command that was rejected.
	pub fn command(&self) -> &str {
		&self.0
	}
}

impl_error_display! {
	BusyError,
	self => "cannot send `{}`: another command is in flight",
	self.0
}

/// A command could not be sent as written.
///
/// Nothing was written to the link.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InvalidCommandError(Box<Invalid>);

#[derive(Debug, PartialEq, Eq, Hash)]
struct Invalid {
	command: String,
	reason: &'static str,
}

impl InvalidCommandError {
	pub(crate) fn new(command: &str, reason: &'static str) -> Self {
		InvalidCommandError(Box::new(Invalid {
			command: command.to_string(),
			reason,
		}))
	}
	/// The rejected command.
	pub fn command(&self) -> &str {
		&self.0.command
	}
	/// Why the command was rejected.
	pub fn reason(&self) -> &str {
		self.0.reason
	}
}

impl_error_display! {
	InvalidCommandError,
	self => "invalid command {:?}: {}",
	self.0.command,
	self.0.reason
}
