//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! Most APIs can fail in more than one way and so return the [`Error`] enum.
//! The error types are convertible to [`Error`], allowing them to be used
//! with `?`, and [`Error`] can be converted back with [`TryFrom`]:
//!
//! ```
//! use mirobot::error::{Error, TimeoutError};
//!
//! fn foo() -> Result<(), Error> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! # fn wrapper() {
//! if let Err(e) = foo() {
//!     match TimeoutError::try_from(e) {
//!         Ok(timeout) => println!("gave up waiting for {}", timeout.command()),
//!         Err(other) => println!("{other}"),
//!     }
//! }
//! # }
//! ```
//!
//! For errors raised after the arm replied, use [`AsRef`] and
//! [`From`]/[`Into`] to retrieve the [`Outcome`](crate::command::Outcome).

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
	(
		$name:path,
		$self:ident =>
		$display:literal
		$(,
			$($arg:expr),+
		)?
	) => {
		impl std::error::Error for $name {}

		impl std::fmt::Display for $name {
			fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				write!(
					f,
					$display
					$(,
						$($arg),+
					)?
				)
			}
		}
	};
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and its underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
///
/// ```compile_fail
/// # // This fails to compile because the macro is not exported.
/// error_enum!{
///     // This defines the enum and From/TryFrom between ThisError and A and B.
///     #[non_exhaustive]
///     pub enum ThisError {
///         VariantA(A),
///         VariantB(B),
///         // ...
///     }
/// }
/// ```
macro_rules! error_enum {
	(
		$(#[$attr:meta])*
		pub enum $name:ident {
			$(
				$(#[$variant_attr:meta])*
				$variant:ident($inner:path)
			),+
			$(,)?
		}
	) => {
		$(
			#[$attr]
		)*
		pub enum $name {
			$(
				$(#[$variant_attr])*
				$variant($inner)
			),+
		}

		impl std::error::Error for $name {}

		// Defer the display to the inner error type
		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				match self {
					$(
						$name::$variant(e) => e.fmt(f)
					),+
				}
			}
		}

		// Allow the enum to be convertible from an infallible error
		impl From<std::convert::Infallible> for $name {
			fn from(_: std::convert::Infallible) -> Self {
				unreachable!();
			}
		}

		// Conversions with underlying errors
		$(
			impl From<$inner> for $name {
				fn from(other: $inner) -> Self {
					$name::$variant(other)
				}
			}

			impl TryFrom<$name> for $inner {
				type Error = $name;
				fn try_from(other: $name) -> Result<Self, Self::Error> {
					match other {
						$name::$variant(value) => Ok(value),
						value => Err(value)
					}
				}
			}
		)+
	};
}

mod exchange;
mod link;

pub use exchange::*;
pub use link::*;

use crate::{command::Outcome, reply::Reply};

error_enum! {
	/// Any error returned by a [`Session`](crate::Session).
	#[derive(Debug)]
	#[non_exhaustive]
	pub enum Error {
		/// The link could not be opened.
		LinkUnavailable(LinkUnavailableError),
		/// The link closed or was closed.
		LinkClosed(LinkClosedError),
		/// No terminal reply arrived in time.
		Timeout(TimeoutError),
		/// The arm reported that the command failed.
		Protocol(ProtocolError),
		/// Another command was in flight.
		Busy(BusyError),
		/// The command could not be sent as written.
		InvalidCommand(InvalidCommandError),
		/// A status query did not produce a status report.
		MissingStatus(MissingStatusError),
		/// Any other I/O failure on the link.
		Io(std::io::Error),
	}
}

impl Error {
	/// A convenience function for determining if the error is due to a
	/// command timing out.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// Whether the link is closed, either because it failed or because the
	/// session was closed.
	pub fn is_link_closed(&self) -> bool {
		matches!(self, Error::LinkClosed(_))
	}

	/// Whether the command was rejected because another one was in flight.
	pub fn is_busy(&self) -> bool {
		matches!(self, Error::Busy(_))
	}

	/// The outcome of the command, if the error was raised after the arm
	/// resolved it.
	pub fn outcome(&self) -> Option<&Outcome> {
		match self {
			Error::Protocol(e) => Some(e.as_ref()),
			Error::MissingStatus(e) => Some(e.as_ref()),
			_ => None,
		}
	}

	/// The non-terminal replies received before the error, if any.
	pub fn observations(&self) -> &[Reply] {
		match self {
			Error::LinkClosed(e) => e.observations(),
			Error::Timeout(e) => e.observations(),
			Error::Protocol(e) => e.as_ref().observations(),
			Error::MissingStatus(e) => e.as_ref().observations(),
			_ => &[],
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use static_assertions::{assert_impl_all, const_assert};

	const WORD_SIZE: usize = std::mem::size_of::<usize>();

	// Every variant boxes its contents, so the enum stays small.
	const_assert!(std::mem::size_of::<Error>() <= 3 * WORD_SIZE);
	const_assert!(std::mem::size_of::<Result<(), Error>>() <= 3 * WORD_SIZE);

	assert_impl_all!(Error: std::error::Error, Send, Sync, From<TimeoutError>, From<BusyError>, From<std::io::Error>);
	assert_impl_all!(LinkUnavailableError: std::error::Error, Send, Sync, TryFrom<Error>);
	assert_impl_all!(LinkClosedError: std::error::Error, Send, Sync, TryFrom<Error>);
	assert_impl_all!(TimeoutError: std::error::Error, Send, Sync, TryFrom<Error>);
	assert_impl_all!(ProtocolError: std::error::Error, Send, Sync, TryFrom<Error>, AsRef<Outcome>);
	assert_impl_all!(BusyError: std::error::Error, Send, Sync, TryFrom<Error>);
	assert_impl_all!(InvalidCommandError: std::error::Error, Send, Sync, TryFrom<Error>);
	assert_impl_all!(MissingStatusError: std::error::Error, Send, Sync, TryFrom<Error>, AsRef<Outcome>);
	assert_impl_all!(Outcome: From<ProtocolError>, From<MissingStatusError>);

	#[test]
	fn classification_helpers() {
		let err: Error = BusyError::new("M50").into();
		assert!(err.is_busy());
		assert!(!err.is_timeout());
		assert!(err.outcome().is_none());
		assert!(err.observations().is_empty());
		assert_eq!(
			err.to_string(),
			"cannot send `M50`: another command is in flight"
		);

		let err: Error = LinkClosedError::before_write("M50").into();
		assert!(err.is_link_closed());
		let err = LinkClosedError::try_from(err).unwrap();
		assert!(!err.was_written());
		assert_eq!(err.sequence(), None);
	}
}
