//! Replies received from the arm and their classification.
//!
//! Every line the arm prints is turned into a [`Reply`] by a [`Classifier`].
//! Classification is total: a line that matches nothing in the
//! [`Vocabulary`] still becomes an [`Info`](ReplyKind::Info) reply with its raw
//! text intact.
//!
//! ```rust
//! # use mirobot::reply::{Classifier, ReplyKind};
//! let classifier = Classifier::default();
//! let reply = classifier.classify("error:22");
//! assert_eq!(reply.kind(), ReplyKind::Error);
//! assert_eq!(reply.fault().and_then(|fault| fault.code()), Some(22));
//! ```

mod status;
mod vocabulary;

pub use status::{AngleSlot, Angles, Cartesians, DeviceStatus, State};
pub use vocabulary::{StatusLayout, Vocabulary};

/// The kind of a [`Reply`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReplyKind {
	/// The in-flight command completed successfully.
	Ack,
	/// A structured status report.
	Status,
	/// Anything without a more specific meaning.
	Info,
	/// An alarm or unexpected reset.
	Warning,
	/// The in-flight command failed.
	Error,
}

impl ReplyKind {
	/// Whether a reply of this kind resolves the in-flight command.
	pub fn is_terminal(self) -> bool {
		matches!(self, ReplyKind::Ack | ReplyKind::Error)
	}
}

impl std::fmt::Display for ReplyKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			ReplyKind::Ack => "ack",
			ReplyKind::Status => "status",
			ReplyKind::Info => "info",
			ReplyKind::Warning => "warning",
			ReplyKind::Error => "error",
		};
		f.write_str(name)
	}
}

/// A failure reported by the arm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fault {
	/// The numeric error code, if the arm sent one.
	code: Option<u32>,
	/// The text following the marker and code.
	message: String,
}

impl Fault {
	/// The numeric error code, if the arm sent one.
	pub fn code(&self) -> Option<u32> {
		self.code
	}
	/// The text following the error marker and code. It may be empty.
	pub fn message(&self) -> &str {
		&self.message
	}
}

/// The structured content of a [`Reply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	/// The reply carries no structured content.
	None,
	/// A parsed status report.
	Status(DeviceStatus),
	/// The details of an error reply.
	Fault(Fault),
	/// The message of an alarm.
	Alarm(String),
	/// The arm printed its reset banner.
	Reset,
}

/// One classified line of output from the arm.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
	kind: ReplyKind,
	payload: Payload,
	/// The line as received, without its terminator.
	raw: String,
}

impl Reply {
	/// The kind of reply.
	pub fn kind(&self) -> ReplyKind {
		self.kind
	}
	/// The structured content, if any.
	pub fn payload(&self) -> &Payload {
		&self.payload
	}
	/// The line as it was received.
	pub fn raw(&self) -> &str {
		&self.raw
	}
	/// Whether the reply resolves the in-flight command.
	pub fn is_terminal(&self) -> bool {
		self.kind.is_terminal()
	}
	/// The status report, if this is a status reply.
	pub fn status(&self) -> Option<&DeviceStatus> {
		match &self.payload {
			Payload::Status(status) => Some(status),
			_ => None,
		}
	}
	/// The failure details, if this is an error reply.
	pub fn fault(&self) -> Option<&Fault> {
		match &self.payload {
			Payload::Fault(fault) => Some(fault),
			_ => None,
		}
	}
	/// Whether this is the banner the arm prints when it resets.
	pub fn is_reset(&self) -> bool {
		self.payload == Payload::Reset
	}
}

impl std::fmt::Display for Reply {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.raw)
	}
}

/// Turns lines of text into [`Reply`]s using a [`Vocabulary`].
///
/// Rules are tried in order and the first match wins:
///  1. a line starting with an error marker is an [`Error`](ReplyKind::Error),
///  2. a line ending with an ack token is an [`Ack`](ReplyKind::Ack),
///  3. a line starting with an alarm marker is a [`Warning`](ReplyKind::Warning),
///  4. a line containing a reset marker is a [`Warning`](ReplyKind::Warning),
///  5. a line wrapped in the status delimiters that parses is a [`Status`](ReplyKind::Status),
///  6. anything else is [`Info`](ReplyKind::Info).
///
/// Markers and tokens match without regard to ASCII case, and must not be
/// directly joined to other letters or digits, so `look` is not an ack.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
	vocabulary: Vocabulary,
}

impl Classifier {
	/// Create a classifier for the given vocabulary.
	pub fn new(vocabulary: Vocabulary) -> Self {
		Classifier { vocabulary }
	}

	/// The vocabulary being used.
	pub fn vocabulary(&self) -> &Vocabulary {
		&self.vocabulary
	}

	/// Classify a single line.
	pub fn classify(&self, line: &str) -> Reply {
		let text = line.trim();
		let vocabulary = &self.vocabulary;
		let (kind, payload) = if let Some(rest) = first_prefix(text, vocabulary.errors()) {
			(ReplyKind::Error, Payload::Fault(parse_fault(rest)))
		} else if vocabulary.acks().iter().any(|token| has_suffix(text, token)) {
			(ReplyKind::Ack, Payload::None)
		} else if let Some(rest) = first_prefix(text, vocabulary.alarms()) {
			(ReplyKind::Warning, Payload::Alarm(strip_separator(rest).to_string()))
		} else if vocabulary
			.resets()
			.iter()
			.any(|marker| contains(text, marker))
		{
			(ReplyKind::Warning, Payload::Reset)
		} else if let Some(status) = DeviceStatus::parse(text, vocabulary.layout()) {
			(ReplyKind::Status, Payload::Status(status))
		} else {
			(ReplyKind::Info, Payload::None)
		};
		Reply {
			kind,
			payload,
			raw: line.to_string(),
		}
	}
}

/// Whether `c` would make a marker part of a larger word.
fn is_word_char(c: char) -> bool {
	c.is_alphanumeric() || c == '_'
}

/// Find the first marker `text` starts with and return the text after it.
fn first_prefix<'a>(text: &'a str, markers: &[String]) -> Option<&'a str> {
	markers.iter().find_map(|marker| {
		let head = text.get(..marker.len())?;
		if !head.eq_ignore_ascii_case(marker) {
			return None;
		}
		let rest = &text[marker.len()..];
		match rest.chars().next() {
			Some(c) if is_word_char(c) => None,
			_ => Some(rest),
		}
	})
}

fn has_suffix(text: &str, token: &str) -> bool {
	let Some(split) = text.len().checked_sub(token.len()) else {
		return false;
	};
	let (Some(head), Some(tail)) = (text.get(..split), text.get(split..)) else {
		return false;
	};
	tail.eq_ignore_ascii_case(token) && !head.chars().next_back().is_some_and(is_word_char)
}

fn contains(text: &str, marker: &str) -> bool {
	text.to_ascii_lowercase()
		.contains(&marker.to_ascii_lowercase())
}

/// Drop the `:` and whitespace separating a marker from its message.
fn strip_separator(text: &str) -> &str {
	text.trim_start_matches(|c: char| c == ':' || c.is_whitespace())
		.trim_end()
}

fn parse_fault(rest: &str) -> Fault {
	let rest = strip_separator(rest);
	let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
	match rest[..digits].parse() {
		Ok(code) => Fault {
			code: Some(code),
			message: strip_separator(&rest[digits..]).to_string(),
		},
		Err(_) => Fault {
			code: None,
			message: rest.to_string(),
		},
	}
}
