//! The firmware-defined token vocabulary consulted by the [`Classifier`](super::Classifier).

use super::AngleSlot;

/// The tokens a firmware uses to mark acknowledgements, errors, alarms,
/// and resets, and the layout of its status reports.
///
/// The default vocabulary matches Mirobot firmware. Other firmware variants
/// only need a different vocabulary, not different code.
///
/// ## Example
///
/// ```rust
/// # use mirobot::reply::{Classifier, ReplyKind, Vocabulary};
/// let mut vocabulary = Vocabulary::new();
/// vocabulary.ack_tokens(["ok", "done"]);
/// let classifier = Classifier::new(vocabulary);
/// assert_eq!(classifier.classify("done").kind(), ReplyKind::Ack);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
	/// Tokens that end an acknowledgement line.
	ack_tokens: Vec<String>,
	/// Tokens that start an error line.
	error_markers: Vec<String>,
	/// Tokens that start an alarm line.
	alarm_markers: Vec<String>,
	/// Text that appears in the banner printed when the arm resets.
	reset_markers: Vec<String>,
	/// The status report layout.
	status: StatusLayout,
}

fn owned<I, S>(tokens: I) -> Vec<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	tokens
		.into_iter()
		.map(Into::into)
		.filter(|token: &String| !token.is_empty())
		.collect()
}

impl Vocabulary {
	/// Create the Mirobot firmware vocabulary, ready for customization.
	///
	/// Equivalent to [`default`](Vocabulary::default).
	pub fn new() -> Self {
		Vocabulary {
			ack_tokens: owned(["ok"]),
			error_markers: owned(["error"]),
			alarm_markers: owned(["ALARM"]),
			reset_markers: owned(["Using reset pos!"]),
			status: StatusLayout::new(),
		}
	}

	/// Replace the acknowledgement tokens. Empty tokens are ignored.
	pub fn ack_tokens<I, S>(&mut self, tokens: I) -> &mut Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.ack_tokens = owned(tokens);
		self
	}

	/// Replace the error markers. Empty markers are ignored.
	pub fn error_markers<I, S>(&mut self, markers: I) -> &mut Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.error_markers = owned(markers);
		self
	}

	/// Replace the alarm markers. Empty markers are ignored.
	pub fn alarm_markers<I, S>(&mut self, markers: I) -> &mut Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.alarm_markers = owned(markers);
		self
	}

	/// Replace the reset banner markers. Empty markers are ignored.
	pub fn reset_markers<I, S>(&mut self, markers: I) -> &mut Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.reset_markers = owned(markers);
		self
	}

	/// Replace the status report layout.
	pub fn status_layout(&mut self, layout: StatusLayout) -> &mut Self {
		self.status = layout;
		self
	}

	/// The acknowledgement tokens.
	pub fn acks(&self) -> &[String] {
		&self.ack_tokens
	}
	/// The error markers.
	pub fn errors(&self) -> &[String] {
		&self.error_markers
	}
	/// The alarm markers.
	pub fn alarms(&self) -> &[String] {
		&self.alarm_markers
	}
	/// The reset banner markers.
	pub fn resets(&self) -> &[String] {
		&self.reset_markers
	}
	/// The status report layout.
	pub fn layout(&self) -> &StatusLayout {
		&self.status
	}
}

impl Default for Vocabulary {
	fn default() -> Self {
		Vocabulary::new()
	}
}

/// The layout of a status report.
///
/// A report is wrapped in the `open` and `close` delimiters and contains a state
/// word followed by labelled fields in this order: angles, cartesian
/// coordinates, pump PWM, valve PWM, and motion mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLayout {
	pub(crate) open: char,
	pub(crate) close: char,
	pub(crate) angle_label: String,
	pub(crate) cartesian_label: String,
	pub(crate) pump_label: String,
	pub(crate) valve_label: String,
	pub(crate) motion_mode_label: String,
	/// Which joint each of the seven angle values belongs to.
	pub(crate) angle_order: [AngleSlot; 7],
}

impl StatusLayout {
	/// Create the Mirobot firmware layout.
	pub fn new() -> Self {
		StatusLayout {
			open: '<',
			close: '>',
			angle_label: "Angle(ABCDXYZ):".to_string(),
			cartesian_label: "Cartesian coordinate(XYZ RxRyRz):".to_string(),
			pump_label: "Pump PWM:".to_string(),
			valve_label: "Valve PWM:".to_string(),
			motion_mode_label: "Motion_MODE:".to_string(),
			angle_order: AngleSlot::FIRMWARE_ORDER,
		}
	}

	/// Set the characters that wrap a report.
	pub fn delimiters(&mut self, open: char, close: char) -> &mut Self {
		self.open = open;
		self.close = close;
		self
	}
	/// Set the label preceding the angle values.
	pub fn angle_label<S: Into<String>>(&mut self, label: S) -> &mut Self {
		self.angle_label = label.into();
		self
	}
	/// Set the label preceding the cartesian values.
	pub fn cartesian_label<S: Into<String>>(&mut self, label: S) -> &mut Self {
		self.cartesian_label = label.into();
		self
	}
	/// Set the label preceding the pump PWM value.
	pub fn pump_label<S: Into<String>>(&mut self, label: S) -> &mut Self {
		self.pump_label = label.into();
		self
	}
	/// Set the label preceding the valve PWM value.
	pub fn valve_label<S: Into<String>>(&mut self, label: S) -> &mut Self {
		self.valve_label = label.into();
		self
	}
	/// Set the label preceding the motion mode flag.
	pub fn motion_mode_label<S: Into<String>>(&mut self, label: S) -> &mut Self {
		self.motion_mode_label = label.into();
		self
	}
	/// Set which joint each reported angle value belongs to.
	///
	/// The default is [`AngleSlot::FIRMWARE_ORDER`].
	pub fn angle_order(&mut self, order: [AngleSlot; 7]) -> &mut Self {
		self.angle_order = order;
		self
	}
}

impl Default for StatusLayout {
	fn default() -> Self {
		StatusLayout::new()
	}
}
