//! Commands sent to the arm and the outcome of each one.
//!
//! Most commands are G-code. The instructions used by the
//! [`Session`](crate::Session) convenience methods are listed in
//! [`instruction`], and motion arguments are built with [`Joints`] and [`Pose`].

use crate::{
	error::InvalidCommandError,
	reply::{DeviceStatus, Reply, ReplyKind},
};
use std::time::{Duration, Instant};

/// The instructions understood by Mirobot firmware.
pub mod instruction {
	/// Home all axes at once.
	pub const HOME_SIMULTANEOUS: &str = "$H";
	/// Home the axes one at a time.
	pub const HOME_INDIVIDUAL: &str = "$HH";
	/// Release the shaft lock after an alarm.
	pub const UNLOCK_SHAFT: &str = "M50";
	/// Move the joints to absolute angles.
	pub const JOINTS_ABSOLUTE: &str = "M21 G90";
	/// Move the joints by relative angles.
	pub const JOINTS_RELATIVE: &str = "M21 G91";
	/// Point-to-point motion to an absolute pose.
	pub const CARTESIAN_PTP_ABSOLUTE: &str = "M20 G90 G0";
	/// Linear motion to an absolute pose.
	pub const CARTESIAN_LIN_ABSOLUTE: &str = "M20 G90 G1";
	/// Point-to-point motion by a relative pose.
	pub const CARTESIAN_PTP_RELATIVE: &str = "M20 G91 G0";
	/// Linear motion by a relative pose.
	pub const CARTESIAN_LIN_RELATIVE: &str = "M20 G91 G1";
	/// Set the air pump PWM. The value follows immediately.
	pub const AIR_PUMP: &str = "M3S";
	/// Set the valve PWM. The value follows immediately.
	pub const VALVE: &str = "M4E";
	/// Begin calibration.
	pub const START_CALIBRATION: &str = "M40";
	/// End calibration.
	pub const FINISH_CALIBRATION: &str = "M41";
	/// Request a status report.
	pub const STATUS: &str = "?";
	/// The soft limit setting.
	pub const SOFT_LIMIT: &str = "$20";
	/// The hard limit setting.
	pub const HARD_LIMIT: &str = "$21";
}

/// Check that `text` can be sent as a single command.
///
/// Surrounding whitespace is removed. The result must be non-empty and
/// cannot contain line terminators, as those would split it into several commands.
pub(crate) fn validate(text: &str) -> Result<&str, InvalidCommandError> {
	let trimmed = text.trim();
	if trimmed.is_empty() {
		Err(InvalidCommandError::new(text, "commands cannot be empty"))
	} else if trimmed.contains(|c: char| c == '\r' || c == '\n') {
		Err(InvalidCommandError::new(
			text,
			"commands cannot contain line terminators",
		))
	} else {
		Ok(trimmed)
	}
}

/// Whether `text` is a settings assignment of the form `$<number>=<value>`.
///
/// ## Example
///
/// ```rust
/// # use mirobot::command::is_variable_command;
/// assert!(is_variable_command("$21=1"));
/// assert!(is_variable_command("$110=2500.0"));
/// assert!(!is_variable_command("$H"));
/// ```
pub fn is_variable_command(text: &str) -> bool {
	let Some((name, value)) = text.strip_prefix('$').and_then(|rest| rest.split_once('=')) else {
		return false;
	};
	!name.is_empty()
		&& name.bytes().all(|b| b.is_ascii_digit())
		&& !value.is_empty()
		&& value.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Generates command sequence numbers.
#[derive(Debug, Default)]
pub(crate) struct Counter {
	/// The last generated sequence number.
	last: u64,
}

impl Counter {
	pub(crate) fn next_sequence(&mut self) -> u64 {
		self.last = self.last.wrapping_add(1);
		self.last
	}
}

/// A command that has been sent to the arm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
	/// The text that was written, without the terminator.
	text: String,
	/// The sequence number, unique within a session.
	sequence: u64,
	/// When the command was written.
	issued: Instant,
}

impl Command {
	pub(crate) fn new(text: &str, sequence: u64) -> Self {
		Command {
			text: text.to_string(),
			sequence,
			issued: Instant::now(),
		}
	}
	/// The text that was written, without the terminator.
	pub fn text(&self) -> &str {
		&self.text
	}
	/// The sequence number, unique within a session. It is never transmitted.
	pub fn sequence(&self) -> u64 {
		self.sequence
	}
	/// When the command was written.
	pub fn issued(&self) -> Instant {
		self.issued
	}
}

impl std::fmt::Display for Command {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.text)
	}
}

/// The resolution of exactly one [`Command`].
///
/// An outcome is only ever built from the terminal reply that followed its
/// command, together with the non-terminal replies seen in between.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
	command: Command,
	/// The terminal reply.
	reply: Reply,
	/// Non-terminal replies, in the order they were received.
	observations: Vec<Reply>,
	/// When the terminal reply was received.
	resolved: Instant,
}

impl Outcome {
	pub(crate) fn new(
		command: Command,
		reply: Reply,
		observations: Vec<Reply>,
		resolved: Instant,
	) -> Self {
		Outcome {
			command,
			reply,
			observations,
			resolved,
		}
	}
	/// Whether the arm acknowledged the command.
	pub fn is_success(&self) -> bool {
		self.reply.kind() == ReplyKind::Ack
	}
	/// The command this outcome belongs to.
	pub fn command(&self) -> &Command {
		&self.command
	}
	/// The terminal reply.
	pub fn reply(&self) -> &Reply {
		&self.reply
	}
	/// The non-terminal replies received before the terminal one.
	pub fn observations(&self) -> &[Reply] {
		&self.observations
	}
	/// Take the non-terminal replies.
	pub fn into_observations(self) -> Vec<Reply> {
		self.observations
	}
	/// The most recent status report among the observations.
	pub fn status(&self) -> Option<&DeviceStatus> {
		self.observations.iter().rev().find_map(Reply::status)
	}
	/// The time between writing the command and receiving its terminal reply.
	pub fn elapsed(&self) -> Duration {
		self.resolved.saturating_duration_since(self.command.issued)
	}
}

/// Append ` <letter><value>` for every value that is set.
fn push_args(out: &mut String, args: &[(char, Option<f64>)]) {
	use std::fmt::Write as _;
	for (letter, value) in args {
		if let Some(value) = value {
			// Writing to a String cannot fail.
			let _ = write!(out, " {letter}{value}");
		}
	}
}

/// Joint targets for [`JOINTS_ABSOLUTE`](instruction::JOINTS_ABSOLUTE) and
/// [`JOINTS_RELATIVE`](instruction::JOINTS_RELATIVE) moves.
///
/// Joints that are not set are left out of the command, so the arm leaves
/// them where they are (or, for relative moves, does not move them).
///
/// ## Example
///
/// ```rust
/// # use mirobot::command::Joints;
/// let joints = Joints::new().axis_1(10.0).axis_3(-5.5).speed(1500);
/// assert_eq!(joints.format("M21 G90", 2000), "M21 G90 X10 Z-5.5 F1500");
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[must_use]
pub struct Joints {
	axes: [Option<f64>; 6],
	rail: Option<f64>,
	speed: Option<u32>,
}

impl Joints {
	/// Create an empty set of targets.
	pub fn new() -> Self {
		Joints::default()
	}
	/// Target all six joints and the rail at zero.
	pub fn zero() -> Self {
		Joints {
			axes: [Some(0.0); 6],
			rail: Some(0.0),
			speed: None,
		}
	}
	/// Set joint 1.
	pub fn axis_1(mut self, value: f64) -> Self {
		self.axes[0] = Some(value);
		self
	}
	/// Set joint 2.
	pub fn axis_2(mut self, value: f64) -> Self {
		self.axes[1] = Some(value);
		self
	}
	/// Set joint 3.
	pub fn axis_3(mut self, value: f64) -> Self {
		self.axes[2] = Some(value);
		self
	}
	/// Set joint 4.
	pub fn axis_4(mut self, value: f64) -> Self {
		self.axes[3] = Some(value);
		self
	}
	/// Set joint 5.
	pub fn axis_5(mut self, value: f64) -> Self {
		self.axes[4] = Some(value);
		self
	}
	/// Set joint 6.
	pub fn axis_6(mut self, value: f64) -> Self {
		self.axes[5] = Some(value);
		self
	}
	/// Set the rail position.
	pub fn rail(mut self, value: f64) -> Self {
		self.rail = Some(value);
		self
	}
	/// Set the speed. If it is unset or zero the session default is used.
	pub fn speed(mut self, speed: u32) -> Self {
		self.speed = Some(speed);
		self
	}

	/// Format the command for `instruction`.
	pub fn format(&self, instruction: &str, default_speed: u32) -> String {
		let [x, y, z, a, b, c] = self.axes;
		let mut out = instruction.to_string();
		push_args(
			&mut out,
			&[
				('X', x),
				('Y', y),
				('Z', z),
				('A', a),
				('B', b),
				('C', c),
				('D', self.rail),
			],
		);
		push_speed(&mut out, self.speed, default_speed);
		out
	}
}

/// A cartesian target for the `M20` family of moves.
///
/// ## Example
///
/// ```rust
/// # use mirobot::command::Pose;
/// let pose = Pose::new().x(200.0).z(150.0).yaw(90.0);
/// assert_eq!(pose.format("M20 G90 G0", 2000), "M20 G90 G0 X200 Z150 C90 F2000");
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[must_use]
pub struct Pose {
	x: Option<f64>,
	y: Option<f64>,
	z: Option<f64>,
	roll: Option<f64>,
	pitch: Option<f64>,
	yaw: Option<f64>,
	speed: Option<u32>,
}

impl Pose {
	/// Create an empty target.
	pub fn new() -> Self {
		Pose::default()
	}
	/// Set the X position.
	pub fn x(mut self, value: f64) -> Self {
		self.x = Some(value);
		self
	}
	/// Set the Y position.
	pub fn y(mut self, value: f64) -> Self {
		self.y = Some(value);
		self
	}
	/// Set the Z position.
	pub fn z(mut self, value: f64) -> Self {
		self.z = Some(value);
		self
	}
	/// Set the rotation about X.
	pub fn roll(mut self, value: f64) -> Self {
		self.roll = Some(value);
		self
	}
	/// Set the rotation about Y.
	pub fn pitch(mut self, value: f64) -> Self {
		self.pitch = Some(value);
		self
	}
	/// Set the rotation about Z.
	pub fn yaw(mut self, value: f64) -> Self {
		self.yaw = Some(value);
		self
	}
	/// Set the speed. If it is unset or zero the session default is used.
	pub fn speed(mut self, speed: u32) -> Self {
		self.speed = Some(speed);
		self
	}

	/// Format the command for `instruction`.
	pub fn format(&self, instruction: &str, default_speed: u32) -> String {
		let mut out = instruction.to_string();
		push_args(
			&mut out,
			&[
				('X', self.x),
				('Y', self.y),
				('Z', self.z),
				('A', self.roll),
				('B', self.pitch),
				('C', self.yaw),
			],
		);
		push_speed(&mut out, self.speed, default_speed);
		out
	}
}

/// The feed rate is always sent, as the firmware otherwise reports an unknown feed rate.
fn push_speed(out: &mut String, speed: Option<u32>, default_speed: u32) {
	use std::fmt::Write as _;
	let speed = speed.filter(|speed| *speed != 0).unwrap_or(default_speed);
	let _ = write!(out, " F{speed}");
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn validation() {
		assert_eq!(validate("  $H \r\n").unwrap(), "$H");
		assert_eq!(validate("M21 G90 X1").unwrap(), "M21 G90 X1");
		for text in ["", "  ", "\r\n", "M50\r\nM40", "M50\nM40", "M50\rM40"] {
			let err = validate(text).unwrap_err();
			assert_eq!(err.command(), text);
		}
	}

	#[test]
	fn variable_commands() {
		for text in ["$21=1", "$20=0", "$110=2500.0", "$1=.5"] {
			assert!(is_variable_command(text), "{text}");
		}
		for text in ["", "$", "$=1", "$21=", "$21", "21=1", "$a=1", "$21=x", "$21=1 ", "$H"] {
			assert!(!is_variable_command(text), "{text}");
		}
	}

	#[test]
	fn counter_starts_at_one() {
		let mut counter = Counter::default();
		assert_eq!(counter.next_sequence(), 1);
		assert_eq!(counter.next_sequence(), 2);
		let mut counter = Counter { last: u64::MAX };
		assert_eq!(counter.next_sequence(), 0);
	}

	#[test]
	fn joint_formatting() {
		assert_eq!(
			Joints::zero().format(instruction::JOINTS_ABSOLUTE, 2000),
			"M21 G90 X0 Y0 Z0 A0 B0 C0 D0 F2000"
		);
		assert_eq!(
			Joints::new().format(instruction::JOINTS_RELATIVE, 2000),
			"M21 G91 F2000"
		);
		assert_eq!(
			Joints::new()
				.axis_2(1.25)
				.axis_4(-30.0)
				.axis_5(7.0)
				.axis_6(8.0)
				.rail(100.0)
				.speed(0)
				.format(instruction::JOINTS_RELATIVE, 1200),
			"M21 G91 Y1.25 A-30 B7 C8 D100 F1200"
		);
	}

	#[test]
	fn pose_formatting() {
		assert_eq!(
			Pose::new()
				.x(198.7)
				.y(0.0)
				.z(230.7)
				.roll(1.0)
				.pitch(2.0)
				.yaw(3.0)
				.speed(500)
				.format(instruction::CARTESIAN_LIN_ABSOLUTE, 2000),
			"M20 G90 G1 X198.7 Y0 Z230.7 A1 B2 C3 F500"
		);
		assert_eq!(
			Pose::new().z(-10.0).format(instruction::CARTESIAN_PTP_RELATIVE, 2000),
			"M20 G91 G0 Z-10 F2000"
		);
	}
}
