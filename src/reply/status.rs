//! Structured status reports.

use super::StatusLayout;

/// The operating state reported in a status report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum State {
	/// The arm is not executing anything.
	Idle,
	/// The arm is executing motion.
	Run,
	/// The arm is homing.
	Home,
	/// Motion is paused.
	Hold,
	/// The arm is in an alarm state and must be homed or unlocked.
	Alarm,
	/// Any other state word.
	Other(String),
}

impl State {
	fn parse(word: &str) -> Self {
		match word {
			"Idle" => State::Idle,
			"Run" => State::Run,
			"Home" => State::Home,
			"Hold" => State::Hold,
			"Alarm" => State::Alarm,
			other => State::Other(other.to_string()),
		}
	}

	/// Whether the arm is idle.
	pub fn is_idle(&self) -> bool {
		*self == State::Idle
	}

	/// The state as it appears on the wire.
	pub fn as_str(&self) -> &str {
		match self {
			State::Idle => "Idle",
			State::Run => "Run",
			State::Home => "Home",
			State::Hold => "Hold",
			State::Alarm => "Alarm",
			State::Other(word) => word,
		}
	}
}

impl std::fmt::Display for State {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A joint of the arm, used to map reported angle values onto [`Angles`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AngleSlot {
	/// Joint 1 (the base).
	Axis1,
	/// Joint 2.
	Axis2,
	/// Joint 3.
	Axis3,
	/// Joint 4.
	Axis4,
	/// Joint 5.
	Axis5,
	/// Joint 6 (the wrist).
	Axis6,
	/// The linear rail, if one is fitted.
	Rail,
}

impl AngleSlot {
	/// The order in which Mirobot firmware lists the angle values.
	///
	/// The firmware labels the field `Angle(ABCDXYZ)` but the first three
	/// values belong to joints 4 to 6, followed by the rail and then joints 1 to 3.
	pub const FIRMWARE_ORDER: [AngleSlot; 7] = [
		AngleSlot::Axis4,
		AngleSlot::Axis5,
		AngleSlot::Axis6,
		AngleSlot::Rail,
		AngleSlot::Axis1,
		AngleSlot::Axis2,
		AngleSlot::Axis3,
	];
}

/// Joint angles in degrees (the rail in millimetres).
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Angles {
	/// Joint 1.
	pub axis_1: f64,
	/// Joint 2.
	pub axis_2: f64,
	/// Joint 3.
	pub axis_3: f64,
	/// Joint 4.
	pub axis_4: f64,
	/// Joint 5.
	pub axis_5: f64,
	/// Joint 6.
	pub axis_6: f64,
	/// The linear rail.
	pub rail: f64,
}

impl Angles {
	/// Get the value for a joint.
	pub fn get(&self, slot: AngleSlot) -> f64 {
		match slot {
			AngleSlot::Axis1 => self.axis_1,
			AngleSlot::Axis2 => self.axis_2,
			AngleSlot::Axis3 => self.axis_3,
			AngleSlot::Axis4 => self.axis_4,
			AngleSlot::Axis5 => self.axis_5,
			AngleSlot::Axis6 => self.axis_6,
			AngleSlot::Rail => self.rail,
		}
	}

	fn slot_mut(&mut self, slot: AngleSlot) -> &mut f64 {
		match slot {
			AngleSlot::Axis1 => &mut self.axis_1,
			AngleSlot::Axis2 => &mut self.axis_2,
			AngleSlot::Axis3 => &mut self.axis_3,
			AngleSlot::Axis4 => &mut self.axis_4,
			AngleSlot::Axis5 => &mut self.axis_5,
			AngleSlot::Axis6 => &mut self.axis_6,
			AngleSlot::Rail => &mut self.rail,
		}
	}
}

/// The end effector pose: position in millimetres, orientation in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Cartesians {
	/// Position along X.
	pub x: f64,
	/// Position along Y.
	pub y: f64,
	/// Position along Z.
	pub z: f64,
	/// Rotation about X.
	pub roll: f64,
	/// Rotation about Y.
	pub pitch: f64,
	/// Rotation about Z.
	pub yaw: f64,
}

/// A parsed status report.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
	/// The operating state.
	state: State,
	/// The joint angles.
	angles: Angles,
	/// The end effector pose.
	cartesians: Cartesians,
	/// The air pump PWM value.
	pump_pwm: u32,
	/// The valve PWM value.
	valve_pwm: u32,
	/// Whether the motion mode flag is set.
	motion_mode: bool,
}

impl DeviceStatus {
	/// The operating state.
	pub fn state(&self) -> &State {
		&self.state
	}
	/// The joint angles.
	pub fn angles(&self) -> &Angles {
		&self.angles
	}
	/// The end effector pose.
	pub fn cartesians(&self) -> &Cartesians {
		&self.cartesians
	}
	/// The air pump PWM value.
	pub fn pump_pwm(&self) -> u32 {
		self.pump_pwm
	}
	/// The valve PWM value.
	pub fn valve_pwm(&self) -> u32 {
		self.valve_pwm
	}
	/// Whether the motion mode flag is set.
	pub fn motion_mode(&self) -> bool {
		self.motion_mode
	}

	/// Parse a status report laid out as described by `layout`.
	///
	/// Returns `None` if the text does not match the layout exactly.
	pub(crate) fn parse(text: &str, layout: &StatusLayout) -> Option<Self> {
		let body = text
			.strip_prefix(layout.open)?
			.strip_suffix(layout.close)?;
		let (state, rest) = body.split_once(',')?;
		let (angle_text, rest) =
			take_field(rest, &layout.angle_label, Some(&layout.cartesian_label))?;
		let (cartesian_text, rest) =
			take_field(rest, &layout.cartesian_label, Some(&layout.pump_label))?;
		let (pump, rest) = take_field(rest, &layout.pump_label, Some(&layout.valve_label))?;
		let (valve, rest) = take_field(
			rest,
			&layout.valve_label,
			Some(&layout.motion_mode_label),
		)?;
		let (motion_mode, _) = take_field(rest, &layout.motion_mode_label, None)?;

		let mut angles = Angles::default();
		let values: [f64; 7] = parse_values(angle_text)?;
		for (slot, value) in layout.angle_order.iter().zip(values) {
			*angles.slot_mut(*slot) = value;
		}
		let [x, y, z, roll, pitch, yaw] = parse_values(cartesian_text)?;

		Some(DeviceStatus {
			state: State::parse(state.trim()),
			angles,
			cartesians: Cartesians {
				x,
				y,
				z,
				roll,
				pitch,
				yaw,
			},
			pump_pwm: pump.parse().ok()?,
			valve_pwm: valve.parse().ok()?,
			motion_mode: motion_mode.parse::<u32>().ok()? != 0,
		})
	}
}

/// Split `text` into the value following `label` and the remainder starting at
/// the `next` label.
fn take_field<'a>(text: &'a str, label: &str, next: Option<&str>) -> Option<(&'a str, &'a str)> {
	let text = text.trim_start().strip_prefix(label)?;
	match next {
		Some(next) => {
			let end = text.find(next)?;
			let value = text[..end].trim().trim_end_matches(',').trim_end();
			Some((value, &text[end..]))
		}
		None => Some((text.trim(), "")),
	}
}

/// Parse exactly `N` comma separated numbers.
fn parse_values<const N: usize>(text: &str) -> Option<[f64; N]> {
	let mut values = [0.0; N];
	let mut parts = text.split(',');
	for value in &mut values {
		*value = parts.next()?.trim().parse().ok()?;
	}
	parts.next().is_none().then_some(values)
}
