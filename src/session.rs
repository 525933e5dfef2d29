//! The session: the handle through which every command reaches the arm.
//!
//! A [`Session`] owns the link and sends one command at a time. Each call
//! blocks until the arm resolves the command, and returns an [`Outcome`] or
//! an [`Error`]. A second caller on another thread gets a
//! [`BusyError`](crate::error::BusyError) rather than waiting, so the order
//! commands run in is always decided by the caller.
//!
//! ```rust
//! # use mirobot::{command::Joints, Session};
//! # use std::time::Duration;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::open("/dev/ttyUSB0")?;
//! session.home()?;
//! session.go_to_axis(&Joints::new().axis_1(30.0))?;
//! let status = session.wait_until_idle(Duration::from_secs(30))?;
//! println!("joint 1 is at {}", status.angles().axis_1);
//! # Ok(())
//! # }
//! ```

mod options;

pub use options::OpenOptions;

use crate::{
	backend::{Backend, Serial},
	command::{instruction, is_variable_command, Command, Joints, Outcome, Pose},
	error::{Error, InvalidCommandError, MissingStatusError, TimeoutError},
	port::Port,
	reply::DeviceStatus,
};
use std::time::{Duration, Instant};

/// The PWM values that switch a tool on and off.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PwmPair {
	/// The value that switches the tool on.
	pub on: u32,
	/// The value that switches the tool off.
	pub off: u32,
}

impl PwmPair {
	fn get(self, on: bool) -> u32 {
		if on {
			self.on
		} else {
			self.off
		}
	}

	fn contains(self, pwm: u32) -> bool {
		pwm == self.on || pwm == self.off
	}
}

/// Settings consulted by the session's methods.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
	/// The default deadline for a reply.
	pub timeout: Duration,
	/// The deadline for homing and motion.
	pub motion_timeout: Duration,
	pub default_speed: u32,
	pub idle_poll_interval: Duration,
	/// Whether motion and tool commands wait for the arm to be idle.
	pub wait_idle: bool,
	pub pump: PwmPair,
	pub valve: PwmPair,
}

/// A snapshot of a session's state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
	/// Whether the link is open.
	open: bool,
	/// Whether a command is in flight.
	in_flight: bool,
	/// The most recent status report.
	last_status: Option<DeviceStatus>,
}

impl SessionState {
	/// Whether the link is open.
	pub fn is_open(&self) -> bool {
		self.open
	}
	/// Whether a command is in flight.
	pub fn is_in_flight(&self) -> bool {
		self.in_flight
	}
	/// The most recent status report received on this session, if any.
	pub fn last_status(&self) -> Option<&DeviceStatus> {
		self.last_status.as_ref()
	}
}

/// A session with a Mirobot arm.
///
/// All methods take `&self`, so a session can be shared between threads
/// (e.g., with an [`Arc`](std::sync::Arc)). Only one command is ever in
/// flight: while one caller waits, any other gets a
/// [`BusyError`](crate::error::BusyError) without anything being written.
///
/// A failed command is never followed by another one automatically. Once the
/// link closes every command fails with a
/// [`LinkClosedError`](crate::error::LinkClosedError).
#[derive(Debug)]
pub struct Session<B = Serial> {
	port: Port<B>,
	settings: Settings,
}

impl Session<Serial> {
	/// Open a serial port to the arm with the default [`OpenOptions`].
	pub fn open(path: &str) -> Result<Self, Error> {
		OpenOptions::new().open(path)
	}
}

impl<B: Backend> Session<B> {
	pub(crate) fn new(port: Port<B>, settings: Settings) -> Self {
		Session { port, settings }
	}

	/// Close the link and release the backend.
	///
	/// If a command is in flight this waits for it to resolve first. Closing
	/// an already closed session does nothing.
	pub fn close(&self) {
		self.port.close();
	}

	/// Whether the link is open.
	///
	/// This is `false` once the session has been closed or the link has failed.
	pub fn is_open(&self) -> bool {
		self.port.is_open()
	}

	/// Whether a command is currently in flight.
	pub fn is_in_flight(&self) -> bool {
		self.port.is_in_flight()
	}

	/// A snapshot of the session's state.
	pub fn state(&self) -> SessionState {
		SessionState {
			open: self.port.is_open(),
			in_flight: self.port.is_in_flight(),
			last_status: self.port.last_status(),
		}
	}

	/// The most recent status report received on this session, if any.
	///
	/// This is updated whenever a status report is received, whichever
	/// command caused it.
	pub fn last_status(&self) -> Option<DeviceStatus> {
		self.port.last_status()
	}

	/// The name of the underlying backend.
	pub fn name(&self) -> &str {
		self.port.name()
	}

	/// Send a command and wait for the arm to resolve it, using the default
	/// timeout.
	///
	/// Surrounding whitespace is removed before the command is sent. A
	/// command containing a line terminator is rejected.
	pub fn execute(&self, command: &str) -> Result<Outcome, Error> {
		self.port.execute(command, self.settings.timeout)
	}

	/// Send a command and wait at most `timeout` for the arm to resolve it.
	pub fn execute_with_timeout(&self, command: &str, timeout: Duration) -> Result<Outcome, Error> {
		self.port.execute(command, timeout)
	}

	fn motion(&self, command: &str) -> Result<Outcome, Error> {
		let outcome = self.port.execute(command, self.settings.motion_timeout)?;
		self.settle(outcome)
	}

	/// Wait for the arm to be idle after `outcome`, if the session is
	/// configured to.
	fn settle(&self, outcome: Outcome) -> Result<Outcome, Error> {
		if self.settings.wait_idle {
			self.wait_until_idle(self.settings.motion_timeout)?;
		}
		Ok(outcome)
	}

	/// Home all axes simultaneously. (Command: `$H`)
	pub fn home(&self) -> Result<Outcome, Error> {
		self.motion(instruction::HOME_SIMULTANEOUS)
	}

	/// Home the axes one at a time. (Command: `$HH`)
	pub fn home_individual(&self) -> Result<Outcome, Error> {
		self.motion(instruction::HOME_INDIVIDUAL)
	}

	/// Unlock the shaft after an alarm. (Command: `M50`)
	pub fn unlock_shaft(&self) -> Result<Outcome, Error> {
		self.execute(instruction::UNLOCK_SHAFT)
	}

	/// Move the joints to absolute angles. (Command: `M21 G90`)
	pub fn go_to_axis(&self, joints: &Joints) -> Result<Outcome, Error> {
		self.motion(&joints.format(instruction::JOINTS_ABSOLUTE, self.settings.default_speed))
	}

	/// Move the joints by relative angles. (Command: `M21 G91`)
	pub fn increment_axis(&self, joints: &Joints) -> Result<Outcome, Error> {
		self.motion(&joints.format(instruction::JOINTS_RELATIVE, self.settings.default_speed))
	}

	/// Move every joint and the rail to zero.
	pub fn go_to_zero(&self) -> Result<Outcome, Error> {
		self.go_to_axis(&Joints::zero())
	}

	/// Point-to-point motion to an absolute pose. (Command: `M20 G90 G0`)
	pub fn go_to_cartesian_ptp(&self, pose: &Pose) -> Result<Outcome, Error> {
		self.motion(&pose.format(
			instruction::CARTESIAN_PTP_ABSOLUTE,
			self.settings.default_speed,
		))
	}

	/// Linear motion to an absolute pose. (Command: `M20 G90 G1`)
	pub fn go_to_cartesian_lin(&self, pose: &Pose) -> Result<Outcome, Error> {
		self.motion(&pose.format(
			instruction::CARTESIAN_LIN_ABSOLUTE,
			self.settings.default_speed,
		))
	}

	/// Point-to-point motion by a relative pose. (Command: `M20 G91 G0`)
	pub fn increment_cartesian_ptp(&self, pose: &Pose) -> Result<Outcome, Error> {
		self.motion(&pose.format(
			instruction::CARTESIAN_PTP_RELATIVE,
			self.settings.default_speed,
		))
	}

	/// Linear motion by a relative pose. (Command: `M20 G91 G1`)
	pub fn increment_cartesian_lin(&self, pose: &Pose) -> Result<Outcome, Error> {
		self.motion(&pose.format(
			instruction::CARTESIAN_LIN_RELATIVE,
			self.settings.default_speed,
		))
	}

	/// Switch the air pump on or off. (Command: `M3S`)
	pub fn set_air_pump(&self, on: bool) -> Result<Outcome, Error> {
		self.set_air_pump_pwm(self.settings.pump.get(on))
	}

	/// Set the air pump to one of its configured PWM values. (Command: `M3S`)
	pub fn set_air_pump_pwm(&self, pwm: u32) -> Result<Outcome, Error> {
		self.set_tool(instruction::AIR_PUMP, self.settings.pump, pwm)
	}

	/// Open or close the valve. (Command: `M4E`)
	pub fn set_valve(&self, on: bool) -> Result<Outcome, Error> {
		self.set_valve_pwm(self.settings.valve.get(on))
	}

	/// Set the valve to one of its configured PWM values. (Command: `M4E`)
	pub fn set_valve_pwm(&self, pwm: u32) -> Result<Outcome, Error> {
		self.set_tool(instruction::VALVE, self.settings.valve, pwm)
	}

	fn set_tool(&self, instruction: &str, allowed: PwmPair, pwm: u32) -> Result<Outcome, Error> {
		let command = format!("{instruction}{pwm}");
		if !allowed.contains(pwm) {
			return Err(InvalidCommandError::new(
				&command,
				"the PWM value is not one of the configured on/off values",
			)
			.into());
		}
		let outcome = self.execute(&command)?;
		self.settle(outcome)
	}

	/// Begin calibration. (Command: `M40`)
	pub fn start_calibration(&self) -> Result<Outcome, Error> {
		self.execute(instruction::START_CALIBRATION)
	}

	/// End calibration. (Command: `M41`)
	pub fn finish_calibration(&self) -> Result<Outcome, Error> {
		self.execute(instruction::FINISH_CALIBRATION)
	}

	/// Enable or disable the hard limit switches. (Command: `$21`)
	pub fn set_hard_limit(&self, enabled: bool) -> Result<Outcome, Error> {
		self.send_variable(&format!(
			"{}={}",
			instruction::HARD_LIMIT,
			u8::from(enabled)
		))
	}

	/// Enable or disable the soft limits. (Command: `$20`)
	pub fn set_soft_limit(&self, enabled: bool) -> Result<Outcome, Error> {
		self.send_variable(&format!(
			"{}={}",
			instruction::SOFT_LIMIT,
			u8::from(enabled)
		))
	}

	/// Send a settings assignment of the form `$<number>=<value>`.
	///
	/// Anything else is rejected without being sent.
	pub fn send_variable(&self, command: &str) -> Result<Outcome, Error> {
		if !is_variable_command(command.trim()) {
			return Err(InvalidCommandError::new(command, "not a variable command").into());
		}
		self.execute(command)
	}

	/// Restore a saved configuration, one `$<number>=<value>` assignment per line.
	///
	/// Blank lines are ignored. Every line is checked before anything is
	/// sent, and sending stops at the first command that fails.
	pub fn reset_configuration<I, S>(&self, lines: I) -> Result<Vec<Outcome>, Error>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut commands = Vec::new();
		for line in lines {
			let line = line.as_ref().trim();
			if line.is_empty() {
				continue;
			}
			if !is_variable_command(line) {
				return Err(InvalidCommandError::new(line, "not a variable command").into());
			}
			commands.push(line.to_string());
		}
		commands
			.iter()
			.map(|command| self.execute(command))
			.collect()
	}

	/// Request a status report. (Command: `?`)
	pub fn report_status(&self) -> Result<DeviceStatus, Error> {
		let outcome = self.execute(instruction::STATUS)?;
		match outcome.status() {
			Some(status) => Ok(status.clone()),
			None => Err(MissingStatusError::new(outcome).into()),
		}
	}

	/// Poll the arm's status until it is idle, for at most `timeout`.
	///
	/// Each poll waits for its reply no longer than the default timeout or
	/// the time left, whichever is shorter. Returns the idle status report.
	pub fn wait_until_idle(&self, timeout: Duration) -> Result<DeviceStatus, Error> {
		let start = Instant::now();
		loop {
			let remaining = timeout.saturating_sub(start.elapsed());
			let outcome = match self
				.port
				.execute(instruction::STATUS, self.settings.timeout.min(remaining))
			{
				Ok(outcome) => outcome,
				// Report the overall deadline rather than the poll's.
				Err(Error::Timeout(e)) => {
					return Err(TimeoutError::new(
						e.command().clone(),
						timeout,
						e.observations().to_vec(),
					)
					.into());
				}
				Err(e) => return Err(e),
			};
			if let Some(status) = outcome.status() {
				if status.state().is_idle() {
					return Ok(status.clone());
				}
			}
			let remaining = timeout.saturating_sub(start.elapsed());
			if remaining.is_zero() {
				let command: Command = outcome.command().clone();
				return Err(TimeoutError::new(command, timeout, outcome.into_observations()).into());
			}
			std::thread::sleep(self.settings.idle_poll_interval.min(remaining));
		}
	}
}
