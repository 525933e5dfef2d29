//! Options for configuring and opening a session.

use super::{PwmPair, Session, Settings};
use crate::{
	backend::{Backend, Serial},
	error::{Error, LinkUnavailableError},
	port::Port,
	reply::{Classifier, Vocabulary},
};
use serialport as sp;
use std::time::Duration;

/// Options for configuring and opening a [`Session`].
///
/// ## Example
///
/// ```rust
/// # use mirobot::OpenOptions;
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let session = OpenOptions::new()
///     .timeout(Duration::from_secs(2))
///     .default_speed(1500)
///     .open("/dev/ttyUSB0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
	/// The custom baud rate
	baud_rate: u32,
	/// The number of stop bits
	stop_bits: sp::StopBits,
	/// Whether to take an exclusive lock on the serial device
	#[cfg_attr(not(unix), allow(dead_code))]
	exclusive: bool,
	/// How long to wait for the arm's banner after opening, if at all
	startup_banner: Option<Duration>,
	/// Written after every command
	terminator: String,
	/// The tokens used to classify replies
	vocabulary: Vocabulary,
	/// How many bytes may arrive without a line terminator
	max_line_len: usize,
	/// Settings used by the session's methods
	settings: Settings,
}

impl OpenOptions {
	/// The default baud rate of the arm: 115,200.
	pub const DEFAULT_BAUD_RATE: u32 = 115_200;

	/// Create a set of options with the defaults, ready for configuration.
	///
	/// The defaults are a baud rate of 115,200 with one stop bit, a `"\n"`
	/// terminator, a command timeout of 5 seconds (60 seconds for homing and
	/// motion), and a wait of up to 10 seconds for the startup banner.
	///
	/// Equivalent to [`default`](OpenOptions::default).
	pub fn new() -> Self {
		OpenOptions {
			baud_rate: OpenOptions::DEFAULT_BAUD_RATE,
			stop_bits: sp::StopBits::One,
			exclusive: true,
			startup_banner: Some(Duration::from_secs(10)),
			terminator: "\n".to_string(),
			vocabulary: Vocabulary::default(),
			max_line_len: 1024,
			settings: Settings {
				timeout: Duration::from_secs(5),
				motion_timeout: Duration::from_secs(60),
				default_speed: 2000,
				idle_poll_interval: Duration::from_millis(100),
				wait_idle: false,
				pump: PwmPair { on: 1000, off: 0 },
				valve: PwmPair { on: 65, off: 40 },
			},
		}
	}

	/// Set a custom baud rate.
	///
	/// The default is 115,200.
	pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
		self.baud_rate = baud_rate;
		self
	}

	/// Set the number of stop bits.
	///
	/// The default is one.
	pub fn stop_bits(&mut self, stop_bits: sp::StopBits) -> &mut Self {
		self.stop_bits = stop_bits;
		self
	}

	/// Set whether other processes are locked out of the serial device.
	///
	/// The default is `true`. This only has an effect on unix, as serial
	/// ports are always exclusive on windows.
	pub fn exclusive(&mut self, exclusive: bool) -> &mut Self {
		self.exclusive = exclusive;
		self
	}

	/// Set how long to wait for the banner the arm prints after it resets.
	///
	/// Opening a serial port normally resets the arm. If `None`, opening does
	/// not wait. The default is 10 seconds.
	pub fn startup_banner(&mut self, timeout: Option<Duration>) -> &mut Self {
		self.startup_banner = timeout;
		self
	}

	/// Set the default deadline for a command's reply.
	///
	/// The default is 5 seconds.
	pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
		self.settings.timeout = timeout;
		self
	}

	/// Set the deadline for homing and motion commands.
	///
	/// The default is 60 seconds.
	pub fn motion_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.settings.motion_timeout = timeout;
		self
	}

	/// Set the text written after every command.
	///
	/// The default is `"\n"`. The firmware answers every line ending with its
	/// own `ok`, so a terminator such as `"\r\n"` produces two acks per
	/// command and the extra one would resolve the next command.
	pub fn terminator<S: Into<String>>(&mut self, terminator: S) -> &mut Self {
		self.terminator = terminator.into();
		self
	}

	/// Set the token vocabulary used to classify replies.
	///
	/// The default is [`Vocabulary::default`].
	pub fn vocabulary(&mut self, vocabulary: Vocabulary) -> &mut Self {
		self.vocabulary = vocabulary;
		self
	}

	/// Set how many bytes may arrive without a line terminator before they
	/// are treated as a line anyway.
	///
	/// The default is 1024.
	pub fn max_line_len(&mut self, len: usize) -> &mut Self {
		self.max_line_len = len;
		self
	}

	/// Set the speed used by motion commands that don't specify one.
	///
	/// The default is 2000.
	pub fn default_speed(&mut self, speed: u32) -> &mut Self {
		self.settings.default_speed = speed;
		self
	}

	/// Set how often [`Session::wait_until_idle`] polls the arm.
	///
	/// The default is 100 milliseconds.
	pub fn idle_poll_interval(&mut self, interval: Duration) -> &mut Self {
		self.settings.idle_poll_interval = interval;
		self
	}

	/// Set the air pump PWM values.
	///
	/// The default is 1000 for on and 0 for off. Some Mirobot drivers send
	/// `M3S0` to switch the pump on. Pass `PwmPair { on: 0, off: 1000 }` to
	/// match them.
	pub fn pump_pwm(&mut self, pwm: PwmPair) -> &mut Self {
		self.settings.pump = pwm;
		self
	}

	/// Set whether motion, homing and tool commands wait for the arm to be
	/// idle before returning.
	///
	/// The firmware acknowledges a move once it has been queued, not once it
	/// has finished. When enabled, these commands poll the status after the
	/// ack, as [`Session::wait_until_idle`] does, for up to the motion timeout.
	/// The default is `false`.
	pub fn wait_idle(&mut self, wait: bool) -> &mut Self {
		self.settings.wait_idle = wait;
		self
	}

	/// Set the valve PWM values.
	///
	/// The default is 65 for on and 40 for off.
	pub fn valve_pwm(&mut self, pwm: PwmPair) -> &mut Self {
		self.settings.valve = pwm;
		self
	}

	/// Open a [`Serial`] port at the specified path.
	fn open_serial_port(&self, path: &str) -> Result<Serial, Error> {
		// The baud rate passed to `new` may be ignored on some platforms, so
		// set it again with the `baud_rate` method below.
		#[allow(unused_mut)]
		let mut port = sp::new(path, OpenOptions::DEFAULT_BAUD_RATE)
			.data_bits(sp::DataBits::Eight)
			.parity(sp::Parity::None)
			.flow_control(sp::FlowControl::None)
			.stop_bits(self.stop_bits)
			.timeout(self.settings.timeout)
			.baud_rate(self.baud_rate)
			.open_native()
			.map_err(|e| LinkUnavailableError::new(path, e))?;
		#[cfg(unix)]
		port.set_exclusive(self.exclusive)
			.map_err(|e| LinkUnavailableError::new(path, e))?;
		Ok(Serial(port))
	}

	/// Open the serial port at the specified path with the custom options.
	pub fn open(&self, path: &str) -> Result<Session<Serial>, Error> {
		self.open_backend(self.open_serial_port(path)?)
	}

	/// Open the serial port at the specified path with the custom options.
	///
	/// The type of the underlying backend is erased via dynamic dispatch,
	/// which does have runtime overhead. [`OpenOptions::open`] should
	/// generally be used instead, except when the type of the underlying
	/// backend may not be known at compile time.
	pub fn open_dyn(&self, path: &str) -> Result<Session<Box<dyn Backend + Send>>, Error> {
		self.open_backend(Box::new(self.open_serial_port(path)?))
	}

	/// Start a session on an already open backend.
	///
	/// If a startup banner is configured, this waits for it before returning.
	pub fn open_backend<B: Backend>(&self, backend: B) -> Result<Session<B>, Error> {
		let port = Port::new(
			backend,
			Classifier::new(self.vocabulary.clone()),
			&self.terminator,
			self.max_line_len,
		);
		log::info!("{} opened", port.name());
		if let Some(timeout) = self.startup_banner {
			port.await_banner(timeout)?;
		}
		Ok(Session::new(port, self.settings.clone()))
	}
}

impl Default for OpenOptions {
	fn default() -> Self {
		OpenOptions::new()
	}
}
