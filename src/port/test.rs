use super::{Port, BANNER};
use crate::{
	backend::Mock,
	error::*,
	reply::{Classifier, ReplyKind, State},
};
use std::{io, time::Duration};

const WAIT: Duration = Duration::from_millis(500);
const SHORT: Duration = Duration::from_millis(30);

const IDLE: &str = "<Idle,Angle(ABCDXYZ):0.0,0.0,0.0,0.0,0.0,0.0,0.0,Cartesian coordinate(XYZ RxRyRz):198.7,0.0,230.7,0.0,0.0,0.0,Pump PWM:0,Valve PWM:0,Motion_MODE:0>";
const RUNNING: &str = "<Run,Angle(ABCDXYZ):0.0,0.0,0.0,0.0,12.5,0.0,0.0,Cartesian coordinate(XYZ RxRyRz):180.2,40.1,230.7,0.0,0.0,0.0,Pump PWM:0,Valve PWM:0,Motion_MODE:0>";

fn open_mock() -> (Port<Mock>, Mock) {
	let mock = Mock::new();
	let port = Port::new(mock.clone(), Classifier::default(), "\n", 1024);
	(port, mock)
}

/// Block until `count` lines have been written to `mock`.
fn wait_for_lines(mock: &Mock, count: usize) {
	while mock.written_lines().len() < count {
		std::thread::sleep(Duration::from_millis(1));
	}
}

#[test]
fn home_acknowledged_immediately() {
	let (port, mock) = open_mock();
	mock.queue_reply("ok\r\n");
	let outcome = port.execute("$H", WAIT).unwrap();
	assert!(outcome.is_success());
	assert_eq!(outcome.command().text(), "$H");
	assert_eq!(outcome.command().sequence(), 1);
	assert!(outcome.observations().is_empty());
	assert_eq!(mock.written(), b"$H\n");
}

#[test]
fn move_with_status_observation() {
	let (port, mock) = open_mock();
	mock.queue_reply(format!("{RUNNING}\r\nok\r\n"));
	let outcome = port.execute("M21 G90 B12.5 F2000", WAIT).unwrap();
	assert!(outcome.is_success());
	assert_eq!(outcome.observations().len(), 1);
	let status = outcome.status().unwrap();
	assert_eq!(*status.state(), State::Run);
	// The fifth reported angle belongs to joint 1.
	assert_eq!(status.angles().axis_1, 12.5);
	assert_eq!(status.angles().axis_2, 0.0);
	assert_eq!(status.cartesians().x, 180.2);
	assert_eq!(status.cartesians().y, 40.1);
}

#[test]
fn observations_precede_the_ack() {
	let (port, mock) = open_mock();
	mock.queue_reply(format!(
		"Moving\r\n{RUNNING}\r\nALARM: Soft limit\r\n{IDLE}\r\nok\r\n"
	));
	let outcome = port.execute("M20 G90 G0 X200 F2000", WAIT).unwrap();
	assert!(outcome.is_success());
	let kinds: Vec<_> = outcome.observations().iter().map(|r| r.kind()).collect();
	assert_eq!(
		kinds,
		vec![
			ReplyKind::Info,
			ReplyKind::Status,
			ReplyKind::Warning,
			ReplyKind::Status
		]
	);
	// The most recent status wins.
	assert!(outcome.status().unwrap().state().is_idle());
	assert_eq!(outcome.reply().raw(), "ok");
}

#[test]
fn error_as_first_reply() {
	let (port, mock) = open_mock();
	mock.queue_reply("error:22\r\n");
	let err = port.execute("G1 X1", WAIT).unwrap_err();
	let err = ProtocolError::try_from(err).unwrap();
	assert_eq!(err.command().text(), "G1 X1");
	assert_eq!(err.fault().unwrap().code(), Some(22));
	assert!(err.as_ref().observations().is_empty());
	assert!(!port.is_in_flight());
	assert!(port.is_open());
}

#[test]
fn error_after_observations() {
	let (port, mock) = open_mock();
	mock.queue_reply(format!("{IDLE}\r\nerror: Unsupported command\r\n"));
	let err = port.execute("M999", WAIT).unwrap_err();
	assert_eq!(err.observations().len(), 1);
	let outcome: crate::command::Outcome = ProtocolError::try_from(err).unwrap().into();
	assert!(!outcome.is_success());
	assert_eq!(outcome.reply().raw(), "error: Unsupported command");
}

#[test]
fn no_cross_attribution() {
	let (port, mock) = open_mock();
	mock.queue_reply(format!("{RUNNING}\r\nok\r\n"));
	mock.queue_reply("error:1\r\n");
	mock.queue_reply(format!("{IDLE}\r\n{IDLE}\r\nok\r\n"));

	let first = port.execute("M21 G91 X1 F2000", WAIT).unwrap();
	let second = port.execute("M21 G91 X2 F2000", WAIT).unwrap_err();
	let third = port.execute("?", WAIT).unwrap();

	assert_eq!(first.command().text(), "M21 G91 X1 F2000");
	assert_eq!(first.observations().len(), 1);
	assert_eq!(ProtocolError::try_from(second).unwrap().command().text(), "M21 G91 X2 F2000");
	assert_eq!(third.command().text(), "?");
	assert_eq!(third.command().sequence(), 3);
	assert_eq!(third.observations().len(), 2);
	assert_eq!(
		mock.written_lines(),
		vec!["M21 G91 X1 F2000", "M21 G91 X2 F2000", "?"]
	);
}

#[test]
fn one_ack_per_line_ending() {
	let (port, mock) = open_mock();
	mock.ack_line_endings(Some("ok\r\n"));
	mock.queue_reply("ok\r\n");
	mock.queue_reply("error:20\r\n");
	assert!(port.execute("M50", WAIT).unwrap().is_success());
	let err = port.execute("G1 BAD", WAIT).unwrap_err();
	let err = ProtocolError::try_from(err).unwrap();
	assert_eq!(err.command().text(), "G1 BAD");
	assert_eq!(err.fault().unwrap().code(), Some(20));
}

#[test]
fn reply_split_across_reads() {
	let (port, mock) = open_mock();
	mock.chunk_size(Some(5));
	mock.queue_reply(format!("{IDLE}\r\nok\r\n"));
	let outcome = port.execute("?", WAIT).unwrap();
	assert!(outcome.status().is_some());
}

#[test]
fn busy_without_writing() {
	let (port, mock) = open_mock();
	std::thread::scope(|s| {
		let handle = s.spawn(|| port.execute("$H", WAIT));
		wait_for_lines(&mock, 1);
		while !port.is_in_flight() {
			std::thread::yield_now();
		}

		let err = port.execute("M50", WAIT).unwrap_err();
		assert!(err.is_busy(), "{err:?}");
		assert_eq!(BusyError::try_from(err).unwrap().command(), "M50");
		assert_eq!(mock.written_lines(), vec!["$H"]);

		mock.append_data("ok\r\n");
		let outcome = handle.join().unwrap().unwrap();
		assert_eq!(outcome.command().text(), "$H");
	});
	assert!(!port.is_in_flight());
	mock.queue_reply("ok\r\n");
	port.execute("M50", WAIT).unwrap();
}

#[test]
fn timeout_then_success() {
	let (port, mock) = open_mock();
	mock.queue_reply(format!("{RUNNING}\r\n"));
	let err = port.execute("$H", SHORT).unwrap_err();
	assert!(err.is_timeout());
	let err = TimeoutError::try_from(err).unwrap();
	assert_eq!(err.command().text(), "$H");
	assert_eq!(err.timeout(), SHORT);
	assert_eq!(err.observations().len(), 1);
	assert!(!port.is_in_flight());
	assert!(port.is_open());

	mock.queue_reply("ok\r\n");
	let outcome = port.execute("M50", WAIT).unwrap();
	assert!(outcome.is_success());
	assert_eq!(outcome.command().text(), "M50");
}

#[test]
fn late_reply_is_not_attributed_to_next_command() {
	let (port, mock) = open_mock();
	assert!(port.execute("G1 X1", SHORT).unwrap_err().is_timeout());

	// The arm finally answers the command that timed out.
	mock.append_data("error:1\r\n");
	mock.queue_reply("ok\r\n");
	let outcome = port.execute("M50", WAIT).unwrap();
	assert!(outcome.is_success());
	assert!(outcome.observations().is_empty());
}

#[test]
fn link_closed_mid_wait() {
	let (port, mock) = open_mock();
	mock.queue_reply("Moving\r\n");
	std::thread::scope(|s| {
		let handle = s.spawn(|| port.execute("$H", WAIT));
		wait_for_lines(&mock, 1);
		while !mock.is_empty() {
			std::thread::yield_now();
		}
		mock.unplug();
		let err = handle.join().unwrap().unwrap_err();
		assert!(err.is_link_closed(), "{err:?}");
		let err = LinkClosedError::try_from(err).unwrap();
		assert!(err.was_written());
		assert_eq!(err.command(), "$H");
		assert_eq!(err.sequence(), Some(1));
		assert_eq!(err.observations().len(), 1);
	});
	assert!(!port.is_open());

	let err = port.execute("M50", WAIT).unwrap_err();
	let err = LinkClosedError::try_from(err).unwrap();
	assert!(!err.was_written());
	assert_eq!(mock.written_lines(), vec!["$H"]);
}

#[test]
fn closed_port_rejects_commands() {
	let (port, mock) = open_mock();
	assert!(port.close());
	assert!(!port.close());
	assert!(!port.is_open());
	let err = port.execute("M50", WAIT).unwrap_err();
	assert!(err.is_link_closed());
	assert!(mock.written().is_empty());
}

#[test]
fn invalid_commands_are_not_written() {
	let (port, mock) = open_mock();
	for text in ["", "   ", "M50\r\nM40"] {
		let err = port.execute(text, WAIT).unwrap_err();
		assert!(matches!(err, Error::InvalidCommand(_)), "{err:?}");
	}
	assert!(mock.written().is_empty());
	assert!(!port.is_in_flight());

	// Surrounding whitespace is trimmed.
	mock.queue_reply("ok\r\n");
	let outcome = port.execute("  M50 \t", WAIT).unwrap();
	assert_eq!(outcome.command().text(), "M50");
	assert_eq!(mock.written(), b"M50\n");
}

#[test]
fn custom_terminator() {
	let mock = Mock::new();
	let port = Port::new(mock.clone(), Classifier::default(), "\r\n", 1024);
	mock.queue_reply("ok\n");
	port.execute("M50", WAIT).unwrap();
	assert_eq!(mock.written(), b"M50\r\n");
}

#[test]
fn last_status_is_updated_by_any_command() {
	let (port, mock) = open_mock();
	assert!(port.last_status().is_none());
	mock.queue_reply(format!("{RUNNING}\r\nok\r\n"));
	port.execute("$H", WAIT).unwrap();
	assert_eq!(*port.last_status().unwrap().state(), State::Run);

	mock.queue_reply(format!("{IDLE}\r\n"));
	assert!(port.execute("?", SHORT).unwrap_err().is_timeout());
	assert!(port.last_status().unwrap().state().is_idle());

	port.close();
	assert!(port.last_status().is_none());
}

#[test]
fn banner() {
	let (port, mock) = open_mock();
	mock.append_data("\r\nQinnew Robot\r\nUsing reset pos!\r\n");
	let replies = port.await_banner(WAIT).unwrap();
	assert_eq!(replies.len(), 2);
	assert_eq!(replies[0].kind(), ReplyKind::Info);
	assert!(replies[1].is_reset());
	assert!(mock.written().is_empty());
	assert!(!port.is_in_flight());
}

#[test]
fn banner_timeout() {
	let (port, mock) = open_mock();
	mock.append_data("Qinnew Robot\r\n");
	let err = TimeoutError::try_from(port.await_banner(SHORT).unwrap_err()).unwrap();
	assert_eq!(err.command().text(), BANNER);
	assert_eq!(err.observations().len(), 1);

	// Anything left over is discarded before the first command.
	mock.append_data("Using reset pos!\r\n");
	mock.queue_reply("ok\r\n");
	assert!(port.execute("M50", WAIT).unwrap().observations().is_empty());
}

#[test]
fn read_errors_keep_the_link_open() {
	let (port, mock) = open_mock();
	mock.read_error(Some(io::Error::new(io::ErrorKind::Other, "glitch")));
	let err = port.execute("$H", WAIT).unwrap_err();
	assert!(matches!(err, Error::Io(_)), "{err:?}");
	assert!(port.is_open());
	assert!(!port.is_in_flight());

	mock.queue_reply("ok\r\n");
	assert!(port.execute("M50", WAIT).unwrap().is_success());
}

#[test]
fn timeout_setting_errors_are_reported() {
	let (port, mock) = open_mock();
	mock.set_read_timeout_error(Some(io::Error::new(io::ErrorKind::Other, "nope")));
	assert!(matches!(port.execute("?", WAIT), Err(Error::Io(_))));
	mock.queue_reply("ok\r\n");
	port.execute("?", WAIT).unwrap();
}

/// Generate tests for failures injected into the `$inject` method of the mock
/// while a command is being written. `$written` is whether the command counts
/// as written when the failure happens.
macro_rules! make_write_failure_tests {
	($($inject:ident => $written:literal),+ $(,)?) => {
		$(
			paste::paste! {
				#[test]
				fn [<disconnect_on_ $inject>]() {
					let (port, mock) = open_mock();
					mock.$inject(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));
					let err = port.execute("$H", WAIT).unwrap_err();
					assert!(err.is_link_closed(), "{err:?}");
					let err = LinkClosedError::try_from(err).unwrap();
					assert_eq!(err.was_written(), $written);
					assert_eq!(err.sequence(), Some(1));
					assert!(!port.is_open());
					assert!(port.execute("M50", WAIT).unwrap_err().is_link_closed());
				}

				#[test]
				fn [<io_failure_on_ $inject>]() {
					let (port, mock) = open_mock();
					mock.$inject(Some(io::Error::new(io::ErrorKind::Other, "glitch")));
					let err = port.execute("$H", WAIT).unwrap_err();
					assert!(matches!(err, Error::Io(_)), "{err:?}");
					assert!(port.is_open());
					assert!(!port.is_in_flight());

					mock.queue_reply("ok\r\n");
					assert!(port.execute("M50", WAIT).unwrap().is_success());
				}
			}
		)+
	};
}

make_write_failure_tests!(write_error => false, flush_error => true);
