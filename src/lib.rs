//! A library for driving WLKATA Mirobot robotic arms over a serial link.
//!
//! The arm speaks a line-based G-code dialect with no request identifiers, so
//! a reply can only be attributed to a command by sending one command at a time.
//! A [`Session`] does exactly that: each call writes one command, collects the
//! status reports and messages the arm prints while it works, and returns once
//! the arm acknowledges or rejects the command. Nothing is sent while a
//! command is in flight, and a failure is never followed by another command
//! automatically.
//!
//! ```rust
//! use mirobot::{command::Pose, Session};
//! # fn wrapper() -> Result<(), mirobot::Error> {
//! let session = Session::open("/dev/ttyUSB0")?;
//! session.home()?;
//! let outcome = session.go_to_cartesian_lin(&Pose::new().x(200.0).z(180.0))?;
//! for reply in outcome.observations() {
//!     println!("{reply}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Sessions are configured with [`OpenOptions`], and any backend implementing
//! [`Backend`](backend::Backend) can be used in place of a serial port.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]

pub mod backend;
pub mod command;
pub mod error;
mod in_flight;
mod port;
pub mod reply;
mod session;

pub use error::Error;
pub use session::{OpenOptions, PwmPair, Session, SessionState};
