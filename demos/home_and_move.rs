//! Demo: home the arm and perform a few moves.
use mirobot::{
    command::{Joints, Pose},
    OpenOptions,
};
use simple_logger::SimpleLogger;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    // Opening the port resets the arm, so this waits for its banner first.
    // Each move then returns once the arm is idle again, not when it is queued.
    let session = OpenOptions::new().wait_idle(true).open("/dev/ttyUSB0")?;
    session.home()?;

    // Rotate the base, then report where the tool ended up.
    session.go_to_axis(&Joints::new().axis_1(45.0).speed(1500))?;
    let status = session.wait_until_idle(Duration::from_secs(30))?;
    println!(
        "tool at x={} y={} z={}",
        status.cartesians().x,
        status.cartesians().y,
        status.cartesians().z
    );

    // Pick something up with the suction cup.
    session.go_to_cartesian_lin(&Pose::new().x(200.0).y(0.0).z(120.0))?;
    session.set_air_pump(true)?;
    session.increment_cartesian_lin(&Pose::new().z(50.0))?;
    session.set_air_pump(false)?;
    session.go_to_zero()?;
    Ok(())
}
