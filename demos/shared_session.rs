//! Demo: share a single session between threads.
use mirobot::{OpenOptions, Session};
use simple_logger::SimpleLogger;
use std::{sync::Arc, time::Duration};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    let session: Arc<Session> = Arc::new(
        OpenOptions::new()
            .motion_timeout(Duration::from_secs(90))
            .open("/dev/ttyUSB0")?,
    );

    // Home from a worker thread while the main thread keeps polling.
    let worker = {
        let session = Arc::clone(&session);
        std::thread::spawn(move || session.home())
    };

    while !worker.is_finished() {
        match session.report_status() {
            Ok(status) => println!("{}", status.state()),
            // Only one command may be in flight, so polling is turned away
            // until homing completes.
            Err(e) if e.is_busy() => {}
            Err(e) => return Err(e.into()),
        }
        std::thread::sleep(Duration::from_millis(250));
    }
    worker.join().unwrap()?;

    if let Some(status) = session.last_status() {
        println!("homed: joint 1 at {}", status.angles().axis_1);
    }
    session.close();
    Ok(())
}
