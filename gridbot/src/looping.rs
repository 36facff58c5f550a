//! Host loop that drives an [`Engine`] between suspension points.

use std::time::Duration;

use tracing::trace;

use crate::engine::{Engine, Tick};
use crate::observer::RunObserver;

/// Poll `engine` until it needs a resume, finishes, or has nothing to run.
///
/// Every [`Tick::Delay`] is handed to `wait`; pass `std::thread::sleep` for
/// real-time playback or a no-op to run as fast as possible.
pub fn drive<F: FnMut(Duration)>(
    engine: &mut Engine,
    observer: &mut dyn RunObserver,
    mut wait: F,
) -> Tick {
    loop {
        match engine.poll(observer) {
            Tick::Delay(delay) => {
                trace!(?delay, "waiting before next instruction");
                wait(delay);
            }
            tick => return tick,
        }
    }
}
