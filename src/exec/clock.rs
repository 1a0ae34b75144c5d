use std::time::Duration;

/// Source of the blocking sleeps every wait loop is built from.
/// The sleeps are the only suspension points in a boot.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// Wall-clock sleeping on the calling thread
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
