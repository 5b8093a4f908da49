//! Monotonic time source for the engine.
//!
//! Every bounded wait in the engine (per-byte read timeout, handshake deadline,
//! keepalive interval and reconnection delay) is measured against a [`Clock`].
//! Targets provide their own implementation on top of a hardware timer; hosted
//! builds can use [`StdClock`] with the `std` feature.

/// A monotonic millisecond clock with a blocking delay.
pub trait Clock {
    /// Milliseconds elapsed since an arbitrary, fixed origin.
    ///
    /// Must never go backwards.
    fn now_ms(&self) -> u64;

    /// Block the caller for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Milliseconds elapsed since `since`, saturating at zero.
    fn elapsed_since(&self, since: u64) -> u64 {
        self.now_ms().saturating_sub(since)
    }
}

/// A [`Clock`] backed by [`std::time::Instant`] and [`std::thread::sleep`].
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Create a clock whose origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}
