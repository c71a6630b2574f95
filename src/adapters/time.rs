//! System clock adapter.
//!
//! - **`target_os = "espidf"`**: monotonic time from `esp_timer_get_time()`
//!   (microsecond precision).  Wall-clock time comes from the system clock,
//!   which SNTP keeps in sync.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for host-side
//!   testing and simulation.

use chrono::{DateTime, Utc};

use crate::app::ports::Clock;

/// Clock backed by the platform timers.
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// `false` until SNTP has set the wall clock (anything before 2020).
    pub fn wall_clock_synced(&self) -> bool {
        const EPOCH_2020: i64 = 1_577_836_800;
        self.now_utc().timestamp() >= EPOCH_2020
    }
}

impl Clock for SystemClock {
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
