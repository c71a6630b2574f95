//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the station if the control loop stops feeding it.  A reset leaves
//! every motor output at its power-on level (low), which is the safe state
//! for doors and feeder alike.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{
    ESP_OK, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_reconfigure,
    esp_task_wdt_reset,
};
use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

/// Watchdog timeout for a given control-loop interval: fifty missed ticks,
/// never less than five seconds.
pub fn timeout_for_loop(control_loop_interval_ms: u32) -> u32 {
    control_loop_interval_ms.saturating_mul(50).max(5_000)
}

pub struct Watchdog {
    subscribed: bool,
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain FFI calls on the current task; the config
            // struct outlives the reconfigure call.
            let subscribed = unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!("watchdog: reconfigure returned {}", ret);
                }
                esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK
            };
            if subscribed {
                info!("watchdog: subscribed ({} ms timeout)", timeout_ms);
            } else {
                warn!("watchdog: subscribe failed, running unguarded");
            }
            Self { subscribed }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("watchdog(sim): {} ms timeout, no-op", timeout_ms);
            Self { subscribed: false }
        }
    }

    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: resets the TWDT entry of the subscribed task.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}
