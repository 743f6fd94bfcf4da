//! Microphone availability check.
//!
//! Desktop hosts do not expose a consent API through cpal. A refused or
//! missing microphone shows up as a default input device that cannot report
//! its configuration, which is what this probes.

use cpal::traits::{DeviceTrait, HostTrait};

/// Whether the default input device can be opened.
pub fn check_microphone_permission() -> bool {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        return false; // No capture device
    };
    match device.default_input_config() {
        Ok(_) => true,
        Err(e) => {
            log::warn!("Microphone is not usable: {}", e);
            false
        }
    }
}
