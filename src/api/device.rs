//! Device identity used for pairing

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the machine's network identity.
pub trait DeviceInfo: Send + Sync {
    /// MAC address as lowercase hex without separators
    fn mac_address(&self) -> Option<String>;
    fn host_name(&self) -> Option<String>;
}

/// Reads interfaces and host name from the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDeviceInfo;

impl DeviceInfo for SystemDeviceInfo {
    fn mac_address(&self) -> Option<String> {
        let networks = sysinfo::Networks::new_with_refreshed_list();
        let mut names: Vec<&String> = networks.list().keys().collect();
        // interface order from the OS is not stable
        names.sort();

        names.into_iter().find_map(|name| {
            let mac = networks.list().get(name)?.mac_address();
            if mac.is_unspecified() {
                None
            } else {
                Some(hex::encode(mac.0))
            }
        })
    }

    fn host_name(&self) -> Option<String> {
        sysinfo::System::host_name()
    }
}

/// SHA-256 (hex) of the device identifier: the configured override, the MAC
/// address, or a timestamp when neither is available.
pub fn device_serial(overridden_mac: &str, device: &dyn DeviceInfo) -> String {
    let mac = if overridden_mac.is_empty() {
        device.mac_address().unwrap_or_default()
    } else {
        overridden_mac.to_string()
    };

    let mac = if mac.is_empty() {
        let dummy = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
            .to_string();
        log::info!("Unable to get MAC address, using a dummy({}) for serial", dummy);
        dummy
    } else {
        mac
    };

    hex::encode(Sha256::digest(mac.as_bytes()))
}
