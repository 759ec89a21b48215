//! Static identification of the chip the firmware was built for.

use core::fmt::Write;

/// Radio blocks present on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipFeatures {
    pub wifi: bool,
    pub bt: bool,
    pub ble: bool,
}

impl ChipFeatures {
    /// `WiFi/BT/BLE`-style label, empty when the target has no radio.
    pub fn label(&self) -> heapless::String<16> {
        let mut label = heapless::String::new();
        if self.wifi {
            let _ = write!(label, "WiFi");
        }
        if self.bt {
            let _ = write!(label, "/BT");
        }
        if self.ble {
            let _ = write!(label, "/BLE");
        }
        label
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChipInfo {
    pub model: &'static str,
    pub cores: u8,
    pub features: ChipFeatures,
}

impl ChipInfo {
    /// Descriptor for the compiled-in target. The HAL selects the chip at
    /// build time, so this is a constant, not a probe.
    pub fn read() -> Self {
        Self {
            model: "esp32",
            cores: 2,
            features: ChipFeatures {
                wifi: true,
                bt: true,
                ble: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esp32_reports_two_cores_and_full_radio() {
        let info = ChipInfo::read();
        assert_eq!(info.model, "esp32");
        assert_eq!(info.cores, 2);
        assert_eq!(info.features.label().as_str(), "WiFi/BT/BLE");
    }

    #[test]
    fn feature_label_drops_absent_blocks() {
        let wifi_only = ChipFeatures {
            wifi: true,
            bt: false,
            ble: false,
        };
        assert_eq!(wifi_only.label().as_str(), "WiFi");

        let no_radio = ChipFeatures {
            wifi: false,
            bt: false,
            ble: false,
        };
        assert!(no_radio.label().is_empty());
    }
}
