//! classification of known slave devices by their identity

use core::fmt;

/// category of a known device
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum DeviceType {
    #[default]
    Unknown,
    /// motor drive following the CiA 402 profile
    Cia402Drive,
    DigitalIo,
    EndEffectorIo,
}

struct KnownDevice {
    vendor_id: u32,
    product_code: u32,
    /// zero matches any revision
    revision: u32,
    device: DeviceType,
}

const KNOWN_DEVICES: [KnownDevice; 3] = [
    KnownDevice {vendor_id: 0x22d2, product_code: 0x201, revision: 0x0a00_0002, device: DeviceType::Cia402Drive},
    KnownDevice {vendor_id: 0x22d2, product_code: 0x202, revision: 0, device: DeviceType::DigitalIo},
    KnownDevice {vendor_id: 0x22d2, product_code: 0x203, revision: 0, device: DeviceType::EndEffectorIo},
    ];

impl DeviceType {
    /// category of the device with the given identity, [Self::Unknown] if not in the table
    pub fn classify(vendor_id: u32, product_code: u32, revision: u32) -> Self {
        KNOWN_DEVICES.iter()
            .find(|known|  known.vendor_id == vendor_id
                        && known.product_code == product_code
                        && (known.revision == 0 || known.revision == revision))
            .map(|known| known.device)
            .unwrap_or_default()
    }
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Cia402Drive => "CiA402 Drive",
            Self::DigitalIo => "Digital I/O",
            Self::EndEffectorIo => "EndEffector I/O",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify() {
        assert_eq!(DeviceType::classify(0x22d2, 0x201, 0x0a00_0002), DeviceType::Cia402Drive);
        assert_eq!(DeviceType::classify(0x22d2, 0x201, 0x0a00_0003), DeviceType::Unknown);
        assert_eq!(DeviceType::classify(0x22d2, 0x202, 0x1234), DeviceType::DigitalIo);
        assert_eq!(DeviceType::classify(0x22d2, 0x203, 0), DeviceType::EndEffectorIo);
        assert_eq!(DeviceType::classify(0x0002, 0x201, 0), DeviceType::Unknown);
        assert_eq!(DeviceType::DigitalIo.to_string(), "Digital I/O");
    }
}
