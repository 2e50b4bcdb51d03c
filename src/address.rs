use crate::MediaError;
use core::fmt::Write;

/// A Bluetooth Device Address (`BD_ADDR`) wrapper for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, defmt::Format)]
pub struct BluetoothAddress(pub [u8; 6]);

impl BluetoothAddress {
    /// Create a new Bluetooth address from bytes
    #[must_use]
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }

    /// Get the raw address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Format the address as a colon-separated hex string
    #[must_use]
    pub fn format_hex(&self) -> heapless::String<17> {
        let mut result = heapless::String::new();
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                result.push(':').ok();
            }
            write!(result, "{byte:02X}").ok();
        }
        result
    }

    /// Parse a Bluetooth address from a colon-separated hex string
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Failed`] if the string is not six colon-separated
    /// two-digit hex groups.
    pub fn from_hex(hex: &str) -> Result<Self, MediaError> {
        let mut bytes = [0u8; 6];
        let mut count = 0;
        for group in hex.split(':') {
            if count == 6 || group.len() != 2 {
                return Err(MediaError::Failed);
            }
            bytes[count] = u8::from_str_radix(group, 16).map_err(|_| MediaError::Failed)?;
            count += 1;
        }
        if count != 6 {
            return Err(MediaError::Failed);
        }
        Ok(Self(bytes))
    }
}

impl From<[u8; 6]> for BluetoothAddress {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl From<BluetoothAddress> for bt_hci::param::BdAddr {
    fn from(addr: BluetoothAddress) -> Self {
        bt_hci::param::BdAddr::new(addr.0)
    }
}

impl TryFrom<&[u8]> for BluetoothAddress {
    type Error = MediaError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let addr: [u8; 6] = bytes.try_into().map_err(|_| MediaError::Failed)?;
        Ok(Self(addr))
    }
}

impl TryFrom<bt_hci::param::BdAddr> for BluetoothAddress {
    type Error = MediaError;

    fn try_from(bd_addr: bt_hci::param::BdAddr) -> Result<Self, Self::Error> {
        bd_addr.raw().try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_hex_round_trip() {
        let addr = BluetoothAddress::new([0x0A, 0xB1, 0x2C, 0xD3, 0x4E, 0xF5]);
        let formatted = addr.format_hex();
        assert_eq!(formatted.as_str(), "0A:B1:2C:D3:4E:F5");
        assert_eq!(BluetoothAddress::from_hex(formatted.as_str()).unwrap(), addr);
    }

    #[test]
    fn from_hex_rejects_malformed_strings() {
        assert!(BluetoothAddress::from_hex("").is_err());
        assert!(BluetoothAddress::from_hex("0A:B1:2C:D3:4E").is_err());
        assert!(BluetoothAddress::from_hex("0A:B1:2C:D3:4E:F5:00").is_err());
        assert!(BluetoothAddress::from_hex("0A:B1:2C:D3:4E:ZZ").is_err());
        assert!(BluetoothAddress::from_hex("0AB12CD34EF5").is_err());
    }

    #[test]
    fn bd_addr_conversions() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC];
        let addr = BluetoothAddress::new(bytes);
        let bd_addr: bt_hci::param::BdAddr = addr.into();
        let back = BluetoothAddress::try_from(bd_addr).unwrap();
        assert_eq!(back, addr);
    }
}
