//! SNMP protocol version.

/// SNMP version carried in the message header.
///
/// Only the community-based versions are supported by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Version {
    /// SNMPv1 (wire value 0)
    V1 = 0,
    /// SNMPv2c (wire value 1)
    V2c = 1,
}

impl Version {
    /// Create from the wire integer.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::V1),
            1 => Some(Self::V2c),
            _ => None,
        }
    }

    /// Get the wire integer.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "SNMPv1"),
            Self::V2c => write!(f, "SNMPv2c"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(Version::V1.as_i32(), 0);
        assert_eq!(Version::V2c.as_i32(), 1);
        assert_eq!(Version::from_i32(0), Some(Version::V1));
        assert_eq!(Version::from_i32(1), Some(Version::V2c));
        assert_eq!(Version::from_i32(3), None);
        assert_eq!(Version::from_i32(-1), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Version::V1.to_string(), "SNMPv1");
        assert_eq!(Version::V2c.to_string(), "SNMPv2c");
    }
}
