// ── VLAN identifiers ──

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidVlan;

/// IEEE 802.1Q VLAN ID in the assignable range `1..=4094`.
///
/// 0 and 4095 are reserved by the standard and never leave this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 4094;

    pub fn new(value: u16) -> Result<Self, InvalidVlan> {
        Self::try_from(i64::from(value))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for VlanId {
    type Error = InvalidVlan;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u16::try_from(value) {
            Ok(v) if (Self::MIN..=Self::MAX).contains(&v) => Ok(Self(v)),
            _ => Err(InvalidVlan::new(value)),
        }
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> Self {
        vlan.0
    }
}

impl FromStr for VlanId {
    type Err = InvalidVlan;

    /// Parses the decimal text a policy store keeps in string columns.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<i64>().map_err(|_| InvalidVlan::new(s))?;
        Self::try_from(value)
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_assignable_range() {
        assert_eq!(VlanId::try_from(1).unwrap().get(), 1);
        assert_eq!(VlanId::try_from(4094).unwrap().get(), 4094);
        assert_eq!(VlanId::new(100).unwrap().to_string(), "100");
    }

    #[test]
    fn rejects_reserved_and_out_of_range() {
        for value in [0, 4095, -5, 70_000, i64::MAX] {
            assert_eq!(VlanId::try_from(value), Err(InvalidVlan::new(value)));
        }
    }

    #[test]
    fn parses_stored_text() {
        assert_eq!(" 20 ".parse::<VlanId>().unwrap().get(), 20);
        assert!("abc".parse::<VlanId>().is_err());
        assert!("0".parse::<VlanId>().is_err());
    }

    #[test]
    fn deserialize_validates_range() {
        assert_eq!(serde_json::from_str::<VlanId>("30").unwrap().get(), 30);
        assert!(serde_json::from_str::<VlanId>("5000").is_err());
    }
}
