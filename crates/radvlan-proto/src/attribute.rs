// ── Attribute TLVs ──
//
// Typed view over the attribute dictionary this server speaks. Anything
// outside the dictionary decodes to `AttributeType::Other` and is carried
// through untouched.

use std::borrow::Cow;
use std::fmt;
use std::net::Ipv4Addr;

/// Largest value a single attribute TLV can carry (255 minus the 2-byte header).
pub const MAX_VALUE_LEN: usize = 253;

/// Tunnel-Type value for VLAN assignment (RFC 3580).
pub const TUNNEL_TYPE_VLAN: u32 = 13;

/// Tunnel-Medium-Type value for IEEE-802 media (RFC 2868).
pub const TUNNEL_MEDIUM_IEEE_802: u32 = 6;

/// Attribute type octet.
///
/// Always build through `From<u8>` so known types never end up wrapped in
/// [`Other`](Self::Other).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    UserName,
    UserPassword,
    NasIpAddress,
    NasPort,
    ServiceType,
    CalledStationId,
    CallingStationId,
    NasIdentifier,
    AcctStatusType,
    AcctSessionId,
    TunnelType,
    TunnelMediumType,
    MessageAuthenticator,
    TunnelPrivateGroupId,
    NasPortId,
    Other(u8),
}

impl From<u8> for AttributeType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::UserName,
            2 => Self::UserPassword,
            4 => Self::NasIpAddress,
            5 => Self::NasPort,
            6 => Self::ServiceType,
            30 => Self::CalledStationId,
            31 => Self::CallingStationId,
            32 => Self::NasIdentifier,
            40 => Self::AcctStatusType,
            44 => Self::AcctSessionId,
            64 => Self::TunnelType,
            65 => Self::TunnelMediumType,
            80 => Self::MessageAuthenticator,
            81 => Self::TunnelPrivateGroupId,
            87 => Self::NasPortId,
            other => Self::Other(other),
        }
    }
}

impl From<AttributeType> for u8 {
    fn from(value: AttributeType) -> Self {
        match value {
            AttributeType::UserName => 1,
            AttributeType::UserPassword => 2,
            AttributeType::NasIpAddress => 4,
            AttributeType::NasPort => 5,
            AttributeType::ServiceType => 6,
            AttributeType::CalledStationId => 30,
            AttributeType::CallingStationId => 31,
            AttributeType::NasIdentifier => 32,
            AttributeType::AcctStatusType => 40,
            AttributeType::AcctSessionId => 44,
            AttributeType::TunnelType => 64,
            AttributeType::TunnelMediumType => 65,
            AttributeType::MessageAuthenticator => 80,
            AttributeType::TunnelPrivateGroupId => 81,
            AttributeType::NasPortId => 87,
            AttributeType::Other(raw) => raw,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UserName => "User-Name",
            Self::UserPassword => "User-Password",
            Self::NasIpAddress => "NAS-IP-Address",
            Self::NasPort => "NAS-Port",
            Self::ServiceType => "Service-Type",
            Self::CalledStationId => "Called-Station-Id",
            Self::CallingStationId => "Calling-Station-Id",
            Self::NasIdentifier => "NAS-Identifier",
            Self::AcctStatusType => "Acct-Status-Type",
            Self::AcctSessionId => "Acct-Session-Id",
            Self::TunnelType => "Tunnel-Type",
            Self::TunnelMediumType => "Tunnel-Medium-Type",
            Self::MessageAuthenticator => "Message-Authenticator",
            Self::TunnelPrivateGroupId => "Tunnel-Private-Group-ID",
            Self::NasPortId => "NAS-Port-Id",
            Self::Other(raw) => return write!(f, "Attr-{raw}"),
        };
        f.write_str(name)
    }
}

/// A single attribute: type octet plus raw value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub kind: AttributeType,
    pub value: Vec<u8>,
}

impl Attribute {
    pub fn new(kind: AttributeType, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Text attribute (User-Name, Calling-Station-Id, Tunnel-Private-Group-ID, ...).
    pub fn string(kind: AttributeType, value: &str) -> Self {
        Self::new(kind, value.as_bytes())
    }

    /// 32-bit big-endian integer attribute.
    ///
    /// Tunnel-Type and Tunnel-Medium-Type encoded this way carry tag 0,
    /// which is what VLAN-assigning NAS implementations expect.
    pub fn integer(kind: AttributeType, value: u32) -> Self {
        Self::new(kind, value.to_be_bytes())
    }

    pub fn ipv4(kind: AttributeType, addr: Ipv4Addr) -> Self {
        Self::new(kind, addr.octets())
    }

    /// Value as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Value as text, with invalid UTF-8 replaced by U+FFFD.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// Value as a 32-bit big-endian integer, if it is exactly 4 bytes.
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().ok()?;
        Some(Ipv4Addr::from(bytes))
    }

    /// Wire length of this attribute including its 2-byte header.
    pub fn wire_len(&self) -> usize {
        self.value.len() + 2
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AttributeType::UserPassword | AttributeType::MessageAuthenticator => {
                write!(f, "{}=<redacted>", self.kind)
            }
            AttributeType::NasIpAddress => match self.as_ipv4() {
                Some(ip) => write!(f, "{}={ip}", self.kind),
                None => write!(f, "{}=0x{}", self.kind, hex::encode(&self.value)),
            },
            AttributeType::NasPort
            | AttributeType::ServiceType
            | AttributeType::AcctStatusType
            | AttributeType::TunnelType
            | AttributeType::TunnelMediumType => match self.as_u32() {
                Some(n) => write!(f, "{}={n}", self.kind),
                None => write!(f, "{}=0x{}", self.kind, hex::encode(&self.value)),
            },
            AttributeType::Other(_) => write!(f, "{}=0x{}", self.kind, hex::encode(&self.value)),
            _ => match self.as_str() {
                Some(s) => write!(f, "{}={s:?}", self.kind),
                None => write!(f, "{}=0x{}", self.kind, hex::encode(&self.value)),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn type_octets_round_trip() {
        for raw in 0..=u8::MAX {
            let kind = AttributeType::from(raw);
            assert_eq!(u8::from(kind), raw);
        }
    }

    #[test]
    fn known_types_never_decode_to_other() {
        assert_eq!(AttributeType::from(31), AttributeType::CallingStationId);
        assert_eq!(AttributeType::from(81), AttributeType::TunnelPrivateGroupId);
        assert_eq!(AttributeType::from(26), AttributeType::Other(26));
    }

    #[test]
    fn integer_attribute_is_big_endian() {
        let attr = Attribute::integer(AttributeType::TunnelType, TUNNEL_TYPE_VLAN);
        assert_eq!(attr.value, vec![0, 0, 0, 13]);
        assert_eq!(attr.as_u32(), Some(13));
        assert_eq!(attr.wire_len(), 6);
    }

    #[test]
    fn ipv4_attribute_accessor() {
        let attr = Attribute::ipv4(AttributeType::NasIpAddress, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(attr.as_ipv4(), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(attr.as_u32(), Some(0xC0A8_0101));
    }

    #[test]
    fn display_redacts_password() {
        let attr = Attribute::string(AttributeType::UserPassword, "hunter2");
        assert_eq!(attr.to_string(), "User-Password=<redacted>");
    }

    #[test]
    fn display_formats_by_type() {
        let mac = Attribute::string(AttributeType::CallingStationId, "AA-BB-CC-DD-EE-FF");
        insta::assert_snapshot!(mac.to_string(), @r#"Calling-Station-Id="AA-BB-CC-DD-EE-FF""#);

        let vendor = Attribute::new(AttributeType::Other(26), vec![0x00, 0x00, 0x01, 0x37]);
        insta::assert_snapshot!(vendor.to_string(), @"Attr-26=0x00000137");
    }
}
