// ── Inbound authentication requests ──
//
// Everything the engine needs from a decoded Access-Request, pulled out
// once so later stages never touch raw attributes.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use radvlan_proto::{Attribute, AttributeType, Packet};
use serde::Serialize;
use uuid::Uuid;

use crate::model::MacAddress;

/// Username recorded when a request carries no MAC candidate at all.
pub const UNKNOWN_USER: &str = "unknown";

/// One Access-Request, as seen by the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequest {
    /// Correlation id carried through every log line for this request.
    pub id: Uuid,
    pub identifier: u8,
    pub source: SocketAddr,
    pub received_at: DateTime<Utc>,
    /// MAC candidate exactly as the NAS sent it.
    pub raw_mac: Option<String>,
    /// Canonical MAC, when `raw_mac` normalized.
    pub mac: Option<MacAddress>,
    pub user_name: Option<String>,
    /// NAS-IP-Address, falling back to the datagram source address.
    pub nas_ip: IpAddr,
    /// NAS-Port-Id, falling back to the numeric NAS-Port.
    pub nas_port: Option<String>,
    pub nas_identifier: Option<String>,
    pub called_station_id: Option<String>,
    pub calling_station_id: Option<String>,
}

impl AuthRequest {
    pub fn from_packet(packet: &Packet, source: SocketAddr, received_at: DateTime<Utc>) -> Self {
        let raw_mac = mac_candidate(packet).map(Cow::into_owned);
        let mac = raw_mac
            .as_deref()
            .and_then(|raw| MacAddress::normalize(raw).ok());

        Self {
            id: Uuid::new_v4(),
            identifier: packet.identifier,
            source,
            received_at,
            raw_mac,
            mac,
            user_name: packet.user_name().map(str::to_owned),
            nas_ip: packet
                .nas_ip_address()
                .map_or_else(|| source.ip().to_canonical(), IpAddr::V4),
            nas_port: packet
                .nas_port_id()
                .map(str::to_owned)
                .or_else(|| packet.nas_port().map(|p| p.to_string())),
            nas_identifier: packet.nas_identifier().map(str::to_owned),
            called_station_id: packet.called_station_id().map(str::to_owned),
            calling_station_id: packet
                .attribute(AttributeType::CallingStationId)
                .map(|a| a.text_lossy().into_owned()),
        }
    }

    /// Identity written to the audit trail: canonical MAC, else the raw
    /// candidate, else [`UNKNOWN_USER`].
    pub fn audit_identity(&self) -> &str {
        self.mac
            .as_ref()
            .map(MacAddress::as_str)
            .or(self.raw_mac.as_deref())
            .unwrap_or(UNKNOWN_USER)
    }
}

/// MAC candidate: Calling-Station-Id first, then User-Name.
///
/// Blank values count as absent. A present but malformed
/// Calling-Station-Id still wins over User-Name, including one that is
/// not valid UTF-8.
pub fn mac_candidate(packet: &Packet) -> Option<Cow<'_, str>> {
    let present = |kind| {
        packet
            .attribute(kind)
            .map(Attribute::text_lossy)
            .filter(|s| !s.trim().is_empty())
    };
    present(AttributeType::CallingStationId).or_else(|| present(AttributeType::UserName))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use radvlan_proto::Code;
    use std::net::Ipv4Addr;

    fn request() -> Packet {
        Packet::new(Code::AccessRequest, 3, [7; 16])
    }

    fn source() -> SocketAddr {
        "192.0.2.10:40000".parse().unwrap()
    }

    #[test]
    fn calling_station_id_wins_over_user_name() {
        let packet = request()
            .with(Attribute::string(AttributeType::UserName, "001122334455"))
            .with(Attribute::string(AttributeType::CallingStationId, "AA-BB-CC-DD-EE-FF"));
        let req = AuthRequest::from_packet(&packet, source(), Utc::now());
        assert_eq!(req.raw_mac.as_deref(), Some("AA-BB-CC-DD-EE-FF"));
        assert_eq!(req.mac.as_ref().map(MacAddress::as_str), Some("aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn falls_back_to_user_name() {
        let packet = request()
            .with(Attribute::string(AttributeType::CallingStationId, "  "))
            .with(Attribute::string(AttributeType::UserName, "00:11:22:33:44:55"));
        let req = AuthRequest::from_packet(&packet, source(), Utc::now());
        assert_eq!(req.mac.unwrap().as_str(), "00:11:22:33:44:55");
    }

    #[test]
    fn malformed_calling_station_id_is_not_skipped() {
        let packet = request()
            .with(Attribute::string(AttributeType::CallingStationId, "garbage"))
            .with(Attribute::string(AttributeType::UserName, "001122334455"));
        let req = AuthRequest::from_packet(&packet, source(), Utc::now());
        assert_eq!(req.raw_mac.as_deref(), Some("garbage"));
        assert_eq!(req.mac, None);
        assert_eq!(req.audit_identity(), "garbage");
    }

    #[test]
    fn non_utf8_calling_station_id_is_not_skipped() {
        let packet = request()
            .with(Attribute::new(
                AttributeType::CallingStationId,
                b"AA-BB-CC-DD-EE-F1\xff".to_vec(),
            ))
            .with(Attribute::string(AttributeType::UserName, "001122334455"));
        let req = AuthRequest::from_packet(&packet, source(), Utc::now());
        // The replacement character is a non-hex delimiter like any other.
        assert_eq!(req.raw_mac.as_deref(), Some("AA-BB-CC-DD-EE-F1\u{fffd}"));
        assert_eq!(req.mac.unwrap().as_str(), "aa:bb:cc:dd:ee:f1");
        assert_eq!(
            req.calling_station_id.as_deref(),
            Some("AA-BB-CC-DD-EE-F1\u{fffd}")
        );
    }

    #[test]
    fn no_candidate_audits_as_unknown() {
        let req = AuthRequest::from_packet(&request(), source(), Utc::now());
        assert_eq!(req.raw_mac, None);
        assert_eq!(req.audit_identity(), UNKNOWN_USER);
    }

    #[test]
    fn nas_ip_falls_back_to_source() {
        let req = AuthRequest::from_packet(&request(), source(), Utc::now());
        assert_eq!(req.nas_ip, "192.0.2.10".parse::<IpAddr>().unwrap());

        let packet = request().with(Attribute::ipv4(
            AttributeType::NasIpAddress,
            Ipv4Addr::new(10, 0, 0, 2),
        ));
        let req = AuthRequest::from_packet(&packet, source(), Utc::now());
        assert_eq!(req.nas_ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn nas_port_prefers_port_id() {
        let packet = request().with(Attribute::integer(AttributeType::NasPort, 7));
        let req = AuthRequest::from_packet(&packet, source(), Utc::now());
        assert_eq!(req.nas_port.as_deref(), Some("7"));

        let packet = packet.with(Attribute::string(AttributeType::NasPortId, "ge-0/0/1"));
        let req = AuthRequest::from_packet(&packet, source(), Utc::now());
        assert_eq!(req.nas_port.as_deref(), Some("ge-0/0/1"));
    }
}
