// ── Response builder ──
//
// Turns an outcome into the reply packet for a specific request. Accepts
// carry the three RFC 3580 tunnel attributes; rejects carry none. The
// reply is always addressed to the datagram's source, never to anything
// the packet claims about itself.

use std::net::SocketAddr;

use radvlan_proto::{
    AUTHENTICATOR_LEN, Attribute, AttributeType, Code, Packet, TUNNEL_MEDIUM_IEEE_802,
    TUNNEL_TYPE_VLAN,
};

use crate::model::Outcome;

/// A reply packet bound to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub packet: Packet,
    pub destination: SocketAddr,
}

/// Build the Access-Accept or Access-Reject answering `request`.
///
/// The packet's authenticator is the request authenticator until
/// [`Packet::encode`] derives the response authenticator from the secret.
/// A Message-Authenticator is included whenever the request carried one.
pub fn build_reply(request: &Packet, source: SocketAddr, outcome: &Outcome) -> Reply {
    let mut packet = match outcome.vlan() {
        Some(vlan) => request
            .reply(Code::AccessAccept)
            .with(Attribute::integer(AttributeType::TunnelType, TUNNEL_TYPE_VLAN))
            .with(Attribute::integer(
                AttributeType::TunnelMediumType,
                TUNNEL_MEDIUM_IEEE_802,
            ))
            .with(Attribute::string(
                AttributeType::TunnelPrivateGroupId,
                &vlan.to_string(),
            )),
        None => request.reply(Code::AccessReject),
    };

    if request.has_message_authenticator() {
        packet.push(Attribute::new(
            AttributeType::MessageAuthenticator,
            [0u8; AUTHENTICATOR_LEN],
        ));
    }

    Reply {
        packet,
        destination: source,
    }
}
