//! `radvlan probe`: act as a NAS and send one MAC-auth Access-Request.
//!
//! The request looks like what a UniFi AP sends: the bare lowercase MAC
//! as User-Name and the dashed uppercase form as Calling-Station-Id.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::net::UdpSocket;
use tracing::debug;

use radvlan_core::MacAddress;
use radvlan_proto::{
    Attribute, AttributeType, Code, MAX_PACKET_LEN, Packet, TUNNEL_TYPE_VLAN,
    random_authenticator,
};

use crate::cli::{GlobalOpts, ProbeArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct ProbeResult {
    server: SocketAddr,
    mac: MacAddress,
    response: String,
    vlan: Option<String>,
    tunnel_type: Option<u32>,
    tunnel_medium_type: Option<u32>,
    message_authenticator: bool,
    attempts: u32,
    rtt_ms: u64,
}

pub async fn handle(args: &ProbeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mac = MacAddress::normalize(&args.mac)?;
    let shared = SecretString::from(args.secret.clone());
    let secret = shared.expose_secret().as_bytes();
    let request = build_request(&mac, args);
    let bytes = request.encode(secret).map_err(|e| CliError::Internal {
        message: format!("cannot encode Access-Request: {e}"),
    })?;

    let socket = client_socket(args.server).await?;
    let started = Instant::now();
    let (reply, attempts) = exchange(&socket, &bytes, &request, args).await?;

    reply
        .verify_response(&request.authenticator, secret)
        .map_err(|e| CliError::BadReply {
            server: args.server,
            reason: e.to_string(),
        })?;
    let message_authenticator = reply
        .verify_message_authenticator(Some(&request.authenticator), secret)
        .map_err(|e| CliError::BadReply {
            server: args.server,
            reason: e.to_string(),
        })?;

    let result = ProbeResult {
        server: args.server,
        mac,
        response: reply.code.to_string(),
        vlan: reply
            .text(AttributeType::TunnelPrivateGroupId)
            .map(str::to_owned),
        tunnel_type: reply
            .attribute(AttributeType::TunnelType)
            .and_then(Attribute::as_u32),
        tunnel_medium_type: reply
            .attribute(AttributeType::TunnelMediumType)
            .and_then(Attribute::as_u32),
        message_authenticator,
        attempts,
        rtt_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };

    let out = output::render(global.output, &result, render_text)?;
    output::print_output(&out, global.quiet)
}

fn build_request(mac: &MacAddress, args: &ProbeArgs) -> Packet {
    let authenticator = random_authenticator();
    let bare = mac.as_str().replace(':', "");
    let dashed = mac.as_str().replace(':', "-").to_uppercase();

    let mut request = Packet::new(Code::AccessRequest, authenticator[0], authenticator)
        .with(Attribute::string(AttributeType::UserName, &bare))
        .with(Attribute::string(AttributeType::CallingStationId, &dashed))
        .with(Attribute::string(AttributeType::NasIdentifier, "radvlan-probe"))
        .with(Attribute::integer(AttributeType::NasPort, 0));
    if let Some(ip) = args.nas_ip {
        request.push(Attribute::ipv4(AttributeType::NasIpAddress, ip));
    }
    if args.message_authenticator {
        request.push(Attribute::new(AttributeType::MessageAuthenticator, vec![0u8; 16]));
    }
    request
}

async fn client_socket(server: SocketAddr) -> Result<UdpSocket, CliError> {
    let local: SocketAddr = if server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local)
        .await
        .map_err(|source| CliError::Bind {
            addr: local,
            source,
        })?;
    socket.connect(server).await?;
    Ok(socket)
}

/// Send, then wait for a reply with our identifier, retransmitting the
/// same bytes on each timeout.
async fn exchange(
    socket: &UdpSocket,
    bytes: &[u8],
    request: &Packet,
    args: &ProbeArgs,
) -> Result<(Packet, u32), CliError> {
    let attempts = args.retries.saturating_add(1);
    let wait = Duration::from_secs(args.timeout);
    let mut buf = vec![0u8; MAX_PACKET_LEN];

    for attempt in 1..=attempts {
        socket.send(bytes).await?;
        debug!(attempt, server = %args.server, "sent Access-Request");
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let received = match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
                Err(_) => break,
                // ICMP port unreachable on a connected socket; same as silence
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                    tokio::time::sleep_until(deadline).await;
                    break;
                }
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(n)) => n,
            };
            match Packet::decode(&buf[..received]) {
                Ok(reply) if reply.identifier == request.identifier && reply.code.is_reply() => {
                    return Ok((reply, attempt));
                }
                Ok(reply) => debug!(id = reply.identifier, "ignoring unrelated reply"),
                Err(e) => debug!(error = %e, "ignoring undecodable datagram"),
            }
        }
    }

    Err(CliError::ProbeTimeout {
        server: args.server,
        attempts,
    })
}

fn render_text(r: &ProbeResult) -> String {
    let mut lines = vec![format!(
        "{} from {} in {} ms ({} attempt{})",
        r.response,
        r.server,
        r.rtt_ms,
        r.attempts,
        if r.attempts == 1 { "" } else { "s" }
    )];
    if let Some(vlan) = &r.vlan {
        lines.push(format!("  VLAN:               {vlan}"));
    }
    if let Some(kind) = r.tunnel_type {
        let label = if kind == TUNNEL_TYPE_VLAN { " (VLAN)" } else { "" };
        lines.push(format!("  Tunnel-Type:        {kind}{label}"));
    }
    if let Some(medium) = r.tunnel_medium_type {
        lines.push(format!("  Tunnel-Medium-Type: {medium}"));
    }
    lines.push(format!(
        "  Message-Auth:       {}",
        if r.message_authenticator {
            "verified"
        } else {
            "absent"
        }
    ));
    lines.join("\n")
}
