// ── Per-datagram pipeline ──
//
// Access-Request:
//   decode -> client secret -> Message-Authenticator -> duplicate check
//   -> MAC candidate -> resolve -> build reply -> send -> audit
//
// Every failure before "resolve" drops the datagram without a reply.
// Once a request has been resolved the NAS always gets an answer, and
// the audit row is written after the answer leaves.
//
// Accounting-Request: decode -> client secret -> authenticator -> ack.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use radvlan_proto::{Code, Packet};
use secrecy::ExposeSecret;
use strum::Display;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::clients::ClientRegistry;
use crate::dedup::{Admission, ReplayCache, RequestKey};
use crate::error::CoreError;
use crate::model::{AuthRequest, Outcome};
use crate::reply::build_reply;
use crate::resolve::Resolver;
use crate::transmit::Transmitter;

/// Why a datagram got no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DropReason {
    Malformed,
    UnexpectedCode,
    UnknownClient,
    BadAuthenticator,
    InFlightDuplicate,
    Internal,
}

impl From<&CoreError> for DropReason {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::MalformedPacket(_) => Self::Malformed,
            CoreError::UnexpectedCode { .. } => Self::UnexpectedCode,
            CoreError::UnknownClient { .. } => Self::UnknownClient,
            CoreError::AuthenticatorMismatch { .. } => Self::BadAuthenticator,
            _ => Self::Internal,
        }
    }
}

/// What happened to one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Dropped(DropReason),
    /// Resolved and answered. `sent` / `audited` report the side effects.
    Answered {
        outcome: Outcome,
        sent: bool,
        audited: bool,
    },
    /// Retransmission of an answered request; the cached reply was resent.
    Replayed { outcome: Outcome, sent: bool },
    /// Accounting request acknowledged.
    Acknowledged { sent: bool },
}

/// Handles datagrams arriving on one listener.
#[async_trait]
pub trait DatagramHandler: Send + Sync {
    async fn handle(&self, datagram: &[u8], source: SocketAddr) -> Disposition;
}

// ── Access-Request handling ──────────────────────────────────────────

pub struct AuthHandler {
    registry: Arc<ClientRegistry>,
    resolver: Resolver,
    audit: AuditLogger,
    replay: Arc<ReplayCache>,
    transmitter: Transmitter,
}

impl AuthHandler {
    pub fn new(
        registry: Arc<ClientRegistry>,
        resolver: Resolver,
        audit: AuditLogger,
        replay: Arc<ReplayCache>,
        transmitter: Transmitter,
    ) -> Self {
        Self {
            registry,
            resolver,
            audit,
            replay,
            transmitter,
        }
    }

    async fn process(&self, datagram: &[u8], source: SocketAddr) -> Result<Disposition, CoreError> {
        let received_at = Utc::now();
        let packet = Packet::decode(datagram)?;
        if packet.code != Code::AccessRequest {
            return Err(CoreError::UnexpectedCode { code: packet.code });
        }

        let client = self.registry.lookup(source.ip())?;
        let secret = client.secret.expose_secret().as_bytes();
        packet
            .verify_message_authenticator(None, secret)
            .map_err(|reason| CoreError::AuthenticatorMismatch {
                address: source.ip(),
                reason,
            })?;

        let key = RequestKey {
            source,
            identifier: packet.identifier,
        };
        match self.replay.admit(key, packet.authenticator, Instant::now()) {
            Admission::New => {}
            Admission::InFlight => {
                debug!(%source, identifier = packet.identifier, "duplicate of in-flight request");
                return Ok(Disposition::Dropped(DropReason::InFlightDuplicate));
            }
            Admission::Replay { outcome, reply } => {
                let sent = match reply {
                    Some(bytes) => self.send(&bytes, source).await,
                    None => false,
                };
                debug!(%source, identifier = packet.identifier, %outcome, sent, "replayed cached reply");
                return Ok(Disposition::Replayed { outcome, sent });
            }
        }

        let request = AuthRequest::from_packet(&packet, source, received_at);
        let outcome = self.resolver.resolve_raw(request.raw_mac.as_deref()).await;
        info!(
            request_id = %request.id,
            nas = client.name,
            %source,
            mac = request.audit_identity(),
            match_kind = %outcome.kind(),
            vlan = outcome.vlan().map(|v| v.get()),
            "{}",
            outcome
        );

        let reply = build_reply(&packet, source, &outcome);
        let encoded = match reply.packet.encode(secret) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "could not encode reply");
                None
            }
        };
        let sent = match &encoded {
            Some(bytes) => self.send(bytes, reply.destination).await,
            None => false,
        };
        self.replay
            .complete(key, packet.authenticator, outcome.clone(), encoded);

        let audited = self.audit.record(&request, &outcome).await;
        Ok(Disposition::Answered {
            outcome,
            sent,
            audited,
        })
    }

    async fn send(&self, bytes: &[u8], destination: SocketAddr) -> bool {
        match self.transmitter.send(bytes, destination).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "reply not sent");
                false
            }
        }
    }
}

#[async_trait]
impl DatagramHandler for AuthHandler {
    async fn handle(&self, datagram: &[u8], source: SocketAddr) -> Disposition {
        match self.process(datagram, source).await {
            Ok(disposition) => disposition,
            Err(err) => drop_datagram(&err, source),
        }
    }
}

// ── Accounting-Request handling ──────────────────────────────────────

/// Acknowledges accounting so NAS devices stop retransmitting. Nothing
/// is stored.
pub struct AcctHandler {
    registry: Arc<ClientRegistry>,
    transmitter: Transmitter,
}

impl AcctHandler {
    pub fn new(registry: Arc<ClientRegistry>, transmitter: Transmitter) -> Self {
        Self {
            registry,
            transmitter,
        }
    }

    async fn process(&self, datagram: &[u8], source: SocketAddr) -> Result<Disposition, CoreError> {
        let packet = Packet::decode(datagram)?;
        if packet.code != Code::AccountingRequest {
            return Err(CoreError::UnexpectedCode { code: packet.code });
        }

        let secret = self.registry.secret_for(source.ip())?.expose_secret().as_bytes();
        packet
            .verify_accounting_request(secret)
            .map_err(|reason| CoreError::AuthenticatorMismatch {
                address: source.ip(),
                reason,
            })?;

        let bytes = packet.reply(Code::AccountingResponse).encode(secret)?;
        let sent = match self.transmitter.send(&bytes, source).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "accounting response not sent");
                false
            }
        };
        debug!(%source, identifier = packet.identifier, sent, "accounting acknowledged");
        Ok(Disposition::Acknowledged { sent })
    }
}

#[async_trait]
impl DatagramHandler for AcctHandler {
    async fn handle(&self, datagram: &[u8], source: SocketAddr) -> Disposition {
        match self.process(datagram, source).await {
            Ok(disposition) => disposition,
            Err(err) => drop_datagram(&err, source),
        }
    }
}

fn drop_datagram(err: &CoreError, source: SocketAddr) -> Disposition {
    let reason = DropReason::from(err);
    match reason {
        DropReason::Malformed | DropReason::UnexpectedCode => {
            debug!(%source, error = %err, "dropping datagram");
        }
        _ => warn!(%source, error = %err, kind = err.kind(), "dropping datagram"),
    }
    Disposition::Dropped(reason)
}
