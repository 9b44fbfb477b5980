// ── RADIUS packet codec ──
//
// Header layout (RFC 2865 §3):
//
//   0      1      2      4                   20
//   +------+------+------+-------------------+----------------
//   | code |  id  | len  |   authenticator   | attributes ...
//   +------+------+------+-------------------+----------------
//
// `len` covers the whole packet; octets past it are padding.

use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use strum::Display;

use crate::attribute::{Attribute, AttributeType, MAX_VALUE_LEN};
use crate::authenticator::{self, AUTHENTICATOR_LEN, Authenticator, ct_eq};
use crate::error::Error;

/// Fixed header size: code, identifier, length, authenticator.
pub const HEADER_LEN: usize = 20;

/// Largest packet the protocol allows.
pub const MAX_PACKET_LEN: usize = 4096;

const ZERO_AUTHENTICATOR: Authenticator = [0u8; AUTHENTICATOR_LEN];

// ── Code ────────────────────────────────────────────────────────────

/// Packet codes understood by the server. Anything else is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Code {
    #[strum(serialize = "Access-Request")]
    AccessRequest,
    #[strum(serialize = "Access-Accept")]
    AccessAccept,
    #[strum(serialize = "Access-Reject")]
    AccessReject,
    #[strum(serialize = "Accounting-Request")]
    AccountingRequest,
    #[strum(serialize = "Accounting-Response")]
    AccountingResponse,
    #[strum(serialize = "Access-Challenge")]
    AccessChallenge,
}

impl Code {
    /// Reply codes carry a response authenticator derived from the request.
    pub fn is_reply(self) -> bool {
        matches!(
            self,
            Self::AccessAccept | Self::AccessReject | Self::AccessChallenge | Self::AccountingResponse
        )
    }
}

impl TryFrom<u8> for Code {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::AccessRequest),
            2 => Ok(Self::AccessAccept),
            3 => Ok(Self::AccessReject),
            4 => Ok(Self::AccountingRequest),
            5 => Ok(Self::AccountingResponse),
            11 => Ok(Self::AccessChallenge),
            other => Err(Error::UnsupportedCode(other)),
        }
    }
}

impl From<Code> for u8 {
    fn from(code: Code) -> Self {
        match code {
            Code::AccessRequest => 1,
            Code::AccessAccept => 2,
            Code::AccessReject => 3,
            Code::AccountingRequest => 4,
            Code::AccountingResponse => 5,
            Code::AccessChallenge => 11,
        }
    }
}

// ── Packet ──────────────────────────────────────────────────────────

/// A decoded packet.
///
/// For reply codes, `authenticator` holds the *request* authenticator
/// until [`encode`](Self::encode) swaps in the derived response
/// authenticator. That is what binds a reply to its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub code: Code,
    pub identifier: u8,
    pub authenticator: Authenticator,
    pub attributes: Vec<Attribute>,
}

impl Packet {
    pub fn new(code: Code, identifier: u8, authenticator: Authenticator) -> Self {
        Self {
            code,
            identifier,
            authenticator,
            attributes: Vec::new(),
        }
    }

    /// Start a reply bound to this request: same identifier, request
    /// authenticator as the seed, no attributes.
    pub fn reply(&self, code: Code) -> Self {
        Self::new(code, self.identifier, self.authenticator)
    }

    pub fn push(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn with(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    // ── Decode ──────────────────────────────────────────────────────

    /// Parse a datagram. Every failure is a malformed-packet error.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let Some((header, _)) = bytes.split_first_chunk::<HEADER_LEN>() else {
            return Err(Error::Truncated { len: bytes.len() });
        };

        let code = Code::try_from(header[0])?;
        let identifier = header[1];
        let declared = usize::from(u16::from_be_bytes([header[2], header[3]]));
        if !(HEADER_LEN..=MAX_PACKET_LEN).contains(&declared) || declared > bytes.len() {
            return Err(Error::InvalidLength {
                declared,
                received: bytes.len(),
            });
        }

        let mut authenticator = ZERO_AUTHENTICATOR;
        authenticator.copy_from_slice(&header[4..HEADER_LEN]);

        let attributes = decode_attributes(&bytes[HEADER_LEN..declared])?;
        if let Some(ma) = attributes
            .iter()
            .find(|a| a.kind == AttributeType::MessageAuthenticator)
        {
            if ma.value.len() != AUTHENTICATOR_LEN {
                return Err(Error::InvalidMessageAuthenticator(ma.value.len()));
            }
        }

        Ok(Self {
            code,
            identifier,
            authenticator,
            attributes,
        })
    }

    // ── Encode ──────────────────────────────────────────────────────

    /// Serialize for the wire, deriving authenticators from `secret`.
    ///
    /// - Reply codes: response authenticator over the request authenticator
    ///   currently held in `self.authenticator`.
    /// - Accounting-Request: request authenticator over a zero seed.
    /// - Access-Request: `self.authenticator` is emitted unchanged.
    ///
    /// A Message-Authenticator attribute, if present, is recomputed; its
    /// current value only has to be 16 bytes long.
    pub fn encode(&self, secret: &[u8]) -> Result<Vec<u8>, Error> {
        let seed = self.seed();
        let (mut buf, ma_offset) = self.serialize(&seed, true)?;

        if let Some(offset) = ma_offset {
            let tag = authenticator::message_authenticator(&buf, secret)?;
            buf[offset..offset + AUTHENTICATOR_LEN].copy_from_slice(&tag);
        }

        if self.code != Code::AccessRequest {
            let derived = authenticator::packet_digest(&buf, secret);
            buf[4..HEADER_LEN].copy_from_slice(&derived);
        }

        Ok(buf)
    }

    // ── Authenticator checks ────────────────────────────────────────

    /// Check an Accounting-Request's authenticator against `secret`.
    pub fn verify_accounting_request(&self, secret: &[u8]) -> Result<(), Error> {
        let (buf, _) = self.serialize(&ZERO_AUTHENTICATOR, false)?;
        let expected = authenticator::packet_digest(&buf, secret);
        if ct_eq(&expected, &self.authenticator) {
            Ok(())
        } else {
            Err(Error::AuthenticatorMismatch)
        }
    }

    /// Check a decoded reply against the request it answers.
    pub fn verify_response(
        &self,
        request_authenticator: &Authenticator,
        secret: &[u8],
    ) -> Result<(), Error> {
        let (buf, _) = self.serialize(request_authenticator, false)?;
        let expected = authenticator::packet_digest(&buf, secret);
        if ct_eq(&expected, &self.authenticator) {
            Ok(())
        } else {
            Err(Error::AuthenticatorMismatch)
        }
    }

    /// Check the Message-Authenticator attribute, if any.
    ///
    /// Pass `None` for requests and `Some(request_authenticator)` for
    /// replies. Returns `Ok(false)` when the attribute is absent.
    pub fn verify_message_authenticator(
        &self,
        request_authenticator: Option<&Authenticator>,
        secret: &[u8],
    ) -> Result<bool, Error> {
        let Some(received) = self.attribute(AttributeType::MessageAuthenticator) else {
            return Ok(false);
        };
        let seed = request_authenticator.copied().unwrap_or_else(|| self.seed());
        let (buf, _) = self.serialize(&seed, true)?;
        authenticator::verify_message_authenticator(&buf, secret, &received.value)?;
        Ok(true)
    }

    // ── Attribute accessors ─────────────────────────────────────────

    /// First attribute of the given type.
    pub fn attribute(&self, kind: AttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.kind == kind)
    }

    /// First attribute of the given type as UTF-8 text.
    pub fn text(&self, kind: AttributeType) -> Option<&str> {
        self.attribute(kind).and_then(Attribute::as_str)
    }

    pub fn user_name(&self) -> Option<&str> {
        self.text(AttributeType::UserName)
    }

    pub fn calling_station_id(&self) -> Option<&str> {
        self.text(AttributeType::CallingStationId)
    }

    pub fn called_station_id(&self) -> Option<&str> {
        self.text(AttributeType::CalledStationId)
    }

    pub fn nas_identifier(&self) -> Option<&str> {
        self.text(AttributeType::NasIdentifier)
    }

    pub fn nas_port_id(&self) -> Option<&str> {
        self.text(AttributeType::NasPortId)
    }

    pub fn nas_ip_address(&self) -> Option<Ipv4Addr> {
        self.attribute(AttributeType::NasIpAddress)
            .and_then(Attribute::as_ipv4)
    }

    pub fn nas_port(&self) -> Option<u32> {
        self.attribute(AttributeType::NasPort)
            .and_then(Attribute::as_u32)
    }

    pub fn has_message_authenticator(&self) -> bool {
        self.attribute(AttributeType::MessageAuthenticator).is_some()
    }

    // ── Private helpers ─────────────────────────────────────────────

    /// Value placed in the authenticator field before digesting.
    fn seed(&self) -> Authenticator {
        match self.code {
            Code::AccountingRequest => ZERO_AUTHENTICATOR,
            _ => self.authenticator,
        }
    }

    /// Lay out header and attributes with `seed` in the authenticator field.
    ///
    /// Returns the buffer and the offset of the Message-Authenticator value,
    /// zeroed when `zero_message_authenticator` is set.
    fn serialize(
        &self,
        seed: &Authenticator,
        zero_message_authenticator: bool,
    ) -> Result<(Vec<u8>, Option<usize>), Error> {
        for attr in &self.attributes {
            if attr.value.len() > MAX_VALUE_LEN {
                return Err(Error::AttributeTooLong {
                    kind: attr.kind.into(),
                    len: attr.value.len(),
                });
            }
            if attr.kind == AttributeType::MessageAuthenticator
                && attr.value.len() != AUTHENTICATOR_LEN
            {
                return Err(Error::InvalidMessageAuthenticator(attr.value.len()));
            }
        }

        let len = HEADER_LEN + self.attributes.iter().map(Attribute::wire_len).sum::<usize>();
        let wire_len = u16::try_from(len)
            .ok()
            .filter(|_| len <= MAX_PACKET_LEN)
            .ok_or(Error::PacketTooLarge { len })?;

        let mut buf = BytesMut::with_capacity(len);
        buf.put_u8(self.code.into());
        buf.put_u8(self.identifier);
        buf.put_u16(wire_len);
        buf.put_slice(seed);

        let mut ma_offset = None;
        for attr in &self.attributes {
            buf.put_u8(attr.kind.into());
            // Bounded by MAX_VALUE_LEN + 2 above.
            buf.put_u8(u8::try_from(attr.wire_len()).unwrap_or(u8::MAX));
            if attr.kind == AttributeType::MessageAuthenticator {
                ma_offset = Some(buf.len());
                if zero_message_authenticator {
                    buf.put_bytes(0, AUTHENTICATOR_LEN);
                    continue;
                }
            }
            buf.put_slice(&attr.value);
        }

        Ok((buf.to_vec(), ma_offset))
    }
}

/// Walk the attribute TLVs of a packet body.
fn decode_attributes(body: &[u8]) -> Result<Vec<Attribute>, Error> {
    let mut attributes = Vec::new();
    let mut offset = 0;

    while offset < body.len() {
        let remaining = &body[offset..];
        let Some(&[kind, length]) = remaining.first_chunk::<2>() else {
            return Err(Error::InvalidAttribute {
                offset: HEADER_LEN + offset,
                length: remaining.len(),
            });
        };
        let length = usize::from(length);
        if length < 2 || length > remaining.len() {
            return Err(Error::InvalidAttribute {
                offset: HEADER_LEN + offset,
                length,
            });
        }

        attributes.push(Attribute::new(
            AttributeType::from(kind),
            &remaining[2..length],
        ));
        offset += length;
    }

    Ok(attributes)
}

// ── Tests ───────────────────────────────────────────────────────────
