//! SNMPv2c messages: version, community, and a single PDU.

use std::fmt;

use super::ber::{self, BerError, Oid, Reader};

const VERSION_2C: i64 = 1;

/// A variable binding value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    /// `INTEGER`.
    Integer(i64),
    /// `OCTET STRING`.
    OctetString(Vec<u8>),
    /// `NULL`, used as the placeholder in GET requests.
    Null,
    /// `OBJECT IDENTIFIER`.
    ObjectId(Oid),
    /// `IpAddress`.
    IpAddress([u8; 4]),
    /// `Counter32`, `Gauge32`, `TimeTicks` or `Counter64`.
    Unsigned(u64),
    /// `noSuchObject`, `noSuchInstance` or `endOfMibView`.
    Missing,
    /// Any other application type.
    Other {
        /// BER tag.
        tag: u8,
        /// Raw content.
        content: Vec<u8>,
    },
}

impl SnmpValue {
    /// Numeric interpretation, parsing textual digits when necessary.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Unsigned(value) => i64::try_from(*value).ok(),
            Self::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            Self::Null
            | Self::ObjectId(_)
            | Self::IpAddress(_)
            | Self::Missing
            | Self::Other { .. } => None,
        }
    }

    /// Textual interpretation.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::OctetString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Unsigned(value) => Some(value.to_string()),
            Self::ObjectId(oid) => Some(oid.to_string()),
            Self::IpAddress([a, b, c, d]) => Some(format!("{a}.{b}.{c}.{d}")),
            Self::Null | Self::Missing | Self::Other { .. } => None,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Integer(value) => ber::write_integer(out, *value),
            Self::OctetString(bytes) => ber::write_tlv(out, ber::OCTET_STRING, bytes),
            Self::Null | Self::Missing => ber::write_tlv(out, ber::NULL, &[]),
            Self::ObjectId(oid) => oid.encode(out),
            Self::IpAddress(octets) => ber::write_tlv(out, ber::IP_ADDRESS, octets),
            Self::Unsigned(value) => {
                let bytes = value.to_be_bytes();
                let leading = bytes.iter().take_while(|byte| **byte == 0).count().min(7);
                let (_, significant) = bytes.split_at(leading);
                let mut content = Vec::with_capacity(significant.len() + 1);
                if significant.first().is_some_and(|byte| byte & 0x80 != 0) {
                    content.push(0);
                }
                content.extend_from_slice(significant);
                ber::write_tlv(out, ber::GAUGE32, &content);
            }
            Self::Other { tag, content } => ber::write_tlv(out, *tag, content),
        }
    }

    fn decode(tag: u8, content: &[u8]) -> Result<Self, BerError> {
        Ok(match tag {
            ber::INTEGER => Self::Integer(ber::decode_integer(content)?),
            ber::OCTET_STRING => Self::OctetString(content.to_vec()),
            ber::NULL => Self::Null,
            ber::OBJECT_IDENTIFIER => Self::ObjectId(Oid::decode(content)?),
            ber::IP_ADDRESS => match content {
                [a, b, c, d] => Self::IpAddress([*a, *b, *c, *d]),
                _ => Self::Other {
                    tag,
                    content: content.to_vec(),
                },
            },
            ber::COUNTER32 | ber::GAUGE32 | ber::TIME_TICKS | ber::COUNTER64 => {
                Self::Unsigned(ber::decode_unsigned(content)?)
            }
            ber::NO_SUCH_OBJECT | ber::NO_SUCH_INSTANCE | ber::END_OF_MIB_VIEW => Self::Missing,
            other => Self::Other {
                tag: other,
                content: content.to_vec(),
            },
        })
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => formatter.write_str(&text),
            None => write!(formatter, "{self:?}"),
        }
    }
}

/// PDU kinds this client sends or accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    /// `GetRequest-PDU`.
    Get,
    /// `Response-PDU`.
    Response,
    /// `SetRequest-PDU`.
    Set,
}

impl PduKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Get => 0xa0,
            Self::Response => 0xa2,
            Self::Set => 0xa3,
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xa0 => Some(Self::Get),
            0xa2 => Some(Self::Response),
            0xa3 => Some(Self::Set),
            _ => None,
        }
    }
}

/// A community-authenticated SNMPv2c message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpMessage {
    /// Community string.
    pub community: String,
    /// PDU type.
    pub kind: PduKind,
    /// Correlates a response with its request.
    pub request_id: i32,
    /// Agent-reported error status; zero on success.
    pub error_status: i64,
    /// One-based index of the binding that caused the error.
    pub error_index: i64,
    /// Variable bindings.
    pub bindings: Vec<(Oid, SnmpValue)>,
}

impl SnmpMessage {
    /// Builds a request with a single binding.
    #[must_use]
    pub fn request(
        kind: PduKind,
        community: &str,
        request_id: i32,
        oid: Oid,
        value: SnmpValue,
    ) -> Self {
        Self {
            community: community.to_owned(),
            kind,
            request_id,
            error_status: 0,
            error_index: 0,
            bindings: vec![(oid, value)],
        }
    }

    /// Encodes the message for transmission.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bindings = Vec::new();
        for (oid, value) in &self.bindings {
            let mut binding = Vec::new();
            oid.encode(&mut binding);
            value.encode(&mut binding);
            ber::write_tlv(&mut bindings, ber::SEQUENCE, &binding);
        }

        let mut pdu = Vec::new();
        ber::write_integer(&mut pdu, i64::from(self.request_id));
        ber::write_integer(&mut pdu, self.error_status);
        ber::write_integer(&mut pdu, self.error_index);
        ber::write_tlv(&mut pdu, ber::SEQUENCE, &bindings);

        let mut message = Vec::new();
        ber::write_integer(&mut message, VERSION_2C);
        ber::write_tlv(&mut message, ber::OCTET_STRING, self.community.as_bytes());
        ber::write_tlv(&mut message, self.kind.tag(), &pdu);

        let mut out = Vec::with_capacity(message.len() + 4);
        ber::write_tlv(&mut out, ber::SEQUENCE, &message);
        out
    }

    /// Decodes a received datagram.
    ///
    /// # Errors
    ///
    /// Returns a [`BerError`] when the datagram is not a well-formed message.
    pub fn decode(datagram: &[u8]) -> Result<Self, BerError> {
        let mut outer = Reader::new(datagram);
        let mut message = Reader::new(outer.read(ber::SEQUENCE)?);
        let _version = message.read_integer()?;
        let community = String::from_utf8_lossy(message.read(ber::OCTET_STRING)?).into_owned();
        let (pdu_tag, pdu_content) = message.read_any()?;
        let kind = PduKind::from_tag(pdu_tag).ok_or(BerError::UnexpectedTag {
            expected: PduKind::Response.tag(),
            found: pdu_tag,
        })?;

        let mut pdu = Reader::new(pdu_content);
        let request_id = pdu.read_integer()?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;
        let mut list = Reader::new(pdu.read(ber::SEQUENCE)?);
        let mut bindings = Vec::new();
        while !list.is_empty() {
            let mut binding = Reader::new(list.read(ber::SEQUENCE)?);
            let oid = Oid::decode(binding.read(ber::OBJECT_IDENTIFIER)?)?;
            let (tag, content) = binding.read_any()?;
            bindings.push((oid, SnmpValue::decode(tag, content)?));
        }

        Ok(Self {
            community,
            kind,
            request_id: i32::try_from(request_id).map_err(|_| BerError::IntegerOverflow)?,
            error_status,
            error_index,
            bindings,
        })
    }
}
