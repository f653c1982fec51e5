//! BER codec for SNMP v1/v2c messages
//!
//! Covers what a single-varbind GET exchange needs:
//! - GetRequest / Response PDUs
//! - universal types (INTEGER, OCTET STRING, NULL, OBJECT IDENTIFIER)
//! - application types (IpAddress, Counter32, Gauge32, TimeTicks, Opaque, Counter64)
//! - v2c exception values (noSuchObject, noSuchInstance, endOfMibView)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_OPAQUE: u8 = 0x44;
const TAG_COUNTER64: u8 = 0x46;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;
const TAG_GET_REQUEST: u8 = 0xA0;
const TAG_RESPONSE: u8 = 0xA2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("truncated message at offset {0}")]
    Truncated(usize),
    #[error("unexpected tag 0x{found:02x} at offset {offset} (expected 0x{expected:02x})")]
    UnexpectedTag { offset: usize, expected: u8, found: u8 },
    #[error("unsupported length encoding at offset {0}")]
    BadLength(usize),
    #[error("integer does not fit in 64 bits")]
    IntegerOverflow,
    #[error("invalid object identifier: {0}")]
    InvalidOid(String),
    #[error("unsupported value type 0x{0:02x}")]
    UnsupportedValue(u8),
    #[error("unsupported PDU type 0x{0:02x}")]
    UnsupportedPdu(u8),
    #[error("unsupported SNMP version {0}")]
    UnsupportedVersion(i64),
    #[error("trailing bytes after message")]
    TrailingBytes,
}

/// Protocol version carried in the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Version {
    #[default]
    #[serde(rename = "1", alias = "v1")]
    V1,
    #[serde(rename = "2c", alias = "v2c")]
    V2c,
}

impl Version {
    fn wire(self) -> i64 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
        }
    }

    fn from_wire(value: i64) -> Result<Self, CodecError> {
        match value {
            0 => Ok(Version::V1),
            1 => Ok(Version::V2c),
            other => Err(CodecError::UnsupportedVersion(other)),
        }
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(Version::V1),
            "2" | "2c" | "v2c" => Ok(Version::V2c),
            other => Err(format!("unknown SNMP version `{other}` (expected 1 or 2c)")),
        }
    }
}

/// Object identifier, e.g. `1.3.6.1.2.1.1.3.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        let first = u64::from(self.0[0]) * 40 + u64::from(self.0[1]);
        encode_base128(first, &mut out);
        for arc in &self.0[2..] {
            encode_base128(u64::from(*arc), &mut out);
        }
        out
    }

    fn decode(content: &[u8]) -> Result<Self, CodecError> {
        if content.is_empty() {
            return Err(CodecError::InvalidOid("empty".into()));
        }
        let mut subids = Vec::new();
        let mut acc: u64 = 0;
        let mut pending = false;
        for byte in content {
            if acc > (u64::MAX >> 7) {
                return Err(CodecError::InvalidOid("sub-identifier overflow".into()));
            }
            acc = (acc << 7) | u64::from(byte & 0x7f);
            pending = byte & 0x80 != 0;
            if !pending {
                subids.push(acc);
                acc = 0;
            }
        }
        if pending {
            return Err(CodecError::InvalidOid("unterminated sub-identifier".into()));
        }

        let first = subids[0];
        let (a, b) = match first {
            0..=39 => (0, first),
            40..=79 => (1, first - 40),
            _ => (2, first - 80),
        };
        let mut arcs = Vec::with_capacity(subids.len() + 1);
        arcs.push(a);
        for value in std::iter::once(b).chain(subids[1..].iter().copied()) {
            let arc = u32::try_from(value)
                .map_err(|_| CodecError::InvalidOid(format!("arc {value} out of range")))?;
            arcs.push(arc);
        }
        Ok(Oid(arcs))
    }
}

impl FromStr for Oid {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        let arcs = trimmed
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| CodecError::InvalidOid(s.to_string()))?;

        if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
            return Err(CodecError::InvalidOid(s.to_string()));
        }
        Ok(Oid(arcs))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}

/// Varbind value as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// Integer view of the value. Octet strings holding a decimal number are
    /// accepted since some PDUs report their counters as display strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(i64::from(*v)),
            Value::Counter64(v) => i64::try_from(*v).ok(),
            Value::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Name of the v2c exception carried in place of a value, if any.
    pub fn exception(&self) -> Option<&'static str> {
        match self {
            Value::NoSuchObject => Some("noSuchObject"),
            Value::NoSuchInstance => Some("noSuchInstance"),
            Value::EndOfMibView => Some("endOfMibView"),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::OctetString(_) => "OCTET STRING",
            Value::Null => "NULL",
            Value::ObjectId(_) => "OBJECT IDENTIFIER",
            Value::IpAddress(_) => "IpAddress",
            Value::Counter32(_) => "Counter32",
            Value::Gauge32(_) => "Gauge32",
            Value::TimeTicks(_) => "TimeTicks",
            Value::Opaque(_) => "Opaque",
            Value::Counter64(_) => "Counter64",
            Value::NoSuchObject => "noSuchObject",
            Value::NoSuchInstance => "noSuchInstance",
            Value::EndOfMibView => "endOfMibView",
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::Integer(v) => write_tlv(out, TAG_INTEGER, &encode_signed(*v)),
            Value::OctetString(bytes) => write_tlv(out, TAG_OCTET_STRING, bytes),
            Value::Null => write_tlv(out, TAG_NULL, &[]),
            Value::ObjectId(oid) => write_tlv(out, TAG_OID, &oid.encode()),
            Value::IpAddress(ip) => write_tlv(out, TAG_IP_ADDRESS, ip),
            Value::Counter32(v) => write_tlv(out, TAG_COUNTER32, &encode_unsigned(u64::from(*v))),
            Value::Gauge32(v) => write_tlv(out, TAG_GAUGE32, &encode_unsigned(u64::from(*v))),
            Value::TimeTicks(v) => write_tlv(out, TAG_TIMETICKS, &encode_unsigned(u64::from(*v))),
            Value::Opaque(bytes) => write_tlv(out, TAG_OPAQUE, bytes),
            Value::Counter64(v) => write_tlv(out, TAG_COUNTER64, &encode_unsigned(*v)),
            Value::NoSuchObject => write_tlv(out, TAG_NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => write_tlv(out, TAG_NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => write_tlv(out, TAG_END_OF_MIB_VIEW, &[]),
        }
    }

    fn decode(tag: u8, content: &[u8]) -> Result<Self, CodecError> {
        let value = match tag {
            TAG_INTEGER => Value::Integer(decode_signed(content)?),
            TAG_OCTET_STRING => Value::OctetString(content.to_vec()),
            TAG_NULL => Value::Null,
            TAG_OID => Value::ObjectId(Oid::decode(content)?),
            TAG_IP_ADDRESS => {
                let ip: [u8; 4] = content.try_into().map_err(|_| CodecError::BadLength(0))?;
                Value::IpAddress(ip)
            }
            TAG_COUNTER32 => Value::Counter32(decode_u32(content)?),
            TAG_GAUGE32 => Value::Gauge32(decode_u32(content)?),
            TAG_TIMETICKS => Value::TimeTicks(decode_u32(content)?),
            TAG_OPAQUE => Value::Opaque(content.to_vec()),
            TAG_COUNTER64 => Value::Counter64(decode_unsigned(content)?),
            TAG_NO_SUCH_OBJECT => Value::NoSuchObject,
            TAG_NO_SUCH_INSTANCE => Value::NoSuchInstance,
            TAG_END_OF_MIB_VIEW => Value::EndOfMibView,
            other => return Err(CodecError::UnsupportedValue(other)),
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    GetRequest,
    Response,
}

impl PduKind {
    fn tag(self) -> u8 {
        match self {
            PduKind::GetRequest => TAG_GET_REQUEST,
            PduKind::Response => TAG_RESPONSE,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            TAG_GET_REQUEST => Ok(PduKind::GetRequest),
            TAG_RESPONSE => Ok(PduKind::Response),
            other => Err(CodecError::UnsupportedPdu(other)),
        }
    }
}

/// `error-status` field of a PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorStatus(pub i64);

impl ErrorStatus {
    pub const NO_ERROR: ErrorStatus = ErrorStatus(0);
    pub const NO_SUCH_NAME: ErrorStatus = ErrorStatus(2);
    pub const GEN_ERR: ErrorStatus = ErrorStatus(5);

    pub fn is_error(self) -> bool {
        self.0 != 0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "noError",
            1 => "tooBig",
            2 => "noSuchName",
            3 => "badValue",
            4 => "readOnly",
            5 => "genErr",
            6 => "noAccess",
            7 => "wrongType",
            8 => "wrongLength",
            9 => "wrongEncoding",
            10 => "wrongValue",
            11 => "noCreation",
            12 => "inconsistentValue",
            13 => "resourceUnavailable",
            14 => "commitFailed",
            15 => "undoFailed",
            16 => "authorizationError",
            17 => "notWritable",
            18 => "inconsistentName",
            _ => "unknownError",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduKind,
    pub request_id: i32,
    pub error_status: ErrorStatus,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: Version,
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl Message {
    /// GetRequest for a single object.
    pub fn get_request(version: Version, community: &str, request_id: i32, oid: Oid) -> Self {
        Message {
            version,
            community: community.as_bytes().to_vec(),
            pdu: Pdu {
                kind: PduKind::GetRequest,
                request_id,
                error_status: ErrorStatus::NO_ERROR,
                error_index: 0,
                varbinds: vec![VarBind { oid, value: Value::Null }],
            },
        }
    }

    /// Response echoing this request's header, carrying `varbinds`.
    pub fn response(&self, error_status: ErrorStatus, error_index: i64, varbinds: Vec<VarBind>) -> Self {
        Message {
            version: self.version,
            community: self.community.clone(),
            pdu: Pdu {
                kind: PduKind::Response,
                request_id: self.pdu.request_id,
                error_status,
                error_index,
                varbinds,
            },
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut list = Vec::new();
        for vb in &self.pdu.varbinds {
            let mut bind = Vec::new();
            write_tlv(&mut bind, TAG_OID, &vb.oid.encode());
            vb.value.encode(&mut bind);
            write_tlv(&mut list, TAG_SEQUENCE, &bind);
        }

        let mut pdu = Vec::new();
        write_tlv(&mut pdu, TAG_INTEGER, &encode_signed(i64::from(self.pdu.request_id)));
        write_tlv(&mut pdu, TAG_INTEGER, &encode_signed(self.pdu.error_status.0));
        write_tlv(&mut pdu, TAG_INTEGER, &encode_signed(self.pdu.error_index));
        write_tlv(&mut pdu, TAG_SEQUENCE, &list);

        let mut body = Vec::new();
        write_tlv(&mut body, TAG_INTEGER, &encode_signed(self.version.wire()));
        write_tlv(&mut body, TAG_OCTET_STRING, &self.community);
        write_tlv(&mut body, self.pdu.kind.tag(), &pdu);

        let mut out = Vec::with_capacity(body.len() + 4);
        write_tlv(&mut out, TAG_SEQUENCE, &body);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut outer = Reader::new(buf);
        let body = outer.read_tagged(TAG_SEQUENCE)?;
        if !outer.is_empty() {
            return Err(CodecError::TrailingBytes);
        }

        let mut r = Reader::new(body);
        let version = Version::from_wire(decode_signed(r.read_tagged(TAG_INTEGER)?)?)?;
        let community = r.read_tagged(TAG_OCTET_STRING)?.to_vec();
        let (tag, pdu_body) = r.read_tlv()?;
        let kind = PduKind::from_tag(tag)?;

        let mut p = Reader::new(pdu_body);
        let request_id = i32::try_from(decode_signed(p.read_tagged(TAG_INTEGER)?)?)
            .map_err(|_| CodecError::IntegerOverflow)?;
        let error_status = ErrorStatus(decode_signed(p.read_tagged(TAG_INTEGER)?)?);
        let error_index = decode_signed(p.read_tagged(TAG_INTEGER)?)?;

        let mut list = Reader::new(p.read_tagged(TAG_SEQUENCE)?);
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut bind = Reader::new(list.read_tagged(TAG_SEQUENCE)?);
            let oid = Oid::decode(bind.read_tagged(TAG_OID)?)?;
            let (value_tag, content) = bind.read_tlv()?;
            varbinds.push(VarBind { oid, value: Value::decode(value_tag, content)? });
        }

        Ok(Message {
            version,
            community,
            pdu: Pdu { kind, request_id, error_status, error_index, varbinds },
        })
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn byte(&mut self) -> Result<u8, CodecError> {
        let b = *self.buf.get(self.pos).ok_or(CodecError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), CodecError> {
        let tag = self.byte()?;
        let first = self.byte()?;
        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7f);
            if count == 0 || count > 4 {
                return Err(CodecError::BadLength(self.pos - 1));
            }
            let mut len = 0usize;
            for _ in 0..count {
                len = (len << 8) | usize::from(self.byte()?);
            }
            len
        };

        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(CodecError::Truncated(self.buf.len()))?;
        let content = &self.buf[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    fn read_tagged(&mut self, expected: u8) -> Result<&'a [u8], CodecError> {
        let offset = self.pos;
        let (found, content) = self.read_tlv()?;
        if found != expected {
            return Err(CodecError::UnexpectedTag { offset, expected, found });
        }
        Ok(content)
    }
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

fn encode_base128(mut value: u64, out: &mut Vec<u8>) {
    let mut chunk = [0u8; 10];
    let mut i = chunk.len();
    loop {
        i -= 1;
        chunk[i] = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = chunk.len() - 1;
    for (idx, byte) in chunk.iter().enumerate().skip(i) {
        out.push(if idx == last { *byte } else { byte | 0x80 });
    }
}

fn encode_signed(value: i64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    // Drop redundant sign bytes (two's complement, minimal form).
    while bytes.len() > 1
        && ((bytes[0] == 0x00 && bytes[1] & 0x80 == 0) || (bytes[0] == 0xff && bytes[1] & 0x80 != 0))
    {
        bytes.remove(0);
    }
    bytes
}

fn encode_unsigned(value: u64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 && bytes[1] & 0x80 == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    bytes
}

fn decode_signed(content: &[u8]) -> Result<i64, CodecError> {
    if content.is_empty() {
        return Err(CodecError::Truncated(0));
    }
    if content.len() > 8 {
        return Err(CodecError::IntegerOverflow);
    }
    let init: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(content.iter().fold(init, |acc, b| (acc << 8) | i64::from(*b)))
}

fn decode_unsigned(content: &[u8]) -> Result<u64, CodecError> {
    if content.is_empty() {
        return Err(CodecError::Truncated(0));
    }
    let digits = match content {
        [0, rest @ ..] if !rest.is_empty() => rest,
        _ => content,
    };
    if digits.len() > 8 {
        return Err(CodecError::IntegerOverflow);
    }
    Ok(digits.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_u32(content: &[u8]) -> Result<u32, CodecError> {
    u32::try_from(decode_unsigned(content)?).map_err(|_| CodecError::IntegerOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    // sysUpTime.0, community "public", SNMPv1, request-id 1
    const GET_SYSUPTIME: [u8; 40] = [
        0x30, 0x26, 0x02, 0x01, 0x00, 0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', 0xa0, 0x19,
        0x02, 0x01, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x0e, 0x30, 0x0c, 0x06, 0x08,
        0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x03, 0x00, 0x05, 0x00,
    ];

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    #[test]
    fn test_get_request_wire_format() {
        let msg = Message::get_request(Version::V1, "public", 1, oid("1.3.6.1.2.1.1.3.0"));
        assert_eq!(msg.encode(), GET_SYSUPTIME.to_vec());
    }

    #[test]
    fn test_decode_get_request() {
        let msg = Message::decode(&GET_SYSUPTIME).unwrap();
        assert_eq!(msg.version, Version::V1);
        assert_eq!(msg.community, b"public");
        assert_eq!(msg.pdu.kind, PduKind::GetRequest);
        assert_eq!(msg.pdu.request_id, 1);
        assert_eq!(msg.pdu.varbinds[0].oid.to_string(), "1.3.6.1.2.1.1.3.0");
        assert_eq!(msg.pdu.varbinds[0].value, Value::Null);
    }

    #[test]
    fn test_response_with_gauge_value() {
        let request = Message::get_request(Version::V2c, "private", 4242, oid("1.3.6.1.4.1.318.1.1.12.1.16.0"));
        let response = request.response(
            ErrorStatus::NO_ERROR,
            0,
            vec![VarBind { oid: oid("1.3.6.1.4.1.318.1.1.12.1.16.0"), value: Value::Gauge32(153) }],
        );

        let decoded = Message::decode(&response.encode()).unwrap();
        assert_eq!(decoded.pdu.kind, PduKind::Response);
        assert_eq!(decoded.pdu.request_id, 4242);
        assert_eq!(decoded.version, Version::V2c);
        assert_eq!(decoded.pdu.varbinds[0].value.as_i64(), Some(153));
    }

    #[test]
    fn test_error_status_and_exceptions_survive_decoding() {
        let request = Message::get_request(Version::V1, "public", 7, oid("1.3.6.1.4.1.9.9.9"));
        let failed = request.response(ErrorStatus::NO_SUCH_NAME, 1, request.pdu.varbinds.clone());
        let decoded = Message::decode(&failed.encode()).unwrap();
        assert!(decoded.pdu.error_status.is_error());
        assert_eq!(decoded.pdu.error_status.name(), "noSuchName");
        assert_eq!(decoded.pdu.error_index, 1);

        let missing = request.response(
            ErrorStatus::NO_ERROR,
            0,
            vec![VarBind { oid: oid("1.3.6.1.4.1.9.9.9"), value: Value::NoSuchObject }],
        );
        let decoded = Message::decode(&missing.encode()).unwrap();
        assert_eq!(decoded.pdu.varbinds[0].value.exception(), Some("noSuchObject"));
    }

    #[test]
    fn test_integer_encoding_is_minimal() {
        assert_eq!(encode_signed(0), vec![0x00]);
        assert_eq!(encode_signed(127), vec![0x7f]);
        assert_eq!(encode_signed(128), vec![0x00, 0x80]);
        assert_eq!(encode_signed(-1), vec![0xff]);
        assert_eq!(encode_signed(-129), vec![0xff, 0x7f]);
        assert_eq!(encode_unsigned(u64::from(u32::MAX)), vec![0x00, 0xff, 0xff, 0xff, 0xff]);

        for v in [0i64, 1, -1, 255, -256, 65_535, i64::from(i32::MIN), i64::MAX, i64::MIN] {
            assert_eq!(decode_signed(&encode_signed(v)).unwrap(), v);
        }
        assert_eq!(decode_unsigned(&encode_unsigned(u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_long_form_length() {
        let community = "c".repeat(200);
        let msg = Message::get_request(Version::V2c, &community, 9, oid("1.3.6.1.2.1.1.5.0"));
        let bytes = msg.encode();
        assert_eq!(bytes[1], 0x81);
        assert_eq!(Message::decode(&bytes).unwrap().community.len(), 200);
    }

    #[test]
    fn test_oid_parsing() {
        assert_eq!(oid(".1.3.6.1.2.1").to_string(), "1.3.6.1.2.1");
        assert!("1".parse::<Oid>().is_err());
        assert!("1.40.1".parse::<Oid>().is_err());
        assert!("1.3.six".parse::<Oid>().is_err());
        assert!("3.1.1".parse::<Oid>().is_err());

        // multi-byte sub-identifiers (318 = APC enterprise)
        let apc = oid("1.3.6.1.4.1.318.1.1.26.4.3.1.5.1");
        assert_eq!(Oid::decode(&apc.encode()).unwrap(), apc);
    }

    #[test]
    fn test_octet_string_counters() {
        assert_eq!(Value::OctetString(b" 2000 ".to_vec()).as_i64(), Some(2000));
        assert_eq!(Value::OctetString(b"n/a".to_vec()).as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
        assert_eq!(Value::Counter64(u64::MAX).as_i64(), None);
    }

    #[test]
    fn test_truncated_and_trailing_input() {
        assert!(matches!(Message::decode(&GET_SYSUPTIME[..20]), Err(CodecError::Truncated(_))));

        let mut padded = GET_SYSUPTIME.to_vec();
        padded.push(0x00);
        assert_eq!(Message::decode(&padded), Err(CodecError::TrailingBytes));
    }

    #[test]
    fn test_unsupported_pdu_tag() {
        // same message with the PDU retagged as GetNextRequest
        let mut bytes = GET_SYSUPTIME.to_vec();
        let pdu_at = bytes.iter().position(|b| *b == 0xA0).unwrap();
        bytes[pdu_at] = 0xA1;
        assert_eq!(Message::decode(&bytes), Err(CodecError::UnsupportedPdu(0xA1)));
    }

    #[test]
    fn test_version_from_str() {
        assert_eq!("2c".parse::<Version>().unwrap(), Version::V2c);
        assert_eq!("v1".parse::<Version>().unwrap(), Version::V1);
        assert!("3".parse::<Version>().is_err());
    }
}
