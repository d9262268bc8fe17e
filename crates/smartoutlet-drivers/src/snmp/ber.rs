//! Basic Encoding Rules primitives for the subset of ASN.1 SNMP needs.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub(crate) const INTEGER: u8 = 0x02;
pub(crate) const OCTET_STRING: u8 = 0x04;
pub(crate) const NULL: u8 = 0x05;
pub(crate) const OBJECT_IDENTIFIER: u8 = 0x06;
pub(crate) const SEQUENCE: u8 = 0x30;
pub(crate) const IP_ADDRESS: u8 = 0x40;
pub(crate) const COUNTER32: u8 = 0x41;
pub(crate) const GAUGE32: u8 = 0x42;
pub(crate) const TIME_TICKS: u8 = 0x43;
pub(crate) const COUNTER64: u8 = 0x46;
pub(crate) const NO_SUCH_OBJECT: u8 = 0x80;
pub(crate) const NO_SUCH_INSTANCE: u8 = 0x81;
pub(crate) const END_OF_MIB_VIEW: u8 = 0x82;

/// Decoding failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BerError {
    /// The input ended inside an element.
    #[error("truncated BER element")]
    Truncated,
    /// An element carried a different tag than the grammar requires.
    #[error("unexpected BER tag 0x{found:02x}, expected 0x{expected:02x}")]
    UnexpectedTag {
        /// Tag the grammar requires.
        expected: u8,
        /// Tag actually present.
        found: u8,
    },
    /// Indefinite or oversized length.
    #[error("unsupported BER length encoding")]
    UnsupportedLength,
    /// An integer does not fit in 64 bits.
    #[error("BER integer overflows 64 bits")]
    IntegerOverflow,
    /// An object identifier is empty or badly terminated.
    #[error("malformed object identifier")]
    MalformedOid,
}

/// A dotted object identifier such as `1.3.6.1.2.1.1.1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(Vec<u64>);

impl Oid {
    /// Builds an identifier from its arcs.
    #[must_use]
    pub fn from_arcs(arcs: &[u64]) -> Self {
        Self(arcs.to_vec())
    }

    /// Arcs of the identifier.
    #[must_use]
    pub fn arcs(&self) -> &[u64] {
        &self.0
    }

    /// Returns a copy with one more arc appended.
    #[must_use]
    pub fn child(&self, arc: u64) -> Self {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Self(arcs)
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        let mut content = Vec::new();
        let mut arcs = self.0.iter().copied();
        let first = arcs.next().unwrap_or(0);
        let second = arcs.next().unwrap_or(0);
        write_base128(&mut content, first * 40 + second);
        for arc in arcs {
            write_base128(&mut content, arc);
        }
        write_tlv(out, OBJECT_IDENTIFIER, &content);
    }

    pub(crate) fn decode(content: &[u8]) -> Result<Self, BerError> {
        let mut arcs = Vec::new();
        let mut current: u64 = 0;
        let mut pending = false;
        for byte in content {
            current = current
                .checked_mul(128)
                .ok_or(BerError::MalformedOid)?
                .saturating_add(u64::from(byte & 0x7f));
            pending = byte & 0x80 != 0;
            if !pending {
                if arcs.is_empty() {
                    let first = (current / 40).min(2);
                    arcs.push(first);
                    arcs.push(current - first * 40);
                } else {
                    arcs.push(current);
                }
                current = 0;
            }
        }
        if pending || arcs.is_empty() {
            return Err(BerError::MalformedOid);
        }
        Ok(Self(arcs))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.0.iter();
        if let Some(first) = arcs.next() {
            write!(formatter, "{first}")?;
        }
        for arc in arcs {
            write!(formatter, ".{arc}")?;
        }
        Ok(())
    }
}

/// Error returned when dotted text is not an object identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{text}' is not a dotted object identifier")]
pub struct OidParseError {
    text: String,
}

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || OidParseError {
            text: text.to_owned(),
        };
        let trimmed = text.strip_prefix('.').unwrap_or(text);
        let arcs = trimmed
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        match arcs.as_slice() {
            [first, second, ..] if *first <= 2 && (*first == 2 || *second < 40) => Ok(Self(arcs)),
            _ => Err(invalid()),
        }
    }
}

/// Appends a tag-length-value element.
pub(crate) fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

/// Appends a minimal two's complement integer element.
pub(crate) fn write_integer(out: &mut Vec<u8>, value: i64) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start + 1 < bytes.len() {
        let (Some(&current), Some(&next)) = (bytes.get(start), bytes.get(start + 1)) else {
            break;
        };
        let redundant = (current == 0x00 && next & 0x80 == 0) || (current == 0xff && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    let (_, significant) = bytes.split_at(start);
    write_tlv(out, INTEGER, significant);
}

fn write_length(out: &mut Vec<u8>, length: usize) {
    if let Ok(short) = u8::try_from(length)
        && short < 0x80
    {
        out.push(short);
        return;
    }
    let bytes = length.to_be_bytes();
    let leading = bytes.iter().take_while(|byte| **byte == 0).count();
    let (_, significant) = bytes.split_at(leading);
    let count = u8::try_from(significant.len()).unwrap_or(u8::MAX);
    out.push(0x80 | count);
    out.extend_from_slice(significant);
}

fn write_base128(out: &mut Vec<u8>, value: u64) {
    let mut groups = vec![value & 0x7f];
    let mut remaining = value >> 7;
    while remaining > 0 {
        groups.push((remaining & 0x7f) | 0x80);
        remaining >>= 7;
    }
    out.extend(
        groups
            .iter()
            .rev()
            .map(|group| u8::try_from(*group).unwrap_or(u8::MAX)),
    );
}

/// Decodes a two's complement integer body.
pub(crate) fn decode_integer(content: &[u8]) -> Result<i64, BerError> {
    if content.is_empty() {
        return Err(BerError::Truncated);
    }
    if content.len() > 8 {
        return Err(BerError::IntegerOverflow);
    }
    let negative = content.first().is_some_and(|byte| byte & 0x80 != 0);
    let mut value: i64 = if negative { -1 } else { 0 };
    for byte in content {
        value = (value << 8) | i64::from(*byte);
    }
    Ok(value)
}

/// Decodes an unsigned application integer body (counters, gauges, ticks).
pub(crate) fn decode_unsigned(content: &[u8]) -> Result<u64, BerError> {
    let trimmed = match content {
        [0, rest @ ..] if !rest.is_empty() => rest,
        other => other,
    };
    if trimmed.len() > 8 {
        return Err(BerError::IntegerOverflow);
    }
    Ok(trimmed
        .iter()
        .fold(0_u64, |value, byte| (value << 8) | u64::from(*byte)))
}

/// Cursor over a BER byte stream.
#[derive(Debug)]
pub(crate) struct Reader<'a> {
    remaining: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { remaining: bytes }
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Reads the next element, returning its tag and content.
    pub(crate) fn read_any(&mut self) -> Result<(u8, &'a [u8]), BerError> {
        let (&tag, rest) = self.remaining.split_first().ok_or(BerError::Truncated)?;
        let (length, rest) = read_length(rest)?;
        if rest.len() < length {
            return Err(BerError::Truncated);
        }
        let (content, rest) = rest.split_at(length);
        self.remaining = rest;
        Ok((tag, content))
    }

    /// Reads the next element, requiring `expected` as its tag.
    pub(crate) fn read(&mut self, expected: u8) -> Result<&'a [u8], BerError> {
        let (found, content) = self.read_any()?;
        if found == expected {
            Ok(content)
        } else {
            Err(BerError::UnexpectedTag { expected, found })
        }
    }

    pub(crate) fn read_integer(&mut self) -> Result<i64, BerError> {
        decode_integer(self.read(INTEGER)?)
    }
}

fn read_length(bytes: &[u8]) -> Result<(usize, &[u8]), BerError> {
    let (&first, rest) = bytes.split_first().ok_or(BerError::Truncated)?;
    if first & 0x80 == 0 {
        return Ok((usize::from(first), rest));
    }
    let count = usize::from(first & 0x7f);
    if count == 0 || count > std::mem::size_of::<usize>() {
        return Err(BerError::UnsupportedLength);
    }
    if rest.len() < count {
        return Err(BerError::Truncated);
    }
    let (length_bytes, rest) = rest.split_at(count);
    let length = length_bytes
        .iter()
        .fold(0_usize, |length, byte| (length << 8) | usize::from(*byte));
    Ok((length, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, &[0x02, 0x01, 0x00])]
    #[case(127, &[0x02, 0x01, 0x7f])]
    #[case(128, &[0x02, 0x02, 0x00, 0x80])]
    #[case(-1, &[0x02, 0x01, 0xff])]
    #[case(-129, &[0x02, 0x02, 0xff, 0x7f])]
    fn integers_use_minimal_encoding(#[case] value: i64, #[case] expected: &[u8]) {
        let mut out = Vec::new();
        write_integer(&mut out, value);
        assert_eq!(out, expected);
        let mut reader = Reader::new(&out);
        assert_eq!(reader.read_integer(), Ok(value));
    }

    #[test]
    fn oid_encoding_matches_reference_bytes() {
        let oid: Oid = "1.3.6.1.4.1.318".parse().expect("oid parses");
        let mut out = Vec::new();
        oid.encode(&mut out);
        assert_eq!(out, [0x06_u8, 0x07, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x3e]);
        let mut reader = Reader::new(&out);
        let content = reader.read(OBJECT_IDENTIFIER).expect("oid element");
        assert_eq!(Oid::decode(content), Ok(oid));
    }

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("1.3.six")]
    #[case("4.1")]
    fn malformed_oids_are_rejected(#[case] text: &str) {
        assert!(text.parse::<Oid>().is_err());
    }

    #[test]
    fn leading_dot_is_accepted() {
        let oid: Oid = ".1.3.6".parse().expect("oid parses");
        assert_eq!(oid.to_string(), "1.3.6");
        assert_eq!(oid.child(7).to_string(), "1.3.6.7");
    }

    #[test]
    fn long_form_lengths_round_trip() {
        let content = vec![0x41; 300];
        let mut out = Vec::new();
        write_tlv(&mut out, OCTET_STRING, &content);
        assert_eq!(out.get(..4), Some(&[0x04_u8, 0x82, 0x01, 0x2c][..]));
        let mut reader = Reader::new(&out);
        assert_eq!(reader.read(OCTET_STRING), Ok(content.as_slice()));
        assert!(reader.is_empty());
    }

    #[test]
    fn truncated_elements_are_rejected() {
        let mut reader = Reader::new(&[0x04, 0x05, 0x61]);
        assert_eq!(reader.read(OCTET_STRING), Err(BerError::Truncated));
    }

    #[test]
    fn unsigned_values_ignore_sign_padding() {
        assert_eq!(decode_unsigned(&[0x00, 0xff, 0xff, 0xff, 0xff]), Ok(0xffff_ffff));
    }
}
