/*
 * SPDX-FileCopyrightText: © 2024 srec-boots-rs contributors
 *
 * SPDX-License-Identifier: MIT OR Apache-2.0
 */

//! Motorola S-record line decoding and validation.
//!
//! ```text
//! S 1 13 7AF0 0A0A0D0000000000000000000000000000 61
//! | | |  |    |                                  |
//! | | |  |    data (byte_count - address - 1)    checksum
//! | | |  address (4, 6 or 8 hex digits)
//! | | byte_count (address + data + checksum bytes)
//! | record type
//! start code
//! ```
//!
//! Only upper case hex digits are accepted. Any character outside `0-9A-F` in a decoded field
//! fails the whole line.

use core::fmt;

use heapless::Vec;

use super::flash_layout::WORD_SIZE;

pub const START_CODE: u8 = b'S';

const START_CODE_OFFSET: usize = 0;
const RECORD_TYPE_OFFSET: usize = 1;
const BYTE_COUNT_OFFSET: usize = 2;
const ADDRESS_FIELD_OFFSET: usize = 4;

/// Largest payload a single record can carry (`0xFF` minus address and checksum bytes).
pub const MAX_DATA_LEN: usize = 255 - 3;
/// Longest well formed line in characters, `(0xFF + 2) * 2`.
pub const MAX_LINE_LEN: usize = (u8::MAX as usize + 2) * 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
#[repr(u8)]
pub enum RecordKind {
    /// S0
    Header = 0,
    /// S1
    Data16 = 1,
    /// S2
    Data24 = 2,
    /// S3
    Data32 = 3,
    /// S4
    Reserved = 4,
    /// S5
    Count16 = 5,
    /// S6
    Count24 = 6,
    /// S7, terminates an S3 series
    Term32 = 7,
    /// S8, terminates an S2 series
    Term24 = 8,
    /// S9, terminates an S1 series
    Term16 = 9,
}

impl TryFrom<u8> for RecordKind {
    type Error = RecordError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Header),
            1 => Ok(Self::Data16),
            2 => Ok(Self::Data24),
            3 => Ok(Self::Data32),
            4 => Ok(Self::Reserved),
            5 => Ok(Self::Count16),
            6 => Ok(Self::Count24),
            7 => Ok(Self::Term32),
            8 => Ok(Self::Term24),
            9 => Ok(Self::Term16),
            _ => Err(RecordError::UnknownRecordType(value)),
        }
    }
}

impl RecordKind {
    /// Width of the address field in bytes.
    ///
    /// The header keeps a 16-bit field on the line but it is skipped, not decoded.
    pub const fn address_bytes(self) -> usize {
        match self {
            Self::Header | Self::Data16 | Self::Count16 | Self::Term16 => 2,
            Self::Data24 | Self::Count24 | Self::Term24 => 3,
            Self::Data32 | Self::Term32 => 4,
            Self::Reserved => 0,
        }
    }

    /// Bytes counted by `byte_count` that are not payload: address plus checksum.
    pub const fn non_data_bytes(self) -> usize {
        self.address_bytes() + 1
    }

    /// Offset of the first payload character on the line.
    pub const fn data_offset(self) -> usize {
        ADDRESS_FIELD_OFFSET + self.address_bytes() * 2
    }

    pub const fn carries_data(self) -> bool {
        matches!(self, Self::Header | Self::Data16 | Self::Data24 | Self::Data32)
    }

    pub const fn is_data(self) -> bool {
        matches!(self, Self::Data16 | Self::Data24 | Self::Data32)
    }

    pub const fn is_termination(self) -> bool {
        matches!(self, Self::Term32 | Self::Term24 | Self::Term16)
    }

    /// Kinds the updater knows what to do with.
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::Reserved | Self::Count16 | Self::Count24)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum RecordError {
    /// Character at `offset` is not an upper case hex digit
    InvalidHexDigit { offset: usize },
    /// Record type digit is a hex digit above 9
    UnknownRecordType(u8),
    /// `byte_count` does not even cover the address and checksum
    ByteCountTooSmall(u8),
    /// Line ends before the fields announced by `byte_count`
    Truncated,
    PayloadTooLong,
    BadStartCode(u8),
    ChecksumMismatch { encoded: u8, computed: u8 },
    LengthMismatch { expected: usize, actual: usize },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHexDigit { offset } => write!(f, "invalid hex digit at {}", offset),
            Self::UnknownRecordType(t) => write!(f, "unknown record type S{:X}", t),
            Self::ByteCountTooSmall(c) => write!(f, "byte count {} too small", c),
            Self::Truncated => write!(f, "truncated record"),
            Self::PayloadTooLong => write!(f, "payload too long"),
            Self::BadStartCode(c) => write!(f, "bad start code {:#04x}", c),
            Self::ChecksumMismatch { encoded, computed } => write!(
                f,
                "checksum mismatch (line {:#04x}, computed {:#04x})",
                encoded, computed
            ),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "length mismatch (expected {}, got {})", expected, actual)
            }
        }
    }
}

/// One decoded line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub start_code: u8,
    pub kind: RecordKind,
    pub byte_count: u8,
    /// Zero for the header and the reserved kind
    pub address: u32,
    pub data: Vec<u8, MAX_DATA_LEN>,
    /// One's complement of the byte sum, recomputed from the decoded fields
    pub checksum: u8,
}

impl Record {
    /// Whole flash words in the payload. Trailing bytes past the last full word are not
    /// programmed.
    pub fn data_word_count(&self) -> usize {
        self.data.len() / WORD_SIZE
    }

    /// Payload as little endian words, the order they land in memory.
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.data
            .chunks_exact(WORD_SIZE)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
    }

    /// Characters a well formed line for this record must have.
    pub fn line_len(&self) -> usize {
        (self.byte_count as usize + 2) * 2
    }
}

fn hex_nibble(line: &[u8], offset: usize) -> Result<u8, RecordError> {
    match line.get(offset) {
        Some(c @ b'0'..=b'9') => Ok(c - b'0'),
        Some(c @ b'A'..=b'F') => Ok(c - b'A' + 10),
        Some(_) => Err(RecordError::InvalidHexDigit { offset }),
        None => Err(RecordError::Truncated),
    }
}

fn hex_byte(line: &[u8], offset: usize) -> Result<u8, RecordError> {
    Ok((hex_nibble(line, offset)? << 4) | hex_nibble(line, offset + 1)?)
}

/// Decode `line` (terminator already stripped) into a [`Record`].
///
/// Decoding only fails on malformed fields. Start code, checksum and length are checked by
/// [`validate`].
pub fn decode(line: &[u8]) -> Result<Record, RecordError> {
    let start_code = *line.get(START_CODE_OFFSET).ok_or(RecordError::Truncated)?;
    let kind = RecordKind::try_from(hex_nibble(line, RECORD_TYPE_OFFSET)?)?;
    let byte_count = hex_byte(line, BYTE_COUNT_OFFSET)?;

    if (byte_count as usize) < kind.non_data_bytes() {
        return Err(RecordError::ByteCountTooSmall(byte_count));
    }

    let mut sum = byte_count;
    let mut address = 0u32;

    if kind != RecordKind::Header {
        for i in 0..kind.address_bytes() {
            let byte = hex_byte(line, ADDRESS_FIELD_OFFSET + i * 2)?;
            address = (address << 8) | byte as u32;
            sum = sum.wrapping_add(byte);
        }
    }

    let mut data = Vec::new();
    if kind.carries_data() {
        let data_len = byte_count as usize - kind.non_data_bytes();
        for i in 0..data_len {
            let byte = hex_byte(line, kind.data_offset() + i * 2)?;
            data.push(byte).map_err(|_| RecordError::PayloadTooLong)?;
            sum = sum.wrapping_add(byte);
        }
    }

    Ok(Record {
        start_code,
        kind,
        byte_count,
        address,
        data,
        checksum: !sum,
    })
}

/// Check a decoded record against the raw line it came from.
///
/// The record type range is already enforced by [`RecordKind`].
pub fn validate(record: &Record, line: &[u8]) -> Result<(), RecordError> {
    let expected = record.line_len();

    if record.start_code != START_CODE {
        return Err(RecordError::BadStartCode(record.start_code));
    }

    let encoded = hex_byte(line, expected - 2).map_err(|e| match e {
        RecordError::Truncated => RecordError::LengthMismatch {
            expected,
            actual: line.len(),
        },
        e => e,
    })?;
    if encoded != record.checksum {
        return Err(RecordError::ChecksumMismatch {
            encoded,
            computed: record.checksum,
        });
    }

    if line.len() != expected {
        return Err(RecordError::LengthMismatch {
            expected,
            actual: line.len(),
        });
    }

    Ok(())
}

/// [`decode`] followed by [`validate`].
pub fn parse_record(line: &[u8]) -> Result<Record, RecordError> {
    let record = decode(line)?;
    validate(&record, line)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_data16() {
        let line = b"S104000000FB";
        let record = decode(line).unwrap();

        assert_eq!(record.start_code, b'S');
        assert_eq!(record.kind, RecordKind::Data16);
        assert_eq!(record.byte_count, 4);
        assert_eq!(record.address, 0x0000);
        assert_eq!(record.data.as_slice(), &[0x00]);
        assert_eq!(record.data_word_count(), 0);
        assert_eq!(record.checksum, 0xFB);
        assert_eq!(validate(&record, line), Ok(()));
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let line = b"S104000000FA";
        let record = decode(line).unwrap();

        assert_eq!(
            validate(&record, line),
            Err(RecordError::ChecksumMismatch {
                encoded: 0xFA,
                computed: 0xFB
            })
        );
    }

    #[test]
    fn decodes_data32_with_words() {
        let line = b"S30D0800A00000010203040506072E";
        let record = parse_record(line).unwrap();

        assert_eq!(record.kind, RecordKind::Data32);
        assert_eq!(record.address, 0x0800_A000);
        assert_eq!(record.data.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(record.data_word_count(), 2);

        let mut words = record.words();
        assert_eq!(words.next(), Some(0x0302_0100));
        assert_eq!(words.next(), Some(0x0706_0504));
        assert_eq!(words.next(), None);
    }

    #[test]
    fn decodes_data24_address() {
        // 05 + 01 + 02 + 03 + AA = 0xB5, !0xB5 = 0x4A
        let record = parse_record(b"S205010203AA4A").unwrap();

        assert_eq!(record.kind, RecordKind::Data24);
        assert_eq!(record.address, 0x01_0203);
        assert_eq!(record.data.as_slice(), &[0xAA]);
    }

    #[test]
    fn header_address_is_skipped() {
        // "HDR." : 07 + 48 + 44 + 52 + 2E = 0x113, !0x13 = 0xEC
        let record = parse_record(b"S00700004844522EEC").unwrap();
        assert_eq!(record.kind, RecordKind::Header);
        assert_eq!(record.address, 0);
        assert_eq!(record.data.as_slice(), b"HDR.");
        assert_eq!(record.data_word_count(), 1);

        // the address field does not take part in the header checksum
        let record = parse_record(b"S00712344844522EEC").unwrap();
        assert_eq!(record.address, 0);
        assert_eq!(record.data.as_slice(), b"HDR.");
    }

    #[test]
    fn termination_records_have_no_payload() {
        // 05 + 08 + 00 + A0 + 00 = 0xAD, !0xAD = 0x52
        let s7 = parse_record(b"S7050800A00052").unwrap();
        assert_eq!(s7.kind, RecordKind::Term32);
        assert!(s7.kind.is_termination());
        assert_eq!(s7.address, 0x0800_A000);
        assert!(s7.data.is_empty());

        // 03 + 00 + 00 = 0x03, !0x03 = 0xFC
        let s9 = parse_record(b"S9030000FC").unwrap();
        assert_eq!(s9.kind, RecordKind::Term16);
    }

    #[test]
    fn count_records_decode_but_are_unsupported() {
        // 03 + 00 + 02 = 0x05, !0x05 = 0xFA
        let s5 = parse_record(b"S5030002FA").unwrap();
        assert_eq!(s5.kind, RecordKind::Count16);
        assert_eq!(s5.address, 2);
        assert!(!s5.kind.is_supported());
    }

    #[test]
    fn invalid_hex_digit_is_an_error() {
        assert_eq!(
            decode(b"S1040000G0FB"),
            Err(RecordError::InvalidHexDigit { offset: 8 })
        );
        // lower case is not part of the format
        assert_eq!(
            decode(b"S10400000afB"),
            Err(RecordError::InvalidHexDigit { offset: 9 })
        );
        assert_eq!(
            decode(b"SX04000000FB"),
            Err(RecordError::InvalidHexDigit { offset: 1 })
        );
    }

    #[test]
    fn type_digit_above_nine_is_rejected() {
        assert_eq!(
            decode(b"SA04000000FB"),
            Err(RecordError::UnknownRecordType(0xA))
        );
    }

    #[test]
    fn wrong_start_code_is_rejected_by_validator() {
        let line = b"X104000000FB";
        let record = decode(line).unwrap();
        assert_eq!(validate(&record, line), Err(RecordError::BadStartCode(b'X')));
    }

    #[test]
    fn length_must_match_byte_count() {
        // trailing garbage after a valid checksum
        assert_eq!(
            parse_record(b"S104000000FB00"),
            Err(RecordError::LengthMismatch {
                expected: 12,
                actual: 14
            })
        );
        // byte count promises more data than the line has
        assert_eq!(parse_record(b"S1050000"), Err(RecordError::Truncated));
        assert_eq!(parse_record(b""), Err(RecordError::Truncated));
    }

    #[test]
    fn byte_count_must_cover_address_and_checksum() {
        assert_eq!(
            decode(b"S3040000"),
            Err(RecordError::ByteCountTooSmall(4))
        );
    }

    #[test]
    fn largest_record_fits() {
        let mut line: Vec<u8, MAX_LINE_LEN> = Vec::new();
        line.extend_from_slice(b"S1FF0000").unwrap();
        // 0xFF + 252 * 0x01 = 0x1FB, low byte 0xFB, !0xFB = 0x04
        for _ in 0..MAX_DATA_LEN {
            line.extend_from_slice(b"01").unwrap();
        }
        line.extend_from_slice(b"04").unwrap();
        assert_eq!(line.len(), MAX_LINE_LEN);

        let record = parse_record(&line).unwrap();
        assert_eq!(record.data.len(), MAX_DATA_LEN);
        assert_eq!(record.data_word_count(), MAX_DATA_LEN / 4);
    }
}
