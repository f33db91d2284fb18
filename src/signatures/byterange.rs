//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature value is
//! stored in a reserved window that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of `(offset, length)` pairs. With a single
//! excluded window (the usual `/Contents` case) it has four integers:
//! `[0, contents_start, contents_end, file_size - contents_end]`.
//!
//! The signature value is a hex-encoded string within `<` and `>` delimiters.

use crate::error::{Error, Result};
use crate::names;
use crate::object::{Dictionary, Object};
use crate::writer::{ObjectSerializer, ReservedSlot};
use sha2::{Digest, Sha256};

/// Bytes always reserved for the `/ByteRange` array.
pub const BYTE_RANGE_RESERVATION: usize = 80;

/// Reservation for a `/Contents` hex string holding `estimated_signature_size` bytes.
///
/// Each byte becomes 2 hex characters, plus 2 for `<` and `>`.
pub fn contents_reservation(estimated_signature_size: usize) -> usize {
    estimated_signature_size * 2 + 2
}

/// Compute the ByteRange covering everything but the excluded windows.
///
/// `slots` may arrive in any order. Every slot except `/ByteRange` itself
/// is excluded; the `/ByteRange` window is covered so that the array is
/// part of what gets signed.
pub fn compute_byte_range(slots: &[ReservedSlot], file_size: u64) -> Vec<i64> {
    let mut gaps: Vec<&ReservedSlot> = slots.iter().filter(|s| s.key != names::BYTE_RANGE).collect();
    gaps.sort_by_key(|s| s.offset);

    let mut ranges = Vec::with_capacity(gaps.len() * 2 + 2);
    let mut start = 0u64;
    for gap in gaps {
        ranges.push(start as i64);
        ranges.push(gap.offset.saturating_sub(start) as i64);
        start = gap.end();
    }
    ranges.push(start as i64);
    ranges.push(file_size.saturating_sub(start) as i64);
    ranges
}

/// Serialize a ByteRange array padded with spaces to exactly `width` bytes.
pub fn format_byte_range(byte_range: &[i64], width: usize) -> Result<Vec<u8>> {
    let array = Object::Array(byte_range.iter().map(|v| Object::Integer(*v)).collect());
    let mut bytes = ObjectSerializer::new().serialize(&array);
    if bytes.len() > width {
        return Err(Error::ReservationOverflow {
            key: names::BYTE_RANGE.as_str().to_string(),
            reserved: width,
            got: bytes.len(),
        });
    }
    bytes.resize(width, b' ');
    Ok(bytes)
}

/// Read the `/ByteRange` of a signature dictionary.
pub fn byte_range_of(sig_dict: &Dictionary) -> Result<Vec<i64>> {
    let array = sig_dict
        .get_array("ByteRange")
        .ok_or_else(|| Error::InvalidPdf("signature dictionary has no /ByteRange".to_string()))?;
    array
        .iter()
        .map(|v| {
            v.as_integer()
                .ok_or_else(|| Error::InvalidPdf(format!("non-integer /ByteRange entry {:?}", v)))
        })
        .collect()
}

/// Extract the bytes covered by a ByteRange.
pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64]) -> Result<Vec<u8>> {
    let pairs = pairs(byte_range)?;
    let mut signed = Vec::with_capacity(pairs.iter().map(|(_, len)| *len).sum());
    for (offset, length) in pairs {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= pdf_data.len())
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange range {} + {} exceeds file size {}",
                    offset,
                    length,
                    pdf_data.len()
                ))
            })?;
        signed.extend_from_slice(&pdf_data[offset..end]);
    }
    Ok(signed)
}

/// Check that a ByteRange covers the entire file except its gaps.
///
/// A valid ByteRange:
/// - starts at 0
/// - has ranges in ascending order that do not overlap
/// - ends at the file size
pub fn validate_byte_range(byte_range: &[i64], file_size: usize) -> Result<()> {
    let pairs = pairs(byte_range)?;
    if pairs.first().map(|(offset, _)| *offset) != Some(0) {
        return Err(Error::InvalidPdf(format!(
            "ByteRange must start at 0, got {:?}",
            byte_range.first()
        )));
    }

    let mut previous_end = 0;
    for (offset, length) in &pairs {
        if *offset < previous_end {
            return Err(Error::InvalidPdf(format!(
                "ByteRange range at {} overlaps the previous one ending at {}",
                offset, previous_end
            )));
        }
        previous_end = offset + length;
    }

    if previous_end != file_size {
        return Err(Error::InvalidPdf(format!(
            "ByteRange must end at file size {}, got {}",
            file_size, previous_end
        )));
    }
    Ok(())
}

/// Check that every gap of a ByteRange is exactly one hex string `<...>`.
pub fn validate_signature_gaps(pdf_data: &[u8], byte_range: &[i64]) -> Result<()> {
    let pairs = pairs(byte_range)?;
    for window in pairs.windows(2) {
        let gap_start = window[0].0 + window[0].1;
        let gap_end = window[1].0;
        let gap = pdf_data
            .get(gap_start..gap_end)
            .ok_or_else(|| Error::InvalidPdf(format!("gap {}..{} outside the file", gap_start, gap_end)))?;
        let hex = gap
            .strip_prefix(b"<")
            .and_then(|g| g.strip_suffix(b">"))
            .ok_or_else(|| Error::InvalidPdf(format!("gap at {} is not a hex string", gap_start)))?;
        if !hex.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::InvalidPdf(format!(
                "gap at {} contains non-hex bytes",
                gap_start
            )));
        }
    }
    Ok(())
}

/// SHA-256 digest of the bytes covered by a ByteRange.
pub fn signed_digest(pdf_data: &[u8], byte_range: &[i64]) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    for (offset, length) in pairs(byte_range)? {
        let chunk = pdf_data
            .get(offset..offset + length)
            .ok_or_else(|| Error::InvalidPdf("ByteRange exceeds file size".to_string()))?;
        hasher.update(chunk);
    }
    Ok(hasher.finalize().into())
}

/// Convert bytes to an uppercase hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}

fn pairs(byte_range: &[i64]) -> Result<Vec<(usize, usize)>> {
    if byte_range.is_empty() || byte_range.len() % 2 != 0 {
        return Err(Error::InvalidPdf(format!(
            "ByteRange needs an even, non-zero number of entries, got {}",
            byte_range.len()
        )));
    }
    byte_range
        .chunks(2)
        .map(|pair| {
            if pair[0] < 0 || pair[1] < 0 {
                return Err(Error::InvalidPdf(format!("negative ByteRange entry in {:?}", pair)));
            }
            Ok((pair[0] as usize, pair[1] as usize))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::Name;

    fn slot(key: Name, offset: u64, len: usize) -> ReservedSlot {
        ReservedSlot { key, offset, len }
    }

    #[test]
    fn test_contents_reservation() {
        // 1024 bytes * 2 (hex) + 2 (brackets) = 2050
        assert_eq!(contents_reservation(1024), 2050);
    }

    #[test]
    fn test_single_gap() {
        let slots = [slot(names::CONTENTS, 400, 100), slot(names::BYTE_RANGE, 520, 80)];
        assert_eq!(compute_byte_range(&slots, 1000), vec![0, 400, 500, 500]);
    }

    #[test]
    fn test_gaps_sorted_by_offset() {
        let slots = [
            slot(Name::new("Cert"), 700, 50),
            slot(names::BYTE_RANGE, 10, 80),
            slot(names::CONTENTS, 300, 100),
        ];
        assert_eq!(compute_byte_range(&slots, 1000), vec![0, 300, 400, 300, 750, 250]);
    }

    #[test]
    fn test_format_byte_range_padding() {
        let bytes = format_byte_range(&[0, 100, 200, 300], 20).unwrap();
        assert_eq!(bytes, b"[0 100 200 300]     ");
        assert!(format_byte_range(&[0, 100, 200, 300], 10).is_err());
    }

    #[test]
    fn test_extract_signed_bytes() {
        let pdf_data = b"AAABBBCCC";
        let signed = extract_signed_bytes(pdf_data, &[0, 3, 6, 3]).unwrap();
        assert_eq!(signed, b"AAACCC");
        assert!(extract_signed_bytes(pdf_data, &[0, 3, 6, 4]).is_err());
    }

    #[test]
    fn test_validate_byte_range() {
        assert!(validate_byte_range(&[0, 100, 150, 50], 200).is_ok());
        assert!(validate_byte_range(&[10, 100, 150, 50], 200).is_err());
        assert!(validate_byte_range(&[0, 100, 150, 100], 200).is_err());
        assert!(validate_byte_range(&[0, 100, 50, 150], 200).is_err());
        assert!(validate_byte_range(&[0, 100, 150], 200).is_err());
    }

    #[test]
    fn test_validate_signature_gaps() {
        let data = b"AAA<0F1e>CCC";
        assert!(validate_signature_gaps(data, &[0, 3, 9, 3]).is_ok());
        assert!(validate_signature_gaps(b"AAA(0F1e)CCC", &[0, 3, 9, 3]).is_err());
        assert!(validate_signature_gaps(b"AAA<0FXe>CCC", &[0, 3, 9, 3]).is_err());
    }

    #[test]
    fn test_signed_digest_skips_gap() {
        let a = signed_digest(b"AAA<00>CCC", &[0, 3, 7, 3]).unwrap();
        let b = signed_digest(b"AAA<FF>CCC", &[0, 3, 7, 3]).unwrap();
        assert_eq!(a, b);
        let c = signed_digest(b"AAA<00>CCD", &[0, 3, 7, 3]).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0x00, 0xAB, 0x7f]), "00AB7F");
    }
}
