//! Stream filters.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.4 - Filters
//!
//! Only what the reader needs to reach objects: FlateDecode with PNG and TIFF
//! predictors (cross-reference streams and object streams use nothing else in
//! practice). Copied streams are never decoded; their bytes travel verbatim.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Decode parameters for predictor handling.
#[derive(Debug, Clone)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (width in samples)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    fn from_dict(dict: &Dictionary) -> Self {
        let get = |key: &str, default: i64| dict.get_integer(key).unwrap_or(default);
        Self {
            predictor: get("Predictor", 1),
            columns: get("Columns", 1).max(1) as usize,
            colors: get("Colors", 1).max(1) as usize,
            bits_per_component: get("BitsPerComponent", 8).max(1) as usize,
        }
    }

    fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Decode stream data according to `/Filter` and `/DecodeParms`.
pub fn decode_stream(dict: &Dictionary, data: &[u8]) -> Result<Vec<u8>> {
    let filters: Vec<&str> = match dict.get("Filter") {
        None => Vec::new(),
        Some(Object::Name(n)) => vec![n.as_str()],
        Some(Object::Array(arr)) => arr.iter().filter_map(Object::as_name).collect(),
        Some(other) => {
            return Err(Error::Decode(format!("invalid /Filter of type {}", other.type_name())))
        },
    };

    let params: Vec<Option<&Dictionary>> = match dict.get("DecodeParms") {
        Some(Object::Dictionary(d)) => vec![Some(d)],
        Some(Object::Array(arr)) => arr.iter().map(Object::as_dict).collect(),
        _ => Vec::new(),
    };

    let mut current = data.to_vec();
    for (index, filter) in filters.iter().enumerate() {
        current = match *filter {
            "FlateDecode" | "Fl" => {
                let inflated = flate_decode(&current)?;
                match params.get(index).copied().flatten() {
                    Some(p) => decode_predictor(&inflated, &DecodeParams::from_dict(p))?,
                    None => inflated,
                }
            },
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        };
    }
    Ok(current)
}

/// Inflate zlib data, falling back to raw deflate for streams with a broken header.
pub fn flate_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    match ZlibDecoder::new(input).read_to_end(&mut output) {
        Ok(_) => Ok(output),
        Err(e) if !output.is_empty() => {
            log::warn!("FlateDecode partial recovery: {} bytes before error: {}", output.len(), e);
            Ok(output)
        },
        Err(e) => {
            log::debug!("Zlib decode failed ({}), trying raw deflate", e);
            output.clear();
            DeflateDecoder::new(input)
                .read_to_end(&mut output)
                .map_err(|e| Error::Decode(format!("FlateDecode failed: {}", e)))?;
            Ok(output)
        },
    }
}

/// Compress data with zlib.
pub fn flate_encode(input: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    Ok(encoder.finish()?)
}

/// Reverse a TIFF or PNG predictor.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Ok(decode_tiff_predictor(data, params)),
        10..=15 => decode_png_predictor(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Vec<u8> {
    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    output
}

fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();
    let mut output = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (tag, encoded) = match chunk.split_first() {
            Some(split) => split,
            None => break,
        };
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            row[i] = match tag {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, up_left)),
                other => return Err(Error::Decode(format!("Invalid PNG row filter: {}", other))),
            };
        }

        output.extend_from_slice(&row);
        previous = row;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names;

    #[test]
    fn test_flate_round_trip() {
        let data = b"BT /F1 12 Tf (Hello) Tj ET".repeat(20);
        let compressed = flate_encode(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(flate_decode(&compressed).unwrap(), data);
    }

    #[test]
    fn test_png_up_predictor() {
        // Two rows of 3 bytes, second row encoded with the Up filter
        let encoded = [0, 1, 2, 3, 2, 1, 1, 1];
        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            ..Default::default()
        };
        assert_eq!(decode_predictor(&encoded, &params).unwrap(), vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_decode_stream_with_params() {
        let raw = [0u8, 1, 0, 0, 2, 0, 0, 1];
        let mut dict = Dictionary::new();
        dict.insert(names::FILTER, names::FLATE_DECODE);
        let mut parms = Dictionary::new();
        parms.insert(names::PREDICTOR, 12);
        parms.insert(names::COLUMNS, 3);
        dict.insert(names::DECODE_PARMS, parms);

        let decoded = decode_stream(&dict, &flate_encode(&raw).unwrap()).unwrap();
        assert_eq!(decoded, vec![1, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn test_unsupported_filter() {
        let mut dict = Dictionary::new();
        dict.insert(names::FILTER, Object::name("DCTDecode"));
        assert!(matches!(decode_stream(&dict, b"xx"), Err(Error::UnsupportedFilter(_))));
    }
}
