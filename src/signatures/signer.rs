//! Signature dictionaries and detached signing.
//!
//! PDF Spec: ISO 32000-1:2008, Section 12.8.1 - Signature Dictionaries
//!
//! [`sign_detached`] drives a [`PdfStamper`] through the usual sequence:
//! reserve `/Contents`, pre-close, hand the ByteRange bytes to an
//! [`ExternalSignatureContainer`], then write the container into the
//! reserved window.

use super::byterange::contents_reservation;
use super::stamper::PdfStamper;
use super::types::SignatureSubFilter;
use crate::error::{Error, Result};
use crate::names::{self, Name};
use crate::object::{Dictionary, Object, PdfString};
use chrono::{DateTime, FixedOffset, Local, Offset};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Estimated container size used when the caller gives none.
pub const DEFAULT_ESTIMATED_SIZE: usize = 8192;

/// Produces the signature container for the bytes covered by the ByteRange.
pub trait ExternalSignatureContainer {
    /// Sign the ByteRange bytes and return the encoded container.
    fn sign(&mut self, data: &mut dyn Read) -> Result<Vec<u8>>;

    /// Set `/Filter`, `/SubFilter` and any other entries the container format requires.
    fn modify_signing_dictionary(&self, dict: &mut Dictionary);
}

/// A container that signs nothing, for preparing a document whose
/// signature is produced elsewhere.
#[derive(Debug, Clone)]
pub struct BlankSignatureContainer {
    filter: Name,
    sub_filter: SignatureSubFilter,
}

impl BlankSignatureContainer {
    /// Container that only stamps `/Filter` and `/SubFilter`.
    pub fn new(filter: Name, sub_filter: SignatureSubFilter) -> Self {
        Self { filter, sub_filter }
    }
}

impl ExternalSignatureContainer for BlankSignatureContainer {
    fn sign(&mut self, _data: &mut dyn Read) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn modify_signing_dictionary(&self, dict: &mut Dictionary) {
        dict.insert(names::FILTER, self.filter.clone());
        dict.insert(names::SUBFILTER, Name::new(self.sub_filter.as_pdf_name()));
    }
}

/// Builder for a `/Type /Sig` dictionary.
#[derive(Debug, Clone)]
pub struct SignatureDictionary {
    sub_filter: SignatureSubFilter,
    name: Option<String>,
    reason: Option<String>,
    location: Option<String>,
    contact_info: Option<String>,
    signing_time: DateTime<FixedOffset>,
}

impl Default for SignatureDictionary {
    fn default() -> Self {
        Self::new(SignatureSubFilter::default())
    }
}

impl SignatureDictionary {
    /// Signature dictionary signed now, in local time.
    pub fn new(sub_filter: SignatureSubFilter) -> Self {
        let now = Local::now();
        Self {
            sub_filter,
            name: None,
            reason: None,
            location: None,
            contact_info: None,
            signing_time: now.with_timezone(&now.offset().fix()),
        }
    }

    /// Set the signer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set contact information for the signer.
    pub fn with_contact_info(mut self, contact_info: impl Into<String>) -> Self {
        self.contact_info = Some(contact_info.into());
        self
    }

    /// Set the signing time written to `/M`.
    pub fn with_signing_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.signing_time = time;
        self
    }

    /// Build the dictionary, without `/Contents` and `/ByteRange`.
    pub fn build(&self) -> Dictionary {
        let mut dict = Dictionary::with_type(names::SIG);
        dict.insert(names::FILTER, names::ADOBE_PPKLITE);
        dict.insert(names::SUBFILTER, Name::new(self.sub_filter.as_pdf_name()));
        let optional = [
            (names::NAME, &self.name),
            (names::REASON, &self.reason),
            (names::LOCATION, &self.location),
            (names::CONTACT_INFO, &self.contact_info),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                dict.insert(key, Object::text(value));
            }
        }
        dict.insert(names::M, Object::text(&format_pdf_date(&self.signing_time)));
        dict
    }
}

/// Format a date as a PDF date string, `D:YYYYMMDDHHmmSS+HH'mm'`.
pub fn format_pdf_date(time: &DateTime<FixedOffset>) -> String {
    let offset = time.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}'",
        time.format("%Y%m%d%H%M%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}

/// Sign the document held by `stamper` with a detached container.
///
/// `/Contents` is reserved for `estimated_size` container bytes. The
/// container is zero padded to that size, so the gap holds exactly one
/// hex string. A container larger than the estimate fails with
/// [`Error::ReservationOverflow`].
pub fn sign_detached<W: Write>(
    mut stamper: PdfStamper<W>,
    container: &mut dyn ExternalSignatureContainer,
    signature: &SignatureDictionary,
    estimated_size: usize,
) -> Result<W> {
    let estimated_size = if estimated_size == 0 {
        DEFAULT_ESTIMATED_SIZE
    } else {
        estimated_size
    };

    let mut dict = signature.build();
    container.modify_signing_dictionary(&mut dict);
    stamper.set_crypto_dictionary(dict)?;

    let reservation = contents_reservation(estimated_size);
    let mut exclusions = HashMap::new();
    exclusions.insert(names::CONTENTS, reservation);
    stamper.pre_close(&exclusions)?;

    let encoded = {
        let mut range = stamper.range_stream()?;
        container.sign(&mut range)?
    };
    if encoded.len() > estimated_size {
        return Err(Error::ReservationOverflow {
            key: names::CONTENTS.as_str().to_string(),
            reserved: reservation,
            got: contents_reservation(encoded.len()),
        });
    }
    log::info!("Signature container is {} of {} reserved bytes", encoded.len(), estimated_size);

    let mut padded = encoded;
    padded.resize(estimated_size, 0);
    let mut update = Dictionary::new();
    update.insert(names::CONTENTS, PdfString::hex(padded));
    stamper.close(&update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StamperOptions;
    use crate::reader::{PdfReader, SourceDocument};
    use crate::signatures::byterange::{byte_range_of, signed_digest, validate_byte_range, validate_signature_gaps};
    use crate::writer::PdfWriter;
    use chrono::TimeZone;
    use sha2::{Digest, Sha256};

    /// Returns the SHA-256 of the signed bytes as its "container".
    struct DigestOnly;

    impl ExternalSignatureContainer for DigestOnly {
        fn sign(&mut self, data: &mut dyn Read) -> Result<Vec<u8>> {
            let mut bytes = Vec::new();
            data.read_to_end(&mut bytes)?;
            Ok(Sha256::digest(&bytes).to_vec())
        }

        fn modify_signing_dictionary(&self, dict: &mut Dictionary) {
            dict.insert(names::SUBFILTER, names::ADBE_PKCS7_DETACHED);
        }
    }

    fn source_pdf() -> PdfReader {
        let mut writer = PdfWriter::new();
        writer
            .new_page([0.0, 0.0, 595.0, 842.0], Dictionary::new(), b"BT ET")
            .unwrap();
        PdfReader::from_bytes(writer.finish().unwrap()).unwrap()
    }

    fn find_signature(reader: &mut PdfReader) -> Dictionary {
        let form = reader.catalog().unwrap().get_dict("AcroForm").unwrap().clone();
        let field = form.get_array("Fields").unwrap()[0].clone();
        let field = reader.resolve_value(&field).unwrap();
        let sig = field.as_dict().unwrap().get("V").unwrap().clone();
        reader.resolve_value(&sig).unwrap().as_dict().unwrap().clone()
    }

    #[test]
    fn test_pdf_date_format() {
        let offset = FixedOffset::east_opt(2 * 3600 + 30 * 60).unwrap();
        let time = offset.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_pdf_date(&time), "D:20240309140507+02'30'");

        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let time = west.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(format_pdf_date(&time), "D:20241231235959-05'00'");
    }

    #[test]
    fn test_dictionary_entries() {
        let dict = SignatureDictionary::new(SignatureSubFilter::CadesDetached)
            .with_name("Jo Signer")
            .with_reason("Approval")
            .build();
        assert!(dict.has_type("Sig"));
        assert_eq!(dict.get_name("Filter"), Some("Adobe.PPKLite"));
        assert_eq!(dict.get_name("SubFilter"), Some("ETSI.CAdES.detached"));
        assert_eq!(dict.get("Reason").and_then(Object::as_text).as_deref(), Some("Approval"));
        assert!(!dict.contains_key("Location"));
        assert!(dict.get("M").and_then(Object::as_text).unwrap().starts_with("D:"));
    }

    #[test]
    fn test_sign_detached_digest_matches() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.add_signature_field("Signature1", 1, [0.0, 0.0, 0.0, 0.0]).unwrap();
        let out = sign_detached(stamper, &mut DigestOnly, &SignatureDictionary::default(), 64).unwrap();

        let mut reader = PdfReader::from_bytes(out.clone()).unwrap();
        let sig = find_signature(&mut reader);
        let byte_range = byte_range_of(&sig).unwrap();
        validate_byte_range(&byte_range, out.len()).unwrap();
        validate_signature_gaps(&out, &byte_range).unwrap();

        let contents = sig.get("Contents").and_then(Object::as_string).unwrap();
        assert_eq!(contents.len(), 64);
        assert_eq!(&contents[..32], &signed_digest(&out, &byte_range).unwrap());
        assert!(contents[32..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_container_larger_than_estimate() {
        let stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        let err = sign_detached(stamper, &mut DigestOnly, &SignatureDictionary::default(), 16).unwrap_err();
        assert!(matches!(err, Error::ReservationOverflow { reserved: 34, got: 66, .. }));
    }

    #[test]
    fn test_blank_container() {
        let mut blank = BlankSignatureContainer::new(names::ADOBE_PPKLITE, SignatureSubFilter::Pkcs7Sha1);
        let mut dict = Dictionary::new();
        blank.modify_signing_dictionary(&mut dict);
        assert_eq!(dict.get_name("SubFilter"), Some("adbe.pkcs7.sha1"));
        assert!(blank.sign(&mut std::io::empty()).unwrap().is_empty());
    }
}
