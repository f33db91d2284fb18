//! Integration tests for incremental updates and byte-range signatures.
//!
//! A document is written, reopened, stamped with a signature field and
//! signed; the result is parsed again and its ByteRange checked against
//! the bytes on disk.

use pdf_graft::config::StamperOptions;
use pdf_graft::names::{self, Name};
use pdf_graft::object::{Dictionary, PdfString};
use pdf_graft::reader::{PdfReader, SourceDocument};
use pdf_graft::signatures::{
    extract_signed_bytes, find_signatures, sign_detached, signed_digest, validate_byte_range,
    validate_signature_gaps, ExternalSignatureContainer, PdfStamper, SignatureDictionary, StamperState,
};
use pdf_graft::writer::PdfWriter;
use pdf_graft::Error;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Read, Write};

fn source_bytes() -> Vec<u8> {
    let mut writer = PdfWriter::new();
    for text in ["first", "second"] {
        let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        writer
            .new_page([0.0, 0.0, 612.0, 792.0], Dictionary::new(), content.as_bytes())
            .unwrap();
    }
    writer.finish().unwrap()
}

fn stamper_for<W: Write>(bytes: &[u8], output: W, options: StamperOptions) -> PdfStamper<W> {
    let reader = PdfReader::from_bytes(bytes.to_vec()).unwrap();
    let mut stamper = PdfStamper::new(reader, output, options).unwrap();
    stamper.add_signature_field("Signature1", 1, [0.0, 0.0, 0.0, 0.0]).unwrap();
    stamper
}

fn sig_dict() -> Dictionary {
    let mut dict = Dictionary::with_type(names::SIG);
    dict.insert(names::FILTER, names::ADOBE_PPKLITE);
    dict.insert(names::SUBFILTER, names::ADBE_PKCS7_DETACHED);
    dict
}

fn reservations(contents: usize) -> HashMap<Name, usize> {
    let mut sizes = HashMap::new();
    sizes.insert(names::CONTENTS, contents);
    sizes.insert(names::BYTE_RANGE, 80);
    sizes
}

/// Uses the SHA-256 of the covered bytes as its container.
struct DigestContainer;

impl ExternalSignatureContainer for DigestContainer {
    fn sign(&mut self, data: &mut dyn Read) -> pdf_graft::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        data.read_to_end(&mut bytes)?;
        Ok(Sha256::digest(&bytes).to_vec())
    }

    fn modify_signing_dictionary(&self, dict: &mut Dictionary) {
        dict.insert(names::FILTER, names::ADOBE_PPKLITE);
        dict.insert(names::SUBFILTER, names::ADBE_PKCS7_DETACHED);
    }
}

#[test]
fn test_reserved_contents_window_is_excluded() {
    let original = source_bytes();
    let mut stamper = stamper_for(&original, Vec::new(), StamperOptions::default());
    stamper.set_crypto_dictionary(sig_dict()).unwrap();
    stamper.pre_close(&reservations(4742)).unwrap();
    assert_eq!(stamper.state(), StamperState::PreClosed);

    let br = stamper.byte_range().to_vec();
    assert_eq!(br.len(), 4);
    assert_eq!(br[0], 0);
    assert_eq!(br[2] - br[1], 4742);

    let mut covered = Vec::new();
    stamper.range_stream().unwrap().read_to_end(&mut covered).unwrap();

    let mut update = Dictionary::new();
    update.insert(names::CONTENTS, PdfString::hex(vec![0xAB; 2370]));
    let out = stamper.close(&update).unwrap();

    let (start, len) = (br[1] as usize, br[2] as usize);
    assert_eq!(out[start], b'<');
    assert_eq!(out[len - 1], b'>');
    assert_eq!((br[2] + br[3]) as usize, out.len());
    assert!(out.starts_with(&original));

    // the patched array sits in its 80 byte window, space padded
    let pattern = regex::bytes::Regex::new(r"/ByteRange\s*(\[(\d+) (\d+) (\d+) (\d+)\])").unwrap();
    let caps = pattern.captures(&out).unwrap();
    let array = caps.get(1).unwrap();
    assert!(out[array.end()..array.start() + 80].iter().all(|&b| b == b' '));
    let written: Vec<i64> = (2..=5)
        .map(|i| std::str::from_utf8(&caps[i]).unwrap().parse().unwrap())
        .collect();
    assert_eq!(written, br);

    validate_byte_range(&br, out.len()).unwrap();
    validate_signature_gaps(&out, &br).unwrap();
    assert_eq!(extract_signed_bytes(&out, &br).unwrap(), covered);

    let mut reader = PdfReader::from_bytes(out.clone()).unwrap();
    assert_eq!(reader.page_count().unwrap(), 2);
    let found = find_signatures(&mut reader).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, "Signature1");
    assert_eq!(found[0].1.byte_range, br);
    assert_eq!(found[0].1.contents, vec![0xAB; 2370]);
}

#[test]
fn test_sign_detached_into_file() {
    let original = source_bytes();
    let file = tempfile::NamedTempFile::new().unwrap();
    let stamper = stamper_for(&original, file.reopen().unwrap(), StamperOptions::default());

    let signature = SignatureDictionary::default()
        .with_name("Tester")
        .with_reason("Approval")
        .with_location("Here");
    sign_detached(stamper, &mut DigestContainer, &signature, 64).unwrap();

    let out = std::fs::read(file.path()).unwrap();
    let mut reader = PdfReader::from_bytes(out.clone()).unwrap();
    let found = find_signatures(&mut reader).unwrap();
    let info = &found[0].1;
    assert_eq!(info.signer_name.as_deref(), Some("Tester"));
    assert_eq!(info.reason.as_deref(), Some("Approval"));
    assert_eq!(info.location.as_deref(), Some("Here"));
    assert!(info.has_single_gap());

    // container is zero padded to the estimate
    assert_eq!(info.contents.len(), 64);
    let digest = signed_digest(&out, &info.byte_range).unwrap();
    assert_eq!(&info.contents[..32], &digest[..]);
}

#[test]
fn test_full_rewrite_signature() {
    let original = source_bytes();
    let stamper = stamper_for(&original, Vec::new(), StamperOptions::new().with_append(false));
    assert!(!stamper.is_append());
    let out = sign_detached(stamper, &mut DigestContainer, &SignatureDictionary::default(), 64).unwrap();

    // a single revision: one trailer
    let eof_markers = out.windows(5).filter(|w| w == b"%%EOF").count();
    assert_eq!(eof_markers, 1);
    let mut reader = PdfReader::from_bytes(out.clone()).unwrap();
    assert_eq!(reader.page_count().unwrap(), 2);
    let found = find_signatures(&mut reader).unwrap();
    let br = &found[0].1.byte_range;
    validate_byte_range(br, out.len()).unwrap();
    assert_eq!(&found[0].1.contents[..32], &signed_digest(&out, br).unwrap()[..]);
}

#[test]
fn test_container_larger_than_estimate() {
    let stamper = stamper_for(&source_bytes(), Vec::new(), StamperOptions::default());
    // a SHA-256 digest does not fit in 16 bytes
    let err = sign_detached(stamper, &mut DigestContainer, &SignatureDictionary::default(), 16).unwrap_err();
    assert!(matches!(err, Error::ReservationOverflow { .. }), "{}", err);
}

#[test]
fn test_close_with_wrong_keys() {
    let bytes = source_bytes();

    let mut stamper = stamper_for(&bytes, Vec::new(), StamperOptions::default());
    stamper.set_crypto_dictionary(sig_dict()).unwrap();
    stamper.pre_close(&reservations(100)).unwrap();
    let mut update = Dictionary::new();
    update.insert("Cert", PdfString::hex(vec![1, 2, 3]));
    assert!(matches!(stamper.close(&update).unwrap_err(), Error::UnreservedKey(key) if key == "Cert"));

    let mut stamper = stamper_for(&bytes, Vec::new(), StamperOptions::default());
    stamper.set_crypto_dictionary(sig_dict()).unwrap();
    stamper.pre_close(&reservations(100)).unwrap();
    let err = stamper.close(&Dictionary::new()).unwrap_err();
    assert!(matches!(err, Error::UpdateKeysMismatch { fewer: true }));
}

#[test]
fn test_signing_twice_keeps_both_revisions() {
    let first = sign_detached(
        stamper_for(&source_bytes(), Vec::new(), StamperOptions::default()),
        &mut DigestContainer,
        &SignatureDictionary::default(),
        64,
    )
    .unwrap();

    let reader = PdfReader::from_bytes(first.clone()).unwrap();
    let mut stamper = PdfStamper::new(reader, Vec::new(), StamperOptions::default()).unwrap();
    stamper.add_signature_field("Signature2", 2, [0.0, 0.0, 0.0, 0.0]).unwrap();
    let second = sign_detached(stamper, &mut DigestContainer, &SignatureDictionary::default(), 64).unwrap();

    assert!(second.starts_with(&first));
    let mut reader = PdfReader::from_bytes(second.clone()).unwrap();
    let found = find_signatures(&mut reader).unwrap();
    let names: Vec<&str> = found.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["Signature1", "Signature2"]);

    // the first signature still covers exactly the first revision
    let first_range = &found[0].1.byte_range;
    assert_eq!((first_range[2] + first_range[3]) as usize, first.len());
    assert_eq!(&found[0].1.contents[..32], &signed_digest(&first, first_range).unwrap()[..]);
}

#[cfg(feature = "signatures")]
mod pkcs7 {
    use super::*;
    use pdf_graft::signatures::{Pkcs7Container, SignedDataSummary, SigningCredentials};

    const CERT: &[u8] = include_bytes!("fixtures/signer_cert.der");
    const KEY: &[u8] = include_bytes!("fixtures/signer_key.der");

    #[test]
    fn test_pkcs7_signature_verifies() {
        let credentials = SigningCredentials::from_der(CERT, KEY).unwrap();
        let mut container = Pkcs7Container::new(credentials);
        let stamper = stamper_for(&source_bytes(), Vec::new(), StamperOptions::default());
        let out = sign_detached(stamper, &mut container, &SignatureDictionary::default(), 0).unwrap();

        let mut reader = PdfReader::from_bytes(out.clone()).unwrap();
        let found = find_signatures(&mut reader).unwrap();
        let info = &found[0].1;
        let summary = SignedDataSummary::parse(info.trimmed_contents()).unwrap();
        assert!(summary.signer_subject.as_deref().unwrap_or_default().contains("pdf_graft test signer"));
        let signed = extract_signed_bytes(&out, &info.byte_range).unwrap();
        assert!(summary.verify(&signed).unwrap());
    }
}
