//! Incremental updates and byte-range signatures.
//!
//! A [`PdfStamper`] writes a modified copy of a document, as an appended
//! revision or a full rewrite. For signing it reserves fixed-width windows
//! in the signature dictionary, computes the `/ByteRange` that excludes
//! them, exposes the covered bytes as a stream, and fills the windows once
//! the signature container is known.
//!
//! ## Example
//!
//! ```ignore
//! use pdf_graft::reader::PdfReader;
//! use pdf_graft::signatures::{sign_detached, PdfStamper, Pkcs7Container, SignatureDictionary, SigningCredentials};
//! use pdf_graft::config::StamperOptions;
//!
//! let reader = PdfReader::open("document.pdf")?;
//! let mut stamper = PdfStamper::new(reader, std::fs::File::create("signed.pdf")?, StamperOptions::default())?;
//! stamper.add_signature_field("Signature1", 1, [0.0, 0.0, 0.0, 0.0])?;
//!
//! let credentials = SigningCredentials::from_der(&cert_der, &key_der)?;
//! let mut container = Pkcs7Container::new(credentials);
//! sign_detached(stamper, &mut container, &SignatureDictionary::default(), 8192)?;
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 7.5.6 - Incremental Updates
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ETSI TS 102 778 - PAdES
//!
//! The PKCS#7 container requires the `signatures` feature.

mod byterange;
#[cfg(feature = "signatures")]
mod pkcs7;
mod range_stream;
mod signer;
mod stamper;
mod types;

pub use byterange::{
    byte_range_of, bytes_to_hex, compute_byte_range, contents_reservation, extract_signed_bytes,
    format_byte_range, signed_digest, validate_byte_range, validate_signature_gaps, BYTE_RANGE_RESERVATION,
};
#[cfg(feature = "signatures")]
pub use pkcs7::{Pkcs7Container, SignedDataSummary, SigningCredentials};
pub use range_stream::RangeStream;
pub use signer::{
    format_pdf_date, sign_detached, BlankSignatureContainer, ExternalSignatureContainer, SignatureDictionary,
    DEFAULT_ESTIMATED_SIZE,
};
pub use stamper::{PdfStamper, StamperState};
pub use types::{find_signatures, DigestAlgorithm, SignatureInfo, SignatureSubFilter};
