//! Digital signature types and data structures.

use super::byterange::byte_range_of;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::reader::SourceDocument;

/// Deepest field hierarchy searched for signature fields.
const MAX_FIELD_DEPTH: usize = 32;

/// Digest algorithm used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-1 (deprecated, but still common in legacy PDFs)
    Sha1,
    /// SHA-256 (recommended)
    #[default]
    Sha256,
}

impl DigestAlgorithm {
    /// Dotted OID of this digest algorithm.
    pub fn oid(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "1.3.14.3.2.26",
            DigestAlgorithm::Sha256 => "2.16.840.1.101.3.4.2.1",
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
        }
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 with SHA-1 digest
    Pkcs7Sha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            _ => None,
        }
    }
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// Name of the signer
    pub signer_name: Option<String>,
    /// Signing time as written in `/M`
    pub signing_time: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Signing location
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// Raw `/Contents` bytes (the signature container, zero padded)
    pub contents: Vec<u8>,
}

impl SignatureInfo {
    /// Extract signature information from a signature dictionary.
    pub fn from_dict(dict: &Dictionary) -> Result<Self> {
        if !dict.has_type("Sig") && !dict.contains_key("ByteRange") {
            return Err(Error::InvalidPdf("not a signature dictionary".to_string()));
        }
        let text = |key: &str| dict.get(key).and_then(Object::as_text);
        Ok(Self {
            signer_name: text("Name"),
            signing_time: text("M"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
            sub_filter: dict.get_name("SubFilter").and_then(SignatureSubFilter::from_pdf_name),
            byte_range: byte_range_of(dict)?,
            contents: dict.get("Contents").and_then(Object::as_string).map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    /// Whether the byte range has a single gap, as produced by one signing pass.
    pub fn has_single_gap(&self) -> bool {
        self.byte_range.len() == 4
    }

    /// The signature container with its zero padding removed.
    pub fn trimmed_contents(&self) -> &[u8] {
        let end = self.contents.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        &self.contents[..end]
    }
}

/// Signed signature fields of a document, as (fully qualified field name, signature).
///
/// Fields whose `/V` is missing or not a signature dictionary are skipped.
pub fn find_signatures<D: SourceDocument + ?Sized>(doc: &mut D) -> Result<Vec<(String, SignatureInfo)>> {
    let catalog = doc.catalog()?;
    let Some(form) = catalog.get("AcroForm") else {
        return Ok(Vec::new());
    };
    let form = doc.resolve_value(form)?;
    let fields = match form.as_dict().and_then(|f| f.get("Fields")) {
        Some(fields) => doc.resolve_value(fields)?,
        None => return Ok(Vec::new()),
    };

    let mut found = Vec::new();
    let mut stack: Vec<(Object, String, usize)> = fields
        .as_array()
        .map(|items| items.iter().rev().map(|f| (f.clone(), String::new(), 0)).collect())
        .unwrap_or_default();
    while let Some((field, prefix, depth)) = stack.pop() {
        if depth > MAX_FIELD_DEPTH {
            log::warn!("Field hierarchy deeper than {} levels, stopping", MAX_FIELD_DEPTH);
            continue;
        }
        let Object::Dictionary(field) = doc.resolve_value(&field)? else {
            continue;
        };
        let name = match field.get("T").and_then(Object::as_text) {
            Some(t) if prefix.is_empty() => t,
            Some(t) => format!("{}.{}", prefix, t),
            None => prefix.clone(),
        };
        if field.get_name("FT") == Some("Sig") {
            if let Some(value) = field.get("V") {
                if let Object::Dictionary(sig) = doc.resolve_value(value)? {
                    match SignatureInfo::from_dict(&sig) {
                        Ok(info) => found.push((name.clone(), info)),
                        Err(e) => log::warn!("Signature field '{}' has a malformed value: {}", name, e),
                    }
                }
            }
        }
        if let Some(kids) = field.get_array("Kids") {
            for kid in kids.iter().rev() {
                stack.push((kid.clone(), name.clone(), depth + 1));
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names;
    use crate::object::PdfString;
    use crate::reader::MemoryDocument;

    #[test]
    fn test_digest_algorithm_names() {
        assert_eq!(DigestAlgorithm::Sha256.name(), "SHA-256");
        assert_eq!(DigestAlgorithm::Sha1.name(), "SHA-1");
        assert_eq!(DigestAlgorithm::default().output_len(), 32);
    }

    #[test]
    fn test_sub_filter_names() {
        assert_eq!(SignatureSubFilter::Pkcs7Detached.as_pdf_name(), "adbe.pkcs7.detached");
        assert_eq!(
            SignatureSubFilter::from_pdf_name("ETSI.CAdES.detached"),
            Some(SignatureSubFilter::CadesDetached)
        );
        assert_eq!(SignatureSubFilter::from_pdf_name("x.unknown"), None);
    }

    #[test]
    fn test_info_from_dict() {
        let mut dict = Dictionary::with_type(names::SIG);
        dict.insert(names::SUBFILTER, names::ADBE_PKCS7_DETACHED);
        dict.insert(names::REASON, Object::text("Approved"));
        dict.insert(names::BYTE_RANGE, vec![Object::Integer(0), Object::Integer(10), Object::Integer(20), Object::Integer(5)]);
        dict.insert(names::CONTENTS, PdfString::hex(vec![0x30, 0x82, 0x00, 0x00]));

        let info = SignatureInfo::from_dict(&dict).unwrap();
        assert_eq!(info.reason.as_deref(), Some("Approved"));
        assert_eq!(info.sub_filter, Some(SignatureSubFilter::Pkcs7Detached));
        assert!(info.has_single_gap());
        assert_eq!(info.trimmed_contents(), &[0x30, 0x82]);
    }

    #[test]
    fn test_info_requires_signature_dict() {
        assert!(SignatureInfo::from_dict(&Dictionary::new()).is_err());
    }

    #[test]
    fn test_find_signatures_walks_field_tree() {
        let mut doc = MemoryDocument::new();
        doc.with_pages(vec![Dictionary::with_type(names::PAGE)]);
        let mut sig = Dictionary::with_type(names::SIG);
        sig.insert(names::BYTE_RANGE, vec![Object::Integer(0), Object::Integer(1), Object::Integer(3), Object::Integer(1)]);
        let sig = doc.add(sig);

        let mut signed = Dictionary::new();
        signed.insert(names::FT, names::SIG);
        signed.insert(names::T, Object::text("approval"));
        signed.insert(names::V, sig);
        let signed = doc.add(signed);
        let mut unsigned = Dictionary::new();
        unsigned.insert(names::FT, names::SIG);
        unsigned.insert(names::T, Object::text("empty"));
        let unsigned = doc.add(unsigned);

        let mut parent = Dictionary::new();
        parent.insert(names::T, Object::text("sigs"));
        parent.insert(names::KIDS, vec![Object::Reference(signed), Object::Reference(unsigned)]);
        let parent = doc.add(parent);
        let mut form = Dictionary::new();
        form.insert(names::FIELDS, vec![Object::Reference(parent)]);
        doc.set_catalog_entry(names::ACRO_FORM, form).unwrap();

        let found = find_signatures(&mut doc).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "sigs.approval");
        assert_eq!(found[0].1.byte_range, vec![0, 1, 3, 1]);
    }

    #[test]
    fn test_find_signatures_without_form() {
        let mut doc = MemoryDocument::new();
        doc.with_pages(vec![Dictionary::with_type(names::PAGE)]);
        assert!(find_signatures(&mut doc).unwrap().is_empty());
    }
}
