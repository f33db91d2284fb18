//! Detached PKCS#7 / CMS signature containers.
//!
//! PDF Spec: ISO 32000-1:2008, Section 12.8.3.3 - PKCS#7 Signatures
//! CMS: RFC 5652, Section 5 - Signed-data Content Type
//!
//! Builds a `SignedData` with no encapsulated content, a single signer
//! identified by issuer and serial number, and the signed attributes
//! content-type, message-digest and signing-time. Only RSA PKCS#1 v1.5
//! keys are supported.

use super::signer::ExternalSignatureContainer;
use super::types::{DigestAlgorithm, SignatureSubFilter};
use crate::error::{Error, Result};
use crate::names::{self, Name};
use crate::object::Dictionary;
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo, SignerInfos,
};
use der::asn1::{OctetString, SetOfVec, UtcTime};
use der::{Any, Decode, Encode, SliceReader};
use pkcs1::DecodeRsaPrivateKey;
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use signature::{SignatureEncoding, Signer, Verifier};
use spki::{AlgorithmIdentifierOwned, ObjectIdentifier};
use std::io::Read;
use std::time::Duration;
use x509_cert::attr::Attribute;
use x509_cert::Certificate;

const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

fn der_error(e: der::Error) -> Error {
    Error::SigningFailed(format!("DER encoding: {}", e))
}

fn digest_oid(algorithm: DigestAlgorithm) -> ObjectIdentifier {
    match algorithm {
        DigestAlgorithm::Sha1 => ObjectIdentifier::new_unwrap("1.3.14.3.2.26"),
        DigestAlgorithm::Sha256 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"),
    }
}

fn digest_from_oid(oid: &ObjectIdentifier) -> Option<DigestAlgorithm> {
    [DigestAlgorithm::Sha1, DigestAlgorithm::Sha256]
        .into_iter()
        .find(|alg| digest_oid(*alg) == *oid)
}

/// Hash everything `data` yields.
fn digest_reader(algorithm: DigestAlgorithm, data: &mut dyn Read) -> Result<Vec<u8>> {
    let mut buf = [0u8; 8192];
    match algorithm {
        DigestAlgorithm::Sha1 => {
            let mut hasher = Sha1::new();
            loop {
                let n = data.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            Ok(hasher.finalize().to_vec())
        },
        DigestAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let n = data.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            Ok(hasher.finalize().to_vec())
        },
    }
}

/// A signing certificate with its RSA private key.
#[derive(Clone)]
pub struct SigningCredentials {
    certificate: Certificate,
    chain: Vec<Certificate>,
    key: RsaPrivateKey,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("subject", &self.certificate.tbs_certificate.subject.to_string())
            .field("chain", &self.chain.len())
            .finish_non_exhaustive()
    }
}

impl SigningCredentials {
    /// Load a DER certificate and a DER private key (PKCS#8, or PKCS#1 RSA).
    pub fn from_der(certificate: &[u8], private_key: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_der(certificate).map_err(der_error)?;
        let key = RsaPrivateKey::from_pkcs8_der(private_key)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(private_key))
            .map_err(|e| Error::SigningFailed(format!("unsupported private key: {}", e)))?;
        Ok(Self {
            certificate,
            chain: Vec::new(),
            key,
        })
    }

    /// Add intermediate certificates (DER) to embed after the signing certificate.
    pub fn with_chain(mut self, chain: &[Vec<u8>]) -> Result<Self> {
        for der in chain {
            let cert = Certificate::from_der(der).map_err(der_error)?;
            if cert != self.certificate && !self.chain.contains(&cert) {
                self.chain.push(cert);
            }
        }
        Ok(self)
    }

    /// Subject of the signing certificate in RFC 4514 form.
    pub fn subject(&self) -> Result<String> {
        let der = self.certificate.to_der().map_err(der_error)?;
        certificate_names(&der).map(|(subject, _)| subject)
    }
}

/// Subject and issuer of a DER certificate.
fn certificate_names(der: &[u8]) -> Result<(String, String)> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| Error::InvalidPdf(format!("bad certificate: {}", e)))?;
    Ok((cert.subject().to_string(), cert.issuer().to_string()))
}

/// Builds detached `SignedData` containers for the ByteRange bytes.
#[derive(Debug, Clone)]
pub struct Pkcs7Container {
    credentials: SigningCredentials,
    digest: DigestAlgorithm,
    sub_filter: SignatureSubFilter,
    signing_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl Pkcs7Container {
    /// SHA-256, `adbe.pkcs7.detached`, signed now.
    pub fn new(credentials: SigningCredentials) -> Self {
        Self {
            credentials,
            digest: DigestAlgorithm::Sha256,
            sub_filter: SignatureSubFilter::Pkcs7Detached,
            signing_time: None,
        }
    }

    /// Choose the digest algorithm.
    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Choose the `/SubFilter` written to the signature dictionary.
    pub fn with_sub_filter(mut self, sub_filter: SignatureSubFilter) -> Self {
        self.sub_filter = sub_filter;
        self
    }

    /// Fix the signing-time attribute.
    pub fn with_signing_time(mut self, time: chrono::DateTime<chrono::Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Build the DER `ContentInfo` for content with the given digest.
    pub fn build(&self, message_digest: &[u8]) -> Result<Vec<u8>> {
        let digest_alg = AlgorithmIdentifierOwned {
            oid: digest_oid(self.digest),
            parameters: None,
        };
        let time = self.signing_time.unwrap_or_else(chrono::Utc::now);
        let unix = Duration::from_secs(time.timestamp().max(0) as u64);

        let signed_attrs = SetOfVec::try_from(vec![
            attribute(ID_CONTENT_TYPE, Any::encode_from(&ID_DATA).map_err(der_error)?)?,
            attribute(
                ID_MESSAGE_DIGEST,
                Any::encode_from(&OctetString::new(message_digest.to_vec()).map_err(der_error)?)
                    .map_err(der_error)?,
            )?,
            attribute(
                ID_SIGNING_TIME,
                Any::encode_from(&UtcTime::from_unix_duration(unix).map_err(der_error)?).map_err(der_error)?,
            )?,
        ])
        .map_err(der_error)?;

        // The signature covers the attributes encoded as an explicit SET OF
        let to_sign = signed_attrs.to_der().map_err(der_error)?;
        let signature = self.sign_bytes(&to_sign)?;

        let cert = &self.credentials.certificate;
        let signer = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: cert.tbs_certificate.issuer.clone(),
                serial_number: cert.tbs_certificate.serial_number.clone(),
            }),
            digest_alg: digest_alg.clone(),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: RSA_ENCRYPTION,
                parameters: Some(Any::null()),
            },
            signature: OctetString::new(signature).map_err(der_error)?,
            unsigned_attrs: None,
        };

        let certificates = std::iter::once(cert)
            .chain(self.credentials.chain.iter())
            .map(|c| CertificateChoices::Certificate(c.clone()))
            .collect::<Vec<_>>();
        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![digest_alg]).map_err(der_error)?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(SetOfVec::try_from(certificates).map_err(der_error)?)),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer]).map_err(der_error)?),
        };
        let info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data).map_err(der_error)?,
        };
        let der = info.to_der().map_err(der_error)?;
        log::debug!("Built {} byte PKCS#7 container ({})", der.len(), self.digest.name());
        Ok(der)
    }

    fn sign_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.credentials.key.clone();
        let signature = match self.digest {
            DigestAlgorithm::Sha1 => SigningKey::<Sha1>::new(key).try_sign(data),
            DigestAlgorithm::Sha256 => SigningKey::<Sha256>::new(key).try_sign(data),
        }
        .map_err(|e| Error::SigningFailed(format!("RSA signing: {}", e)))?;
        Ok(signature.to_vec())
    }
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value]).map_err(der_error)?,
    })
}

impl ExternalSignatureContainer for Pkcs7Container {
    fn sign(&mut self, data: &mut dyn Read) -> Result<Vec<u8>> {
        let digest = digest_reader(self.digest, data)?;
        self.build(&digest)
    }

    fn modify_signing_dictionary(&self, dict: &mut Dictionary) {
        dict.insert(names::FILTER, names::ADOBE_PPKLITE);
        dict.insert(names::SUBFILTER, Name::new(self.sub_filter.as_pdf_name()));
    }
}

/// What a detached `SignedData` says about its signer.
#[derive(Debug, Clone)]
pub struct SignedDataSummary {
    /// Digest algorithm of the first signer
    pub digest_algorithm: Option<DigestAlgorithm>,
    /// Value of the message-digest signed attribute
    pub message_digest: Option<Vec<u8>>,
    /// Subject of the signing certificate
    pub signer_subject: Option<String>,
    /// Issuer of the signing certificate
    pub signer_issuer: Option<String>,
    /// Number of embedded certificates
    pub certificate_count: usize,
    signed_attrs: Vec<u8>,
    signature: Vec<u8>,
    signer_certificate: Option<Vec<u8>>,
}

impl SignedDataSummary {
    /// Parse a container; trailing zero padding from `/Contents` is ignored.
    pub fn parse(container: &[u8]) -> Result<Self> {
        let bad = |e: der::Error| Error::InvalidPdf(format!("bad PKCS#7 container: {}", e));
        let mut reader = SliceReader::new(container).map_err(bad)?;
        let info = ContentInfo::decode(&mut reader).map_err(bad)?;
        if info.content_type != ID_SIGNED_DATA {
            return Err(Error::InvalidPdf(format!(
                "container content type {} is not signed-data",
                info.content_type
            )));
        }
        let signed_data = SignedData::from_der(&info.content.to_der().map_err(bad)?).map_err(bad)?;
        let signer = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .ok_or_else(|| Error::InvalidPdf("signed-data has no signer".to_string()))?;

        let mut message_digest = None;
        let mut signed_attrs = Vec::new();
        if let Some(attrs) = &signer.signed_attrs {
            for attr in attrs.iter() {
                if attr.oid == ID_MESSAGE_DIGEST {
                    message_digest = attr.values.iter().next().map(|v| v.value().to_vec());
                }
            }
            signed_attrs = attrs.to_der().map_err(bad)?;
        }

        let certificates: Vec<&Certificate> = signed_data
            .certificates
            .as_ref()
            .map(|set| {
                set.0
                    .iter()
                    .filter_map(|choice| match choice {
                        CertificateChoices::Certificate(cert) => Some(cert),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let signer_cert = match &signer.sid {
            SignerIdentifier::IssuerAndSerialNumber(id) => certificates
                .iter()
                .find(|c| c.tbs_certificate.serial_number == id.serial_number && c.tbs_certificate.issuer == id.issuer),
            _ => certificates.first(),
        };
        let signer_certificate = match signer_cert {
            Some(cert) => Some(cert.to_der().map_err(bad)?),
            None => None,
        };
        let (signer_subject, signer_issuer) = match signer_certificate.as_deref().map(certificate_names) {
            Some(Ok((subject, issuer))) => (Some(subject), Some(issuer)),
            Some(Err(e)) => {
                log::warn!("Could not read signer certificate: {}", e);
                (None, None)
            },
            None => (None, None),
        };

        Ok(Self {
            digest_algorithm: digest_from_oid(&signer.digest_alg.oid),
            message_digest,
            signer_subject,
            signer_issuer,
            certificate_count: certificates.len(),
            signed_attrs,
            signature: signer.signature.as_bytes().to_vec(),
            signer_certificate,
        })
    }

    /// Check the container against the signed content.
    ///
    /// Returns `Ok(false)` when the digest or the RSA signature does not match.
    pub fn verify(&self, content: &[u8]) -> Result<bool> {
        let algorithm = self
            .digest_algorithm
            .ok_or_else(|| Error::Unsupported("unknown digest algorithm".to_string()))?;
        let digest = digest_reader(algorithm, &mut std::io::Cursor::new(content))?;
        if self.message_digest.as_deref() != Some(digest.as_slice()) {
            log::info!("Message digest does not match the signed content");
            return Ok(false);
        }

        let cert_der = self
            .signer_certificate
            .as_deref()
            .ok_or_else(|| Error::InvalidPdf("signer certificate not embedded".to_string()))?;
        let cert = Certificate::from_der(cert_der).map_err(der_error)?;
        let spki = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(der_error)?;
        let key = RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| Error::Unsupported(format!("signer key is not RSA: {}", e)))?;
        let signature = match Signature::try_from(self.signature.as_slice()) {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };
        let valid = match algorithm {
            DigestAlgorithm::Sha1 => VerifyingKey::<Sha1>::new(key).verify(&self.signed_attrs, &signature),
            DigestAlgorithm::Sha256 => VerifyingKey::<Sha256>::new(key).verify(&self.signed_attrs, &signature),
        }
        .is_ok();
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StamperOptions;
    use crate::reader::{PdfReader, SourceDocument};
    use crate::signatures::byterange::{byte_range_of, extract_signed_bytes};
    use crate::signatures::signer::{sign_detached, SignatureDictionary};
    use crate::signatures::stamper::PdfStamper;
    use crate::signatures::types::SignatureInfo;
    use crate::writer::PdfWriter;

    const CERT: &[u8] = include_bytes!("../../tests/fixtures/signer_cert.der");
    const KEY: &[u8] = include_bytes!("../../tests/fixtures/signer_key.der");

    fn credentials() -> SigningCredentials {
        SigningCredentials::from_der(CERT, KEY).unwrap()
    }

    #[test]
    fn test_credentials_subject() {
        let subject = credentials().subject().unwrap();
        assert!(subject.contains("pdf_graft test signer"), "{}", subject);
    }

    #[test]
    fn test_container_round_trip() {
        let container = Pkcs7Container::new(credentials());
        let content = b"signed bytes";
        let der = container.build(&Sha256::digest(content)).unwrap();

        let mut padded = der.clone();
        padded.resize(der.len() + 64, 0);
        let summary = SignedDataSummary::parse(&padded).unwrap();
        assert_eq!(summary.digest_algorithm, Some(DigestAlgorithm::Sha256));
        assert_eq!(summary.certificate_count, 1);
        assert!(summary.signer_subject.unwrap().contains("pdf_graft test signer"));
        assert!(SignedDataSummary::parse(&der).unwrap().verify(content).unwrap());
        assert!(!SignedDataSummary::parse(&der).unwrap().verify(b"other bytes").unwrap());
    }

    #[test]
    fn test_sha1_container() {
        let container = Pkcs7Container::new(credentials()).with_digest(DigestAlgorithm::Sha1);
        let mut content = std::io::Cursor::new(b"legacy".to_vec());
        let der = container.clone().sign(&mut content).unwrap();
        let summary = SignedDataSummary::parse(&der).unwrap();
        assert_eq!(summary.digest_algorithm, Some(DigestAlgorithm::Sha1));
        assert!(summary.verify(b"legacy").unwrap());
    }

    #[test]
    fn test_sign_document() {
        let mut writer = PdfWriter::new();
        writer
            .new_page([0.0, 0.0, 612.0, 792.0], Dictionary::new(), b"BT ET")
            .unwrap();
        let reader = PdfReader::from_bytes(writer.finish().unwrap()).unwrap();

        let mut stamper = PdfStamper::new(reader, Vec::new(), StamperOptions::default()).unwrap();
        stamper.add_signature_field("Signature1", 1, [0.0, 0.0, 0.0, 0.0]).unwrap();
        let mut container = Pkcs7Container::new(credentials());
        let dict = SignatureDictionary::default().with_reason("Testing");
        let out = sign_detached(stamper, &mut container, &dict, 4096).unwrap();

        let mut reader = PdfReader::from_bytes(out.clone()).unwrap();
        let form = reader.catalog().unwrap().get_dict("AcroForm").unwrap().clone();
        let field = reader.resolve_value(&form.get_array("Fields").unwrap()[0]).unwrap();
        let sig = reader
            .resolve_value(field.as_dict().unwrap().get("V").unwrap())
            .unwrap();
        let info = SignatureInfo::from_dict(sig.as_dict().unwrap()).unwrap();
        assert_eq!(info.reason.as_deref(), Some("Testing"));

        let signed = extract_signed_bytes(&out, &byte_range_of(sig.as_dict().unwrap()).unwrap()).unwrap();
        let summary = SignedDataSummary::parse(&info.contents).unwrap();
        assert!(summary.verify(&signed).unwrap());
    }
}
