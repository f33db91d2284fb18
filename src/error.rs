//! Error types for the PDF library.
//!
//! This module defines all error types that can occur while reading, copying,
//! writing and signing PDF documents.

use crate::object::ObjectRef;

/// Result type alias for PDF library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)] // "Invalid" prefix is intentional for clarity
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Page number outside the page tree
    #[error("Invalid page number {page}: document has {count} pages")]
    InvalidPageNumber {
        /// Requested 1-based page number
        page: usize,
        /// Number of pages in the document
        count: usize,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 decoding error
    #[error("UTF-8 decoding error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// XML reading or writing error (bookmark import/export)
    #[error("XML error: {0}")]
    Xml(String),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// `pre_close` was called on a stamper that is already pre-closed
    #[error("Document already pre-closed")]
    AlreadyPreClosed,

    /// `pre_close` was called before a signature dictionary was attached
    #[error("No crypto dictionary defined")]
    NoCryptoDictionary,

    /// `close` or `range_stream` was called before `pre_close`
    #[error("preClose() must be called first")]
    PreCloseRequired,

    /// The update dictionary passed to `close` does not match the reserved keys
    #[error("The update dictionary has {} keys than required", fewer_or_more(.fewer))]
    UpdateKeysMismatch {
        /// `true` when keys are missing, `false` when there are extra keys
        fewer: bool,
    },

    /// A patched value does not fit in its reserved window
    #[error("The key /{key} is too big. Is {got}, reserved {reserved}")]
    ReservationOverflow {
        /// Name of the reserved key
        key: String,
        /// Bytes reserved for the key
        reserved: usize,
        /// Bytes required by the serialized value
        got: usize,
    },

    /// The update dictionary passed to `close` names a key that was not reserved
    #[error("The key /{0} didn't reserve space in preClose()")]
    UnreservedKey(String),

    /// External signer or container builder failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Table cannot be placed in the available area
    #[error("Layout error: {0}")]
    Layout(String),
}

fn fewer_or_more(fewer: &bool) -> &'static str {
    if *fewer {
        "fewer"
    } else {
        "more"
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("NotAPDF".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("NotAPDF"));
    }

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_object_not_found_error() {
        let err = Error::ObjectNotFound(10, 0);
        assert!(err.to_string().contains("10 0 R"));
    }

    #[test]
    fn test_signing_protocol_messages() {
        assert!(Error::AlreadyPreClosed.to_string().contains("already pre-closed"));
        assert!(Error::NoCryptoDictionary
            .to_string()
            .contains("No crypto dictionary defined"));
        assert!(Error::PreCloseRequired.to_string().contains("must be called first"));

        let fewer = Error::UpdateKeysMismatch { fewer: true };
        assert!(fewer.to_string().contains("fewer keys than required"));
        let more = Error::UpdateKeysMismatch { fewer: false };
        assert!(more.to_string().contains("more keys than required"));
        assert!(Error::UnreservedKey("Cert".to_string()).to_string().contains("/Cert"));
    }

    #[test]
    fn test_reservation_overflow_message() {
        let err = Error::ReservationOverflow {
            key: "Contents".to_string(),
            reserved: 4742,
            got: 4744,
        };
        let msg = err.to_string();
        assert!(msg.contains("/Contents"));
        assert!(msg.contains("4742"));
        assert!(msg.contains("4744"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_circular_reference_error() {
        let err = Error::CircularReference(ObjectRef::new(7, 0));
        assert!(err.to_string().contains("7 0 R"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
