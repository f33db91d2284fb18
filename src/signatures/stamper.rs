//! Modifying an existing document and reserving signature windows.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.5.6 - Incremental Updates,
//! Section 12.8.1 - Digital Signatures
//!
//! A stamper moves through three states:
//!
//! ```text
//! Unclosed --pre_close--> PreClosed --close--> Closed
//! ```
//!
//! `pre_close` writes the whole output, including the signature dictionary
//! with fixed-width space-filled windows for each reserved key, and fills
//! `/ByteRange` in place. The signed bytes can then be read back through
//! [`PdfStamper::range_stream`]. `close` overwrites the remaining windows
//! with their final values and copies the finished file to the output.

use super::byterange::{compute_byte_range, format_byte_range, BYTE_RANGE_RESERVATION};
use super::range_stream::RangeStream;
use crate::config::StamperOptions;
use crate::error::{Error, Result};
use crate::names::{self, Name};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::reader::{PdfReader, SourceDocument};
use crate::writer::{ObjectSerializer, OutputSink, PdfWriter, ReservedSlot};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

/// Annotation flags Print (4) and Locked (128).
const SIGNATURE_WIDGET_FLAGS: i64 = 132;

/// SignaturesExist (1) and AppendOnly (2).
const SIG_FLAGS: i64 = 3;

/// Lifecycle of a [`PdfStamper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StamperState {
    /// Objects may still be added or replaced
    Unclosed,
    /// Output written with reserved windows; waiting for their values
    PreClosed,
    /// Finished
    Closed,
}

/// Writes a modified copy of a document, either appended as an incremental
/// update or rewritten in full.
pub struct PdfStamper<W: Write> {
    reader: Option<PdfReader>,
    writer: Option<PdfWriter>,
    output: Option<W>,
    state: StamperState,
    /// Replaced and new objects, written at pre-close or finish
    updates: BTreeMap<ObjectRef, Object>,
    crypto: Option<Dictionary>,
    signature_ref: Option<ObjectRef>,
    /// Reserved windows of the signature dictionary, sorted by offset
    slots: Vec<ReservedSlot>,
    byte_range: Vec<i64>,
}

impl<W: Write> std::fmt::Debug for PdfStamper<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfStamper")
            .field("state", &self.state)
            .field("updates", &self.updates.len())
            .field("slots", &self.slots)
            .field("byte_range", &self.byte_range)
            .finish()
    }
}

impl<W: Write> PdfStamper<W> {
    /// Start modifying `reader`, writing the result to `output` when closed.
    pub fn new(reader: PdfReader, output: W, options: StamperOptions) -> Result<Self> {
        let sink = match options.temp_dir.as_deref() {
            Some(dir) => OutputSink::temp_file(Some(dir))?,
            None => OutputSink::memory(),
        };
        let writer = if options.append {
            PdfWriter::append(&reader, options.writer, sink)?
        } else {
            PdfWriter::rewrite(&reader, options.writer, sink)?
        };
        Ok(Self {
            reader: Some(reader),
            writer: Some(writer),
            output: Some(output),
            state: StamperState::Unclosed,
            updates: BTreeMap::new(),
            crypto: None,
            signature_ref: None,
            slots: Vec::new(),
            byte_range: Vec::new(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StamperState {
        self.state
    }

    /// Whether the result is an incremental update.
    pub fn is_append(&self) -> bool {
        self.writer.as_ref().map_or(false, PdfWriter::is_append)
    }

    /// The ByteRange computed by [`pre_close`](Self::pre_close).
    pub fn byte_range(&self) -> &[i64] {
        &self.byte_range
    }

    /// Reserved windows of the signature dictionary, sorted by offset.
    pub fn reserved_slots(&self) -> &[ReservedSlot] {
        &self.slots
    }

    /// Current version of an object: a pending update if there is one, else the source's.
    pub fn get_object(&mut self, reference: ObjectRef) -> Result<Object> {
        if let Some(object) = self.updates.get(&reference) {
            return Ok(object.clone());
        }
        self.reader_mut()?.resolve(reference)
    }

    /// Reference of page `n` (1-based).
    pub fn page_ref(&mut self, n: usize) -> Result<ObjectRef> {
        self.reader_mut()?.page_ref(n)
    }

    /// Add a new object to the output.
    pub fn add_object(&mut self, object: impl Into<Object>) -> Result<ObjectRef> {
        self.ensure_unclosed()?;
        let reference = self.writer_mut()?.alloc_ref();
        self.updates.insert(reference, object.into());
        Ok(reference)
    }

    /// Replace an existing object in the output.
    pub fn update_object(&mut self, reference: ObjectRef, object: impl Into<Object>) -> Result<()> {
        self.ensure_unclosed()?;
        self.updates.insert(reference, object.into());
        Ok(())
    }

    /// Attach the signature dictionary that `pre_close` will write.
    ///
    /// Returns the reference the dictionary will be written under.
    pub fn set_crypto_dictionary(&mut self, dict: Dictionary) -> Result<ObjectRef> {
        self.ensure_unclosed()?;
        let reference = self.signature_reference()?;
        self.crypto = Some(dict);
        Ok(reference)
    }

    /// Add an invisible signature field whose value is the signature dictionary.
    ///
    /// The field doubles as its widget annotation, placed on page `page`
    /// (1-based) at `rect`. The page's `/Annots` and the catalog's
    /// `/AcroForm` are updated; `/SigFlags` becomes 3.
    pub fn add_signature_field(&mut self, name: &str, page: usize, rect: [f64; 4]) -> Result<ObjectRef> {
        self.ensure_unclosed()?;
        let page_ref = self.page_ref(page)?;
        let signature = self.signature_reference()?;

        let mut appearance = Dictionary::with_type(Name::new("XObject"));
        appearance.insert(names::SUBTYPE, Name::new("Form"));
        appearance.insert(
            names::BBOX,
            vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real((rect[2] - rect[0]).abs()),
                Object::Real((rect[3] - rect[1]).abs()),
            ],
        );
        appearance.insert(names::LENGTH, 0);
        let appearance = self.add_object(Object::Stream {
            dict: appearance,
            data: bytes::Bytes::new(),
        })?;
        let mut ap = Dictionary::new();
        ap.insert(names::N, appearance);

        let mut field = Dictionary::with_type(names::ANNOT);
        field.insert(names::SUBTYPE, names::WIDGET);
        field.insert(names::FT, names::SIG);
        field.insert(names::T, Object::text(name));
        field.insert(names::V, signature);
        field.insert(names::F, SIGNATURE_WIDGET_FLAGS);
        field.insert(names::RECT, rect.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>());
        field.insert(names::P, page_ref);
        field.insert(Name::new("AP"), ap);
        let field_ref = self.add_object(field)?;

        self.append_to_annots(page_ref, field_ref)?;
        self.register_field(field_ref)?;
        log::info!("Added signature field '{}' on page {} as {}", name, page, field_ref);
        Ok(field_ref)
    }

    fn append_to_annots(&mut self, page_ref: ObjectRef, annot: ObjectRef) -> Result<()> {
        let mut page = self.get_object(page_ref)?;
        let dict = page
            .as_dict_mut()
            .ok_or_else(|| Error::InvalidPdf(format!("page {} is not a dictionary", page_ref)))?;
        match dict.get(names::ANNOTS.as_str()).cloned() {
            Some(Object::Reference(array_ref)) => {
                let mut array = match self.get_object(array_ref)? {
                    Object::Array(array) => array,
                    _ => Vec::new(),
                };
                array.push(Object::Reference(annot));
                self.updates.insert(array_ref, Object::Array(array));
                return Ok(());
            },
            Some(Object::Array(mut array)) => {
                array.push(Object::Reference(annot));
                dict.insert(names::ANNOTS, array);
            },
            _ => {
                dict.insert(names::ANNOTS, vec![Object::Reference(annot)]);
            },
        }
        self.updates.insert(page_ref, page);
        Ok(())
    }

    fn register_field(&mut self, field: ObjectRef) -> Result<()> {
        let root = self
            .reader_mut()?
            .trailer()
            .get_reference("Root")
            .ok_or_else(|| Error::InvalidPdf("Trailer has no /Root reference".to_string()))?;
        let mut catalog = self.get_object(root)?;

        let (form_ref, mut form) = match catalog.as_dict().and_then(|c| c.get(names::ACRO_FORM.as_str())).cloned() {
            Some(Object::Reference(r)) => match self.get_object(r)? {
                Object::Dictionary(d) => (Some(r), d),
                _ => (Some(r), Dictionary::new()),
            },
            Some(Object::Dictionary(d)) => (None, d),
            _ => (None, Dictionary::new()),
        };

        let mut fields = match form.get(names::FIELDS.as_str()).cloned() {
            Some(Object::Reference(r)) => self.get_object(r)?.as_array().cloned().unwrap_or_default(),
            Some(Object::Array(array)) => array,
            _ => Vec::new(),
        };
        fields.push(Object::Reference(field));
        form.insert(names::FIELDS, fields);
        form.insert(names::SIG_FLAGS, SIG_FLAGS);

        match form_ref {
            Some(r) => {
                self.updates.insert(r, Object::Dictionary(form));
            },
            None => {
                let dict = catalog
                    .as_dict_mut()
                    .ok_or_else(|| Error::InvalidPdf("catalog is not a dictionary".to_string()))?;
                dict.insert(names::ACRO_FORM, form);
                self.updates.insert(root, catalog);
            },
        }
        Ok(())
    }

    /// Write the output with fixed-width windows for the signature values.
    ///
    /// `exclusion_sizes` maps each key of the signature dictionary to the
    /// number of bytes its final value may occupy. `/ByteRange` is always
    /// reserved with 80 bytes and filled before this returns.
    pub fn pre_close(&mut self, exclusion_sizes: &HashMap<Name, usize>) -> Result<()> {
        if self.state != StamperState::Unclosed {
            return Err(Error::AlreadyPreClosed);
        }
        let crypto = self.crypto.clone().ok_or(Error::NoCryptoDictionary)?;
        let signature = self.signature_reference()?;

        let mut reserved: Vec<(Name, usize)> = exclusion_sizes
            .iter()
            .filter(|(key, _)| **key != names::BYTE_RANGE)
            .map(|(key, len)| (key.clone(), *len))
            .collect();
        reserved.sort_by(|a, b| a.0.cmp(&b.0));
        reserved.push((names::BYTE_RANGE, BYTE_RANGE_RESERVATION));

        self.write_updates()?;
        let writer = self.writer_mut()?;
        let mut slots = writer.write_reserved(signature, &crypto, &reserved)?;
        let total = writer.close()?;
        slots.sort_by_key(|slot| slot.offset);

        let byte_range = compute_byte_range(&slots, total);
        let range_slot = slots
            .iter()
            .find(|slot| slot.key == names::BYTE_RANGE)
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("no /ByteRange window was reserved".to_string()))?;
        let bytes = format_byte_range(&byte_range, range_slot.len)?;
        writer.sink_mut().patch(range_slot.offset, &bytes)?;

        log::info!("Pre-closed {} byte output, ByteRange {:?}", total, byte_range);
        self.slots = slots;
        self.byte_range = byte_range;
        self.state = StamperState::PreClosed;
        Ok(())
    }

    /// The bytes covered by the ByteRange, in order, skipping the reserved windows.
    pub fn range_stream(&mut self) -> Result<RangeStream<'_>> {
        if self.state != StamperState::PreClosed {
            return Err(Error::PreCloseRequired);
        }
        let writer = self.writer.as_mut().ok_or(Error::PreCloseRequired)?;
        RangeStream::new(writer.sink_mut(), &self.byte_range)
    }

    /// Fill the reserved windows and copy the finished document to the output.
    ///
    /// `update` must hold exactly the keys reserved in `pre_close`, apart from
    /// `/ByteRange`. Values shorter than their window are padded with spaces.
    /// The source document and any temporary file are released whether or
    /// not this succeeds.
    pub fn close(mut self, update: &Dictionary) -> Result<W> {
        let result = self.close_inner(update);
        self.release();
        result
    }

    fn close_inner(&mut self, update: &Dictionary) -> Result<W> {
        if self.state != StamperState::PreClosed {
            return Err(Error::PreCloseRequired);
        }
        let pending: Vec<ReservedSlot> = self
            .slots
            .iter()
            .filter(|slot| slot.key != names::BYTE_RANGE)
            .cloned()
            .collect();
        if update.len() != pending.len() {
            return Err(Error::UpdateKeysMismatch {
                fewer: update.len() < pending.len(),
            });
        }

        let serializer = ObjectSerializer::new();
        let mut patches = Vec::with_capacity(pending.len());
        for (key, value) in update {
            let slot = pending
                .iter()
                .find(|slot| slot.key == *key)
                .ok_or_else(|| Error::UnreservedKey(key.as_str().to_string()))?;
            let bytes = serializer.serialize(value);
            if bytes.len() > slot.len {
                return Err(Error::ReservationOverflow {
                    key: key.as_str().to_string(),
                    reserved: slot.len,
                    got: bytes.len(),
                });
            }
            patches.push((slot.offset, bytes));
        }

        let writer = self.writer.as_mut().ok_or(Error::PreCloseRequired)?;
        for (offset, bytes) in &patches {
            writer.sink_mut().patch(*offset, bytes)?;
        }
        let mut output = self.output.take().ok_or(Error::PreCloseRequired)?;
        let written = writer.sink_mut().copy_to(&mut output)?;
        output.flush()?;
        self.state = StamperState::Closed;
        log::info!("Closed stamper: {} reserved values filled, {} bytes written", patches.len(), written);
        Ok(output)
    }

    /// Write the modified document without any signature windows.
    pub fn finish(mut self) -> Result<W> {
        let result = self.finish_inner();
        self.release();
        result
    }

    fn finish_inner(&mut self) -> Result<W> {
        if self.state != StamperState::Unclosed {
            return Err(Error::AlreadyPreClosed);
        }
        if self.crypto.is_some() {
            return Err(Error::InvalidPdf(
                "a signature dictionary is attached; use pre_close and close".to_string(),
            ));
        }
        self.write_updates()?;
        let writer = self.writer_mut()?;
        writer.close()?;
        let mut output = self.output.take().ok_or(Error::PreCloseRequired)?;
        let writer = self.writer_mut()?;
        writer.sink_mut().copy_to(&mut output)?;
        output.flush()?;
        self.state = StamperState::Closed;
        Ok(output)
    }

    /// Write pending objects; a rewrite first carries over every untouched source object.
    fn write_updates(&mut self) -> Result<()> {
        let (Some(writer), Some(reader)) = (self.writer.as_mut(), self.reader.as_mut()) else {
            return Err(Error::InvalidPdf("stamper already released its document".to_string()));
        };
        if !writer.is_append() {
            let mut carried = 0;
            for reference in reader.xref().in_use() {
                if self.updates.contains_key(&reference) || Some(reference) == self.signature_ref {
                    continue;
                }
                let object = reader.resolve(reference)?;
                if is_cross_reference_container(&object) || object.is_null() {
                    continue;
                }
                writer.write_object(reference, &object)?;
                carried += 1;
            }
            log::debug!("Carried {} source objects into the rewrite", carried);
        }
        for (reference, object) in std::mem::take(&mut self.updates) {
            writer.write_object(reference, &object)?;
        }
        Ok(())
    }

    fn signature_reference(&mut self) -> Result<ObjectRef> {
        if let Some(reference) = self.signature_ref {
            return Ok(reference);
        }
        let reference = self.writer_mut()?.alloc_ref();
        self.signature_ref = Some(reference);
        Ok(reference)
    }

    fn ensure_unclosed(&self) -> Result<()> {
        if self.state != StamperState::Unclosed {
            return Err(Error::AlreadyPreClosed);
        }
        Ok(())
    }

    fn reader_mut(&mut self) -> Result<&mut PdfReader> {
        self.reader
            .as_mut()
            .ok_or_else(|| Error::InvalidPdf("stamper already released its document".to_string()))
    }

    fn writer_mut(&mut self) -> Result<&mut PdfWriter> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::InvalidPdf("stamper already released its output".to_string()))
    }

    /// Drop the source document and the output buffer (deleting a temporary file).
    fn release(&mut self) {
        if self.reader.take().is_some() {
            log::debug!("Released source document");
        }
        self.writer = None;
    }
}

impl<W: Write> Drop for PdfStamper<W> {
    fn drop(&mut self) {
        if self.state != StamperState::Closed && self.writer.is_some() {
            log::warn!("Stamper dropped in state {:?}; output discarded", self.state);
        }
        self.release();
    }
}

/// Object and cross-reference streams only describe the source layout.
fn is_cross_reference_container(object: &Object) -> bool {
    match object {
        Object::Stream { dict, .. } => dict.has_type("ObjStm") || dict.has_type("XRef"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::PdfString;
    use crate::signatures::byterange::contents_reservation;
    use std::io::Read;

    fn source_pdf() -> PdfReader {
        let mut writer = PdfWriter::new();
        writer
            .new_page([0.0, 0.0, 612.0, 792.0], Dictionary::new(), b"BT ET")
            .unwrap();
        PdfReader::from_bytes(writer.finish().unwrap()).unwrap()
    }

    fn sig_dict() -> Dictionary {
        let mut dict = Dictionary::with_type(names::SIG);
        dict.insert(names::FILTER, names::ADOBE_PPKLITE);
        dict.insert(names::SUBFILTER, names::ADBE_PKCS7_DETACHED);
        dict
    }

    fn contents_only(len: usize) -> HashMap<Name, usize> {
        let mut sizes = HashMap::new();
        sizes.insert(names::CONTENTS, len);
        sizes
    }

    #[test]
    fn test_pre_close_requires_crypto() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        let err = stamper.pre_close(&contents_only(100)).unwrap_err();
        assert!(matches!(err, Error::NoCryptoDictionary));
        assert_eq!(stamper.state(), StamperState::Unclosed);
    }

    #[test]
    fn test_pre_close_twice() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(100)).unwrap();
        let err = stamper.pre_close(&contents_only(100)).unwrap_err();
        assert!(matches!(err, Error::AlreadyPreClosed));
    }

    #[test]
    fn test_range_stream_before_pre_close() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        assert!(matches!(stamper.range_stream(), Err(Error::PreCloseRequired)));
    }

    #[test]
    fn test_close_before_pre_close() {
        let stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        let err = stamper.close(&Dictionary::new()).unwrap_err();
        assert!(matches!(err, Error::PreCloseRequired));
    }

    #[test]
    fn test_byte_range_always_reserved() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        let mut sizes = contents_only(20);
        sizes.insert(names::BYTE_RANGE, 10);
        stamper.pre_close(&sizes).unwrap();

        let range = stamper
            .reserved_slots()
            .iter()
            .find(|s| s.key == names::BYTE_RANGE)
            .unwrap()
            .clone();
        assert_eq!(range.len, BYTE_RANGE_RESERVATION);
        let slots = stamper.reserved_slots();
        assert!(slots.windows(2).all(|w| w[0].offset < w[1].offset));
    }

    #[test]
    fn test_key_count_mismatch() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(20)).unwrap();
        let err = stamper.close(&Dictionary::new()).unwrap_err();
        assert!(matches!(err, Error::UpdateKeysMismatch { fewer: true }));
    }

    #[test]
    fn test_too_many_keys() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(20)).unwrap();
        let mut update = Dictionary::new();
        update.insert(names::CONTENTS, PdfString::hex(vec![1]));
        update.insert(names::REASON, Object::text("late"));
        let err = stamper.close(&update).unwrap_err();
        assert!(matches!(err, Error::UpdateKeysMismatch { fewer: false }));
    }

    #[test]
    fn test_unreserved_key() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(20)).unwrap();
        let mut update = Dictionary::new();
        update.insert(names::REASON, Object::text("x"));
        let err = stamper.close(&update).unwrap_err();
        assert!(matches!(err, Error::UnreservedKey(ref key) if key == "Reason"));
    }

    #[test]
    fn test_overflow_rejected() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(contents_reservation(4))).unwrap();
        let mut update = Dictionary::new();
        update.insert(names::CONTENTS, PdfString::hex(vec![0xAB; 5]));
        let err = stamper.close(&update).unwrap_err();
        match err {
            Error::ReservationOverflow { key, reserved, got } => {
                assert_eq!(key, "Contents");
                assert_eq!(reserved, 10);
                assert_eq!(got, 12);
            },
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_short_value_padded_with_spaces() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(10)).unwrap();
        let slot = stamper.reserved_slots().iter().find(|s| s.key == names::CONTENTS).unwrap().clone();
        let mut update = Dictionary::new();
        update.insert(names::CONTENTS, PdfString::hex(vec![0xAB]));
        let out = stamper.close(&update).unwrap();
        let start = slot.offset as usize;
        assert_eq!(&out[start..start + slot.len], b"<AB>      ");
    }

    #[test]
    fn test_range_stream_matches_byte_range() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(contents_reservation(8))).unwrap();
        let byte_range = stamper.byte_range().to_vec();
        let mut signed = Vec::new();
        stamper.range_stream().unwrap().read_to_end(&mut signed).unwrap();
        assert_eq!(signed.len() as i64, byte_range[1] + byte_range[3]);

        let mut update = Dictionary::new();
        update.insert(names::CONTENTS, PdfString::hex(vec![0x11; 8]));
        let out = stamper.close(&update).unwrap();
        let expected = crate::signatures::byterange::extract_signed_bytes(&out, &byte_range).unwrap();
        assert_eq!(signed, expected);
        assert_eq!(byte_range[2] + byte_range[3], out.len() as i64);
    }

    #[test]
    fn test_append_keeps_original_prefix() {
        let reader = source_pdf();
        let original = reader.data().to_vec();
        let mut stamper = PdfStamper::new(reader, Vec::new(), StamperOptions::default()).unwrap();
        stamper.add_signature_field("Signature1", 1, [0.0, 0.0, 0.0, 0.0]).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(20)).unwrap();
        let mut update = Dictionary::new();
        update.insert(names::CONTENTS, PdfString::hex(vec![0; 9]));
        let out = stamper.close(&update).unwrap();
        assert!(out.starts_with(&original));
        assert!(out.len() > original.len());

        let mut reread = PdfReader::from_bytes(out).unwrap();
        let catalog = reread.catalog().unwrap();
        let form = catalog.get_dict("AcroForm").unwrap();
        assert_eq!(form.get_integer("SigFlags"), Some(3));
        assert_eq!(form.get_array("Fields").unwrap().len(), 1);
        let page = reread.page(1).unwrap();
        assert_eq!(page.get_array("Annots").unwrap().len(), 1);
    }

    #[test]
    fn test_full_rewrite_is_single_revision() {
        let options = StamperOptions::default().with_append(false);
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), options).unwrap();
        assert!(!stamper.is_append());
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(20)).unwrap();
        let mut update = Dictionary::new();
        update.insert(names::CONTENTS, PdfString::hex(vec![0; 9]));
        let out = stamper.close(&update).unwrap();

        let text = String::from_utf8_lossy(&out);
        assert_eq!(text.matches("startxref").count(), 1);
        assert!(!text.contains("/Prev"));
        let mut reread = PdfReader::from_bytes(out).unwrap();
        assert_eq!(reread.page_count().unwrap(), 1);
    }

    #[test]
    fn test_finish_without_signature() {
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), StamperOptions::default()).unwrap();
        let extra = stamper.add_object(Object::text("note")).unwrap();
        let out = stamper.finish().unwrap();
        let mut reread = PdfReader::from_bytes(out).unwrap();
        assert_eq!(reread.resolve(extra).unwrap().as_text().as_deref(), Some("note"));
    }

    #[test]
    fn test_temp_file_backing() {
        let dir = tempfile::tempdir().unwrap();
        let options = StamperOptions::default().with_temp_dir(dir.path());
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), options).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(20)).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let mut update = Dictionary::new();
        update.insert(names::CONTENTS, PdfString::hex(vec![0; 9]));
        stamper.close(&update).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_temp_file_removed_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let options = StamperOptions::default().with_temp_dir(dir.path());
        let mut stamper = PdfStamper::new(source_pdf(), Vec::new(), options).unwrap();
        stamper.set_crypto_dictionary(sig_dict()).unwrap();
        stamper.pre_close(&contents_only(4)).unwrap();
        let mut update = Dictionary::new();
        update.insert(names::CONTENTS, PdfString::hex(vec![0; 9]));
        assert!(stamper.close(&update).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
