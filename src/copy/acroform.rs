//! Interactive form merging.
//!
//! PDF Spec: ISO 32000-1:2008, Section 12.7.2 - Interactive Form Dictionary
//!
//! Widget annotations on copied pages pull their top-level field into the
//! destination `/Fields` array. Document-wide defaults come from the first
//! source that defines them.

use crate::names::{self, Name};
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::HashSet;

/// Form-wide keys merged from the first source defining them.
pub const FORM_DEFAULT_KEYS: [Name; 4] = [names::DR, names::DA, names::NEED_APPEARANCES, names::SIG_FLAGS];

/// Destination `/AcroForm` under construction.
#[derive(Debug, Default, Clone)]
pub struct AcroFormBuilder {
    fields: Vec<ObjectRef>,
    seen: HashSet<ObjectRef>,
    defaults: Dictionary,
}

impl AcroFormBuilder {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level field (destination reference). Returns `false` if it was already present.
    pub fn add_field(&mut self, field: ObjectRef) -> bool {
        if !self.seen.insert(field) {
            return false;
        }
        self.fields.push(field);
        true
    }

    /// Top-level fields in insertion order.
    pub fn fields(&self) -> &[ObjectRef] {
        &self.fields
    }

    /// Whether a form-wide default is already set.
    pub fn has_default(&self, key: &str) -> bool {
        self.defaults.contains_key(key)
    }

    /// Set a form-wide default unless one exists.
    pub fn set_default(&mut self, key: Name, value: Object) {
        if !self.defaults.contains_key(key.as_str()) {
            self.defaults.insert(key, value);
        }
    }

    /// The `/AcroForm` dictionary, or `None` when no field was merged.
    pub fn build(&self) -> Option<Dictionary> {
        if self.fields.is_empty() {
            return None;
        }
        let mut form = Dictionary::new();
        form.insert(
            names::FIELDS,
            self.fields.iter().map(|f| Object::Reference(*f)).collect::<Vec<_>>(),
        );
        for (key, value) in &self.defaults {
            form.insert(key.clone(), value.clone());
        }
        Some(form)
    }
}
