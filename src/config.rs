//! Configuration for reading, writing, copying and stamping.
//!
//! All option structs follow the same pattern: `Default` gives the lenient,
//! general-purpose behavior and `with_*` methods adjust individual settings.

use std::path::PathBuf;

/// Options for opening a source document.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Fail on a broken cross-reference chain instead of rebuilding it.
    pub strict: bool,

    /// Maximum depth when following references or walking the page tree.
    pub max_recursion_depth: u32,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_recursion_depth: 100,
        }
    }
}

impl ReaderOptions {
    /// Create options with defaults (lenient).
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict mode: no xref reconstruction.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Set the recursion limit.
    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth;
        self
    }
}

/// Options for serializing a document.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// PDF version written in the header, e.g. "1.7".
    pub version: String,

    /// Compact dictionary formatting (no newlines between entries).
    pub compact: bool,

    /// Flate-compress streams created by this crate (copied streams are never re-encoded).
    pub compress_new_streams: bool,

    /// Fixed `/ID` for reproducible output; generated when `None`.
    pub file_id: Option<[u8; 16]>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            version: "1.7".to_string(),
            compact: false,
            compress_new_streams: true,
            file_id: None,
        }
    }
}

impl WriterOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Enable or disable compact formatting.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Enable or disable compression of new streams.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress_new_streams = compress;
        self
    }

    /// Use a fixed file identifier.
    pub fn with_file_id(mut self, id: [u8; 16]) -> Self {
        self.file_id = Some(id);
        self
    }
}

/// Options for the object copy engine.
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Preserve the tagged-PDF structure tree of imported pages.
    pub tagged: bool,

    /// Merge AcroForm fields of imported widget annotations.
    pub merge_acroform: bool,
}

impl CopyOptions {
    /// Create options with defaults (untagged, no form merging).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable structure tree preservation.
    pub fn with_tagged(mut self, tagged: bool) -> Self {
        self.tagged = tagged;
        self
    }

    /// Enable AcroForm merging.
    pub fn with_acroform(mut self, merge: bool) -> Self {
        self.merge_acroform = merge;
        self
    }
}

/// Options for a stamper (incremental update or full rewrite).
#[derive(Debug, Clone)]
pub struct StamperOptions {
    /// Append an incremental update instead of rewriting the file.
    pub append: bool,

    /// Back the output with a temporary file in this directory instead of memory.
    pub temp_dir: Option<PathBuf>,

    /// Serialization options for the new revision.
    pub writer: WriterOptions,
}

impl Default for StamperOptions {
    fn default() -> Self {
        Self {
            append: true,
            temp_dir: None,
            writer: WriterOptions::default(),
        }
    }
}

impl StamperOptions {
    /// Create options with defaults (append mode, in-memory output).
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose between incremental update and full rewrite.
    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Back the output with a temporary file.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Set the writer options for the new revision.
    pub fn with_writer(mut self, writer: WriterOptions) -> Self {
        self.writer = writer;
        self
    }
}
