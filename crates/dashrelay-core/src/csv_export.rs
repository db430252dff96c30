//! Client-side CSV download contract.
//!
//! A download is a filename plus already-encoded CSV text. The saved file is
//! the text prefixed with a UTF-8 byte-order mark (so spreadsheet tools pick
//! the right encoding) and typed [`CSV_MIME_TYPE`].
//!
//! Two save paths exist, chosen by [`save_csv`]: the legacy explicit-save API
//! when the browser exposes it, otherwise a hidden anchor receiving a
//! synthetic click.

use tracing::{debug, warn};

use crate::error::{RelayError, Result};

pub const CSV_MIME_TYPE: &str = "text/csv;charset=utf-8;";

pub const BYTE_ORDER_MARK: char = '\u{feff}';

const BYTE_ORDER_MARK_STR: &str = "\u{feff}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    filename: String,
    content: String,
}

impl CsvExport {
    /// Rejects a blank filename; the content is taken verbatim.
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let filename = filename.into();
        if filename.trim().is_empty() {
            return Err(RelayError::InvalidFilename);
        }
        Ok(Self {
            filename,
            content: content.into(),
        })
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Blob parts in order: the byte-order mark, then the content.
    #[must_use]
    pub fn blob_parts(&self) -> [&str; 2] {
        [BYTE_ORDER_MARK_STR, &self.content]
    }

    /// Full file text as saved.
    #[must_use]
    pub fn payload(&self) -> String {
        let mut out = String::with_capacity(BYTE_ORDER_MARK.len_utf8() + self.content.len());
        out.push(BYTE_ORDER_MARK);
        out.push_str(&self.content);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStrategy {
    /// Browser-native explicit save (`navigator.msSaveBlob`).
    LegacySave,
    /// Hidden `<a download>` element with a synthetic click.
    AnchorClick,
}

/// Platform hooks for saving a file.
pub trait FileSaver {
    fn supports_legacy_save(&self) -> bool;
    fn legacy_save(&self, export: &CsvExport) -> Result<()>;
    fn anchor_download(&self, export: &CsvExport) -> Result<()>;
}

/// Save `export`, preferring the legacy API when available.
pub fn save_csv<F: FileSaver + ?Sized>(saver: &F, export: &CsvExport) -> Result<SaveStrategy> {
    let strategy = if saver.supports_legacy_save() {
        SaveStrategy::LegacySave
    } else {
        SaveStrategy::AnchorClick
    };
    let outcome = match strategy {
        SaveStrategy::LegacySave => saver.legacy_save(export),
        SaveStrategy::AnchorClick => saver.anchor_download(export),
    };
    match outcome {
        Ok(()) => {
            debug!(
                filename = export.filename(),
                bytes = export.content().len(),
                ?strategy,
                "csv download triggered"
            );
            Ok(strategy)
        }
        Err(err) => {
            warn!(filename = export.filename(), error = %err, "csv download failed");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::RecordingSaver;
    use pretty_assertions::assert_eq;

    #[test]
    fn blank_filename_is_rejected() {
        assert!(matches!(CsvExport::new("", "a,b"), Err(RelayError::InvalidFilename)));
        assert!(matches!(CsvExport::new("  ", "a,b"), Err(RelayError::InvalidFilename)));
    }

    #[test]
    fn payload_is_bom_prefixed() {
        let export = CsvExport::new("Figure metadata.csv", "a,b\n1,2\n").unwrap();
        assert_eq!(export.blob_parts(), ["\u{feff}", "a,b\n1,2\n"]);
        let payload = export.payload();
        assert!(payload.starts_with(BYTE_ORDER_MARK));
        assert_eq!(&payload.as_bytes()[..3], &[0xEF, 0xBB, 0xBF]);
        assert_eq!(&payload[3..], "a,b\n1,2\n");
    }

    #[test]
    fn empty_content_still_carries_bom() {
        let export = CsvExport::new("empty.csv", "").unwrap();
        assert_eq!(export.payload(), "\u{feff}");
    }

    #[test]
    fn anchor_click_is_the_fallback() {
        let saver = RecordingSaver::new();
        let export = CsvExport::new("query.csv", "x\n").unwrap();
        assert_eq!(save_csv(&saver, &export).unwrap(), SaveStrategy::AnchorClick);
        let saved = saver.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].filename, "query.csv");
        assert_eq!(saved[0].mime_type, "text/csv;charset=utf-8;");
        assert_eq!(saved[0].payload, "\u{feff}x\n");
    }

    #[test]
    fn legacy_save_preferred_when_available() {
        let saver = RecordingSaver::with_legacy_save();
        let export = CsvExport::new("query.csv", "x\n").unwrap();
        assert_eq!(save_csv(&saver, &export).unwrap(), SaveStrategy::LegacySave);
        assert_eq!(saver.saved()[0].strategy, SaveStrategy::LegacySave);
    }

    #[test]
    fn saver_error_propagates() {
        struct Broken;
        impl FileSaver for Broken {
            fn supports_legacy_save(&self) -> bool {
                false
            }
            fn legacy_save(&self, _: &CsvExport) -> Result<()> {
                Ok(())
            }
            fn anchor_download(&self, _: &CsvExport) -> Result<()> {
                Err(RelayError::SaveFailed {
                    reason: "object URL unavailable".into(),
                })
            }
        }
        let export = CsvExport::new("a.csv", "").unwrap();
        let err = save_csv(&Broken, &export).unwrap_err();
        assert_eq!(err.to_string(), "file save failed: object URL unavailable");
    }
}
