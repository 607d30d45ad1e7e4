//! Upload provenance for extracted documents.
//!
//! Merges `filename`, `upload_date`, and `file_type` into a document's
//! extractor metadata. Provenance keys overwrite extractor keys of the same
//! name; every other extractor key is kept.

use chrono::{DateTime, Utc};

use crate::models::{EnrichedDocument, RawDocument};

pub const KEY_FILENAME: &str = "filename";
pub const KEY_UPLOAD_DATE: &str = "upload_date";
pub const KEY_FILE_TYPE: &str = "file_type";

/// Attach upload provenance to a raw document.
///
/// `uploaded_at` is supplied by the caller so the result is a pure function
/// of the inputs.
pub fn enrich(
    doc: RawDocument,
    filename: &str,
    file_type: &str,
    uploaded_at: DateTime<Utc>,
) -> EnrichedDocument {
    let mut metadata = doc.source_metadata;
    metadata.insert(KEY_FILENAME.to_string(), filename.into());
    metadata.insert(KEY_UPLOAD_DATE.to_string(), uploaded_at.into());
    metadata.insert(KEY_FILE_TYPE.to_string(), file_type.into());

    EnrichedDocument {
        text: doc.text,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, MetadataValue};
    use chrono::TimeZone;

    fn raw(text: &str, pairs: &[(&str, MetadataValue)]) -> RawDocument {
        let mut source_metadata = Metadata::new();
        for (k, v) in pairs {
            source_metadata.insert(k.to_string(), v.clone());
        }
        RawDocument {
            text: text.to_string(),
            source_metadata,
        }
    }

    #[test]
    fn adds_provenance_and_keeps_source_keys() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 8, 30, 0).unwrap();
        let doc = raw(
            "page text",
            &[("page", 2.into()), ("source", "/tmp/x.pdf".into())],
        );

        let enriched = enrich(doc, "report.pdf", "application/pdf", ts);

        assert_eq!(enriched.text, "page text");
        assert_eq!(enriched.metadata.len(), 5);
        assert_eq!(enriched.metadata["page"], MetadataValue::Integer(2));
        assert_eq!(enriched.metadata["source"], "/tmp/x.pdf".into());
        assert_eq!(enriched.metadata["filename"], "report.pdf".into());
        assert_eq!(enriched.metadata["file_type"], "application/pdf".into());
        assert_eq!(enriched.metadata["upload_date"].to_string(), "2024-03-09T08:30:00Z");
    }

    #[test]
    fn provenance_wins_on_collision() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let doc = raw(
            "t",
            &[
                ("filename", "extractor-name".into()),
                ("file_type", "guess".into()),
                ("upload_date", "yesterday".into()),
            ],
        );

        let enriched = enrich(doc, "real.txt", "text/plain", ts);

        assert_eq!(enriched.metadata.len(), 3);
        assert_eq!(enriched.metadata["filename"], "real.txt".into());
        assert_eq!(enriched.metadata["file_type"], "text/plain".into());
        assert_eq!(enriched.metadata["upload_date"], MetadataValue::Timestamp(ts));
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let a = enrich(raw("x", &[]), "f.md", "text/markdown", ts);
        let b = enrich(raw("x", &[]), "f.md", "text/markdown", ts);
        assert_eq!(a, b);
    }
}
