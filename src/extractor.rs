/*!
 * Text extraction collaborator interface.
 *
 * Byte-level PDF parsing is outside the pipeline; the orchestrating
 * application supplies an extractor. A plain-text implementation is
 * provided so the pipeline is runnable and testable end to end.
 */

use crate::errors::PipelineError;
use crate::models::{LayoutHints, PageText};

/// Turns raw document bytes into an ordered sequence of page texts
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>, PipelineError>;
}

/// Extractor for UTF-8 text documents. Pages are separated by form feeds;
/// a document without form feeds is a single page.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageText>, PipelineError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PipelineError::Extraction(format!("document is not valid UTF-8: {}", e)))?;

        let pages = text
            .split('\u{c}')
            .enumerate()
            .map(|(i, page)| PageText {
                page_number: i + 1,
                text: page.to_string(),
                layout: LayoutHints {
                    column_count: 1,
                    ..LayoutHints::default()
                },
            })
            .collect();

        Ok(pages)
    }
}
