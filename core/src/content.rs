//! Content sources turn a file on disk into plain text for tokenizing.
//!
//! A [`Document`](crate::Document) holds one source, picked by extension from a
//! [`ContentRegistry`] when the document is created. New formats plug in by
//! registering another [`ContentSource`]; nothing else needs to change.

use crate::error::{Error, Result};
use scraper::Html;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Capability to read the textual content of a file.
pub trait ContentSource: Send + Sync {
    /// Returns the file's text, or [`Error::Extraction`].
    fn read(&self, path: &Path) -> Result<String>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}

impl fmt::Debug for dyn ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn extraction_error(path: &Path, reason: impl fmt::Display) -> Error {
    Error::Extraction { path: path.to_path_buf(), reason: reason.to_string() }
}

/// Reads the file as text, replacing invalid UTF-8.
#[derive(Debug, Default)]
pub struct PlainText;

impl ContentSource for PlainText {
    fn read(&self, path: &Path) -> Result<String> {
        let raw = std::fs::read(path).map_err(|e| extraction_error(path, e))?;
        match String::from_utf8(raw) {
            Ok(text) => Ok(text),
            Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }

    fn name(&self) -> &'static str {
        "text"
    }
}

/// Flattens every text and CDATA node of an XML/XHTML document.
#[derive(Debug, Default)]
pub struct XmlText;

impl XmlText {
    /// Nodes are joined with a space so adjacent elements never fuse.
    /// Markup that is not well-formed XML is read leniently as HTML.
    pub fn flatten(markup: &str) -> String {
        let options = roxmltree::ParsingOptions { allow_dtd: true, ..roxmltree::ParsingOptions::default() };
        match roxmltree::Document::parse_with_options(markup, options) {
            Ok(document) => join_text(document.descendants().filter(|n| n.is_text()).filter_map(|n| n.text())),
            Err(e) => {
                debug!(error = %e, "not well-formed xml, reading as html");
                join_text(Html::parse_document(markup).root_element().text())
            }
        }
    }
}

fn join_text<'a>(nodes: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for node in nodes.map(str::trim).filter(|n| !n.is_empty()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(node);
    }
    out
}

impl ContentSource for XmlText {
    fn read(&self, path: &Path) -> Result<String> {
        let markup = PlainText.read(path)?;
        Ok(Self::flatten(&markup))
    }

    fn name(&self) -> &'static str {
        "xml"
    }
}

/// Extracts the text layer of a PDF.
#[derive(Debug, Default)]
pub struct PdfText;

impl ContentSource for PdfText {
    fn read(&self, path: &Path) -> Result<String> {
        // pdf-extract panics on some malformed files instead of returning an error.
        match std::panic::catch_unwind(|| pdf_extract::extract_text(path)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(extraction_error(path, e)),
            Err(_) => Err(extraction_error(path, "pdf parser panicked")),
        }
    }

    fn name(&self) -> &'static str {
        "pdf"
    }
}

/// Maps lowercase file extensions (without the dot) to content sources.
#[derive(Clone)]
pub struct ContentRegistry {
    sources: HashMap<String, Arc<dyn ContentSource>>,
}

impl Default for ContentRegistry {
    fn default() -> Self {
        let text: Arc<dyn ContentSource> = Arc::new(PlainText);
        let xml: Arc<dyn ContentSource> = Arc::new(XmlText);
        let mut registry = Self::empty();
        registry.register("txt", text);
        registry.register("xml", xml.clone());
        registry.register("xhtml", xml);
        registry.register("pdf", Arc::new(PdfText));
        registry
    }
}

impl fmt::Debug for ContentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut exts: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        exts.sort_unstable();
        f.debug_struct("ContentRegistry").field("extensions", &exts).finish()
    }
}

impl ContentRegistry {
    pub fn empty() -> Self {
        Self { sources: HashMap::new() }
    }

    pub fn register(&mut self, extension: &str, source: Arc<dyn ContentSource>) {
        self.sources.insert(normalize_extension(extension), source);
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.sources.contains_key(&normalize_extension(extension))
    }

    /// Resolve the source for `path`, failing fast with [`Error::UnsupportedFormat`].
    pub fn resolve(&self, path: &Path, extension: &str) -> Result<Arc<dyn ContentSource>> {
        self.sources
            .get(&normalize_extension(extension))
            .cloned()
            .ok_or_else(|| Error::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            })
    }
}

/// Extension of `path` as stored on a document: lowercase, no leading dot.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn resolves_by_extension_case_insensitively() {
        let registry = ContentRegistry::default();
        assert_eq!(registry.resolve(Path::new("a.TXT"), "TXT").unwrap().name(), "text");
        assert_eq!(registry.resolve(Path::new("a.xhtml"), ".xhtml").unwrap().name(), "xml");
        assert_eq!(registry.resolve(Path::new("a.pdf"), "pdf").unwrap().name(), "pdf");
    }

    #[test]
    fn unsupported_extension_fails_fast() {
        let registry = ContentRegistry::default();
        let err = registry.resolve(Path::new("photo.png"), "png").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension, .. } if extension == "png"));
    }

    #[test]
    fn extension_is_normalized() {
        assert_eq!(extension_of(Path::new("/docs/Report.XML")), "xml");
        assert_eq!(extension_of(Path::new("/docs/README")), "");
    }

    #[test]
    fn plain_text_tolerates_invalid_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        fs::write(&path, b"caf\xe9 menu").unwrap();
        let text = PlainText.read(&path).unwrap();
        assert!(text.starts_with("caf"));
        assert!(text.ends_with("menu"));
    }

    #[test]
    fn missing_file_is_an_extraction_error() {
        let dir = tempdir().unwrap();
        let err = PlainText.read(&dir.path().join("gone.txt")).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn xml_text_nodes_do_not_fuse() {
        let text = XmlText::flatten("<?xml version=\"1.0\"?><note><to>Tove</to><from>Jani</from></note>");
        assert!(text.contains("Tove Jani"), "got {text:?}");
    }

    #[test]
    fn xml_keeps_cdata() {
        let text = XmlText::flatten("<doc><body><![CDATA[secret payload]]></body><p>visible</p></doc>");
        assert_eq!(text, "secret payload visible");
    }

    #[test]
    fn empty_xml_elements_do_not_swallow_the_rest() {
        let text = XmlText::flatten("<rss><item><title/><desc>real text</desc></item></rss>");
        assert_eq!(text, "real text");
    }

    #[test]
    fn xml_comments_are_not_text() {
        let text = XmlText::flatten("<a><!-- hidden --><b>shown</b></a>");
        assert_eq!(text, "shown");
    }

    #[test]
    fn loose_xhtml_falls_back_to_html_parsing() {
        let text = XmlText::flatten("<html><body><p>one<br>two</p></body></html>");
        assert!(text.contains("one") && text.contains("two"), "got {text:?}");
        assert!(!text.contains('<'));
    }

    #[test]
    fn malformed_pdf_is_an_extraction_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"definitely not a pdf").unwrap();
        let err = PdfText.read(&path).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }
}
