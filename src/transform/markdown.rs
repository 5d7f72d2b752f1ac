//! Markdown → HTML transform.
//!
//! Plain CommonMark by default; GFM-style extensions are opt-in through
//! `[markdown] extensions`.

use async_trait::async_trait;
use bytes::Bytes;
use pulldown_cmark::{html, Options, Parser};

use crate::config::schema::{MarkdownConfig, MarkdownExtension};
use crate::transform::{Transform, TransformError, TransformedDocument};

#[derive(Debug, Clone)]
pub struct MarkdownTransform {
    options: Options,
}

impl MarkdownTransform {
    /// CommonMark without extensions.
    pub fn new() -> Self {
        Self {
            options: Options::empty(),
        }
    }

    pub fn from_config(config: &MarkdownConfig) -> Self {
        let mut options = Options::empty();
        for ext in &config.extensions {
            options.insert(match ext {
                MarkdownExtension::Tables => Options::ENABLE_TABLES,
                MarkdownExtension::Strikethrough => Options::ENABLE_STRIKETHROUGH,
                MarkdownExtension::Tasklists => Options::ENABLE_TASKLISTS,
                MarkdownExtension::Footnotes => Options::ENABLE_FOOTNOTES,
                MarkdownExtension::SmartPunctuation => Options::ENABLE_SMART_PUNCTUATION,
            });
        }
        Self { options }
    }

    /// Render synchronously.
    pub fn render(&self, source: &[u8]) -> Result<String, TransformError> {
        let text = std::str::from_utf8(source)?;
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        html::push_html(&mut out, Parser::new_ext(text, self.options));
        Ok(out)
    }
}

impl Default for MarkdownTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transform for MarkdownTransform {
    fn name(&self) -> &'static str {
        "markdown"
    }

    async fn transform(&self, body: Bytes) -> Result<TransformedDocument, TransformError> {
        let html = self.render(&body)?;
        Ok(TransformedDocument {
            bytes: Bytes::from(html),
            charset: "utf-8".to_string(),
            mime_type: "text/html".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn heading_renders_as_h1() {
        let doc = MarkdownTransform::new()
            .transform(Bytes::from_static(b"# Hi"))
            .await
            .unwrap();
        assert_eq!(&doc.bytes[..], b"<h1>Hi</h1>\n");
        assert_eq!(doc.charset, "utf-8");
        assert_eq!(doc.mime_type, "text/html");
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = MarkdownTransform::new().render(&[0x23, 0x20, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, TransformError::InvalidEncoding(_)));
    }

    #[test]
    fn tables_need_the_extension() {
        let src = b"| a |\n|---|\n| 1 |\n";
        let plain = MarkdownTransform::new().render(src).unwrap();
        assert!(!plain.contains("<table>"));

        let config = MarkdownConfig {
            extensions: vec![MarkdownExtension::Tables],
        };
        let gfm = MarkdownTransform::from_config(&config).render(src).unwrap();
        assert!(gfm.contains("<table>"));
    }

    #[test]
    fn raw_html_passes_through_like_commonmark() {
        let out = MarkdownTransform::new().render(b"<div>x</div>\n").unwrap();
        assert_eq!(out, "<div>x</div>\n");
    }
}
