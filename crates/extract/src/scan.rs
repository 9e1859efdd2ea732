//! Locating the preview image inside a Telegram preview page.

use exn::OptionExt;
use scraper::Html;
use tracing::instrument;

use crate::consts;
use crate::error::{ErrorKind, Result};

/// A parsed preview page.
///
/// Wraps the document tree produced by the HTML parser. The tree is not
/// [`Send`], so callers in async code should finish scanning before the next
/// `.await` and keep only the owned [`String`] reference.
pub struct PreviewPage {
    document: Html,
}
impl PreviewPage {
    /// Parses raw bytes into a document tree.
    ///
    /// The parser itself is lenient (as browsers are): an empty document is
    /// still a valid one, it just has no preview image. The only input
    /// rejected here is binary content (anything with a NUL byte), which is
    /// not markup at all. Invalid UTF-8 byte sequences are replaced with
    /// U+FFFD.
    #[instrument(level = "debug", skip(html), fields(html_size = html.as_ref().len()))]
    pub fn parse(html: impl AsRef<[u8]>) -> Result<Self> {
        let html = html.as_ref();
        if html.contains(&0) {
            exn::bail!(ErrorKind::MalformedHtml("binary content"));
        }
        let html = String::from_utf8_lossy(html);
        let document = Html::parse_document(&html);
        if !document.errors.is_empty() {
            tracing::debug!(errors = document.errors.len(), "Preview page parsed with recoverable errors");
        }
        Ok(Self { document })
    }

    /// Returns the `src` of the first preview image in document order.
    ///
    /// An image qualifies when its class attribute is exactly
    /// [`PREVIEW_PHOTO_CLASS`](crate::PREVIEW_PHOTO_CLASS) and it carries a
    /// non-empty `src`.
    pub fn image_reference(&self) -> Option<&str> {
        self.document
            .select(&consts::PREVIEW_IMAGE_SELECTOR)
            .filter_map(|element| element.value().attr("src"))
            .find(|src| !src.is_empty())
    }

    /// Same as [`image_reference()`](Self::image_reference), but a missing
    /// image is an error.
    pub fn require_image_reference(&self) -> Result<&str> {
        self.image_reference().ok_or_raise(|| ErrorKind::MissingImage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn page(body: &str) -> PreviewPage {
        PreviewPage::parse(format!("<!DOCTYPE html><html><head></head><body>{body}</body></html>")).unwrap()
    }

    #[test]
    fn test_finds_preview_image() {
        let page = page(r#"<div><img class="tgme_page_photo_image" src="https://cdn/x.jpg"></div>"#);
        assert_eq!(page.image_reference(), Some("https://cdn/x.jpg"));
    }

    #[test]
    fn test_missing_preview_image() {
        let page = page(r#"<img class="avatar" src="https://cdn/avatar.jpg"><p>nothing here</p>"#);
        assert_eq!(page.image_reference(), None);
        let err = page.require_image_reference().unwrap_err();
        assert_eq!(*err, ErrorKind::MissingImage);
    }

    #[test]
    fn test_first_match_wins() {
        let page = page(concat!(
            r#"<section><a><img class="tgme_page_photo_image" src="https://cdn/first.jpg"></a></section>"#,
            r#"<img class="tgme_page_photo_image" src="https://cdn/second.jpg">"#,
        ));
        assert_eq!(page.image_reference(), Some("https://cdn/first.jpg"));
    }

    #[rstest]
    // Qualifying class, but no usable source: keep looking.
    #[case(r#"<img class="tgme_page_photo_image"><img class="tgme_page_photo_image" src="https://cdn/b.jpg">"#, Some("https://cdn/b.jpg"))]
    #[case(r#"<img class="tgme_page_photo_image" src=""><img class="tgme_page_photo_image" src="https://cdn/b.jpg">"#, Some("https://cdn/b.jpg"))]
    // The class attribute must equal the marker, not merely contain it.
    #[case(r#"<img class="tgme_page_photo_image extra" src="https://cdn/a.jpg">"#, None)]
    // Only images count.
    #[case(r#"<div class="tgme_page_photo_image" src="https://cdn/a.jpg"></div>"#, None)]
    #[case(r#"<IMG CLASS="tgme_page_photo_image" SRC="https://cdn/upper.jpg">"#, Some("https://cdn/upper.jpg"))]
    fn test_qualifying_elements(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(page(body).image_reference(), expected);
    }

    #[test]
    fn test_entities_in_src_are_decoded() {
        let page = page(r#"<img class="tgme_page_photo_image" src="https://cdn/x.jpg?a=1&amp;b=2">"#);
        assert_eq!(page.image_reference(), Some("https://cdn/x.jpg?a=1&b=2"));
    }

    #[test]
    fn test_inline_reference_is_returned_verbatim() {
        let page = page(r#"<img class="tgme_page_photo_image" src="data:image/svg+xml;base64,PHN2Zz48L3N2Zz4=">"#);
        assert_eq!(page.image_reference(), Some("data:image/svg+xml;base64,PHN2Zz48L3N2Zz4="));
    }

    #[rstest]
    #[case("")]
    #[case("   \n\t ")]
    fn test_empty_document_has_no_image(#[case] html: &str) {
        let page = PreviewPage::parse(html).unwrap();
        assert_eq!(page.image_reference(), None);
        assert_eq!(*page.require_image_reference().unwrap_err(), ErrorKind::MissingImage);
    }

    #[test]
    fn test_binary_content_is_malformed() {
        let err = PreviewPage::parse(b"\xff\xd8\xff\xe0\x00\x10JFIF\x00").err().unwrap();
        assert!(matches!(*err, ErrorKind::MalformedHtml(_)));
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut html = b"<html><body><p>\xff\xfe</p>".to_vec();
        html.extend_from_slice(br#"<img class="tgme_page_photo_image" src="https://cdn/x.jpg"></body></html>"#);
        let page = PreviewPage::parse(html).unwrap();
        assert_eq!(page.image_reference(), Some("https://cdn/x.jpg"));
    }
}
