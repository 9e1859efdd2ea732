mod consts;
pub mod error;
mod inline;
mod reference;
mod scan;

use tracing::instrument;

use crate::error::Result;
pub use crate::consts::PREVIEW_PHOTO_CLASS;
pub use crate::inline::decode_inline;
pub use crate::reference::{ImageReference, ReferenceKind};
pub use crate::scan::PreviewPage;

/// Easy, top-level entrypoint for finding the preview image of a Telegram
/// preview page from raw HTML bytes.
///
/// Parses the document, takes the first qualifying image in document order
/// and classifies its reference. Fails with
/// [`MalformedHtml`](error::ErrorKind::MalformedHtml) for binary content
/// and [`MissingImage`](error::ErrorKind::MissingImage) when there is no
/// preview image (an empty document included).
///
/// ```rust
/// use tgimg_extract::{ReferenceKind, extract};
/// let html = r#"<html><body><img class="tgme_page_photo_image" src="https://cdn/x.jpg"></body></html>"#;
/// let reference = extract(html).unwrap();
/// assert_eq!(reference.as_str(), "https://cdn/x.jpg");
/// assert_eq!(reference.kind(), ReferenceKind::Remote);
/// ```
#[instrument(skip(html), fields(html_size = html.as_ref().len()))]
pub fn extract(html: impl AsRef<[u8]>) -> Result<ImageReference> {
    let page = PreviewPage::parse(html)?;
    let reference = ImageReference::new(page.require_image_reference()?);
    tracing::debug!(kind = ?reference.kind(), "Preview image located");
    Ok(reference)
}
