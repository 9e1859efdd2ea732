use scraper::Selector;
use std::sync::LazyLock;

/// Class carried by the representative image on a Telegram preview page.
pub const PREVIEW_PHOTO_CLASS: &str = "tgme_page_photo_image";

pub(crate) const REMOTE_PREFIX: &str = "http";
pub(crate) const INLINE_PREFIX: &str = "data:image";

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

// Attribute equality rather than `.class` matching: the whole class attribute
// has to be the marker, additional classes disqualify the element.
selector!(PREVIEW_IMAGE_SELECTOR, &format!(r#"img[class="{}"][src]"#, PREVIEW_PHOTO_CLASS));
