use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fmt;
use std::path::Path;
use url::Url;

/// Suffix appended to images that were decoded from an inline data URI.
///
/// Telegram only inlines SVG placeholders, so this is what the store has
/// always used; it is not derived from the data URI's MIME type.
pub const INLINE_SUFFIX: &str = ".svg";

/// File name an image is stored under, derived from its source link.
///
/// The same link always yields the same identifier, which makes it the cache
/// key for the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identifier(String);
impl Identifier {
    /// Derives the identifier from the last non-empty path segment of an
    /// `http(s)` link, percent-decoded. Query and fragment are ignored.
    ///
    /// ```rust
    /// use tgimg_resolve::Identifier;
    /// let identifier = Identifier::from_link("https://t.me/channel/123").unwrap();
    /// assert_eq!(identifier.as_str(), "123");
    /// assert_eq!(identifier.inline().as_str(), "123.svg");
    /// ```
    pub fn from_link(link: &str) -> Result<Self> {
        let invalid = || ErrorKind::InvalidLink(link.to_string());
        let url = Url::parse(link.trim()).or_raise(invalid)?;
        if !matches!(url.scheme(), "http" | "https") {
            exn::bail!(invalid());
        }
        let segment = url
            .path_segments()
            .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
            .ok_or_raise(invalid)?;
        // Stored under the decoded name, which is what a static file server
        // looks up after decoding the request path.
        let segment = urlencoding::decode(segment).or_raise(invalid)?;
        // Dot segments are already resolved by the URL parser; this catches
        // anything else the store would refuse (an escaped `/` included).
        let validated = tgimg_storage::validate_path(&*segment).or_raise(invalid)?;
        if validated.as_os_str() != &*segment || validated.components().count() != 1 {
            exn::bail!(invalid());
        }
        Ok(Self(segment.into_owned()))
    }

    /// The identifier an inline-decoded image is stored under.
    pub fn inline(&self) -> Self {
        Self(format!("{}{}", self.0, INLINE_SUFFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl AsRef<Path> for Identifier {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}
