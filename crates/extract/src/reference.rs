use crate::consts::{INLINE_PREFIX, REMOTE_PREFIX};

/// How the bytes behind an image reference can be retrieved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// An absolute URL to fetch.
    Remote,
    /// A `data:image/...` URI carrying the bytes inline.
    Inline,
    /// Anything else; there is no way to retrieve it.
    Unknown,
}
impl ReferenceKind {
    /// Classifies a reference by its prefix.
    ///
    /// ```rust
    /// use tgimg_extract::ReferenceKind;
    /// assert_eq!(ReferenceKind::classify("https://x/y.png"), ReferenceKind::Remote);
    /// assert_eq!(ReferenceKind::classify("data:image/png;base64,AAAA"), ReferenceKind::Inline);
    /// assert_eq!(ReferenceKind::classify("ftp://x"), ReferenceKind::Unknown);
    /// ```
    pub fn classify(reference: &str) -> Self {
        if reference.starts_with(REMOTE_PREFIX) {
            Self::Remote
        } else if reference.starts_with(INLINE_PREFIX) {
            Self::Inline
        } else {
            Self::Unknown
        }
    }
}

/// An image reference taken from a preview page, together with its kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageReference {
    value: String,
    kind: ReferenceKind,
}
impl ImageReference {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let kind = ReferenceKind::classify(&value);
        Self { value, kind }
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}
impl From<&str> for ImageReference {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
impl AsRef<str> for ImageReference {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://x/y.png", ReferenceKind::Remote)]
    #[case("http://cdn.example/abc.jpg", ReferenceKind::Remote)]
    // Prefix match only, as served by Telegram.
    #[case("httpfoo", ReferenceKind::Remote)]
    #[case("data:image/png;base64,AAAA", ReferenceKind::Inline)]
    #[case("data:image/svg+xml;base64,PHN2Zz48L3N2Zz4=", ReferenceKind::Inline)]
    #[case("data:text/plain;base64,AAAA", ReferenceKind::Unknown)]
    #[case("ftp://x", ReferenceKind::Unknown)]
    #[case("//cdn.example/abc.jpg", ReferenceKind::Unknown)]
    #[case("HTTPS://x/y.png", ReferenceKind::Unknown)]
    #[case("", ReferenceKind::Unknown)]
    fn test_classify(#[case] reference: &str, #[case] expected: ReferenceKind) {
        assert_eq!(ReferenceKind::classify(reference), expected);
        assert_eq!(ImageReference::from(reference).kind(), expected);
    }

    #[test]
    fn test_reference_keeps_value() {
        let reference = ImageReference::new("https://cdn.example/abc.jpg");
        assert_eq!(reference.as_str(), "https://cdn.example/abc.jpg");
        assert_eq!(reference.into_inner(), "https://cdn.example/abc.jpg");
    }
}
