//! Path validation for the image store.
//!
//! Stored names come from user-supplied links, so every path handed to a
//! backend is normalized here first and anything that would leave the store
//! root is rejected.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a storage path.
///
/// `.` components and repeated or trailing separators are dropped, `..` is
/// resolved lexically and rejected once it would climb above the root. Null
/// bytes, platform prefixes and paths that normalize to nothing are rejected
/// with [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use tgimg_storage::validate_path;
/// assert_eq!(validate_path("123").unwrap(), Path::new("123"));
/// assert_eq!(validate_path("./channel//123.svg/").unwrap(), Path::new("channel/123.svg"));
/// assert!(validate_path("../123").is_err());
/// assert!(validate_path("12\03").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut normalized = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(segment) if segment.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if normalized.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if normalized.is_empty() {
        exn::bail!(invalid());
    }
    Ok(normalized.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("123", "123")]
    #[case("123.svg", "123.svg")]
    #[case("channel/123", "channel/123")]
    #[case("channel//123", "channel/123")]
    #[case("./123", "123")]
    #[case("123/", "123")]
    #[case("a/b/..", "a")]
    // Absolute paths are re-rooted, never trusted.
    #[case("/123", "123")]
    fn test_valid(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    #[case("..")]
    #[case("../images/123")]
    #[case("a/../../123")]
    #[case("12\03")]
    #[case("\0")]
    fn test_invalid(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(p) if p == Path::new(input)));
    }
}
