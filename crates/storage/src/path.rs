//! Relative path handling for filesystem-backed storage.
//!
//! Folder names coming from another backend (album titles) are used verbatim
//! as sub-paths of a local root, so they must not be able to escape it.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Normalises a folder or file name into a path relative to a storage root.
///
/// An empty result (e.g. for the root folder's empty name) is allowed;
/// anything climbing above the root, absolute prefixes and null bytes are not.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use album_rsync_storage::relative_path;
///
/// assert_eq!(relative_path("2019/Holiday/").unwrap(), Path::new("2019/Holiday"));
/// assert_eq!(relative_path("").unwrap(), Path::new(""));
/// assert!(relative_path("../etc").is_err());
/// ```
pub fn relative(name: impl AsRef<Path>) -> Result<PathBuf> {
    let name = name.as_ref();
    let mut components = Vec::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => {
                if part.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(name.to_path_buf()));
                }
                components.push(part);
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(name.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(name.to_path_buf()));
                }
            },
        }
    }
    Ok(components.into_iter().collect())
}

/// Render a relative path with `/` separators, as used for folder names.
pub(crate) fn display_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Holiday", "Holiday")]
    #[case("2019/Holiday", "2019/Holiday")]
    #[case("2019//Holiday/", "2019/Holiday")]
    #[case("./2019/./Holiday", "2019/Holiday")]
    #[case("/Holiday", "Holiday")]
    #[case("a/b/..", "a")]
    #[case("", "")]
    #[case(".", "")]
    fn test_normalises(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(relative(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("a\0b")]
    fn test_rejects_escapes(#[case] input: &str) {
        let err = relative(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("2019/Holiday")), "2019/Holiday");
        assert_eq!(display_name(Path::new("")), "");
    }
}
