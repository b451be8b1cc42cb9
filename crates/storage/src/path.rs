//! Path validation relative to an import root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a path that is meant to stay inside an import root.
///
/// The path is normalized (`.` and empty components dropped, `..` resolved)
/// and rejected if it would ever climb above the root, is empty, or carries a
/// null byte.
pub(crate) fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Express an absolute path found under `root` relative to that root.
pub fn relative_to(root: &Path, absolute: &Path) -> Result<PathBuf> {
    if !absolute.is_absolute() {
        exn::bail!(ErrorKind::InvalidPath(absolute.to_path_buf()));
    }
    match absolute.strip_prefix(root) {
        Ok(relative) => validate(relative),
        Err(_) => exn::bail!(ErrorKind::InvalidPath(absolute.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate("Smith/Foo 1 - Title.mp3").unwrap(), Path::new("Smith/Foo 1 - Title.mp3"));
        assert_eq!(validate("book.m4b").unwrap(), Path::new("book.m4b"));
        assert_eq!(validate("a//b/./c/").unwrap(), Path::new("a/b/c"));
        assert_eq!(validate("a/b/..").unwrap(), Path::new("a"));
        assert_eq!(validate("Smith/../Jones/Title.mp3").unwrap(), Path::new("Jones/Title.mp3"));
    }

    #[test]
    fn test_invalid_paths() {
        assert!(validate("../outside.mp3").is_err());
        assert!(validate("a/../../b").is_err());
        assert!(validate("a\0b").is_err());
        assert!(validate("").is_err());
        assert!(validate("./.").is_err());
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/srv/audiobooks");
        assert_eq!(
            relative_to(root, Path::new("/srv/audiobooks/Smith/Title.mp3")).unwrap(),
            Path::new("Smith/Title.mp3")
        );
        assert!(relative_to(root, Path::new("/srv/other/Title.mp3")).is_err());
        assert!(relative_to(root, Path::new("Smith/Title.mp3")).is_err());
        // The root itself is not a file inside the root.
        assert!(relative_to(root, root).is_err());
    }
}
