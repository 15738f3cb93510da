//! Include/exclude name filtering.
//!
//! Patterns are regular expressions searched anywhere in the name (not
//! anchored) and matched case-insensitively. A name passes when it matches the
//! include pattern (if any) and does not match the exclude pattern (if any).

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use regex::{Regex, RegexBuilder};

/// One include/exclude pair.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}
impl Filter {
    /// Compile a filter. Empty patterns are treated as absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use album_rsync_storage::Filter;
    ///
    /// let filter = Filter::new(Some("jpe?g$"), Some("^draft")).unwrap();
    /// assert!(filter.matches("IMG_0001.JPG"));
    /// assert!(!filter.matches("Draft.jpg"));
    /// assert!(!filter.matches("notes.txt"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.include.as_ref().is_none_or(|re| re.is_match(name))
            && self.exclude.as_ref().is_none_or(|re| !re.is_match(name))
    }
}

fn compile(pattern: Option<&str>) -> Result<Option<Regex>> {
    match pattern {
        Some(pattern) if !pattern.is_empty() => {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .or_raise(|| ErrorKind::InvalidPattern(pattern.to_string()))?;
            Ok(Some(regex))
        },
        _ => Ok(None),
    }
}

/// File and folder filters, applied independently of each other.
#[derive(Debug, Clone, Default)]
pub struct NameFilters {
    pub files: Filter,
    pub folders: Filter,
}
impl NameFilters {
    pub fn new(files: Filter, folders: Filter) -> Self {
        Self { files, folders }
    }

    pub fn file(&self, name: &str) -> bool {
        self.files.matches(name)
    }

    pub fn folder(&self, name: &str) -> bool {
        self.folders.matches(name)
    }
}
