use serde::Serialize;

/// True if `path` matches any of `patterns`.
///
/// Patterns use shell glob syntax (`*`, `**`, `?`, `[...]`, `{a,b}`). A pattern
/// without a leading `/` is also tried against the path minus its leading `/`,
/// so `usr/lib/*.so` and `/usr/lib/*.so` select the same files.
pub fn matches<S: AsRef<str>>(path: &str, patterns: &[S]) -> bool {
    if path.is_empty() {
        return false;
    }
    let relative = path.strip_prefix('/');
    patterns.iter().map(AsRef::as_ref).any(|pattern| {
        if pattern.is_empty() {
            return false;
        }
        glob_match::glob_match(pattern, path)
            || (!pattern.starts_with('/')
                && relative.is_some_and(|rel| glob_match::glob_match(pattern, rel)))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    Manifest,
    Binary,
}

/// Sorts paths into manifest and binary files.
///
/// Exclusion wins over everything, then manifest over binary; a path lands in
/// at most one class.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    pub exclusion: &'a [String],
    pub manifest: &'a [String],
    pub binary: &'a [String],
}

impl Classifier<'_> {
    pub fn classify(&self, path: &str) -> Option<FileClass> {
        if matches(path, self.exclusion) {
            None
        } else if matches(path, self.manifest) {
            Some(FileClass::Manifest)
        } else if matches(path, self.binary) {
            Some(FileClass::Binary)
        } else {
            None
        }
    }
}
