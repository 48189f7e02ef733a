//! In-memory directory trees built from `ls -lan[R]` output.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single file or directory seen in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredEntry {
    pub name: String,
    /// Parent directory relative to the scan root, `/`-separated, empty for
    /// the root itself.
    pub path: String,
    pub kind: EntryKind,
}

impl DiscoveredEntry {
    /// `root` + `path` + `name`, joined with single `/` separators.
    pub fn absolute_path(&self, root: &str) -> String {
        let mut out = root.trim_end_matches('/').to_string();
        for part in [self.path.as_str(), self.name.as_str()] {
            let part = part.trim_matches('/');
            if !part.is_empty() {
                out.push('/');
                out.push_str(part);
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }
}

/// A directory and everything listed beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveredDirectory {
    /// Empty for the root of a listing.
    pub name: String,
    /// Parent directory relative to the scan root.
    pub path: String,
    pub files: Vec<DiscoveredEntry>,
    pub sub_dirs: Vec<DiscoveredDirectory>,
}

impl DiscoveredDirectory {
    /// Depth-first iterator over every file in the tree.
    ///
    /// A directory's files come before its sub-directories, and
    /// sub-directories are visited in listing order.
    pub fn files_iter(&self) -> FilesIter<'_> {
        FilesIter {
            current: self.files.iter(),
            pending: self.sub_dirs.iter().rev().collect(),
        }
    }

    /// Number of files in the whole tree.
    pub fn file_count(&self) -> usize {
        self.files.len() + self.sub_dirs.iter().map(|d| d.file_count()).sum::<usize>()
    }

    /// Consume the tree and return it with `prefix` prepended to the path of
    /// everything beneath it, so a subtree listed on its own can be hung under
    /// its real parent. The directory's own `name`/`path` are left alone.
    pub fn rerooted(self, prefix: &str) -> DiscoveredDirectory {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return self;
        }
        self.prefix_contents(prefix)
    }

    fn prefix_contents(self, prefix: &str) -> DiscoveredDirectory {
        DiscoveredDirectory {
            name: self.name,
            path: self.path,
            files: self
                .files
                .into_iter()
                .map(|f| DiscoveredEntry {
                    path: join(prefix, &f.path),
                    ..f
                })
                .collect(),
            sub_dirs: self
                .sub_dirs
                .into_iter()
                .map(|d| {
                    let path = join(prefix, &d.path);
                    DiscoveredDirectory {
                        path,
                        ..d.prefix_contents(prefix)
                    }
                })
                .collect(),
        }
    }

    /// Replace the direct sub-directory named `sub_tree.name` with `sub_tree`.
    /// Returns false (and drops `sub_tree`) when there is no such directory.
    pub fn splice(&mut self, sub_tree: DiscoveredDirectory) -> bool {
        match self.sub_dirs.iter_mut().find(|d| d.name == sub_tree.name) {
            Some(slot) => {
                *slot = sub_tree;
                true
            }
            None => false,
        }
    }
}

pub struct FilesIter<'a> {
    current: std::slice::Iter<'a, DiscoveredEntry>,
    pending: Vec<&'a DiscoveredDirectory>,
}

impl<'a> Iterator for FilesIter<'a> {
    type Item = &'a DiscoveredEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(entry);
            }
            let dir = self.pending.pop()?;
            self.current = dir.files.iter();
            self.pending.extend(dir.sub_dirs.iter().rev());
        }
    }
}

fn join(parent: &str, name: &str) -> String {
    match (parent.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{parent}/{name}"),
    }
}

// ---- Listing parser ----

/// One parsed `ls -l` line.
#[derive(Debug, PartialEq, Eq)]
struct RawEntry {
    name: String,
    kind: EntryKind,
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Build a tree from the output of `ls -lan <base>` or `ls -lanR <base>`.
///
/// Entry paths are relative to `base`. Lines that can't be understood are
/// skipped, so truncated output gives a partial tree rather than an error.
pub fn parse_listing(text: &str, base: &str) -> DiscoveredDirectory {
    let mut sections: HashMap<String, Vec<RawEntry>> = HashMap::new();
    let mut current = String::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if let Some(entry) = parse_entry_line(line) {
            sections.entry(current.clone()).or_default().push(entry);
        } else if let Some(header) = parse_header_line(line) {
            current = relative_to(header, base);
        }
    }

    build_dir(String::new(), String::new(), &mut sections)
}

fn build_dir(
    name: String,
    path: String,
    sections: &mut HashMap<String, Vec<RawEntry>>,
) -> DiscoveredDirectory {
    let rel = join(&path, &name);
    let entries = sections.remove(&rel).unwrap_or_default();

    let mut dir = DiscoveredDirectory {
        name,
        path,
        ..Default::default()
    };
    for entry in entries {
        match entry.kind {
            EntryKind::File => dir.files.push(DiscoveredEntry {
                name: entry.name,
                path: rel.clone(),
                kind: EntryKind::File,
            }),
            EntryKind::Directory => {
                let sub = build_dir(entry.name, rel.clone(), sections);
                dir.sub_dirs.push(sub);
            }
        }
    }
    dir
}

fn is_mode_string(token: &str) -> bool {
    let mut chars = token.chars();
    let Some(kind) = chars.next() else {
        return false;
    };
    token.len() >= 10
        && "-dlcbpsD".contains(kind)
        && chars.all(|c| "rwxsStTl-+.@".contains(c))
}

/// Split off the first whitespace-separated field, returning it and the rest
/// with leading whitespace removed.
fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], s[end..].trim_start()))
}

fn parse_entry_line(line: &str) -> Option<RawEntry> {
    let (mode, mut rest) = next_field(line)?;
    if !is_mode_string(mode) {
        return None;
    }
    let kind = match mode.as_bytes()[0] {
        b'd' => EntryKind::Directory,
        b'-' => EntryKind::File,
        _ => return None,
    };

    // links, uid, gid, size
    for _ in 0..4 {
        let (_, r) = next_field(rest)?;
        rest = r;
    }

    // Optional `Mon DD HH:MM` / `Mon DD YYYY` timestamp.
    if let Some((month, after_month)) = next_field(rest) {
        let after_date = next_field(after_month).and_then(|(_, r)| next_field(r));
        if let (true, Some((_, r))) = (MONTHS.contains(&month), after_date) {
            rest = r;
        }
    }

    let name = rest.trim_end();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(RawEntry {
        name: name.to_string(),
        kind,
    })
}

fn parse_header_line(line: &str) -> Option<&str> {
    let header = line.strip_suffix(':')?;
    match next_field(header) {
        Some((first, _)) if is_mode_string(first) => None,
        Some(_) => Some(header),
        None => None,
    }
}

fn relative_to(header: &str, base: &str) -> String {
    let base = base.trim_end_matches('/');
    let rel = if let Some(rest) = header
        .strip_prefix(base)
        .filter(|r| !base.is_empty() && (r.is_empty() || r.starts_with('/')))
    {
        rest
    } else if header == "." {
        ""
    } else {
        header.strip_prefix("./").unwrap_or(header)
    };
    rel.trim_matches('/').to_string()
}
