//! Hierarchical view of the central directory.
//!
//! The flat header sequence is folded into a tree of directories and files
//! keyed by `/`-separated path segments. The tree is built once, right
//! after the central directory is parsed, and never mutated afterwards;
//! lookups hand out borrowed [`Node`]s.

use log::warn;

use crate::error::{Result, ZipError};

use super::records::CentralDirectoryFileHeader;

/// A directory in the archive.
///
/// `meta` is present only when the archive carries an explicit entry for
/// the directory itself; directories implied by a deeper entry's path are
/// synthesized without one. Children keep insertion order and names are
/// compared byte for byte.
#[derive(Debug)]
pub struct DirectoryEntry {
    name: String,
    meta: Option<CentralDirectoryFileHeader>,
    dirs: Vec<DirectoryEntry>,
    files: Vec<FileEntry>,
}

/// A file in the archive, owning its central directory header.
#[derive(Debug)]
pub struct FileEntry {
    name: String,
    header: CentralDirectoryFileHeader,
}

impl FileEntry {
    /// Leaf name, without any directory prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &CentralDirectoryFileHeader {
        &self.header
    }
}

/// A resolved tree node, directory or file.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Directory(&'a DirectoryEntry),
    File(&'a FileEntry),
}

impl<'a> Node<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Node::Directory(dir) => dir.name(),
            Node::File(file) => file.name(),
        }
    }
}

impl DirectoryEntry {
    fn root() -> Self {
        Self {
            name: ".".to_string(),
            meta: None,
            dirs: Vec::new(),
            files: Vec::new(),
        }
    }

    fn child(name: &str) -> Self {
        Self {
            name: name.to_string(),
            meta: None,
            dirs: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Fold the central directory's flat header sequence into a tree.
    ///
    /// The root is a distinguished directory named `"."` with no metadata.
    pub fn build(entries: Vec<CentralDirectoryFileHeader>) -> DirectoryEntry {
        let mut root = DirectoryEntry::root();
        for header in entries {
            root.insert(header);
        }
        root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> Option<&CentralDirectoryFileHeader> {
        self.meta.as_ref()
    }

    pub fn dirs(&self) -> &[DirectoryEntry] {
        &self.dirs
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    fn insert(&mut self, header: CentralDirectoryFileHeader) {
        let is_dir = header.is_directory();
        let path = header.name.trim_end_matches('/').to_string();
        if path.is_empty() {
            warn!("skipping central directory entry with an empty name");
            return;
        }

        let mut segments = path.split('/');
        let leaf = segments.next_back().unwrap_or_default().to_string();
        let ancestors: Vec<&str> = segments.collect();
        let parent = self.ensure_directories(&ancestors);

        if is_dir {
            let node = parent.ensure_child(&leaf);
            node.meta = Some(header);
        } else {
            match parent.files.iter_mut().find(|f| f.name == leaf) {
                Some(existing) => existing.header = header,
                None => parent.files.push(FileEntry { name: leaf, header }),
            }
        }
    }

    /// Walk `parts` from this directory, creating missing intermediate
    /// directories and reusing existing ones.
    fn ensure_directories(&mut self, parts: &[&str]) -> &mut DirectoryEntry {
        let mut entry = self;
        for part in parts {
            if part.is_empty() {
                continue;
            }
            entry = entry.ensure_child(part);
        }
        entry
    }

    fn ensure_child(&mut self, name: &str) -> &mut DirectoryEntry {
        let index = match self.dirs.iter().position(|d| d.name == name) {
            Some(index) => index,
            None => {
                self.dirs.push(DirectoryEntry::child(name));
                self.dirs.len() - 1
            }
        };
        &mut self.dirs[index]
    }

    /// Resolve an archive path against this directory.
    ///
    /// The platform path separator is accepted in place of `/`, and a
    /// leading `.` segment is skipped. An empty segment (trailing or
    /// doubled separator) ends the walk at the directory reached so far.
    /// A miss is `Ok(None)`; only an empty path is an error.
    pub fn resolve(&self, path: &str) -> Result<Option<Node<'_>>> {
        if path.trim().is_empty() {
            return Err(ZipError::InvalidArgument("path must not be empty"));
        }

        let normalized = path.replace(std::path::MAIN_SEPARATOR, "/");
        let parts: Vec<&str> = normalized.split('/').collect();

        let mut entry = self;
        for (index, raw) in parts.iter().enumerate() {
            let part = raw.trim();
            if part.is_empty() {
                break;
            }
            if index == 0 && part == "." {
                continue;
            }

            if let Some(child) = entry.dirs.iter().find(|d| d.name == part) {
                entry = child;
                continue;
            }

            if index == parts.len() - 1
                && let Some(file) = entry.files.iter().find(|f| f.name == part)
            {
                return Ok(Some(Node::File(file)));
            }

            return Ok(None);
        }

        Ok(Some(Node::Directory(entry)))
    }

    /// Depth-first visit of every entry below this directory. `visit`
    /// receives each node's archive-relative path; directory paths keep
    /// their trailing `/`.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&str, Node<'a>)) {
        self.walk_prefixed("", visit);
    }

    fn walk_prefixed<'a>(&'a self, prefix: &str, visit: &mut dyn FnMut(&str, Node<'a>)) {
        for file in &self.files {
            visit(&format!("{prefix}{}", file.name), Node::File(file));
        }
        for dir in &self.dirs {
            let path = format!("{prefix}{}/", dir.name);
            visit(&path, Node::Directory(dir));
            dir.walk_prefixed(&path, visit);
        }
    }
}
