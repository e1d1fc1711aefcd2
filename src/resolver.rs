//! Pattern resolution.
//!
//! Walks the filesystem one pattern segment at a time and lazily yields every
//! file the pattern names, together with its path relative to the directory
//! the output tree is mirrored from.

use glob::MatchOptions;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ResolveError;
use crate::pattern::{match_options, PathPattern, Segment};

/// A file matched by a pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Absolute input path
    pub input: PathBuf,
    /// Path below the pattern's base directory; just the file name unless the
    /// pattern descends recursively
    pub relative: PathBuf,
}

/// Resolves parsed patterns against the filesystem
#[derive(Debug, Clone, Copy)]
pub struct PathMatcher {
    options: MatchOptions,
}

impl Default for PathMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMatcher {
    pub fn new() -> Self {
        Self {
            options: match_options(),
        }
    }

    /// Lazily enumerate the files named by `pattern`.
    ///
    /// A missing starting directory yields an empty sequence. `Err` items are
    /// reports about unreadable subtrees; iteration continues past them.
    pub fn resolve<'a>(&self, pattern: &'a PathPattern) -> Matches<'a> {
        let mut matches = Matches {
            segments: pattern.segments(),
            options: self.options,
            stack: Vec::new(),
            pending: VecDeque::new(),
        };

        match std::path::absolute(pattern.root()) {
            Ok(root) if root.is_dir() => matches.stack.push(Frame::Directory {
                path: root,
                index: 0,
            }),
            Ok(root) => debug!("base directory {} does not exist", root.display()),
            Err(source) => matches.pending.push_back(Err(ResolveError::ReadDir {
                path: pattern.root().to_path_buf(),
                source,
            })),
        }

        matches
    }
}

enum Frame {
    /// Directory still to be expanded against `segments[index..]`
    Directory { path: PathBuf, index: usize },
    /// In-progress recursive descent; `index` is the filename segment
    Descent {
        base: PathBuf,
        walker: walkdir::IntoIter,
        index: usize,
    },
}

/// Iterator returned by [`PathMatcher::resolve`]
pub struct Matches<'a> {
    segments: &'a [Segment],
    options: MatchOptions,
    stack: Vec<Frame>,
    pending: VecDeque<Result<DiscoveredFile, ResolveError>>,
}

impl Matches<'_> {
    fn expand(&mut self, dir: PathBuf, index: usize) {
        let segments = self.segments;
        let is_last = index + 1 == segments.len();

        match &segments[index] {
            Segment::RecursiveDescent => {
                debug!("descending into {}", dir.display());
                let walker = WalkDir::new(&dir).sort_by_file_name().into_iter();
                self.stack.push(Frame::Descent {
                    base: dir,
                    walker,
                    index: index + 1,
                });
            }
            Segment::Literal(name) if is_last => {
                let input = dir.join(name);
                if input.is_file() {
                    self.pending.push_back(Ok(DiscoveredFile {
                        input,
                        relative: PathBuf::from(name),
                    }));
                }
            }
            Segment::Literal(name) => {
                let next = dir.join(name);
                if next.is_dir() {
                    self.stack.push(Frame::Directory {
                        path: next,
                        index: index + 1,
                    });
                }
            }
            Segment::Glob(_) => {
                let Some(names) = self.list(&dir, index, is_last) else {
                    return;
                };
                if is_last {
                    self.pending
                        .extend(names.into_iter().map(|(input, name)| {
                            Ok(DiscoveredFile {
                                input,
                                relative: PathBuf::from(name),
                            })
                        }));
                } else {
                    // Reversed so the stack pops directories in name order
                    for (path, _) in names.into_iter().rev() {
                        self.stack.push(Frame::Directory {
                            path,
                            index: index + 1,
                        });
                    }
                }
            }
        }
    }

    /// Entries of `dir` matching `segments[index]`, files or directories,
    /// sorted by name. `None` when the directory could not be read.
    fn list(
        &mut self,
        dir: &Path,
        index: usize,
        files: bool,
    ) -> Option<Vec<(PathBuf, OsString)>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(source) => {
                warn!("cannot read directory {}: {}", dir.display(), source);
                self.pending.push_back(Err(ResolveError::ReadDir {
                    path: dir.to_path_buf(),
                    source,
                }));
                return None;
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    warn!("cannot read entry in {}: {}", dir.display(), source);
                    self.pending.push_back(Err(ResolveError::ReadDir {
                        path: dir.to_path_buf(),
                        source,
                    }));
                    continue;
                }
            };
            let path = entry.path();
            let kind_matches = if files { path.is_file() } else { path.is_dir() };
            let name = entry.file_name();
            let name_matches = self.segments[index].matches(&name.to_string_lossy(), self.options);
            if kind_matches && name_matches {
                names.push((path, name));
            }
        }
        names.sort_by(|a, b| a.1.cmp(&b.1));
        Some(names)
    }

    /// Advance a recursive walk by one entry
    fn step(
        &self,
        base: &Path,
        walker: &mut walkdir::IntoIter,
        index: usize,
    ) -> Option<Option<Result<DiscoveredFile, ResolveError>>> {
        let entry = match walker.next()? {
            Ok(entry) => entry,
            Err(source) => {
                let path = source.path().unwrap_or(base).to_path_buf();
                warn!("skipping {}: {}", path.display(), source);
                return Some(Some(Err(ResolveError::Walk { path, source })));
            }
        };

        let path = entry.path();
        let matched = path.is_file()
            && self.segments[index].matches(&entry.file_name().to_string_lossy(), self.options);
        if !matched {
            return Some(None);
        }

        let relative = path
            .strip_prefix(base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
        Some(Some(Ok(DiscoveredFile {
            input: path.to_path_buf(),
            relative,
        })))
    }
}

impl Iterator for Matches<'_> {
    type Item = Result<DiscoveredFile, ResolveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            match self.stack.pop()? {
                Frame::Directory { path, index } => self.expand(path, index),
                Frame::Descent {
                    base,
                    mut walker,
                    index,
                } => {
                    let Some(found) = self.step(&base, &mut walker, index) else {
                        continue;
                    };
                    self.stack.push(Frame::Descent {
                        base,
                        walker,
                        index,
                    });
                    if let Some(item) = found {
                        return Some(item);
                    }
                }
            }
        }
    }
}
