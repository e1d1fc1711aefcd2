//! Input pattern parsing.
//!
//! A pattern is a slash-delimited path whose segments are literal names,
//! single-level globs, or one `**` recursive-descent segment followed by a
//! filename glob, e.g. `samples/**/*.dds`.

use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::PatternError;

/// One pattern segment
#[derive(Debug, Clone)]
pub enum Segment {
    /// Exact name; joined directly onto the current directory
    Literal(String),
    /// Single-level glob (`*`, `?`, `[...]`)
    Glob(Pattern),
    /// `**`: this directory and every directory below it
    RecursiveDescent,
}

impl Segment {
    fn classify(raw: &str) -> Result<Self, PatternError> {
        if raw == "**" {
            return Ok(Segment::RecursiveDescent);
        }
        if raw.contains(['*', '?', '[']) {
            let compiled = Pattern::new(raw).map_err(|e| PatternError::InvalidGlob {
                segment: raw.to_string(),
                reason: e.msg.to_string(),
            })?;
            return Ok(Segment::Glob(compiled));
        }
        Ok(Segment::Literal(raw.to_string()))
    }

    /// Whether a directory entry name matches this segment
    pub fn matches(&self, name: &str, options: MatchOptions) -> bool {
        match self {
            Segment::Literal(literal) if options.case_sensitive => literal == name,
            Segment::Literal(literal) => literal.eq_ignore_ascii_case(name),
            Segment::Glob(pattern) => pattern.matches_with(name, options),
            Segment::RecursiveDescent => false,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(literal) => f.write_str(literal),
            Segment::Glob(pattern) => f.write_str(pattern.as_str()),
            Segment::RecursiveDescent => f.write_str("**"),
        }
    }
}

/// Parsed input pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    root: PathBuf,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern string
    ///
    /// # Arguments
    /// * `raw` - pattern such as `../samples/**/*.dds`, split on `/` and `\`
    ///
    /// # Returns
    /// The parsed pattern, or the reason it is not supported
    ///
    /// # Examples
    /// ```
    /// use dds2png::pattern::PathPattern;
    ///
    /// let pattern = PathPattern::parse("samples/**/*.dds").unwrap();
    /// assert_eq!(pattern.root(), std::path::Path::new("samples"));
    /// assert_eq!(pattern.segments().len(), 2);
    /// ```
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }

        let parts: Vec<&str> = raw.split(['/', '\\']).collect();
        let (root, rest) = match parts.split_first() {
            Some((first, rest)) if first.is_empty() => (PathBuf::from("/"), rest),
            // A lone segment, or a leading `*`/`**`, starts from the current directory
            Some((first, rest)) if rest.is_empty() || !Segment::classify(first)?.is_literal() => {
                (PathBuf::from("."), parts.as_slice())
            }
            Some((first, rest)) => (root_dir(first), rest),
            None => return Err(PatternError::Empty),
        };

        let segments = rest
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| Segment::classify(s))
            .collect::<Result<Vec<_>, _>>()?;

        let pattern = Self {
            raw: raw.to_string(),
            root,
            segments,
        };
        pattern.check()?;
        Ok(pattern)
    }

    fn check(&self) -> Result<(), PatternError> {
        let pattern = || self.raw.clone();

        if self.segments.is_empty() {
            return Err(PatternError::MissingFilePattern { pattern: pattern() });
        }

        let recursive: Vec<usize> = self
            .segments
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Segment::RecursiveDescent))
            .map(|(i, _)| i)
            .collect();

        match recursive.as_slice() {
            [] => Ok(()),
            [index] => {
                if let Some(segment) = self.segments[..*index].iter().find(|s| !s.is_literal()) {
                    return Err(PatternError::NonLiteralBase {
                        pattern: pattern(),
                        segment: segment.to_string(),
                    });
                }
                match self.segments.len() - index - 1 {
                    0 => Err(PatternError::MissingFilePattern { pattern: pattern() }),
                    1 => Ok(()),
                    _ => Err(PatternError::TrailingSegments { pattern: pattern() }),
                }
            }
            _ => Err(PatternError::MultipleRecursive { pattern: pattern() }),
        }
    }

    /// Starting directory (first segment, or `/` for rooted patterns)
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Segments walked below the root
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Root for a literal first segment; a bare drive letter means its root
fn root_dir(first: &str) -> PathBuf {
    if cfg!(windows) && first.ends_with(':') {
        return PathBuf::from(format!("{first}\\"));
    }
    PathBuf::from(first)
}

/// Match options used for every segment: no separator crossing, dotfiles
/// allowed, case folding only where the filesystem folds case.
pub fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}
