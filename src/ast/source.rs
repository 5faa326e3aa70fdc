//! This module contains the decoding of compiler `src` locations
//! (`start:length:file`) into human-readable `file:line` strings.

use std::collections::BTreeMap;

/// The interface to anything that can turn a raw `src` location from the AST
/// into a human-readable location for diagnostics.
///
/// Any `Fn(&str) -> String` is a decoder, so simple callers can pass a
/// closure.
pub trait SourceDecoder {
    /// Decodes the raw `src` location.
    fn decode(&self, src: &str) -> String;
}

impl<F> SourceDecoder for F
where
    F: Fn(&str) -> String,
{
    fn decode(&self, src: &str) -> String {
        self(src)
    }
}

/// A decoder that knows the path and contents of each source file in a
/// compilation, and so can compute line numbers.
#[derive(Clone, Debug, Default)]
pub struct SourceMap {
    files: BTreeMap<u32, SourceFile>,
}

/// A single file known to the [`SourceMap`].
#[derive(Clone, Debug)]
struct SourceFile {
    path: String,

    /// The byte offsets at which each line begins.
    line_starts: Vec<usize>,
}

impl SourceMap {
    /// Creates an empty source map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the file at `index` with the given `path` and `content`.
    #[must_use]
    pub fn with_source(mut self, index: u32, path: impl Into<String>, content: &str) -> Self {
        self.add_source(index, path, content);
        self
    }

    /// Registers the file at `index` with the given `path` and `content`.
    pub fn add_source(&mut self, index: u32, path: impl Into<String>, content: &str) {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let path = path.into();
        self.files.insert(index, SourceFile { path, line_starts });
    }
}

impl SourceDecoder for SourceMap {
    /// Produces `path:line` for locations in known files, and returns the raw
    /// location unchanged otherwise.
    fn decode(&self, src: &str) -> String {
        let mut parts = src.split(':');
        let start = parts.next().and_then(|s| s.parse::<usize>().ok());
        let file = parts.nth(1).and_then(|s| s.parse::<u32>().ok());

        match (start, file.and_then(|f| self.files.get(&f))) {
            (Some(start), Some(file)) => {
                let line = file.line_starts.partition_point(|&s| s <= start);
                format!("{}:{line}", file.path)
            }
            _ => src.to_string(),
        }
    }
}
