use std::ops;

use crate::ast::{Position, Range};

/// Converts between byte offsets and editor positions for one source text.
///
/// Positions count characters in UTF-16 code units, which is what editors expect.
#[derive(Debug)]
pub struct LineIndex<'a> {
    source: &'a str,
    lines: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let lines = source
            .match_indices('\n')
            .map(|(index, _)| index + 1)
            .collect();
        LineIndex { source, lines }
    }

    /// Returns the zero-based line and the byte offset within that line.
    fn resolve(&self, offset: usize) -> (usize, usize) {
        match self.lines.binary_search(&offset) {
            Ok(index) => (index + 1, 0),
            Err(0) => (0, offset),
            Err(index) => (index, offset - self.lines[index - 1]),
        }
    }

    fn line_start(&self, line: usize) -> usize {
        match line {
            0 => 0,
            _ => self.lines[line - 1],
        }
    }

    pub fn position(&self, offset: usize) -> Position {
        let offset = floor_char_boundary(self.source, offset.min(self.source.len()));
        let (line, column) = self.resolve(offset);
        let start = offset - column;
        let character = self.source[start..offset].encode_utf16().count();
        Position::new(to_u32(line), to_u32(character))
    }

    pub fn range(&self, span: ops::Range<usize>) -> Range {
        Range::new(self.position(span.start), self.position(span.end))
    }

    /// Converts a position back to a byte offset, clamping to the end of the line.
    pub fn offset(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line > self.lines.len() {
            return self.source.len();
        }

        let start = self.line_start(line);
        let end = self
            .lines
            .get(line)
            .copied()
            .unwrap_or(self.source.len());

        let mut units = 0;
        for (index, ch) in self.source[start..end].char_indices() {
            if units >= position.character as usize {
                return start + index;
            }
            units += ch.len_utf16();
        }
        end
    }

    pub fn line_count(&self) -> usize {
        self.lines.len() + 1
    }

    /// The range covering the whole source.
    pub fn full_range(&self) -> Range {
        self.range(0..self.source.len())
    }
}

fn floor_char_boundary(source: &str, mut offset: usize) -> usize {
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn to_u32(value: usize) -> u32 {
    value.try_into().unwrap_or(u32::MAX)
}
