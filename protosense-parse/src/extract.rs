//! Extraction of individual statements from source text.
//!
//! Each construct has its own named extractor backed by a small anchored regex. Extractors take
//! the byte span of one statement in the comment-stripped text and return the AST node for it,
//! filling in empty names and zero numbers for pieces that are missing. They are shared between
//! the fallback parser, which finds statement boundaries itself, and the grammar-based parser,
//! which uses them to read the leaves of tree nodes.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::{
    ast::{
        EnumValue, ExtensionRange, Field, FieldModifier, Group, Import, ImportModifier, MapField,
        NumberRange, OptionEntry, OptionValue, Package, Range, Reserved, ReservedName, Rpc,
        SyntaxDecl, SyntaxKind,
    },
    lines::LineIndex,
    literal::{parse_constant, parse_int},
    text::{
        find_matching, find_top_level, skip_whitespace, split_top_level, strip_comments, trim_span,
    },
};

const IDENT: &str = r"[A-Za-z_][A-Za-z0-9_]*";
const TYPE_NAME: &str = r"\.?[A-Za-z_][A-Za-z0-9_]*(?:\s*\.\s*[A-Za-z_][A-Za-z0-9_]*)*";
const NUMBER: &str = r"[-+]?\s*[0-9][0-9A-Za-z]*";

fn build(pattern: String) -> Regex {
    Regex::new(&pattern).unwrap()
}

static SYNTAX: Lazy<Regex> =
    Lazy::new(|| build(r#"^(syntax|edition)\s*=\s*(?:"([^"\n]*)"?|'([^'\n]*)'?)"#.to_owned()));
static PACKAGE: Lazy<Regex> = Lazy::new(|| build(format!(r"^package\s*({TYPE_NAME})?")));
static IMPORT: Lazy<Regex> = Lazy::new(|| {
    build(r#"^import\s*(?:(weak|public)\s*)?(?:"([^"\n]*)"?|'([^'\n]*)'?)?"#.to_owned())
});
static FIELD: Lazy<Regex> = Lazy::new(|| {
    build(format!(
        r"^(?:(optional|required|repeated)\s+)?({TYPE_NAME})\s+({IDENT})\s*(?:=\s*({NUMBER}))?"
    ))
});
// Unanchored; a match starts at a word boundary or at the leading dot of an absolute type.
static FIELD_DECL: Lazy<Regex> = Lazy::new(|| {
    build(format!(
        r"(?:\b(?:optional|required|repeated)\s+)?(?:\.|\b){IDENT}(?:\s*\.\s*{IDENT})*\s+{IDENT}\s*=\s*{NUMBER}"
    ))
});
static MAP_FIELD: Lazy<Regex> = Lazy::new(|| {
    build(format!(
        r"^(?:(?:optional|required|repeated)\s+)?map\s*<\s*({TYPE_NAME})?\s*,?\s*({TYPE_NAME})?\s*>\s*({IDENT})?\s*(?:=\s*({NUMBER}))?"
    ))
});
static GROUP: Lazy<Regex> = Lazy::new(|| {
    build(format!(
        r"^(?:(optional|required|repeated)\s+)?group\s+({IDENT})?\s*(?:=\s*({NUMBER}))?"
    ))
});
static ENUM_VALUE: Lazy<Regex> =
    Lazy::new(|| build(format!(r"^({IDENT})\s*(?:=\s*({NUMBER}))?")));
static RANGE: Lazy<Regex> =
    Lazy::new(|| build(format!(r"^({NUMBER})(?:\s+to\s+({NUMBER}|max))?$")));
static RPC: Lazy<Regex> = Lazy::new(|| {
    build(format!(
        r"^rpc\s+({IDENT})?\s*(?:\(\s*(?:(stream)\s+)?({TYPE_NAME})?\s*\))?\s*(?:returns\s*\(\s*(?:(stream)\s+)?({TYPE_NAME})?\s*\))?"
    ))
});
static BLOCK: Lazy<Regex> = Lazy::new(|| {
    build(format!(
        r"^(message|enum|service|oneof|extend)\s*({TYPE_NAME})?"
    ))
});

/// A source file prepared for extraction.
#[derive(Debug)]
pub(crate) struct Source<'a> {
    text: &'a str,
    clean: String,
    lines: LineIndex<'a>,
}

impl<'a> Source<'a> {
    pub fn new(text: &'a str) -> Self {
        Source {
            text,
            clean: strip_comments(text),
            lines: LineIndex::new(text),
        }
    }

    /// The text with comments replaced by spaces.
    pub fn clean(&self) -> &str {
        &self.clean
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn range(&self, start: usize, end: usize) -> Range {
        self.lines.range(start..end)
    }

    pub fn full_range(&self) -> Range {
        self.lines.full_range()
    }

    fn span_range(&self, span: Option<(usize, usize)>, fallback: usize) -> Range {
        match span {
            Some((start, end)) => self.range(start, end),
            None => self.range(fallback, fallback),
        }
    }

    fn slice(&self, span: Option<(usize, usize)>) -> &str {
        match span {
            Some((start, end)) => &self.clean[start..end],
            None => "",
        }
    }

    fn captures(&self, regex: &Regex, start: usize, end: usize) -> Option<Captures<'_>> {
        regex.captures(&self.clean[start..end])
    }
}

fn group_span(caps: &Captures<'_>, index: usize, base: usize) -> Option<(usize, usize)> {
    caps.get(index).map(|m| (base + m.start(), base + m.end()))
}

/// Type names may be written with whitespace around the dots.
fn normalize_name(name: &str) -> String {
    name.chars().filter(|ch| !ch.is_whitespace()).collect()
}

fn parse_modifier(text: Option<&str>) -> Option<FieldModifier> {
    match text? {
        "optional" => Some(FieldModifier::Optional),
        "required" => Some(FieldModifier::Required),
        "repeated" => Some(FieldModifier::Repeated),
        _ => None,
    }
}

fn number(src: &Source<'_>, span: Option<(usize, usize)>) -> i64 {
    parse_int(src.slice(span)).unwrap_or(0)
}

/// Extracts a `syntax = "..."` or `edition = "..."` statement.
pub(crate) fn syntax(src: &Source<'_>, start: usize, end: usize) -> Option<SyntaxDecl> {
    let caps = src.captures(&SYNTAX, start, end)?;
    let kind = match caps.get(1).map(|m| m.as_str()) {
        Some("edition") => SyntaxKind::Edition,
        _ => SyntaxKind::Syntax,
    };
    let value = group_span(&caps, 2, start).or_else(|| group_span(&caps, 3, start));

    Some(SyntaxDecl {
        kind,
        value: src.slice(value).to_owned(),
        value_range: src.span_range(value, end),
        range: src.range(start, end),
    })
}

/// Extracts a `package a.b.c;` statement.
pub(crate) fn package(src: &Source<'_>, start: usize, end: usize) -> Option<Package> {
    let caps = src.captures(&PACKAGE, start, end)?;
    let name = group_span(&caps, 1, start);

    Some(Package {
        name: normalize_name(src.slice(name)),
        name_range: src.span_range(name, end),
        range: src.range(start, end),
    })
}

/// Extracts an `import [weak|public] "path";` statement.
pub(crate) fn import(src: &Source<'_>, start: usize, end: usize) -> Option<Import> {
    let caps = src.captures(&IMPORT, start, end)?;
    let modifier = match caps.get(1).map(|m| m.as_str()) {
        Some("weak") => Some(ImportModifier::Weak),
        Some("public") => Some(ImportModifier::Public),
        _ => None,
    };
    let path = group_span(&caps, 2, start).or_else(|| group_span(&caps, 3, start));

    Some(Import {
        modifier,
        path: src.slice(path).to_owned(),
        path_range: src.span_range(path, end),
        range: src.range(start, end),
    })
}

/// Extracts an `option name = value;` statement.
pub(crate) fn option_statement(src: &Source<'_>, start: usize, end: usize) -> Option<OptionEntry> {
    let clean = src.clean();
    let body = clean[start..end].strip_prefix("option")?;
    if body.starts_with(|ch: char| ch.is_ascii_alphanumeric() || ch == '_') {
        return None;
    }

    let body_end = match clean[..end].trim_end().strip_suffix(';') {
        Some(rest) => rest.len(),
        None => end,
    };
    let mut entry = option_entry(src, start + "option".len(), body_end.max(start))?;
    entry.range = src.range(start, end);
    Some(entry)
}

/// Extracts a single `name = value` pair, as found in an option statement or an options list.
pub(crate) fn option_entry(src: &Source<'_>, start: usize, end: usize) -> Option<OptionEntry> {
    let clean = src.clean();
    let (start, end) = trim_span(clean, start, end);
    if start >= end {
        return None;
    }

    let (name_span, value_span) = match find_top_level(clean, start, end, b"=") {
        Some(eq) => (trim_span(clean, start, eq), trim_span(clean, eq + 1, end)),
        None => ((start, end), (end, end)),
    };

    let name = normalize_name(&clean[name_span.0..name_span.1]);
    if name.is_empty() {
        return None;
    }

    Some(OptionEntry {
        name,
        name_range: src.range(name_span.0, name_span.1),
        value: parse_constant(&clean[value_span.0..value_span.1]),
        value_range: src.range(value_span.0, value_span.1),
        range: src.range(start, end),
    })
}

/// Finds the compact options list `[...]` of a statement spanning `start..end`, if any, and
/// returns its entries together with the index of the opening bracket.
pub(crate) fn compact_options(
    src: &Source<'_>,
    start: usize,
    end: usize,
) -> (Vec<OptionEntry>, Option<usize>) {
    let clean = src.clean();
    let open = match find_top_level(clean, start, end, b"[") {
        Some(open) => open,
        None => return (Vec::new(), None),
    };
    // An unterminated list runs to the end of the statement.
    let close = match find_matching(&clean[..end], open) {
        Some(close) => close,
        None => end,
    };

    let entries = split_top_level(clean, open + 1, close, b',')
        .into_iter()
        .filter_map(|(start, end)| option_entry(src, start, end))
        .collect();
    (entries, Some(open))
}

/// Extracts a normal field declaration, such as `repeated foo.Bar name = 1 [deprecated = true];`.
///
/// The modifier keywords are only recognized when followed by whitespace, so a type named
/// `RepeatedRules` or `optionalThing` is never split.
pub(crate) fn field_statement(src: &Source<'_>, start: usize, end: usize) -> Option<Field> {
    let (options, open) = compact_options(src, start, end);
    let head_end = open.unwrap_or(end);
    let caps = src.captures(&FIELD, start, head_end)?;

    let type_name = group_span(&caps, 2, start);
    let name = group_span(&caps, 3, start);
    let number = group_span(&caps, 4, start);

    Some(Field {
        modifier: parse_modifier(caps.get(1).map(|m| m.as_str())),
        type_name: normalize_name(src.slice(type_name)),
        type_range: src.span_range(type_name, start),
        name: src.slice(name).to_owned(),
        name_range: src.span_range(name, start),
        number: self::number(src, number),
        number_range: src.span_range(number, head_end),
        options,
        range: src.range(start, end),
    })
}

/// Finds every field declaration in `start..end`.
///
/// Used to recover fields from text that was not cleanly split into statements. A declaration
/// must have a type, a name and a number to be found. Each one runs up to the next, so a field
/// missing its `;` does not swallow the field after it, and text which is not a field is
/// skipped.
pub(crate) fn scan_fields(src: &Source<'_>, start: usize, end: usize) -> Vec<Field> {
    let clean = src.clean();
    let mut fields = Vec::new();
    for (piece_start, piece_end) in split_top_level(clean, start, end, b';') {
        let starts = field_starts(clean, piece_start, piece_end);
        for (i, &field_start) in starts.iter().enumerate() {
            let field_end = match starts.get(i + 1) {
                Some(&next) => trim_span(clean, field_start, next).1,
                None => statement_end(clean, piece_end, end),
            };
            fields.extend(field_statement(src, field_start, field_end));
        }
    }
    fields
}

/// The offsets at which field declarations begin in `clean[start..end]`.
///
/// Options lists are skipped, so `[default = x]` is never taken for a declaration.
fn field_starts(clean: &str, start: usize, end: usize) -> Vec<usize> {
    let haystack = &clean[..end];
    let mut starts = Vec::new();
    let mut from = start;
    while let Some(m) = FIELD_DECL.find_at(haystack, from) {
        starts.push(m.start());
        let next = skip_whitespace(clean, m.end(), end);
        from = match haystack.as_bytes().get(next) {
            Some(b'[') => find_matching(haystack, next).map_or(end, |close| close + 1),
            _ => m.end(),
        };
    }
    starts
}

/// Extends a statement span to include the terminating semicolon, if it directly follows.
fn statement_end(clean: &str, end: usize, limit: usize) -> usize {
    let rest = &clean[end..limit];
    match rest.find(|ch: char| !ch.is_whitespace()) {
        Some(index) if rest.as_bytes()[index] == b';' => end + index + 1,
        _ => end,
    }
}

/// Extracts a `map<K, V> name = N;` declaration.
pub(crate) fn map_field(src: &Source<'_>, start: usize, end: usize) -> Option<MapField> {
    let (options, open) = compact_options(src, start, end);
    let head_end = open.unwrap_or(end);
    let caps = src.captures(&MAP_FIELD, start, head_end)?;

    let key_type = group_span(&caps, 1, start);
    let value_type = group_span(&caps, 2, start);
    let name = group_span(&caps, 3, start);
    let number = group_span(&caps, 4, start);

    Some(MapField {
        key_type: normalize_name(src.slice(key_type)),
        key_type_range: src.span_range(key_type, start),
        value_type: normalize_name(src.slice(value_type)),
        value_type_range: src.span_range(value_type, start),
        name: src.slice(name).to_owned(),
        name_range: src.span_range(name, start),
        number: self::number(src, number),
        number_range: src.span_range(number, head_end),
        options,
        range: src.range(start, end),
    })
}

/// Extracts the header of a group, `repeated group Name = N [opts]`, up to the opening brace.
///
/// The returned group has an empty body; the caller parses the block.
pub(crate) fn group_header(
    src: &Source<'_>,
    start: usize,
    header_end: usize,
    end: usize,
) -> Option<Group> {
    let (options, open) = compact_options(src, start, header_end);
    let head_end = open.unwrap_or(header_end);
    let caps = src.captures(&GROUP, start, head_end)?;

    let name = group_span(&caps, 2, start);
    let number = group_span(&caps, 3, start);

    let mut group = Group {
        modifier: parse_modifier(caps.get(1).map(|m| m.as_str())),
        name: src.slice(name).to_owned(),
        name_range: src.span_range(name, start),
        number: self::number(src, number),
        number_range: src.span_range(number, head_end),
        options,
        range: src.range(start, end),
        ..Default::default()
    };
    group.body.name = group.name.clone();
    group.body.name_range = group.name_range;
    group.body.range = group.range;
    Some(group)
}

/// Extracts an enum value declaration, `NAME = -1 [deprecated = true];`.
pub(crate) fn enum_value(src: &Source<'_>, start: usize, end: usize) -> Option<EnumValue> {
    let (options, open) = compact_options(src, start, end);
    let head_end = open.unwrap_or(end);
    let caps = src.captures(&ENUM_VALUE, start, head_end)?;

    let name = group_span(&caps, 1, start);
    let number = group_span(&caps, 2, start);

    Some(EnumValue {
        name: src.slice(name).to_owned(),
        name_range: src.span_range(name, start),
        number: self::number(src, number),
        number_range: src.span_range(number, head_end),
        options,
        range: src.range(start, end),
    })
}

/// Parses a comma-separated list of numbers and ranges such as `1, 5 to 10, 100 to max`.
fn number_ranges(src: &Source<'_>, pieces: &[(usize, usize)], max: i64) -> Vec<NumberRange> {
    let clean = src.clean();
    pieces
        .iter()
        .filter_map(|&(start, end)| {
            let caps = RANGE.captures(&clean[start..end])?;
            let first = parse_int(caps.get(1)?.as_str()).unwrap_or(0);
            let last = match caps.get(2).map(|m| m.as_str()) {
                Some("max") => max,
                Some(text) => parse_int(text).unwrap_or(first),
                None => first,
            };
            Some(NumberRange {
                start: first,
                end: last,
                range: src.range(start, end),
            })
        })
        .collect()
}

/// Splits the list following a keyword, such as `reserved` or `extensions`.
fn keyword_list(
    src: &Source<'_>,
    keyword: &str,
    start: usize,
    end: usize,
) -> Option<Vec<(usize, usize)>> {
    let clean = src.clean();
    let rest = clean[start..end].strip_prefix(keyword)?;
    if rest.starts_with(|ch: char| ch.is_ascii_alphanumeric() || ch == '_') {
        return None;
    }
    let list_end = match find_top_level(clean, start, end, b";") {
        Some(semi) => semi,
        None => end,
    };
    Some(split_top_level(
        clean,
        start + keyword.len(),
        list_end.max(start + keyword.len()),
        b',',
    ))
}

/// Extracts a `reserved` statement. `max` is the value `max` stands for in this context.
pub(crate) fn reserved(src: &Source<'_>, start: usize, end: usize, max: i64) -> Option<Reserved> {
    let pieces = keyword_list(src, "reserved", start, end)?;
    let clean = src.clean();

    let mut numbers = Vec::new();
    let mut names = Vec::new();
    for (piece_start, piece_end) in pieces {
        let text = &clean[piece_start..piece_end];
        let quoted = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')));
        match quoted {
            Some(name) => names.push(ReservedName {
                name: name.to_owned(),
                range: src.range(piece_start, piece_end),
            }),
            // Editions allow reserved names as bare identifiers.
            None if text.starts_with(|ch: char| ch.is_ascii_alphabetic() || ch == '_') => {
                names.push(ReservedName {
                    name: text.to_owned(),
                    range: src.range(piece_start, piece_end),
                })
            }
            None => numbers.push((piece_start, piece_end)),
        }
    }

    Some(Reserved {
        ranges: number_ranges(src, &numbers, max),
        names,
        range: src.range(start, end),
    })
}

/// Extracts an `extensions 100 to max [opts];` statement.
pub(crate) fn extensions(src: &Source<'_>, start: usize, end: usize) -> Option<ExtensionRange> {
    let (options, open) = compact_options(src, start, end);
    let pieces = keyword_list(src, "extensions", start, open.unwrap_or(end))?;

    Some(ExtensionRange {
        ranges: number_ranges(src, &pieces, crate::MAX_FIELD_NUMBER),
        options,
        range: src.range(start, end),
    })
}

/// Extracts the signature of an rpc. Options in a trailing block are left to the caller.
pub(crate) fn rpc(src: &Source<'_>, start: usize, header_end: usize, end: usize) -> Option<Rpc> {
    let caps = src.captures(&RPC, start, header_end)?;

    let name = group_span(&caps, 1, start);
    let request = group_span(&caps, 3, start);
    let response = group_span(&caps, 5, start);

    Some(Rpc {
        name: src.slice(name).to_owned(),
        name_range: src.span_range(name, start),
        request_type: normalize_name(src.slice(request)),
        request_type_range: src.span_range(request, start),
        request_stream: caps.get(2).is_some(),
        response_type: normalize_name(src.slice(response)),
        response_type_range: src.span_range(response, start),
        response_stream: caps.get(4).is_some(),
        options: Vec::new(),
        range: src.range(start, end),
    })
}

/// The keyword and name of a block header such as `message Foo` or `extend .foo.Bar`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BlockHeader {
    pub keyword: &'static str,
    pub name: String,
    pub name_range: Range,
}

/// Extracts the header of a `message`, `enum`, `service`, `oneof` or `extend` block.
pub(crate) fn block_header(src: &Source<'_>, start: usize, end: usize) -> Option<BlockHeader> {
    let caps = src.captures(&BLOCK, start, end)?;
    let keyword = match caps.get(1)?.as_str() {
        "message" => "message",
        "enum" => "enum",
        "service" => "service",
        "oneof" => "oneof",
        _ => "extend",
    };
    let name = group_span(&caps, 2, start);

    // `messageFoo` is not a header.
    if name.is_none() && keyword.len() < end - start {
        let next = src.clean().as_bytes()[start + keyword.len()];
        if next.is_ascii_alphanumeric() || next == b'_' {
            return None;
        }
    }
    if let Some((name_start, _)) = name {
        if name_start == start + keyword.len() {
            return None;
        }
    }

    Some(BlockHeader {
        keyword,
        name: normalize_name(src.slice(name)),
        name_range: src.span_range(name, end),
    })
}
