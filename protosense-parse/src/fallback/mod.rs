//! A parser driven purely by text patterns.
//!
//! Statement boundaries come from bracket matching over the comment-stripped text, and each
//! statement is read by the extractor for its construct. The parser never fails: a statement it
//! cannot make sense of is skipped, and a statement with missing pieces yields a node with empty
//! names or zero numbers. Sibling statements are unaffected either way.

use tracing::trace;

use crate::{
    ast::{Enum, Extend, Field, Group, Message, Oneof, ProtoFile, Service},
    extract::{self, Source},
    text::{find_matching, find_top_level, leading_word, skip_whitespace},
    MAX_FIELD_NUMBER,
};


/// Parses source text into a [`ProtoFile`] without a grammar.
///
/// The fallback parser never reports syntax errors, so `syntax_errors` is always empty.
pub fn parse(source: &str) -> ProtoFile {
    let src = Source::new(source);
    parse_source(&src)
}

pub(crate) fn parse_source(src: &Source<'_>) -> ProtoFile {
    let mut file = ProtoFile {
        range: src.full_range(),
        ..Default::default()
    };

    for stmt in statements(src.clean(), 0, src.clean().len()) {
        match stmt.keyword(src) {
            "syntax" | "edition" => {
                if let Some(decl) = extract::syntax(src, stmt.start, stmt.end) {
                    file.syntax.get_or_insert(decl);
                }
            }
            "package" => {
                if let Some(package) = extract::package(src, stmt.start, stmt.end) {
                    file.package.get_or_insert(package);
                }
            }
            "import" => file.imports.extend(extract::import(src, stmt.start, stmt.end)),
            "option" => file
                .options
                .extend(extract::option_statement(src, stmt.start, stmt.end)),
            "message" if stmt.body.is_some() => file.messages.push(message(src, &stmt)),
            "enum" if stmt.body.is_some() => file.enums.push(enumeration(src, &stmt)),
            "service" if stmt.body.is_some() => file.services.push(service(src, &stmt)),
            "extend" if stmt.body.is_some() => file.extends.push(extend(src, &stmt)),
            _ => trace!(offset = stmt.start, "skipping unrecognized statement"),
        }
    }

    file
}

/// One statement, either terminated by `;` or followed by a `{ ... }` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Statement {
    /// The offset of the first non-whitespace byte.
    pub start: usize,
    /// The offset of the `;` or `{` which ends the statement head.
    pub header_end: usize,
    /// The span between the braces of the block, if any.
    pub body: Option<(usize, usize)>,
    /// The offset just past the statement, including its terminator.
    pub end: usize,
}

impl Statement {
    fn keyword<'s>(&self, src: &'s Source<'_>) -> &'s str {
        leading_word(&src.clean()[self.start..self.end])
    }

    /// For statements beginning with a label, the word following it.
    fn keyword_after_label<'s>(&self, src: &'s Source<'_>) -> &'s str {
        let text = &src.clean()[self.start..self.end];
        let word = leading_word(text);
        match word {
            "optional" | "required" | "repeated" => leading_word(text[word.len()..].trim_start()),
            _ => word,
        }
    }
}

/// Keywords whose statements always end with `;`, even if they contain braces.
fn is_simple_statement(keyword: &str) -> bool {
    matches!(
        keyword,
        "syntax" | "edition" | "package" | "import" | "option" | "reserved" | "extensions"
    )
}

/// Splits `clean[start..end]` into statements.
pub(crate) fn statements(clean: &str, start: usize, end: usize) -> Vec<Statement> {
    let bytes = clean.as_bytes();
    let mut result = Vec::new();
    let mut i = start;

    loop {
        i = skip_whitespace(clean, i, end);
        if i >= end {
            break;
        }
        // Empty statements and stray closing braces.
        if matches!(bytes[i], b';' | b'}') {
            i += 1;
            continue;
        }

        let targets: &[u8] = if is_simple_statement(leading_word(&clean[i..end])) {
            b";"
        } else {
            b";{"
        };

        let stmt = match find_top_level(clean, i, end, targets) {
            Some(pos) if bytes[pos] == b'{' => {
                // An unterminated block runs to the end of the enclosing scope.
                let close = find_matching(&clean[..end], pos).unwrap_or(end);
                Statement {
                    start: i,
                    header_end: pos,
                    body: Some((pos + 1, close)),
                    end: (close + 1).min(end),
                }
            }
            Some(pos) => Statement {
                start: i,
                header_end: pos,
                body: None,
                end: pos + 1,
            },
            // Unbalanced closing brackets hide the terminator from the bracket-aware search.
            None => match clean[i..end].find(';') {
                Some(pos) => Statement {
                    start: i,
                    header_end: i + pos,
                    body: None,
                    end: i + pos + 1,
                },
                None => Statement {
                    start: i,
                    header_end: end,
                    body: None,
                    end,
                },
            },
        };

        i = stmt.end;
        result.push(stmt);
    }

    result
}

fn message(src: &Source<'_>, stmt: &Statement) -> Message {
    let mut message = Message {
        range: src.range(stmt.start, stmt.end),
        ..Default::default()
    };
    if let Some(header) = extract::block_header(src, stmt.start, stmt.header_end) {
        message.name = header.name;
        message.name_range = header.name_range;
    }
    if let Some((start, end)) = stmt.body {
        message_body(src, start, end, &mut message);
    }
    message
}

fn message_body(src: &Source<'_>, start: usize, end: usize, message: &mut Message) {
    for stmt in statements(src.clean(), start, end) {
        let has_body = stmt.body.is_some();
        match stmt.keyword(src) {
            "message" if has_body => message.messages.push(self::message(src, &stmt)),
            "enum" if has_body => message.enums.push(enumeration(src, &stmt)),
            "oneof" if has_body => message.oneofs.push(oneof(src, &stmt)),
            "extend" if has_body => message.extends.push(extend(src, &stmt)),
            "option" => message
                .options
                .extend(extract::option_statement(src, stmt.start, stmt.end)),
            "reserved" => message.reserved.extend(extract::reserved(
                src,
                stmt.start,
                stmt.end,
                MAX_FIELD_NUMBER,
            )),
            "extensions" => message
                .extensions
                .extend(extract::extensions(src, stmt.start, stmt.end)),
            _ => match stmt.keyword_after_label(src) {
                "group" if has_body => message.groups.extend(group(src, &stmt)),
                "map" => match extract::map_field(src, stmt.start, stmt.end) {
                    Some(map) => message.maps.push(map),
                    None => message.fields.extend(fields(src, &stmt)),
                },
                _ => {
                    let found = fields(src, &stmt);
                    if found.is_empty() {
                        trace!(offset = stmt.start, "skipping unrecognized message member");
                    }
                    message.fields.extend(found);
                }
            },
        }
    }
}

/// Reads the fields of a statement which is not any other kind of member.
///
/// A declaration missing its `;` runs on into the next statement, so one statement may hold
/// several fields. A lone declaration with an `=` but no usable number is still kept, with
/// number zero.
fn fields(src: &Source<'_>, stmt: &Statement) -> Vec<Field> {
    let fields = extract::scan_fields(src, stmt.start, stmt.end);
    if !fields.is_empty() {
        return fields;
    }
    match find_top_level(src.clean(), stmt.start, stmt.header_end, b"=") {
        Some(_) => extract::field_statement(src, stmt.start, stmt.end)
            .into_iter()
            .collect(),
        None => Vec::new(),
    }
}

fn group(src: &Source<'_>, stmt: &Statement) -> Option<Group> {
    let mut group = extract::group_header(src, stmt.start, stmt.header_end, stmt.end)?;
    if let Some((start, end)) = stmt.body {
        message_body(src, start, end, &mut group.body);
    }
    Some(group)
}

fn oneof(src: &Source<'_>, stmt: &Statement) -> Oneof {
    let mut oneof = Oneof {
        range: src.range(stmt.start, stmt.end),
        ..Default::default()
    };
    if let Some(header) = extract::block_header(src, stmt.start, stmt.header_end) {
        oneof.name = header.name;
        oneof.name_range = header.name_range;
    }

    if let Some((start, end)) = stmt.body {
        for stmt in statements(src.clean(), start, end) {
            match stmt.keyword(src) {
                "option" => oneof
                    .options
                    .extend(extract::option_statement(src, stmt.start, stmt.end)),
                _ if stmt.body.is_some() && stmt.keyword_after_label(src) == "group" => {
                    oneof.groups.extend(group(src, &stmt))
                }
                _ => oneof.fields.extend(fields(src, &stmt)),
            }
        }
    }
    oneof
}

fn enumeration(src: &Source<'_>, stmt: &Statement) -> Enum {
    let mut enumeration = Enum {
        range: src.range(stmt.start, stmt.end),
        ..Default::default()
    };
    if let Some(header) = extract::block_header(src, stmt.start, stmt.header_end) {
        enumeration.name = header.name;
        enumeration.name_range = header.name_range;
    }

    if let Some((start, end)) = stmt.body {
        for stmt in statements(src.clean(), start, end) {
            match stmt.keyword(src) {
                "option" => enumeration
                    .options
                    .extend(extract::option_statement(src, stmt.start, stmt.end)),
                "reserved" => enumeration.reserved.extend(extract::reserved(
                    src,
                    stmt.start,
                    stmt.end,
                    i64::from(i32::MAX),
                )),
                _ => enumeration
                    .values
                    .extend(extract::enum_value(src, stmt.start, stmt.end)),
            }
        }
    }
    enumeration
}

fn service(src: &Source<'_>, stmt: &Statement) -> Service {
    let mut service = Service {
        range: src.range(stmt.start, stmt.end),
        ..Default::default()
    };
    if let Some(header) = extract::block_header(src, stmt.start, stmt.header_end) {
        service.name = header.name;
        service.name_range = header.name_range;
    }

    if let Some((start, end)) = stmt.body {
        for stmt in statements(src.clean(), start, end) {
            match stmt.keyword(src) {
                "option" => service
                    .options
                    .extend(extract::option_statement(src, stmt.start, stmt.end)),
                "rpc" => {
                    let Some(mut rpc) = extract::rpc(src, stmt.start, stmt.header_end, stmt.end)
                    else {
                        continue;
                    };
                    if let Some((start, end)) = stmt.body {
                        for option in statements(src.clean(), start, end) {
                            rpc.options.extend(extract::option_statement(
                                src,
                                option.start,
                                option.end,
                            ));
                        }
                    }
                    service.rpcs.push(rpc);
                }
                _ => trace!(offset = stmt.start, "skipping unrecognized service member"),
            }
        }
    }
    service
}

fn extend(src: &Source<'_>, stmt: &Statement) -> Extend {
    let mut extend = Extend {
        range: src.range(stmt.start, stmt.end),
        ..Default::default()
    };
    if let Some(header) = extract::block_header(src, stmt.start, stmt.header_end) {
        extend.extendee = header.name;
        extend.extendee_range = header.name_range;
    }

    if let Some((start, end)) = stmt.body {
        for stmt in statements(src.clean(), start, end) {
            if stmt.body.is_some() && stmt.keyword_after_label(src) == "group" {
                extend.groups.extend(group(src, &stmt));
            } else {
                extend.fields.extend(fields(src, &stmt));
            }
        }
    }
    extend
}
