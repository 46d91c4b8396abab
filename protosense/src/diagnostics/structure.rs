use once_cell::sync::Lazy;
use protosense_parse::{LineIndex, Range};
use regex::Regex;

use super::{Context, Diagnostic};
use crate::paths;

/// A complete field declaration with nothing after it.
static FIELD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^
        (?:(?:optional|required|repeated)\s+)?
        (?:map\s*<\s*[\w.]+\s*,\s*[\w.]+\s*>|\.?[A-Za-z_][\w.]*)\s+
        [A-Za-z_]\w*\s*=\s*
        -?\s*(?:0[xX][0-9A-Fa-f]+|[0-9]+)
        (?:\s*\[.*\])?
        $",
    )
    .unwrap()
});

pub(super) fn check(cx: &mut Context) {
    let file = cx.file;

    for error in &file.syntax_errors {
        cx.push(Diagnostic::error(error.range, error.message.clone()).with_code("syntax-error"));
    }

    if file.syntax.is_none() {
        let range = match cx.text {
            Some(text) => first_line(text),
            None => Range::default(),
        };
        cx.push(
            Diagnostic::warning(
                range,
                "Missing 'syntax' or 'edition' declaration; the file will be treated as proto2",
            )
            .with_code("missing-syntax"),
        );
    }

    package_directory(cx);

    if let Some(text) = cx.text {
        missing_semicolons(cx, text);
    }
}

fn first_line(text: &str) -> Range {
    let index = LineIndex::new(text);
    let end = text.find('\n').unwrap_or(text.len());
    index.range(0..text[..end].trim_end().len())
}

fn package_directory(cx: &mut Context) {
    let file = cx.file;
    let Some(package) = &file.package else {
        return;
    };
    if package.name.is_empty() || paths::builtin_name(cx.uri).is_some() {
        return;
    }
    let Some(path) = paths::uri_to_path(cx.uri) else {
        return;
    };
    let Some(directory) = path
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
    else {
        return;
    };

    if !package.name.split('.').any(|segment| segment == directory) {
        cx.push(
            Diagnostic::hint(
                package.name_range,
                format!(
                    "Package '{}' does not match the directory '{directory}' containing this file",
                    package.name
                ),
            )
            .with_code("package-directory"),
        );
    }
}

fn missing_semicolons(cx: &mut Context, text: &str) {
    let index = LineIndex::new(text);
    let code = blank_comments(text);

    let lines: Vec<(usize, &str)> = line_spans(&code).collect();
    for (i, &(offset, line)) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("option ") || !FIELD_LINE.is_match(trimmed) {
            continue;
        }

        let continues = lines[i + 1..]
            .iter()
            .map(|(_, next)| next.trim())
            .find(|next| !next.is_empty())
            .is_some_and(|next| next.starts_with('[') || next.starts_with(';'));
        if continues {
            continue;
        }

        let start = offset + (line.len() - line.trim_start().len());
        let end = start + trimmed.len();
        cx.push(
            Diagnostic::warning(
                index.range(start..end),
                "Missing ';' after field declaration",
            )
            .with_code("missing-semicolon"),
        );
    }
}

/// Lines of `text` with the byte offset each starts at.
fn line_spans(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |line| {
        let start = offset;
        offset += line.len();
        (start, line.trim_end_matches(['\n', '\r']))
    })
}

/// Replaces comments and string contents with spaces, keeping byte offsets and newlines.
fn blank_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        let rest = &text[i..];
        if rest.starts_with("//") {
            let end = rest.find('\n').unwrap_or(rest.len());
            out.extend(std::iter::repeat(' ').take(end));
            i += end;
        } else if rest.starts_with("/*") {
            let end = rest[2..].find("*/").map_or(rest.len(), |e| e + 4);
            for ch in rest[..end].chars() {
                blank(&mut out, ch);
            }
            i += end;
        } else if let Some(quote @ ('"' | '\'')) = rest.chars().next() {
            let mut end = rest.len();
            let mut closed = false;
            let mut escaped = false;
            for (j, ch) in rest.char_indices().skip(1) {
                if ch == '\n' {
                    end = j;
                    break;
                }
                if ch == quote && !escaped {
                    end = j;
                    closed = true;
                    break;
                }
                escaped = ch == '\\' && !escaped;
            }
            out.push(quote);
            for ch in rest[1..end].chars() {
                blank(&mut out, ch);
            }
            if closed {
                out.push(quote);
                end += 1;
            }
            i += end;
        } else {
            let ch = rest.chars().next().unwrap_or(' ');
            out.push(ch);
            i += ch.len_utf8().max(1);
        }
    }
    out
}

fn blank(out: &mut String, ch: char) {
    if ch == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat(' ').take(ch.len_utf8()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lines() {
        for line in [
            "string name = 1",
            "repeated Foo.Bar items = 2",
            "optional .pkg.Type x = 0x10",
            "map<string, int32> counts = 3",
            "bool flag = 4 [deprecated = true]",
        ] {
            assert!(FIELD_LINE.is_match(line), "{line}");
        }
        for line in [
            "string name = 1;",
            "string name = 1; // done",
            "message Foo {",
            "syntax = \"proto3\"",
            "reserved 1 to 3",
            "string name =",
        ] {
            assert!(!FIELD_LINE.is_match(line), "{line}");
        }
    }

    #[test]
    fn comments_are_blanked() {
        let text = "a // b\n/* c\nd */ e \"f // g\"";
        let blanked = blank_comments(text);
        assert_eq!(blanked.len(), text.len());
        assert_eq!(blanked, "a     \n    \n     e \"      \"");
    }
}
