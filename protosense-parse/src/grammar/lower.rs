//! Lowering of the concrete syntax tree into the shared AST.
//!
//! The tree supplies structure: which statements exist, how blocks nest and where the grammar
//! gave up. The text of each leaf statement is read with the same extractors the fallback parser
//! uses, so both strategies agree on names, numbers and option values.
//!
//! Each construct has its own lowering function. When one fails, the error is logged and that
//! node is skipped; its siblings and parent are still lowered.
//!
//! Lowering reads nodes through [`CstNode`], so it does not depend on where the tree came from.

use thiserror::Error;
use tracing::{debug, trace};
use tree_sitter::{Node, Tree};

use crate::{
    ast::{
        Enum, EnumValue, Extend, ExtensionRange, Field, Group, Import, MapField, Message, Oneof,
        OptionEntry, Package, ProtoFile, Reserved, Rpc, Service, SyntaxDecl, SyntaxError,
    },
    extract::{self, Source},
    text::find_top_level,
    MAX_FIELD_NUMBER,
};

/// The view of a concrete syntax tree node used for lowering.
pub(crate) trait CstNode: Copy {
    fn kind(&self) -> &str;

    /// The byte offsets of the node in the source text.
    fn span(&self) -> (usize, usize);

    fn is_error(&self) -> bool;

    /// Whether the node was inserted by error recovery and covers no text.
    fn is_missing(&self) -> bool;

    /// Whether the node or any of its descendants is an error or missing node.
    fn has_error(&self) -> bool;

    fn children(&self) -> Vec<Self>;

    fn named_children(&self) -> Vec<Self>;
}

impl CstNode for Node<'_> {
    fn kind(&self) -> &str {
        Node::kind(self)
    }

    fn span(&self) -> (usize, usize) {
        (self.start_byte(), self.end_byte())
    }

    fn is_error(&self) -> bool {
        Node::is_error(self)
    }

    fn is_missing(&self) -> bool {
        Node::is_missing(self)
    }

    fn has_error(&self) -> bool {
        Node::has_error(self)
    }

    fn children(&self) -> Vec<Self> {
        let mut cursor = self.walk();
        Node::children(self, &mut cursor).collect()
    }

    fn named_children(&self) -> Vec<Self> {
        let mut cursor = self.walk();
        Node::named_children(self, &mut cursor).collect()
    }
}

/// A node whose text could not be read as the construct its kind promised.
#[derive(Debug, Error)]
#[error("could not lower '{kind}' node at bytes {start}..{end}")]
pub(crate) struct LowerError {
    kind: String,
    start: usize,
    end: usize,
}

impl LowerError {
    fn new<N: CstNode>(node: N) -> Self {
        let (start, end) = node.span();
        LowerError {
            kind: node.kind().to_owned(),
            start,
            end,
        }
    }
}

type LowerResult<T> = Result<T, LowerError>;

pub(crate) fn lower(tree: &Tree, text: &str) -> ProtoFile {
    lower_root(tree.root_node(), text)
}

/// Lowers the tree under `root`, which was parsed from `text`.
pub(crate) fn lower_root<N: CstNode>(root: N, text: &str) -> ProtoFile {
    let src = Source::new(text);

    let mut file = ProtoFile {
        range: src.full_range(),
        ..Default::default()
    };
    file_members(&src, root, &mut file);
    collect_errors(&src, root, &mut file.syntax_errors);
    file
}

fn push<T>(result: LowerResult<T>, into: &mut Vec<T>) {
    match result {
        Ok(value) => into.push(value),
        Err(err) => debug!(error = %err, "skipping node"),
    }
}

/// The statements inside a construct, looking through `*_body` wrapper nodes.
fn members<N: CstNode>(node: N) -> Vec<N> {
    let mut result = Vec::new();
    for child in node.named_children() {
        if child.kind().ends_with("_body") {
            result.extend(members(child));
        } else {
            result.push(child);
        }
    }
    result
}

/// The end of a block statement's header: its opening brace, or the end of the node.
fn header_end<N: CstNode>(src: &Source<'_>, node: N) -> usize {
    let (start, end) = node.span();
    find_top_level(src.clean(), start, end, b"{").unwrap_or(end)
}

fn file_members<N: CstNode>(src: &Source<'_>, node: N, file: &mut ProtoFile) {
    for child in members(node) {
        match child.kind() {
            "syntax" | "edition" => match lower_syntax(src, child) {
                Ok(decl) => {
                    file.syntax.get_or_insert(decl);
                }
                Err(err) => debug!(error = %err, "skipping node"),
            },
            "package" => match lower_package(src, child) {
                Ok(package) => {
                    file.package.get_or_insert(package);
                }
                Err(err) => debug!(error = %err, "skipping node"),
            },
            "import" => push(lower_import(src, child), &mut file.imports),
            "option" => push(lower_option(src, child), &mut file.options),
            "message" => push(lower_message(src, child), &mut file.messages),
            "enum" => push(lower_enum(src, child), &mut file.enums),
            "service" => push(lower_service(src, child), &mut file.services),
            "extend" => push(lower_extend(src, child), &mut file.extends),
            // Partial constructs inside an error node are still worth lowering.
            "ERROR" => file_members(src, child, file),
            kind => trace!(kind, "ignoring node"),
        }
    }
}

fn lower_syntax<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<SyntaxDecl> {
    let (start, end) = node.span();
    extract::syntax(src, start, end).ok_or_else(|| LowerError::new(node))
}

fn lower_package<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Package> {
    let (start, end) = node.span();
    extract::package(src, start, end).ok_or_else(|| LowerError::new(node))
}

fn lower_import<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Import> {
    let (start, end) = node.span();
    extract::import(src, start, end).ok_or_else(|| LowerError::new(node))
}

fn lower_option<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<OptionEntry> {
    let (start, end) = node.span();
    extract::option_statement(src, start, end).ok_or_else(|| LowerError::new(node))
}

fn lower_message<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Message> {
    let (start, end) = node.span();
    let header =
        extract::block_header(src, start, header_end(src, node)).ok_or_else(|| LowerError::new(node))?;

    let mut message = Message {
        name: header.name,
        name_range: header.name_range,
        range: src.range(start, end),
        ..Default::default()
    };
    message_members(src, node, &mut message);
    Ok(message)
}

fn message_members<N: CstNode>(src: &Source<'_>, node: N, message: &mut Message) {
    for child in members(node) {
        match child.kind() {
            "field" => match lower_fields(src, child) {
                Ok(fields) => message.fields.extend(fields),
                Err(err) => debug!(error = %err, "skipping node"),
            },
            "map_field" => push(lower_map_field(src, child), &mut message.maps),
            "group" => push(lower_group(src, child), &mut message.groups),
            "oneof" => push(lower_oneof(src, child), &mut message.oneofs),
            "message" => push(lower_message(src, child), &mut message.messages),
            "enum" => push(lower_enum(src, child), &mut message.enums),
            "extend" => push(lower_extend(src, child), &mut message.extends),
            "option" => push(lower_option(src, child), &mut message.options),
            "reserved" => push(
                lower_reserved(src, child, MAX_FIELD_NUMBER),
                &mut message.reserved,
            ),
            "extensions" => push(lower_extensions(src, child), &mut message.extensions),
            "ERROR" => {
                let before = message.fields.len();
                message_members(src, child, message);
                if message.fields.len() == before {
                    let (start, end) = child.span();
                    message.fields.extend(extract::scan_fields(src, start, end));
                }
            }
            kind => trace!(kind, "ignoring node"),
        }
    }
}

/// Lowers a field node, which the grammar sometimes stretches over several declarations.
fn lower_fields<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Vec<Field>> {
    let (start, end) = node.span();
    let fields = extract::scan_fields(src, start, end);
    if !fields.is_empty() {
        return Ok(fields);
    }

    extract::field_statement(src, start, end)
        .map(|field| vec![field])
        .ok_or_else(|| LowerError::new(node))
}

fn lower_map_field<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<MapField> {
    let (start, end) = node.span();
    extract::map_field(src, start, end).ok_or_else(|| LowerError::new(node))
}

fn lower_group<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Group> {
    let (start, end) = node.span();
    let mut group = extract::group_header(src, start, header_end(src, node), end)
        .ok_or_else(|| LowerError::new(node))?;
    message_members(src, node, &mut group.body);
    Ok(group)
}

fn lower_oneof<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Oneof> {
    let (start, end) = node.span();
    let header =
        extract::block_header(src, start, header_end(src, node)).ok_or_else(|| LowerError::new(node))?;

    let mut oneof = Oneof {
        name: header.name,
        name_range: header.name_range,
        range: src.range(start, end),
        ..Default::default()
    };
    for child in members(node) {
        match child.kind() {
            "oneof_field" | "field" => match lower_fields(src, child) {
                Ok(fields) => oneof.fields.extend(fields),
                Err(err) => debug!(error = %err, "skipping node"),
            },
            "group" => push(lower_group(src, child), &mut oneof.groups),
            "option" => push(lower_option(src, child), &mut oneof.options),
            "ERROR" => {
                let (start, end) = child.span();
                oneof.fields.extend(extract::scan_fields(src, start, end));
            }
            kind => trace!(kind, "ignoring node"),
        }
    }
    Ok(oneof)
}

fn lower_enum<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Enum> {
    let (start, end) = node.span();
    let header =
        extract::block_header(src, start, header_end(src, node)).ok_or_else(|| LowerError::new(node))?;

    let mut enumeration = Enum {
        name: header.name,
        name_range: header.name_range,
        range: src.range(start, end),
        ..Default::default()
    };
    for child in members(node) {
        match child.kind() {
            "enum_field" => push(lower_enum_value(src, child), &mut enumeration.values),
            "option" => push(lower_option(src, child), &mut enumeration.options),
            "reserved" => push(
                lower_reserved(src, child, i64::from(i32::MAX)),
                &mut enumeration.reserved,
            ),
            kind => trace!(kind, "ignoring node"),
        }
    }
    Ok(enumeration)
}

fn lower_enum_value<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<EnumValue> {
    let (start, end) = node.span();
    extract::enum_value(src, start, end).ok_or_else(|| LowerError::new(node))
}

fn lower_reserved<N: CstNode>(src: &Source<'_>, node: N, max: i64) -> LowerResult<Reserved> {
    let (start, end) = node.span();
    extract::reserved(src, start, end, max).ok_or_else(|| LowerError::new(node))
}

fn lower_extensions<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<ExtensionRange> {
    let (start, end) = node.span();
    extract::extensions(src, start, end).ok_or_else(|| LowerError::new(node))
}

fn lower_service<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Service> {
    let (start, end) = node.span();
    let header =
        extract::block_header(src, start, header_end(src, node)).ok_or_else(|| LowerError::new(node))?;

    let mut service = Service {
        name: header.name,
        name_range: header.name_range,
        range: src.range(start, end),
        ..Default::default()
    };
    for child in members(node) {
        match child.kind() {
            "rpc" => push(lower_rpc(src, child), &mut service.rpcs),
            "option" => push(lower_option(src, child), &mut service.options),
            kind => trace!(kind, "ignoring node"),
        }
    }
    Ok(service)
}

fn lower_rpc<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Rpc> {
    let (start, end) = node.span();
    let mut rpc = extract::rpc(src, start, header_end(src, node), end)
        .ok_or_else(|| LowerError::new(node))?;
    for child in members(node) {
        if child.kind() == "option" {
            push(lower_option(src, child), &mut rpc.options);
        }
    }
    Ok(rpc)
}

fn lower_extend<N: CstNode>(src: &Source<'_>, node: N) -> LowerResult<Extend> {
    let (start, end) = node.span();
    let header =
        extract::block_header(src, start, header_end(src, node)).ok_or_else(|| LowerError::new(node))?;

    let mut extend = Extend {
        extendee: header.name,
        extendee_range: header.name_range,
        range: src.range(start, end),
        ..Default::default()
    };
    for child in members(node) {
        match child.kind() {
            "field" => match lower_fields(src, child) {
                Ok(fields) => extend.fields.extend(fields),
                Err(err) => debug!(error = %err, "skipping node"),
            },
            "group" => push(lower_group(src, child), &mut extend.groups),
            kind => trace!(kind, "ignoring node"),
        }
    }
    Ok(extend)
}

/// Records every error and missing node in the tree.
///
/// Error nodes are reported once, without descending into them.
fn collect_errors<N: CstNode>(src: &Source<'_>, node: N, errors: &mut Vec<SyntaxError>) {
    if node.is_error() {
        let (start, end) = node.span();
        errors.push(SyntaxError {
            range: src.range(start, end),
            message: unexpected_message(&src.text()[start..end]),
        });
        return;
    }
    if node.is_missing() {
        let (start, end) = node.span();
        errors.push(SyntaxError {
            range: src.range(start, end),
            message: format!("Missing '{}'", node.kind()),
        });
        return;
    }
    if !node.has_error() {
        return;
    }

    for child in node.children() {
        collect_errors(src, child, errors);
    }
}

fn unexpected_message(text: &str) -> String {
    const MAX_SNIPPET: usize = 30;

    let line = text.trim().lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "Syntax error".to_owned();
    }

    let snippet = match line.char_indices().nth(MAX_SNIPPET) {
        Some((index, _)) => format!("{}...", &line[..index]),
        None => line.to_owned(),
    };
    format!("Syntax error: unexpected '{snippet}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_snippets() {
        assert_eq!(unexpected_message("  \n "), "Syntax error");
        assert_eq!(
            unexpected_message("}}\nmore"),
            "Syntax error: unexpected '}}'"
        );
        assert_eq!(
            unexpected_message(&"x".repeat(40)),
            format!("Syntax error: unexpected '{}...'", "x".repeat(30))
        );
    }
}
