use std::{env, sync::Arc};

use super::{
    lower::{lower_root, CstNode},
    *,
};
use crate::{
    ast::{Position, Range},
    fallback,
};

/// Set to the path of a compiled `tree-sitter-proto` library to also run against a real grammar.
const GRAMMAR_ENV: &str = "PROTOSENSE_TEST_GRAMMAR";

fn loaded_parser() -> Option<GrammarParser> {
    let path = env::var_os(GRAMMAR_ENV)?;
    let parser = GrammarParser::new();
    parser.initialize(path).ok()?;
    Some(parser)
}

/// A concrete syntax tree written out by hand, with the node kinds the protobuf grammar uses.
#[derive(Debug)]
struct TestNode {
    kind: &'static str,
    start: usize,
    end: usize,
    named: bool,
    missing: bool,
    children: Vec<TestNode>,
}

impl<'a> CstNode for &'a TestNode {
    fn kind(&self) -> &str {
        self.kind
    }

    fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    fn is_error(&self) -> bool {
        self.kind == "ERROR"
    }

    fn is_missing(&self) -> bool {
        self.missing
    }

    fn has_error(&self) -> bool {
        self.is_error() || self.missing || self.children.iter().any(|child| child.has_error())
    }

    fn children(&self) -> Vec<Self> {
        let node: &'a TestNode = self;
        node.children.iter().collect()
    }

    fn named_children(&self) -> Vec<Self> {
        let node: &'a TestNode = self;
        node.children.iter().filter(|child| child.named).collect()
    }
}

enum Extent {
    /// Exactly this text.
    Text(&'static str),
    /// From this text to the brace closing the first block after it.
    Block(&'static str),
    /// Nothing, at the end of the previous sibling.
    Missing,
}

struct Shape {
    kind: &'static str,
    extent: Extent,
    named: bool,
    children: Vec<Shape>,
}

fn node(kind: &'static str, text: &'static str, children: Vec<Shape>) -> Shape {
    Shape {
        kind,
        extent: Extent::Text(text),
        named: true,
        children,
    }
}

fn leaf(kind: &'static str, text: &'static str) -> Shape {
    node(kind, text, Vec::new())
}

fn block(kind: &'static str, head: &'static str, children: Vec<Shape>) -> Shape {
    Shape {
        kind,
        extent: Extent::Block(head),
        named: true,
        children,
    }
}

fn error(text: &'static str, children: Vec<Shape>) -> Shape {
    node("ERROR", text, children)
}

fn token(text: &'static str) -> Shape {
    Shape {
        kind: text,
        extent: Extent::Text(text),
        named: false,
        children: Vec::new(),
    }
}

fn missing(kind: &'static str) -> Shape {
    Shape {
        kind,
        extent: Extent::Missing,
        named: false,
        children: Vec::new(),
    }
}

fn tree(source: &str, shapes: Vec<Shape>) -> TestNode {
    TestNode {
        kind: "source_file",
        start: 0,
        end: source.len(),
        named: true,
        missing: false,
        children: layout(source, 0, source.len(), shapes),
    }
}

/// Places each shape at the next occurrence of its text in `source[from..end]`.
fn layout(source: &str, mut from: usize, end: usize, shapes: Vec<Shape>) -> Vec<TestNode> {
    let mut nodes = Vec::new();
    for shape in shapes {
        let (start, node_end) = match shape.extent {
            Extent::Text(text) => {
                let start = find(source, from, end, text);
                (start, start + text.len())
            }
            Extent::Block(head) => {
                let start = find(source, from, end, head);
                (start, block_end(source, start, end))
            }
            Extent::Missing => (from, from),
        };
        nodes.push(TestNode {
            kind: shape.kind,
            start,
            end: node_end,
            named: shape.named,
            missing: matches!(shape.extent, Extent::Missing),
            children: layout(source, start, node_end, shape.children),
        });
        from = node_end;
    }
    nodes
}

fn find(source: &str, from: usize, end: usize, text: &str) -> usize {
    match source[from..end].find(text) {
        Some(index) => from + index,
        None => panic!("{text:?} not found in {:?}", &source[from..end]),
    }
}

fn block_end(source: &str, start: usize, end: usize) -> usize {
    let mut depth = 0;
    for (index, ch) in source[start..end].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return start + index + 1;
                }
            }
            _ => (),
        }
    }
    end
}

const ORDER: &str = r#"syntax = "proto3";
package shop.v1;

import "google/protobuf/timestamp.proto";

message Order {
    string id = 1;
    repeated Item items = 2 [deprecated = true];
    map<string, int64> totals = 3;
    oneof payment {
        string card = 4;
        string voucher = 5;
    }
    message Item {
        string sku = 1;
        int32 quantity = 0x10;
    }
    reserved 6, 8 to max;
}

enum Status {
    STATUS_UNSPECIFIED = 0;
    STATUS_OPEN = 1;
}

service Orders {
    rpc Watch (stream Order) returns (stream Order);
}
"#;

fn order_tree() -> TestNode {
    tree(
        ORDER,
        vec![
            leaf("syntax", r#"syntax = "proto3";"#),
            leaf("package", "package shop.v1;"),
            leaf("import", r#"import "google/protobuf/timestamp.proto";"#),
            block(
                "message",
                "message Order",
                vec![
                    leaf("message_name", "Order"),
                    block(
                        "message_body",
                        "{",
                        vec![
                            leaf("field", "string id = 1;"),
                            leaf("field", "repeated Item items = 2 [deprecated = true];"),
                            leaf("map_field", "map<string, int64> totals = 3;"),
                            block(
                                "oneof",
                                "oneof payment",
                                vec![
                                    leaf("oneof_field", "string card = 4;"),
                                    leaf("oneof_field", "string voucher = 5;"),
                                ],
                            ),
                            block(
                                "message",
                                "message Item",
                                vec![block(
                                    "message_body",
                                    "{",
                                    vec![
                                        leaf("field", "string sku = 1;"),
                                        leaf("field", "int32 quantity = 0x10;"),
                                    ],
                                )],
                            ),
                            leaf("reserved", "reserved 6, 8 to max;"),
                        ],
                    ),
                ],
            ),
            block(
                "enum",
                "enum Status",
                vec![block(
                    "enum_body",
                    "{",
                    vec![
                        leaf("enum_field", "STATUS_UNSPECIFIED = 0;"),
                        leaf("enum_field", "STATUS_OPEN = 1;"),
                    ],
                )],
            ),
            block(
                "service",
                "service Orders",
                vec![leaf(
                    "rpc",
                    "rpc Watch (stream Order) returns (stream Order);",
                )],
            ),
        ],
    )
}

/// The names and numbers of everything in a file, in order.
fn outline(file: &ProtoFile) -> Vec<String> {
    fn walk(out: &mut Vec<String>, m: &crate::ast::Message) {
        out.push(format!("message {}", m.name));
        for member in m.numbered_members() {
            out.push(format!("  {} = {}", member.name(), member.number()));
        }
        for oneof in &m.oneofs {
            out.push(format!("  oneof {}", oneof.name));
        }
        for reserved in &m.reserved {
            for range in &reserved.ranges {
                out.push(format!("  reserved {range}"));
            }
        }
        for nested in &m.messages {
            walk(out, nested);
        }
    }

    let mut out = vec![
        format!("package {}", file.package_name()),
        format!("imports {}", file.imports.len()),
    ];
    for m in &file.messages {
        walk(&mut out, m);
    }
    for e in &file.enums {
        out.push(format!("enum {}", e.name));
        for value in &e.values {
            out.push(format!("  {} = {}", value.name, value.number));
        }
    }
    for s in &file.services {
        for rpc in &s.rpcs {
            out.push(format!(
                "rpc {}({} {}) -> ({} {})",
                rpc.name, rpc.request_stream, rpc.request_type, rpc.response_stream, rpc.response_type
            ));
        }
    }
    out
}

fn field_names(message: &crate::ast::Message) -> Vec<&str> {
    message.fields.iter().map(|f| f.name.as_str()).collect()
}

#[test]
fn missing_library() {
    let parser = GrammarParser::new();
    let err = parser
        .initialize("/nonexistent/libtree-sitter-proto.so")
        .unwrap_err();
    assert!(matches!(*err, GrammarError::NotFound { .. }));
    assert!(!parser.is_initialized());
    assert!(parser.init_error().is_some());
}

#[test]
fn initialize_is_idempotent() {
    let parser = GrammarParser::new();
    let first = parser.initialize("/nonexistent/first.so").unwrap_err();
    let second = parser.initialize("/nonexistent/second.so").unwrap_err();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        first.to_string(),
        "grammar library not found: /nonexistent/first.so"
    );
}

#[test]
fn not_a_library() {
    let dir = env::temp_dir().join(format!("protosense-grammar-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("not-a-library.so");
    std::fs::write(&path, b"definitely not an ELF file").unwrap();

    let parser = GrammarParser::new();
    let err = parser.initialize(&path).unwrap_err();
    assert!(matches!(*err, GrammarError::Load { .. }));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn parse_before_initialize() {
    let parser = GrammarParser::new();
    assert!(matches!(
        parser.parse("syntax = \"proto3\";"),
        Err(GrammarError::NotInitialized)
    ));
}

#[test]
fn lowering_agrees_with_fallback() {
    let tree = order_tree();
    let lowered = lower_root(&tree, ORDER);

    assert!(lowered.syntax_errors.is_empty());
    similar_asserts::assert_eq!(outline(&lowered), outline(&fallback::parse(ORDER)));

    let order = &lowered.messages[0];
    assert_eq!(order.fields[1].options.len(), 1);
    assert_eq!(order.maps[0].value_type, "int64");
    assert_eq!(order.messages[0].fields[1].number, 16);
    assert!(lowered.services[0].rpcs[0].request_stream);
}

#[test]
fn lowering_is_deterministic() {
    let tree = order_tree();
    assert_eq!(lower_root(&tree, ORDER), lower_root(&tree, ORDER));
    assert_eq!(lower_root(&tree, ORDER), fallback::parse(ORDER));
}

#[test]
fn error_nodes_become_syntax_errors() {
    let source = "syntax = \"proto3\";\nmessage A {\n  string a = 1;\n  int32 = ;\n  bool c = 3;\n}\nmessage B { string b = 2 }\n";
    let tree = tree(
        source,
        vec![
            leaf("syntax", "syntax = \"proto3\";"),
            block(
                "message",
                "message A",
                vec![block(
                    "message_body",
                    "{",
                    vec![
                        leaf("field", "string a = 1;"),
                        error("int32 = ;", vec![token("int32"), token("="), token(";")]),
                        leaf("field", "bool c = 3;"),
                    ],
                )],
            ),
            block(
                "message",
                "message B",
                vec![block(
                    "message_body",
                    "{",
                    vec![node(
                        "field",
                        "string b = 2",
                        vec![leaf("field_number", "2"), missing(";")],
                    )],
                )],
            ),
        ],
    );

    let file = lower_root(&tree, source);
    assert_eq!(field_names(&file.messages[0]), ["a", "c"]);
    assert_eq!(field_names(&file.messages[1]), ["b"]);

    let errors: Vec<_> = file
        .syntax_errors
        .iter()
        .map(|e| (e.message.as_str(), e.range))
        .collect();
    assert_eq!(
        errors,
        [
            (
                "Syntax error: unexpected 'int32 = ;'",
                Range::new(Position::new(3, 2), Position::new(3, 11))
            ),
            (
                "Missing ';'",
                Range::new(Position::new(6, 24), Position::new(6, 24))
            ),
        ]
    );
}

#[test]
fn fields_recovered_from_stretched_and_error_nodes() {
    let source = "message M {\n  string a = 1\n  int32 b = 2;\n  garbage here\n  bool c = 3;\n  oneof o {\n    string x = 4\n    string y = 5;\n  }\n}\n";
    let tree = tree(
        source,
        vec![block(
            "message",
            "message M",
            vec![block(
                "message_body",
                "{",
                vec![
                    leaf("field", "string a = 1\n  int32 b = 2;"),
                    error(
                        "garbage here\n  bool c = 3;",
                        vec![leaf("identifier", "garbage"), leaf("identifier", "here")],
                    ),
                    block(
                        "oneof",
                        "oneof o",
                        vec![leaf("oneof_field", "string x = 4\n    string y = 5;")],
                    ),
                ],
            )],
        )],
    );

    let file = lower_root(&tree, source);
    let message = &file.messages[0];
    assert_eq!(field_names(message), ["a", "b", "c"]);
    assert_eq!(message.fields[1].name_range.start, Position::new(2, 8));

    let oneof: Vec<_> = message.oneofs[0].fields.iter().map(|f| f.number).collect();
    assert_eq!(oneof, [4, 5]);

    assert_eq!(file.syntax_errors.len(), 1);
    assert_eq!(
        file.syntax_errors[0].message,
        "Syntax error: unexpected 'garbage here'"
    );
}

#[test]
fn constructs_inside_top_level_errors() {
    let source = "}\nmessage Lost { int32 x = 1; }\n";
    let tree = tree(
        source,
        vec![error(
            "}\nmessage Lost { int32 x = 1; }",
            vec![
                token("}"),
                block(
                    "message",
                    "message Lost",
                    vec![block("message_body", "{", vec![leaf("field", "int32 x = 1;")])],
                ),
            ],
        )],
    );

    let file = lower_root(&tree, source);
    assert_eq!(file.messages[0].name, "Lost");
    assert_eq!(field_names(&file.messages[0]), ["x"]);
    assert_eq!(file.syntax_errors[0].message, "Syntax error: unexpected '}'");
}

#[test]
fn unreadable_nodes_are_skipped() {
    let source = "enum E { = 5; OK = 1; }\nservice S { rpc; }\n";
    let tree = tree(
        source,
        vec![
            block(
                "enum",
                "enum E",
                vec![block(
                    "enum_body",
                    "{",
                    vec![leaf("enum_field", "= 5;"), leaf("enum_field", "OK = 1;")],
                )],
            ),
            block("service", "service S", vec![leaf("rpc", "rpc;")]),
        ],
    );

    let file = lower_root(&tree, source);
    let values: Vec<_> = file.enums[0]
        .values
        .iter()
        .map(|v| (v.name.as_str(), v.number))
        .collect();
    assert_eq!(values, [("OK", 1)]);
    assert_eq!(file.services[0].name, "S");
    assert!(file.syntax_errors.is_empty());
}

#[test]
fn loaded_grammar_agrees_with_fallback() {
    let Some(parser) = loaded_parser() else {
        return;
    };

    let grammar = parser.parse(ORDER).unwrap();
    assert!(grammar.syntax_errors.is_empty());
    similar_asserts::assert_eq!(outline(&grammar), outline(&fallback::parse(ORDER)));
    assert_eq!(parser.parse(ORDER).unwrap(), grammar);
}
