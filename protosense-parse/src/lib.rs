//! Error-tolerant parsing of protobuf source files.
//!
//! Two parsers produce the same [`ProtoFile`] tree:
//!
//! * a grammar-based parser ([`GrammarParser`]) which runs a tree-sitter grammar loaded from a
//!   shared library and reports syntax errors, and
//! * a fallback parser ([`parse()`]) which reads statements with text patterns and never fails.
//!
//! [`ParserFacade`] chooses between them and keeps statistics about how parses were served.
//!
//! # Examples
//!
//! ```
//! use protosense_parse::parse;
//!
//! let file = parse("syntax = \"proto3\";\nmessage User { string name = 1; }");
//!
//! assert_eq!(file.messages[0].name, "User");
//! assert_eq!(file.messages[0].fields[0].number, 1);
//! ```
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/protosense-parse/0.1.0/")]

pub mod ast;
mod extract;
mod facade;
mod fallback;
mod grammar;
mod lex;
mod lines;
mod literal;
mod text;

pub use self::{
    ast::{
        is_map_key_type, is_scalar_type, Enum, EnumValue, Extend, ExtensionRange, Field,
        FieldModifier, Group, Import, ImportModifier, MapField, Message, NumberRange,
        NumberedMember, Oneof, OptionEntry, OptionValue, Package, Position, ProtoFile, Range,
        Reserved, ReservedName, Rpc, Service, SyntaxDecl, SyntaxError, SyntaxKind,
    },
    facade::{LastError, ParseStats, ParserFacade, Strategy},
    fallback::parse,
    grammar::{GrammarError, GrammarParser, LANGUAGE_SYMBOL},
    lines::LineIndex,
};

/// The largest valid field number.
pub const MAX_FIELD_NUMBER: i64 = 536_870_911;

/// Field numbers reserved for the protobuf implementation.
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<i64> = 19_000..=19_999;
