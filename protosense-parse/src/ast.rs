//! The syntax tree shared by both parser strategies.
//!
//! Every node records the [`Range`] of its full span and, where it declares a name, the range of
//! just the name token. A [`ProtoFile`] is never mutated after it is produced: an edit to the
//! source text produces a new tree.

use std::fmt;

use crate::MAX_FIELD_NUMBER;

/// A zero-based line and UTF-16 code unit offset into a source file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// The zero-based line number.
    pub line: u32,
    /// The zero-based character offset within the line, counted in UTF-16 code units.
    pub character: u32,
}

/// A half-open range `[start, end)` between two positions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    /// The inclusive start of the range.
    pub start: Position,
    /// The exclusive end of the range.
    pub end: Position,
}

impl Position {
    /// Creates a new position.
    pub const fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

impl Range {
    /// Creates a new range.
    pub const fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    /// Returns `true` if `position` lies within this range.
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    /// Returns `true` if the range covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.character + 1)
    }
}

/// The root of the tree for a single source file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProtoFile {
    /// The `syntax` or `edition` declaration, if present.
    pub syntax: Option<SyntaxDecl>,
    /// The package declaration, if present.
    pub package: Option<Package>,
    /// Import statements, in declaration order.
    pub imports: Vec<Import>,
    /// File-level options.
    pub options: Vec<OptionEntry>,
    /// Top-level messages.
    pub messages: Vec<Message>,
    /// Top-level enums.
    pub enums: Vec<Enum>,
    /// Services.
    pub services: Vec<Service>,
    /// Top-level `extend` blocks.
    pub extends: Vec<Extend>,
    /// Syntax errors found while parsing. Only the grammar-based parser reports these.
    pub syntax_errors: Vec<SyntaxError>,
    /// The range of the whole file.
    pub range: Range,
}

/// Whether a file declares a `syntax` or an `edition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    /// `syntax = "proto2";` or `syntax = "proto3";`
    Syntax,
    /// `edition = "2023";`
    Edition,
}

/// A `syntax` or `edition` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxDecl {
    pub kind: SyntaxKind,
    /// The declared value without quotes, e.g. `proto3` or `2023`.
    pub value: String,
    pub value_range: Range,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// The dotted package name.
    pub name: String,
    pub name_range: Range,
    pub range: Range,
}

/// The modifier on an import statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportModifier {
    Weak,
    Public,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub modifier: Option<ImportModifier>,
    /// The imported path, without quotes.
    pub path: String,
    pub path_range: Range,
    pub range: Range,
}

/// The value assigned to an option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// A string literal, with adjacent literals concatenated and escapes resolved.
    String(String),
    Int(i64),
    /// A floating-point literal, including `inf` and `nan`.
    Float(f64),
    Bool(bool),
    /// An identifier such as an enum value name.
    Identifier(String),
    /// A message literal in text format, kept as source text.
    Aggregate(String),
    /// Text that could not be interpreted as any constant.
    Other(String),
}

impl OptionValue {
    /// A short name for the kind of value, used in messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            OptionValue::String(_) => "string",
            OptionValue::Int(_) => "integer",
            OptionValue::Float(_) => "float",
            OptionValue::Bool(_) => "boolean",
            OptionValue::Identifier(_) => "identifier",
            OptionValue::Aggregate(_) => "message",
            OptionValue::Other(_) => "value",
        }
    }
}

/// An option, either a full `option name = value;` statement or an entry in a `[...]` list.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionEntry {
    /// The option name with whitespace removed, e.g. `deprecated` or `(my.ext).field`.
    pub name: String,
    pub name_range: Range,
    pub value: OptionValue,
    pub value_range: Range,
    pub range: Range,
}

impl OptionEntry {
    /// Returns `true` if this is a custom option such as `(foo.bar)`.
    pub fn is_custom(&self) -> bool {
        self.name.starts_with('(')
    }

    /// For custom options, the extension name between the parentheses.
    pub fn extension_name(&self) -> Option<&str> {
        let rest = self.name.strip_prefix('(')?;
        let end = rest.find(')')?;
        Some(&rest[..end])
    }
}

/// A field label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldModifier {
    Optional,
    Required,
    Repeated,
}

impl FieldModifier {
    /// The keyword for this modifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldModifier::Optional => "optional",
            FieldModifier::Required => "required",
            FieldModifier::Repeated => "repeated",
        }
    }
}

impl fmt::Display for FieldModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub name_range: Range,
    pub range: Range,
    pub fields: Vec<Field>,
    pub messages: Vec<Message>,
    pub enums: Vec<Enum>,
    pub oneofs: Vec<Oneof>,
    pub options: Vec<OptionEntry>,
    pub reserved: Vec<Reserved>,
    pub extensions: Vec<ExtensionRange>,
    pub maps: Vec<MapField>,
    pub groups: Vec<Group>,
    pub extends: Vec<Extend>,
}

impl Message {
    /// Iterates over every number-bearing member of this message, in no particular order.
    ///
    /// This includes plain fields, fields declared inside oneofs, map fields and groups, but not
    /// members of nested messages.
    pub fn numbered_members(&self) -> impl Iterator<Item = NumberedMember<'_>> {
        let fields = self.fields.iter().map(NumberedMember::Field);
        let oneof_fields = self
            .oneofs
            .iter()
            .flat_map(|oneof| oneof.fields.iter().map(NumberedMember::Field));
        let oneof_groups = self
            .oneofs
            .iter()
            .flat_map(|oneof| oneof.groups.iter().map(NumberedMember::Group));
        let maps = self.maps.iter().map(NumberedMember::Map);
        let groups = self.groups.iter().map(NumberedMember::Group);

        fields.chain(oneof_fields).chain(maps).chain(groups).chain(oneof_groups)
    }

    /// Returns `true` if `number` is covered by a reserved range of this message.
    pub fn is_reserved_number(&self, number: i64) -> bool {
        self.reserved
            .iter()
            .flat_map(|r| &r.ranges)
            .any(|r| r.contains(number))
    }

    /// Returns `true` if `name` is listed as a reserved name of this message.
    pub fn is_reserved_name(&self, name: &str) -> bool {
        self.reserved
            .iter()
            .flat_map(|r| &r.names)
            .any(|n| n.name == name)
    }

    /// Looks up the value of an option declared directly in the message body.
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        find_option(&self.options, name)
    }
}

/// A borrowed reference to any message member that carries a field number.
#[derive(Debug, Clone, Copy)]
pub enum NumberedMember<'a> {
    Field(&'a Field),
    Map(&'a MapField),
    Group(&'a Group),
}

impl<'a> NumberedMember<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            NumberedMember::Field(f) => &f.name,
            NumberedMember::Map(m) => &m.name,
            NumberedMember::Group(g) => &g.name,
        }
    }

    pub fn number(&self) -> i64 {
        match self {
            NumberedMember::Field(f) => f.number,
            NumberedMember::Map(m) => m.number,
            NumberedMember::Group(g) => g.number,
        }
    }

    pub fn name_range(&self) -> Range {
        match self {
            NumberedMember::Field(f) => f.name_range,
            NumberedMember::Map(m) => m.name_range,
            NumberedMember::Group(g) => g.name_range,
        }
    }

    pub fn number_range(&self) -> Range {
        match self {
            NumberedMember::Field(f) => f.number_range,
            NumberedMember::Map(m) => m.number_range,
            NumberedMember::Group(g) => g.number_range,
        }
    }

    pub fn range(&self) -> Range {
        match self {
            NumberedMember::Field(f) => f.range,
            NumberedMember::Map(m) => m.range,
            NumberedMember::Group(g) => g.range,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Field {
    pub modifier: Option<FieldModifier>,
    /// The type as written, either a scalar keyword or a possibly-qualified reference.
    pub type_name: String,
    pub type_range: Range,
    pub name: String,
    pub name_range: Range,
    /// The declared number, or `0` if it is missing or could not be parsed.
    pub number: i64,
    pub number_range: Range,
    pub options: Vec<OptionEntry>,
    pub range: Range,
}

impl Field {
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        find_option(&self.options, name)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MapField {
    pub key_type: String,
    pub key_type_range: Range,
    pub value_type: String,
    pub value_type_range: Range,
    pub name: String,
    pub name_range: Range,
    pub number: i64,
    pub number_range: Range,
    pub options: Vec<OptionEntry>,
    pub range: Range,
}

/// A legacy group field. The group body is laid out like a message named after the group.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Group {
    pub modifier: Option<FieldModifier>,
    pub name: String,
    pub name_range: Range,
    pub number: i64,
    pub number_range: Range,
    pub options: Vec<OptionEntry>,
    pub body: Message,
    pub range: Range,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Oneof {
    pub name: String,
    pub name_range: Range,
    pub fields: Vec<Field>,
    pub groups: Vec<Group>,
    pub options: Vec<OptionEntry>,
    pub range: Range,
}

/// An inclusive range of numbers, as used by `reserved` and `extensions`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NumberRange {
    pub start: i64,
    /// The inclusive end. `max` is stored as [`MAX_FIELD_NUMBER`].
    pub end: i64,
    pub range: Range,
}

impl NumberRange {
    pub fn contains(&self, number: i64) -> bool {
        self.start <= number && number <= self.end
    }

    pub fn overlaps(&self, other: &NumberRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns `true` if the end was written as `max`.
    pub fn is_max(&self) -> bool {
        self.end == MAX_FIELD_NUMBER
    }
}

impl fmt::Display for NumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReservedName {
    pub name: String,
    pub range: Range,
}

/// A `reserved` statement, listing numbers, names or both.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reserved {
    pub ranges: Vec<NumberRange>,
    pub names: Vec<ReservedName>,
    pub range: Range,
}

/// An `extensions` statement.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtensionRange {
    pub ranges: Vec<NumberRange>,
    pub options: Vec<OptionEntry>,
    pub range: Range,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Enum {
    pub name: String,
    pub name_range: Range,
    pub values: Vec<EnumValue>,
    pub options: Vec<OptionEntry>,
    pub reserved: Vec<Reserved>,
    pub range: Range,
}

impl Enum {
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        find_option(&self.options, name)
    }

    /// Returns `true` if `option allow_alias = true;` is set.
    pub fn allows_alias(&self) -> bool {
        matches!(self.option("allow_alias"), Some(OptionValue::Bool(true)))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub name_range: Range,
    pub number: i64,
    pub number_range: Range,
    pub options: Vec<OptionEntry>,
    pub range: Range,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Service {
    pub name: String,
    pub name_range: Range,
    pub rpcs: Vec<Rpc>,
    pub options: Vec<OptionEntry>,
    pub range: Range,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Rpc {
    pub name: String,
    pub name_range: Range,
    pub request_type: String,
    pub request_type_range: Range,
    pub request_stream: bool,
    pub response_type: String,
    pub response_type_range: Range,
    pub response_stream: bool,
    pub options: Vec<OptionEntry>,
    pub range: Range,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extend {
    /// The extended type as written.
    pub extendee: String,
    pub extendee_range: Range,
    pub fields: Vec<Field>,
    pub groups: Vec<Group>,
    pub range: Range,
}

/// A recoverable syntax error.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub range: Range,
    pub message: String,
}

impl ProtoFile {
    /// The declared package, or the empty string.
    pub fn package_name(&self) -> &str {
        self.package.as_ref().map_or("", |p| p.name.as_str())
    }

    /// Returns `true` if the file declares `syntax = "proto3"` or any edition.
    pub fn is_proto3_or_later(&self) -> bool {
        match &self.syntax {
            Some(decl) => decl.kind == SyntaxKind::Edition || decl.value == "proto3",
            None => false,
        }
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        find_option(&self.options, name)
    }
}

fn find_option<'a>(options: &'a [OptionEntry], name: &str) -> Option<&'a OptionValue> {
    options
        .iter()
        .rev()
        .find(|opt| opt.name == name)
        .map(|opt| &opt.value)
}

/// Returns `true` if `name` is one of the scalar type keywords.
pub fn is_scalar_type(name: &str) -> bool {
    matches!(
        name,
        "double"
            | "float"
            | "int32"
            | "int64"
            | "uint32"
            | "uint64"
            | "sint32"
            | "sint64"
            | "fixed32"
            | "fixed64"
            | "sfixed32"
            | "sfixed64"
            | "bool"
            | "string"
            | "bytes"
    )
}

/// Returns `true` if `name` may be used as the key type of a map field.
pub fn is_map_key_type(name: &str) -> bool {
    is_scalar_type(name) && !matches!(name, "double" | "float" | "bytes")
}
