//! The well-known files under `google/protobuf/`.
//!
//! These are always registered with the analyzer, so imports of them resolve without any include
//! path. The vendored copies keep only declarations; the upstream files' comments and options
//! are omitted.

macro_rules! include_proto {
    ($name:literal) => {
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/protobuf/google/protobuf/",
            $name
        ))
    };
}

pub(crate) const ANY: &str = include_proto!("any.proto");
pub(crate) const API: &str = include_proto!("api.proto");
pub(crate) const DESCRIPTOR: &str = include_proto!("descriptor.proto");
pub(crate) const DURATION: &str = include_proto!("duration.proto");
pub(crate) const EMPTY: &str = include_proto!("empty.proto");
pub(crate) const FIELD_MASK: &str = include_proto!("field_mask.proto");
pub(crate) const SOURCE_CONTEXT: &str = include_proto!("source_context.proto");
pub(crate) const STRUCT: &str = include_proto!("struct.proto");
pub(crate) const TIMESTAMP: &str = include_proto!("timestamp.proto");
pub(crate) const TYPE: &str = include_proto!("type.proto");
pub(crate) const WRAPPERS: &str = include_proto!("wrappers.proto");
pub(crate) const COMPILER_PLUGIN: &str = include_proto!("compiler/plugin.proto");

/// Every well-known file, by import name.
pub(crate) const FILES: &[(&str, &str)] = &[
    ("google/protobuf/any.proto", ANY),
    ("google/protobuf/api.proto", API),
    ("google/protobuf/descriptor.proto", DESCRIPTOR),
    ("google/protobuf/duration.proto", DURATION),
    ("google/protobuf/empty.proto", EMPTY),
    ("google/protobuf/field_mask.proto", FIELD_MASK),
    ("google/protobuf/source_context.proto", SOURCE_CONTEXT),
    ("google/protobuf/struct.proto", STRUCT),
    ("google/protobuf/timestamp.proto", TIMESTAMP),
    ("google/protobuf/type.proto", TYPE),
    ("google/protobuf/wrappers.proto", WRAPPERS),
    ("google/protobuf/compiler/plugin.proto", COMPILER_PLUGIN),
];

/// Returns `true` if `name` is the import name of a well-known file.
pub(crate) fn is_well_known(name: &str) -> bool {
    FILES.iter().any(|(file, _)| *file == name)
}
