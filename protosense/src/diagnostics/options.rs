//! Value checks for the options defined by `descriptor.proto`.

use protosense_parse::{Message, OptionEntry, OptionValue, ProtoFile};

use super::{all_enums, all_messages, Context, Diagnostic};

/// The kind of declaration an option is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    File,
    Message,
    Field,
    Oneof,
    Enum,
    EnumValue,
    Service,
    Method,
    ExtensionRange,
}

enum Expected {
    Bool,
    String,
    Enum(&'static [&'static str]),
}

fn expected(target: Target, name: &str) -> Option<Expected> {
    use Expected::*;

    let expected = match (target, name) {
        (_, "deprecated") => Bool,
        (
            Target::File,
            "java_multiple_files"
            | "java_generate_equals_and_hash"
            | "java_string_check_utf8"
            | "cc_generic_services"
            | "java_generic_services"
            | "py_generic_services"
            | "cc_enable_arenas",
        ) => Bool,
        (
            Target::File,
            "java_package" | "java_outer_classname" | "go_package" | "objc_class_prefix"
            | "csharp_namespace" | "swift_prefix" | "php_class_prefix" | "php_namespace"
            | "php_metadata_namespace" | "ruby_package",
        ) => String,
        (Target::File, "optimize_for") => Enum(&["SPEED", "CODE_SIZE", "LITE_RUNTIME"]),
        (
            Target::Message,
            "message_set_wire_format"
            | "no_standard_descriptor_accessor"
            | "map_entry"
            | "deprecated_legacy_json_field_conflicts",
        ) => Bool,
        (
            Target::Field,
            "packed" | "lazy" | "unverified_lazy" | "weak" | "debug_redact",
        ) => Bool,
        (Target::Field, "json_name") => String,
        (Target::Field, "ctype") => Enum(&["STRING", "CORD", "STRING_PIECE"]),
        (Target::Field, "jstype") => Enum(&["JS_NORMAL", "JS_STRING", "JS_NUMBER"]),
        (Target::Field, "retention") => {
            Enum(&["RETENTION_UNKNOWN", "RETENTION_RUNTIME", "RETENTION_SOURCE"])
        }
        (Target::Enum, "allow_alias") => Bool,
        (Target::EnumValue, "debug_redact") => Bool,
        (Target::Method, "idempotency_level") => {
            Enum(&["IDEMPOTENCY_UNKNOWN", "NO_SIDE_EFFECTS", "IDEMPOTENT"])
        }
        _ => return None,
    };
    Some(expected)
}

/// Every option in the file, with its target and the fully-qualified scope it appears in.
pub(crate) fn all_options(file: &ProtoFile) -> Vec<(Target, String, &OptionEntry)> {
    fn message_options<'a>(
        out: &mut Vec<(Target, String, &'a OptionEntry)>,
        scope: &str,
        message: &'a Message,
    ) {
        let mut push = |target, options: &'a [OptionEntry]| {
            out.extend(options.iter().map(|o| (target, scope.to_owned(), o)));
        };

        push(Target::Message, &message.options);
        let fields = message
            .fields
            .iter()
            .chain(message.oneofs.iter().flat_map(|o| &o.fields))
            .chain(message.extends.iter().flat_map(|e| &e.fields));
        for field in fields {
            push(Target::Field, &field.options);
        }
        for map in &message.maps {
            push(Target::Field, &map.options);
        }
        let groups = message
            .groups
            .iter()
            .chain(message.oneofs.iter().flat_map(|o| &o.groups));
        for group in groups {
            push(Target::Field, &group.options);
        }
        for oneof in &message.oneofs {
            push(Target::Oneof, &oneof.options);
        }
        for range in &message.extensions {
            push(Target::ExtensionRange, &range.options);
        }
    }

    let package = file.package_name();
    let mut out: Vec<(Target, String, &OptionEntry)> = file
        .options
        .iter()
        .map(|o| (Target::File, package.to_owned(), o))
        .collect();

    for (scope, _, message) in all_messages(file) {
        message_options(&mut out, &scope, message);
    }
    for field in file.extends.iter().flat_map(|e| &e.fields) {
        out.extend(field.options.iter().map(|o| (Target::Field, package.to_owned(), o)));
    }
    for (scope, e) in all_enums(file) {
        out.extend(e.options.iter().map(|o| (Target::Enum, scope.clone(), o)));
        for value in &e.values {
            out.extend(
                value
                    .options
                    .iter()
                    .map(|o| (Target::EnumValue, scope.clone(), o)),
            );
        }
    }
    for service in &file.services {
        out.extend(
            service
                .options
                .iter()
                .map(|o| (Target::Service, package.to_owned(), o)),
        );
        for rpc in &service.rpcs {
            out.extend(
                rpc.options
                    .iter()
                    .map(|o| (Target::Method, package.to_owned(), o)),
            );
        }
    }

    out
}

pub(super) fn check(cx: &mut Context) {
    for (target, _, option) in all_options(cx.file) {
        if option.is_custom() {
            continue;
        }
        let Some(expected) = expected(target, &option.name) else {
            continue;
        };

        let problem = match (&expected, &option.value) {
            (Expected::Bool, OptionValue::Bool(_))
            | (Expected::String, OptionValue::String(_)) => None,
            (Expected::Enum(values), OptionValue::Identifier(value))
                if values.contains(&value.as_str()) =>
            {
                None
            }
            (Expected::Bool, value) => Some(format!(
                "Option '{}' expects a boolean, found {}",
                option.name,
                value.kind_name()
            )),
            (Expected::String, value) => Some(format!(
                "Option '{}' expects a string, found {}",
                option.name,
                value.kind_name()
            )),
            (Expected::Enum(values), _) => Some(format!(
                "Option '{}' must be one of {}",
                option.name,
                values.join(", ")
            )),
        };

        if let Some(message) = problem {
            cx.push(Diagnostic::warning(option.value_range, message).with_code("option-type"));
        }
    }
}
