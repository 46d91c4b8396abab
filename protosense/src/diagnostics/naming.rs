use protosense_parse::{Field, Range};

use super::{all_enums, all_messages, Context, Diagnostic, Fix};
use crate::case::{
    is_lower_snake_case, is_pascal_case, is_upper_snake_case, to_lower_snake_case,
    to_pascal_case, to_upper_snake_case,
};

const CODE: &str = "naming-convention";

pub(super) fn check(cx: &mut Context) {
    let file = cx.file;

    for (_, name, message) in all_messages(file) {
        pascal(cx, "Message", name, message.name_range);

        let fields = message
            .fields
            .iter()
            .chain(message.oneofs.iter().flat_map(|o| &o.fields))
            .chain(message.extends.iter().flat_map(|e| &e.fields));
        for field in fields {
            snake_field(cx, field);
        }
        for map in &message.maps {
            snake(cx, "Field", &map.name, map.name_range);
        }
        for oneof in &message.oneofs {
            snake(cx, "Oneof", &oneof.name, oneof.name_range);
        }
    }

    for field in file.extends.iter().flat_map(|e| &e.fields) {
        snake_field(cx, field);
    }

    for (_, e) in all_enums(file) {
        pascal(cx, "Enum", &e.name, e.name_range);
        for value in &e.values {
            if !value.name.is_empty() && !is_upper_snake_case(&value.name) {
                let suggestion = to_upper_snake_case(&value.name);
                cx.push(rename(
                    value.name_range,
                    format!(
                        "Enum value '{}' should be UPPER_SNAKE_CASE, e.g. '{suggestion}'",
                        value.name
                    ),
                    suggestion,
                ));
            }
        }
    }

    for service in &file.services {
        pascal(cx, "Service", &service.name, service.name_range);
        for rpc in &service.rpcs {
            pascal(cx, "RPC", &rpc.name, rpc.name_range);
        }
    }
}

fn pascal(cx: &mut Context, what: &str, name: &str, range: Range) {
    if !name.is_empty() && !is_pascal_case(name) {
        let suggestion = to_pascal_case(name);
        cx.push(rename(
            range,
            format!("{what} name '{name}' should be PascalCase, e.g. '{suggestion}'"),
            suggestion,
        ));
    }
}

fn snake(cx: &mut Context, what: &str, name: &str, range: Range) {
    if !name.is_empty() && !is_lower_snake_case(name) {
        let suggestion = to_lower_snake_case(name);
        cx.push(rename(
            range,
            format!("{what} name '{name}' should be lower_snake_case, e.g. '{suggestion}'"),
            suggestion,
        ));
    }
}

fn snake_field(cx: &mut Context, field: &Field) {
    snake(cx, "Field", &field.name, field.name_range);
}

fn rename(range: Range, message: String, to: String) -> Diagnostic {
    Diagnostic::warning(range, message)
        .with_code(CODE)
        .with_fix(Fix::Rename { to })
}
