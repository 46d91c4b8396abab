use protosense_parse::Enum;
use rustc_hash::FxHashMap;

use super::{all_enums, Context, Diagnostic};

pub(super) fn check(cx: &mut Context) {
    let file = cx.file;
    let open_enums = file.is_proto3_or_later();

    for (_, e) in all_enums(file) {
        if open_enums {
            first_value_zero(cx, e);
        }
        if !e.allows_alias() {
            duplicate_values(cx, e);
        }
        if cx.settings.field_tag_checks {
            reserved_collisions(cx, e);
        }
    }
}

fn first_value_zero(cx: &mut Context, e: &Enum) {
    if let Some(first) = e.values.first() {
        if first.number != 0 {
            cx.push(
                Diagnostic::warning(
                    first.number_range,
                    format!(
                        "The first value of enum '{}' should be zero, found '{}' = {}",
                        e.name, first.name, first.number
                    ),
                )
                .with_code("enum-first-value"),
            );
        }
    }
}

fn duplicate_values(cx: &mut Context, e: &Enum) {
    let mut first_with_number: FxHashMap<i64, &str> = FxHashMap::default();
    for value in &e.values {
        match first_with_number.get(&value.number) {
            Some(&first) => cx.push(
                Diagnostic::error(
                    value.number_range,
                    format!(
                        "Duplicate enum value {}: '{}' has the same number as '{first}'; set 'option allow_alias = true;' to allow aliases",
                        value.number, value.name
                    ),
                )
                .with_code("duplicate-enum-value"),
            ),
            None => {
                first_with_number.insert(value.number, &value.name);
            }
        }
    }
}

fn reserved_collisions(cx: &mut Context, e: &Enum) {
    for value in &e.values {
        let reserved_number = e
            .reserved
            .iter()
            .flat_map(|r| &r.ranges)
            .any(|r| r.contains(value.number));
        if reserved_number {
            cx.push(
                Diagnostic::error(
                    value.number_range,
                    format!(
                        "Enum value '{}' uses reserved number {}",
                        value.name, value.number
                    ),
                )
                .with_code("reserved-number"),
            );
        }

        let reserved_name = e
            .reserved
            .iter()
            .flat_map(|r| &r.names)
            .any(|n| n.name == value.name);
        if reserved_name {
            cx.push(
                Diagnostic::error(
                    value.name_range,
                    format!("Enum value name '{}' is reserved", value.name),
                )
                .with_code("reserved-name"),
            );
        }
    }
}
