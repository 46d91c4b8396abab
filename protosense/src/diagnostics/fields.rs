//! Checks on the numbered members of messages.

use protosense_parse::{
    is_map_key_type, FieldModifier, LineIndex, Message, NumberRange, NumberedMember,
    MAX_FIELD_NUMBER, RESERVED_FIELD_NUMBERS,
};
use rustc_hash::FxHashMap;

use super::{all_messages, Context, Diagnostic};

pub(super) fn check(cx: &mut Context) {
    let file = cx.file;
    for (_, name, message) in all_messages(file) {
        let members = members_in_order(message);

        if cx.settings.field_tag_checks {
            number_ranges(cx, &members);
            reserved_collisions(cx, message, &members);
            continuity(cx, message, &members);
            reserved_overlaps(cx, message);
        }
        if cx.settings.duplicate_field_checks {
            duplicates(cx, name, &members);
        }
        oneof_labels(cx, message);
        map_keys(cx, message);
        if cx.settings.discouraged_constructs {
            discouraged(cx, message);
        }
    }

    if cx.settings.discouraged_constructs {
        for extend in &file.extends {
            for field in &extend.fields {
                if field.modifier == Some(FieldModifier::Required) {
                    cx.push(required(field.name_range, &field.name));
                }
            }
        }
    }
}

/// The numbered members of `message` in the order they were declared.
fn members_in_order(message: &Message) -> Vec<NumberedMember<'_>> {
    let mut members: Vec<_> = message.numbered_members().collect();
    members.sort_by_key(|m| m.range().start);
    members
}

fn number_ranges(cx: &mut Context, members: &[NumberedMember]) {
    for member in members {
        let number = member.number();
        if !(1..=MAX_FIELD_NUMBER).contains(&number) {
            let written = written_number(cx, member);
            cx.push(
                Diagnostic::error(
                    member.number_range(),
                    format!(
                        "Field number {written} of '{}' is out of range; field numbers must be between 1 and {MAX_FIELD_NUMBER}",
                        member.name()
                    ),
                )
                .with_code("field-number-range"),
            );
        } else if RESERVED_FIELD_NUMBERS.contains(&number) {
            cx.push(
                Diagnostic::error(
                    member.number_range(),
                    format!(
                        "Field number {number} of '{}' is reserved for the protobuf implementation ({} to {})",
                        member.name(),
                        RESERVED_FIELD_NUMBERS.start(),
                        RESERVED_FIELD_NUMBERS.end()
                    ),
                )
                .with_code("field-number-range"),
            );
        }
    }
}

/// The number of `member` as it appears in the source, which may be too large to parse.
fn written_number(cx: &Context, member: &NumberedMember) -> String {
    let written = cx.text.and_then(|text| {
        let index = LineIndex::new(text);
        let range = member.number_range();
        text.get(index.offset(range.start)..index.offset(range.end))
    });
    match written.map(str::trim) {
        Some(written) if !written.is_empty() => written.to_owned(),
        _ => member.number().to_string(),
    }
}

fn reserved_collisions(cx: &mut Context, message: &Message, members: &[NumberedMember]) {
    for member in members {
        if message.is_reserved_number(member.number()) {
            cx.push(
                Diagnostic::error(
                    member.number_range(),
                    format!(
                        "Field '{}' uses reserved field number {}",
                        member.name(),
                        member.number()
                    ),
                )
                .with_code("reserved-number"),
            );
        }
        if !member.name().is_empty() && message.is_reserved_name(member.name()) {
            cx.push(
                Diagnostic::error(
                    member.name_range(),
                    format!("Field name '{}' is reserved", member.name()),
                )
                .with_code("reserved-name"),
            );
        }
    }
}

fn duplicates(cx: &mut Context, message_name: &str, members: &[NumberedMember]) {
    let mut by_number: FxHashMap<i64, Vec<&NumberedMember>> = FxHashMap::default();
    for member in members.iter().filter(|m| m.number() > 0) {
        by_number.entry(member.number()).or_default().push(member);
    }

    for member in members {
        let Some(users) = by_number.get(&member.number()) else {
            continue;
        };
        if users.len() < 2 {
            continue;
        }

        let others: Vec<String> = users
            .iter()
            .filter(|other| other.range() != member.range())
            .map(|other| format!("'{}'", other.name()))
            .collect();
        cx.push(
            Diagnostic::error(
                member.number_range(),
                format!(
                    "Duplicate field number {} in message '{message_name}': also used by {}",
                    member.number(),
                    others.join(", ")
                ),
            )
            .with_code("duplicate-field-number"),
        );
    }
}

/// Numbers which a message accounts for without declaring a field.
fn covered_ranges(message: &Message) -> Vec<(i64, i64)> {
    let reserved = message.reserved.iter().flat_map(|r| &r.ranges);
    let extensions = message.extensions.iter().flat_map(|r| &r.ranges);
    let mut ranges: Vec<(i64, i64)> = reserved
        .chain(extensions)
        .map(|r| (r.start, r.end))
        .chain(Some((
            *RESERVED_FIELD_NUMBERS.start(),
            *RESERVED_FIELD_NUMBERS.end(),
        )))
        .collect();
    ranges.sort_unstable();
    ranges
}

/// Returns `true` if every number in `start..=end` is in one of `ranges`, which must be sorted.
fn is_covered(start: i64, end: i64, ranges: &[(i64, i64)]) -> bool {
    let mut next = start;
    for &(lo, hi) in ranges {
        if lo > next {
            break;
        }
        if hi >= next {
            next = hi.saturating_add(1);
        }
        if next > end {
            return true;
        }
    }
    next > end
}

fn continuity(cx: &mut Context, message: &Message, members: &[NumberedMember]) {
    let valid: Vec<&NumberedMember> = members
        .iter()
        .filter(|m| (1..=MAX_FIELD_NUMBER).contains(&m.number()))
        .collect();

    let mut max_seen: Option<i64> = None;
    for member in &valid {
        if let Some(previous) = max_seen {
            if member.number() < previous {
                cx.push(
                    Diagnostic::hint(
                        member.number_range(),
                        format!(
                            "Field number {} is lower than the preceding field number {previous}; consider declaring fields in increasing order",
                            member.number()
                        ),
                    )
                    .with_code("field-number-order"),
                );
            }
        }
        max_seen = Some(max_seen.map_or(member.number(), |n| n.max(member.number())));
    }

    let mut sorted = valid;
    sorted.sort_by_key(|m| m.number());
    sorted.dedup_by_key(|m| m.number());
    let covered = covered_ranges(message);
    for pair in sorted.windows(2) {
        let (low, high) = (pair[0].number(), pair[1].number());
        if high > low + 1 && !is_covered(low + 1, high - 1, &covered) {
            let missing = if high == low + 2 {
                format!("{}", low + 1)
            } else {
                format!("{} to {}", low + 1, high - 1)
            };
            cx.push(
                Diagnostic::hint(
                    pair[1].number_range(),
                    format!(
                        "Field numbers jump from {low} to {high}; consider reserving {missing} if they were used before"
                    ),
                )
                .with_code("field-number-gap"),
            );
        }
    }
}

fn reserved_overlaps(cx: &mut Context, message: &Message) {
    let ranges: Vec<&NumberRange> = message.reserved.iter().flat_map(|r| &r.ranges).collect();
    for (i, later) in ranges.iter().enumerate() {
        if let Some(earlier) = ranges[..i].iter().find(|earlier| earlier.overlaps(later)) {
            cx.push(
                Diagnostic::warning(
                    later.range,
                    format!("Reserved range {later} overlaps with reserved range {earlier}"),
                )
                .with_code("reserved-overlap"),
            );
        }
    }
}

fn oneof_labels(cx: &mut Context, message: &Message) {
    for oneof in &message.oneofs {
        for field in &oneof.fields {
            if let Some(modifier @ (FieldModifier::Required | FieldModifier::Repeated)) =
                field.modifier
            {
                cx.push(
                    Diagnostic::warning(
                        field.range,
                        format!(
                            "Field '{}' in oneof '{}' cannot be '{modifier}'",
                            field.name, oneof.name
                        ),
                    )
                    .with_code("oneof-label"),
                );
            }
        }
    }
}

fn map_keys(cx: &mut Context, message: &Message) {
    for map in &message.maps {
        if !map.key_type.is_empty() && !is_map_key_type(&map.key_type) {
            cx.push(
                Diagnostic::error(
                    map.key_type_range,
                    format!(
                        "Map key type '{}' is not allowed; keys must be an integral type, bool or string",
                        map.key_type
                    ),
                )
                .with_code("map-key-type"),
            );
        }
    }
}

fn discouraged(cx: &mut Context, message: &Message) {
    let fields = message
        .fields
        .iter()
        .chain(message.extends.iter().flat_map(|e| &e.fields));
    for field in fields {
        if field.modifier == Some(FieldModifier::Required) {
            cx.push(required(field.name_range, &field.name));
        }
    }

    let groups = message
        .groups
        .iter()
        .chain(message.oneofs.iter().flat_map(|o| &o.groups));
    for group in groups {
        cx.push(
            Diagnostic::warning(
                group.name_range,
                format!(
                    "Group '{}' is deprecated; use a nested message and a field instead",
                    group.name
                ),
            )
            .with_code("group-field"),
        );
    }
}

fn required(range: protosense_parse::Range, name: &str) -> Diagnostic {
    Diagnostic::warning(
        range,
        format!("Required field '{name}' is discouraged; required fields can never be removed safely"),
    )
    .with_code("required-field")
}
