//! Wire and API compatibility between two versions of a file.

use protosense_parse::{
    Enum, FieldModifier, Message, NumberedMember, ProtoFile, Range, Rpc, Service,
};
use rustc_hash::FxHashMap;

use super::{all_enums, all_messages, Diagnostic};

/// Compares `current` against an earlier version of the same file.
///
/// Findings are positioned in `current`. Changes to things that no longer exist are reported at
/// the nearest enclosing declaration that still does, or at the start of the file.
pub fn check_breaking_changes(baseline: &ProtoFile, current: &ProtoFile) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if baseline.package_name() != current.package_name() {
        let range = current.package.as_ref().map_or(Range::default(), |p| p.name_range);
        out.push(
            Diagnostic::error(
                range,
                format!(
                    "Package changed from '{}' to '{}'",
                    baseline.package_name(),
                    current.package_name()
                ),
            )
            .with_code("breaking-package"),
        );
    }

    let current_messages: FxHashMap<String, &Message> = all_messages(current)
        .into_iter()
        .map(|(name, _, message)| (name, message))
        .collect();
    for (name, _, old) in all_messages(baseline) {
        match current_messages.get(&name) {
            Some(new) => fields(&mut out, &name, old, new),
            None => out.push(
                Diagnostic::error(
                    enclosing_range(&current_messages, &name),
                    format!("Message '{name}' was removed"),
                )
                .with_code("breaking-message-removed"),
            ),
        }
    }

    let current_enums: FxHashMap<String, &Enum> = all_enums(current)
        .into_iter()
        .map(|(scope, e)| (qualify(&scope, &e.name), e))
        .collect();
    for (scope, old) in all_enums(baseline) {
        let name = qualify(&scope, &old.name);
        match current_enums.get(&name) {
            Some(new) => enum_values(&mut out, &name, old, new),
            None => out.push(
                Diagnostic::error(
                    enclosing_range(&current_messages, &name),
                    format!("Enum '{name}' was removed"),
                )
                .with_code("breaking-enum-removed"),
            ),
        }
    }

    for old in &baseline.services {
        match current.services.iter().find(|s| s.name == old.name) {
            Some(new) => rpcs(&mut out, old, new),
            None => out.push(
                Diagnostic::error(Range::default(), format!("Service '{}' was removed", old.name))
                    .with_code("breaking-service-removed"),
            ),
        }
    }

    out
}

fn qualify(scope: &str, name: &str) -> String {
    crate::analyzer::qualify(scope, name)
}

/// The name range of the innermost message in `current` enclosing `name`.
fn enclosing_range(current: &FxHashMap<String, &Message>, name: &str) -> Range {
    let mut scope = name;
    while let Some(idx) = scope.rfind('.') {
        scope = &scope[..idx];
        if let Some(message) = current.get(scope) {
            return message.name_range;
        }
    }
    Range::default()
}

fn describe(member: &NumberedMember) -> String {
    match member {
        NumberedMember::Field(f) => {
            let modifier = match f.modifier {
                Some(FieldModifier::Repeated) => "repeated ",
                _ => "",
            };
            format!("{modifier}{}", f.type_name.split_whitespace().collect::<String>())
        }
        NumberedMember::Map(m) => format!("map<{}, {}>", m.key_type, m.value_type),
        NumberedMember::Group(g) => format!("group {}", g.name),
    }
}

fn is_repeated(member: &NumberedMember) -> bool {
    match member {
        NumberedMember::Field(f) => f.modifier == Some(FieldModifier::Repeated),
        NumberedMember::Map(_) => true,
        NumberedMember::Group(g) => g.modifier == Some(FieldModifier::Repeated),
    }
}

fn fields(out: &mut Vec<Diagnostic>, message_name: &str, old: &Message, new: &Message) {
    let new_by_number: FxHashMap<i64, NumberedMember> =
        new.numbered_members().map(|m| (m.number(), m)).collect();
    let new_by_name: FxHashMap<&str, NumberedMember> =
        new.numbered_members().map(|m| (m.name(), m)).collect();

    for old_member in old.numbered_members() {
        let number = old_member.number();
        let name = old_member.name();

        let Some(new_member) = new_by_number.get(&number) else {
            if let Some(renumbered) = new_by_name.get(name) {
                out.push(
                    Diagnostic::error(
                        renumbered.number_range(),
                        format!(
                            "Field '{name}' in '{message_name}' changed number from {number} to {}",
                            renumbered.number()
                        ),
                    )
                    .with_code("breaking-field-number"),
                );
            } else if !new.is_reserved_number(number) {
                out.push(
                    Diagnostic::error(
                        new.name_range,
                        format!(
                            "Field '{name}' ({number}) was removed from '{message_name}' without reserving its number"
                        ),
                    )
                    .with_code("breaking-field-removed"),
                );
            }
            continue;
        };

        let (old_kind, new_kind) = (describe(&old_member), describe(new_member));
        if is_repeated(&old_member) != is_repeated(new_member) {
            out.push(
                Diagnostic::error(
                    new_member.range(),
                    format!(
                        "Field {number} in '{message_name}' changed label from '{old_kind}' to '{new_kind}'"
                    ),
                )
                .with_code("breaking-field-label"),
            );
        } else if old_kind != new_kind {
            out.push(
                Diagnostic::error(
                    new_member.range(),
                    format!(
                        "Field {number} in '{message_name}' changed type from '{old_kind}' to '{new_kind}'"
                    ),
                )
                .with_code("breaking-field-type"),
            );
        }

        if new_member.name() != name {
            out.push(
                Diagnostic::warning(
                    new_member.name_range(),
                    format!(
                        "Field {number} in '{message_name}' was renamed from '{name}' to '{}', which breaks JSON and text format compatibility",
                        new_member.name()
                    ),
                )
                .with_code("breaking-field-name"),
            );
        }
    }
}

fn enum_values(out: &mut Vec<Diagnostic>, enum_name: &str, old: &Enum, new: &Enum) {
    for value in &old.values {
        match new.values.iter().find(|v| v.name == value.name) {
            Some(current) if current.number != value.number => out.push(
                Diagnostic::error(
                    current.number_range,
                    format!(
                        "Enum value '{}' in '{enum_name}' changed number from {} to {}",
                        value.name, value.number, current.number
                    ),
                )
                .with_code("breaking-enum-value-number"),
            ),
            Some(_) => {}
            None => {
                let reused = new.values.iter().any(|v| v.number == value.number);
                let reserved = new
                    .reserved
                    .iter()
                    .flat_map(|r| &r.ranges)
                    .any(|r| r.contains(value.number));
                if !reused && !reserved {
                    out.push(
                        Diagnostic::error(
                            new.name_range,
                            format!(
                                "Enum value '{}' ({}) was removed from '{enum_name}' without reserving its number",
                                value.name, value.number
                            ),
                        )
                        .with_code("breaking-enum-value-removed"),
                    );
                }
            }
        }
    }
}

fn rpcs(out: &mut Vec<Diagnostic>, old: &Service, new: &Service) {
    for old_rpc in &old.rpcs {
        let Some(new_rpc) = new.rpcs.iter().find(|r| r.name == old_rpc.name) else {
            out.push(
                Diagnostic::error(
                    new.name_range,
                    format!("RPC '{}.{}' was removed", old.name, old_rpc.name),
                )
                .with_code("breaking-rpc-removed"),
            );
            continue;
        };

        let signature = |rpc: &Rpc| {
            (
                compact(&rpc.request_type),
                rpc.request_stream,
                compact(&rpc.response_type),
                rpc.response_stream,
            )
        };
        let (old_req, old_req_stream, old_resp, old_resp_stream) = signature(old_rpc);
        let (new_req, new_req_stream, new_resp, new_resp_stream) = signature(new_rpc);

        if old_req != new_req || old_req_stream != new_req_stream {
            out.push(
                Diagnostic::error(
                    new_rpc.request_type_range,
                    format!(
                        "RPC '{}' changed its request from '{}' to '{}'",
                        old_rpc.name,
                        stream(old_req_stream, &old_req),
                        stream(new_req_stream, &new_req)
                    ),
                )
                .with_code("breaking-rpc-request"),
            );
        }
        if old_resp != new_resp || old_resp_stream != new_resp_stream {
            out.push(
                Diagnostic::error(
                    new_rpc.response_type_range,
                    format!(
                        "RPC '{}' changed its response from '{}' to '{}'",
                        old_rpc.name,
                        stream(old_resp_stream, &old_resp),
                        stream(new_resp_stream, &new_resp)
                    ),
                )
                .with_code("breaking-rpc-response"),
            );
        }
    }
}

fn compact(name: &str) -> String {
    name.split_whitespace().collect()
}

fn stream(streaming: bool, ty: &str) -> String {
    if streaming {
        format!("stream {ty}")
    } else {
        ty.to_owned()
    }
}
