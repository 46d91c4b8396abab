//! Type references and the imports they depend on.

use protosense_parse::{is_scalar_type, Extend, ImportModifier, ProtoFile, Range};
use rustc_hash::FxHashSet;

use super::{all_messages, options::all_options, Context, Diagnostic, Fix};

/// A type name written somewhere in a file, with the scope it is resolved from.
struct TypeRef<'a> {
    name: &'a str,
    range: Range,
    scope: String,
}

fn type_references(file: &ProtoFile) -> Vec<TypeRef<'_>> {
    fn push<'a>(out: &mut Vec<TypeRef<'a>>, name: &'a str, range: Range, scope: &str) {
        if !name.is_empty() && !is_scalar_type(name) {
            out.push(TypeRef {
                name,
                range,
                scope: scope.to_owned(),
            });
        }
    }

    fn extends<'a>(out: &mut Vec<TypeRef<'a>>, extends: &'a [Extend], scope: &str) {
        for extend in extends {
            push(out, &extend.extendee, extend.extendee_range, scope);
            for field in &extend.fields {
                push(out, &field.type_name, field.type_range, scope);
            }
        }
    }

    let mut out = Vec::new();
    let package = file.package_name();

    for (scope, _, message) in all_messages(file) {
        let fields = message
            .fields
            .iter()
            .chain(message.oneofs.iter().flat_map(|o| &o.fields));
        for field in fields {
            push(&mut out, &field.type_name, field.type_range, &scope);
        }
        for map in &message.maps {
            push(&mut out, &map.value_type, map.value_type_range, &scope);
        }
        extends(&mut out, &message.extends, &scope);
    }
    extends(&mut out, &file.extends, package);

    for service in &file.services {
        for rpc in &service.rpcs {
            push(&mut out, &rpc.request_type, rpc.request_type_range, package);
            push(&mut out, &rpc.response_type, rpc.response_type_range, package);
        }
    }

    out
}

pub(super) fn check(cx: &mut Context) {
    let file = cx.file;
    let analyzer = cx.analyzer;
    let visible = analyzer.visible_file_uris(cx.uri);
    let mut used: FxHashSet<String> = FxHashSet::default();

    for reference in type_references(file) {
        let Some(symbol) = analyzer.resolve_type(reference.name, cx.uri, &reference.scope) else {
            if cx.settings.reference_checks {
                cx.push(
                    Diagnostic::error(
                        reference.range,
                        format!("Unknown type '{}'", reference.name),
                    )
                    .with_code("unresolved-type"),
                );
            }
            continue;
        };

        if symbol.uri == cx.uri {
            continue;
        }
        used.insert(symbol.uri.clone());

        if cx.settings.import_checks && !visible.contains(&symbol.uri) {
            let diagnostic = match analyzer.import_path_for_file(cx.uri, &symbol.uri) {
                Some(path) => Diagnostic::error(
                    reference.range,
                    format!(
                        "Type '{}' is defined in '{path}', which is not imported",
                        reference.name
                    ),
                )
                .with_fix(Fix::AddImport { path }),
                None => Diagnostic::error(
                    reference.range,
                    format!(
                        "Type '{}' is defined in '{}', which is not imported",
                        reference.name, symbol.uri
                    ),
                ),
            };
            cx.push(diagnostic.with_code("missing-import"));
        }
    }

    for (_, scope, option) in all_options(file) {
        if let Some(name) = option.extension_name() {
            if let Some(uri) = analyzer.resolve_extension(name, &scope) {
                if uri != cx.uri {
                    used.insert(uri.to_owned());
                }
            }
        }
    }

    imports(cx, &used);
}

fn imports(cx: &mut Context, used: &FxHashSet<String>) {
    let analyzer = cx.analyzer;
    let imports = analyzer.imports_with_resolutions(cx.uri);
    let mut seen = FxHashSet::default();

    for import in &imports {
        if cx.settings.discouraged_constructs && import.modifier == Some(ImportModifier::Weak) {
            cx.push(
                Diagnostic::hint(
                    import.range,
                    format!("Weak import '{}' is discouraged", import.path),
                )
                .with_code("weak-import"),
            );
        }

        if !cx.settings.import_checks {
            continue;
        }

        if !seen.insert(import.path.as_str()) {
            cx.push(
                Diagnostic::warning(import.range, format!("Duplicate import '{}'", import.path))
                    .with_code("duplicate-import"),
            );
            continue;
        }

        let Some(resolved) = &import.resolved_uri else {
            cx.push(
                Diagnostic::error(
                    import.range,
                    format!("Import '{}' cannot be resolved", import.path),
                )
                .with_code("unresolved-import"),
            );
            continue;
        };

        if let Some(canonical) = analyzer.import_path_for_file(cx.uri, resolved) {
            if canonical != import.path {
                cx.push(
                    Diagnostic::warning(
                        import.path_range,
                        format!(
                            "Import '{}' should be written as '{canonical}'",
                            import.path
                        ),
                    )
                    .with_code("import-path")
                    .with_fix(Fix::ReplaceImport {
                        from: import.path.clone(),
                        to: canonical,
                    }),
                );
            }
        }

        let is_used = used.contains(resolved)
            || analyzer
                .public_closure(resolved)
                .iter()
                .any(|uri| used.contains(uri));
        if import.modifier != Some(ImportModifier::Public) && !is_used {
            cx.push(
                Diagnostic::hint(import.range, format!("Import '{}' is unused", import.path))
                    .with_code("unused-import"),
            );
        }
    }
}
