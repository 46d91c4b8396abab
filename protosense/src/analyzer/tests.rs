use std::{fs, sync::Arc};

use protosense_parse::parse;

use super::*;

fn analyzer_with(files: &[(&str, &str)]) -> SymbolAnalyzer {
    let mut analyzer = SymbolAnalyzer::default();
    for (uri, source) in files {
        analyzer.update_file(uri, Arc::new(parse(source)));
    }
    analyzer
}

#[test]
fn vendored_well_known_files() {
    for (name, source) in well_known::FILES {
        let file = parse(source);
        assert!(file.syntax.is_some(), "{name}");
        assert!(file.package_name().starts_with("google.protobuf"), "{name}");
        assert!(file.syntax_errors.is_empty(), "{name}");
    }
}

#[test]
fn well_known_types_are_registered() {
    let analyzer = SymbolAnalyzer::default();

    let timestamp = analyzer.symbol("google.protobuf.Timestamp").unwrap();
    assert_eq!(timestamp.uri, "builtin:///google/protobuf/timestamp.proto");
    assert_eq!(timestamp.kind, SymbolKind::Message);

    let null = analyzer.symbol(".google.protobuf.NullValue").unwrap();
    assert_eq!(null.kind, SymbolKind::Enum);

    for name in [
        "Any",
        "Api",
        "Method",
        "Mixin",
        "Duration",
        "Empty",
        "FieldMask",
        "SourceContext",
        "Struct",
        "Value",
        "ListValue",
        "Type",
        "Field",
        "Enum",
        "EnumValue",
        "Option",
        "Syntax",
        "DoubleValue",
        "FloatValue",
        "Int64Value",
        "UInt64Value",
        "Int32Value",
        "UInt32Value",
        "BoolValue",
        "StringValue",
        "BytesValue",
        "FieldOptions",
    ] {
        assert!(
            analyzer.symbol(&format!("google.protobuf.{name}")).is_some(),
            "{name}"
        );
    }
}

#[test]
fn nested_symbols() {
    let analyzer = analyzer_with(&[(
        "file:///a.proto",
        "package pkg;\nmessage Outer {\n  message Inner { enum Kind { A = 0; } }\n  optional group Result = 1 { optional string url = 2; }\n}\nenum Top { X = 0; }\n",
    )]);

    let names: Vec<_> = analyzer
        .symbols_in_file("file:///a.proto")
        .into_iter()
        .map(|s| s.qualified_name.as_str())
        .collect();
    assert_eq!(
        names,
        [
            "pkg.Outer",
            "pkg.Outer.Inner",
            "pkg.Outer.Inner.Kind",
            "pkg.Outer.Result",
            "pkg.Top"
        ]
    );
    assert_eq!(analyzer.symbol("pkg.Outer.Inner").unwrap().name, "Inner");
}

#[test]
fn resolution_order() {
    let analyzer = analyzer_with(&[(
        "file:///a.proto",
        "package pkg.v1;\nmessage Outer {\n  message Inner {}\n  message Sibling {}\n}\nmessage Inner {}\nmessage Top {}\n",
    )]);

    let resolve = |name: &str, container: &str| {
        analyzer
            .resolve_type(name, "file:///a.proto", container)
            .map(|s| s.qualified_name)
    };

    // Innermost scope first.
    assert_eq!(resolve("Inner", "pkg.v1.Outer").as_deref(), Some("pkg.v1.Outer.Inner"));
    assert_eq!(resolve("Inner", "pkg.v1").as_deref(), Some("pkg.v1.Inner"));
    // Siblings of an enclosing message.
    assert_eq!(
        resolve("Sibling", "pkg.v1.Outer.Inner").as_deref(),
        Some("pkg.v1.Outer.Sibling")
    );
    // Partially-qualified and absolute names.
    assert_eq!(resolve("v1.Top", "pkg.v1.Outer").as_deref(), Some("pkg.v1.Top"));
    assert_eq!(resolve(".pkg.v1.Inner", "pkg.v1.Outer").as_deref(), Some("pkg.v1.Inner"));
    assert_eq!(resolve(".Inner", "pkg.v1.Outer"), None);
    assert_eq!(resolve("pkg.v1.Top", "").as_deref(), Some("pkg.v1.Top"));
    assert_eq!(
        resolve("google.protobuf.Any", "pkg.v1").as_deref(),
        Some("google.protobuf.Any")
    );
    assert_eq!(resolve("Missing", "pkg.v1"), None);
    assert_eq!(resolve("", "pkg.v1"), None);
}

#[test]
fn lenient_resolution() {
    let mut analyzer = analyzer_with(&[
        ("file:///a.proto", "package a;\nmessage Unique {}\nmessage Shared {}\n"),
        ("file:///b.proto", "package b;\nmessage Shared {}\n"),
    ]);
    assert!(analyzer.resolve_type("Unique", "file:///c.proto", "c").is_none());

    analyzer.set_config(AnalyzerConfig {
        lenient_resolution: true,
        ..Default::default()
    });
    assert_eq!(
        analyzer
            .resolve_type("Unique", "file:///c.proto", "c")
            .unwrap()
            .qualified_name,
        "a.Unique"
    );
    assert!(analyzer.resolve_type("Shared", "file:///c.proto", "c").is_none());
}

#[test]
fn update_replaces_symbols() {
    let mut analyzer = analyzer_with(&[("file:///a.proto", "message Old {}")]);
    analyzer.update_file("file:///a.proto", Arc::new(parse("message New {}")));

    assert!(analyzer.symbol("Old").is_none());
    assert_eq!(analyzer.symbol("New").unwrap().uri, "file:///a.proto");
}

#[test]
fn last_write_wins_and_removal_restores() {
    let mut analyzer = analyzer_with(&[
        ("file:///a.proto", "message Dup { int32 a = 1; }"),
        ("file:///b.proto", "message Dup { int32 b = 1; }"),
    ]);
    assert_eq!(analyzer.symbol("Dup").unwrap().uri, "file:///b.proto");

    let removed = analyzer.remove_file("file:///b.proto");
    assert!(removed.is_some());
    assert!(analyzer.file("file:///b.proto").is_none());
    assert_eq!(analyzer.symbol("Dup").unwrap().uri, "file:///a.proto");

    analyzer.remove_file("file:///a.proto");
    assert!(analyzer.symbol("Dup").is_none());
    assert!(analyzer.symbols_in_file("file:///a.proto").is_empty());
}

#[test]
fn extensions_are_indexed() {
    let analyzer = analyzer_with(&[(
        "file:///opts.proto",
        "package my.opts;\nimport \"google/protobuf/descriptor.proto\";\nextend google.protobuf.FieldOptions { optional string label = 50000; }\nmessage Holder { extend google.protobuf.MessageOptions { optional bool flag = 50001; } }\n",
    )]);

    assert_eq!(
        analyzer.resolve_extension("my.opts.label", "other"),
        Some("file:///opts.proto")
    );
    assert_eq!(
        analyzer.resolve_extension("label", "my.opts"),
        Some("file:///opts.proto")
    );
    assert_eq!(
        analyzer.resolve_extension("my.opts.Holder.flag", ""),
        Some("file:///opts.proto")
    );
    assert_eq!(analyzer.resolve_extension("label", "other"), None);
}

#[test]
fn imports_resolve_to_registered_and_builtin_files() {
    let analyzer = analyzer_with(&[
        (
            "file:///work/proto/app/main.proto",
            "import \"google/protobuf/timestamp.proto\";\nimport public \"common/types.proto\";\nimport \"nonexistent.proto\";\n",
        ),
        ("file:///work/proto/common/types.proto", "message T {}"),
    ]);

    let imports = analyzer.imports_with_resolutions("file:///work/proto/app/main.proto");
    assert_eq!(imports.len(), 3);
    assert_eq!(
        imports[0].resolved_uri.as_deref(),
        Some("builtin:///google/protobuf/timestamp.proto")
    );
    assert_eq!(
        imports[1].resolved_uri.as_deref(),
        Some("file:///work/proto/common/types.proto")
    );
    assert_eq!(imports[1].modifier, Some(ImportModifier::Public));
    assert_eq!(imports[2].resolved_uri, None);

    let direct = analyzer.imported_file_uris("file:///work/proto/app/main.proto");
    assert_eq!(direct.len(), 2);
    assert!(analyzer.imports_with_resolutions("file:///unknown.proto").is_empty());
}

#[test]
fn public_imports_are_visible_transitively() {
    let analyzer = analyzer_with(&[
        ("file:///a.proto", "import \"b.proto\";"),
        ("file:///b.proto", "import public \"c.proto\";\nimport \"d.proto\";"),
        ("file:///c.proto", "import public \"e.proto\";"),
        ("file:///d.proto", ""),
        ("file:///e.proto", ""),
    ]);

    let mut visible: Vec<_> = analyzer.visible_file_uris("file:///a.proto").into_iter().collect();
    visible.sort();
    assert_eq!(visible, ["file:///b.proto", "file:///c.proto", "file:///e.proto"]);

    let mut closure: Vec<_> = analyzer.public_closure("file:///b.proto").into_iter().collect();
    closure.sort();
    assert_eq!(closure, ["file:///c.proto", "file:///e.proto"]);
}

#[test]
fn memoized_resolution_is_cleared_when_files_appear() {
    let mut analyzer = analyzer_with(&[("file:///a.proto", "import \"b.proto\";")]);
    assert_eq!(analyzer.resolve_import("file:///a.proto", "b.proto"), None);

    analyzer.update_file("file:///b.proto", Arc::new(parse("")));
    assert_eq!(
        analyzer.resolve_import("file:///a.proto", "b.proto").as_deref(),
        Some("file:///b.proto")
    );

    analyzer.remove_file("file:///b.proto");
    assert_eq!(analyzer.resolve_import("file:///a.proto", "b.proto"), None);
}

#[test]
fn imports_resolve_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let include = dir.path().join("include");
    fs::create_dir_all(include.join("shared")).unwrap();
    fs::write(include.join("shared/money.proto"), "message Money {}").unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/local.proto"), "message Local {}").unwrap();

    let main_uri = crate::paths::path_to_uri(&dir.path().join("src/main.proto")).unwrap();
    let mut analyzer = SymbolAnalyzer::new(AnalyzerConfig {
        include_paths: vec![include.clone()],
        ..Default::default()
    });
    analyzer.update_file(
        &main_uri,
        Arc::new(parse("import \"shared/money.proto\";\nimport \"local.proto\";")),
    );

    let imports = analyzer.imports_with_resolutions(&main_uri);
    assert_eq!(
        imports[0].resolved_uri,
        crate::paths::path_to_uri(&include.join("shared/money.proto"))
    );
    assert_eq!(
        imports[1].resolved_uri,
        crate::paths::path_to_uri(&dir.path().join("src/local.proto"))
    );
}

#[test]
fn canonical_import_paths() {
    let analyzer = SymbolAnalyzer::new(AnalyzerConfig {
        include_paths: vec!["/work/proto".into()],
        ..Default::default()
    });

    assert_eq!(
        analyzer
            .import_path_for_file(
                "file:///work/proto/app/main.proto",
                "file:///work/proto/common/types.proto"
            )
            .as_deref(),
        Some("common/types.proto")
    );
    assert_eq!(
        analyzer
            .import_path_for_file("file:///elsewhere/a.proto", "file:///elsewhere/sub/b.proto")
            .as_deref(),
        Some("sub/b.proto")
    );
    assert_eq!(
        analyzer
            .import_path_for_file("file:///x/a.proto", "builtin:///google/protobuf/any.proto")
            .as_deref(),
        Some("google/protobuf/any.proto")
    );
    assert_eq!(
        analyzer.import_path_for_file("file:///x/a.proto", "file:///y/b.proto"),
        None
    );
}

#[test]
fn relative_include_paths() {
    let cwd = std::env::current_dir().unwrap();
    let analyzer = SymbolAnalyzer::new(AnalyzerConfig {
        include_paths: vec!["./proto/../vendor".into(), ".".into()],
        ..Default::default()
    });
    assert_eq!(analyzer.config().include_paths, [cwd.join("vendor"), cwd.clone()]);

    let uri = |path: &str| crate::paths::path_to_uri(&cwd.join(path)).unwrap();
    assert_eq!(
        analyzer
            .import_path_for_file(&uri("sub/x.proto"), &uri("sub/y.proto"))
            .as_deref(),
        Some("sub/y.proto")
    );
    assert_eq!(
        analyzer
            .import_path_for_file(&uri("sub/x.proto"), &uri("vendor/common/types.proto"))
            .as_deref(),
        Some("common/types.proto")
    );
}
