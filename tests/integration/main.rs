//! Integration tests for Depscope
//!
//! Real Go module layouts on disk, resolved through the Go catalog.

use depscope_core::{DependencyCache, FileEvent, ImpactLevel, OwnershipResolver, Selector, UnitId};
use depscope_golang::{GoCatalog, GoFileValidator, Settings};
use depscope_watcher::{GoDispatcher, Handler, WatchEvent};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

type GoResolver = OwnershipResolver<GoCatalog, GoFileValidator>;

fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn linux() -> Settings {
    Settings {
        goos: "linux".to_string(),
        goarch: "amd64".to_string(),
        ..Settings::default()
    }
}

fn resolver(root: &Path) -> GoResolver {
    let catalog = GoCatalog::open(root, &linux()).unwrap();
    let root = catalog.root().to_path_buf();
    OwnershipResolver::new(DependencyCache::new(root, catalog), GoFileValidator::new())
}

/// Two platform builds of one folder plus an unrelated command.
fn routing_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "go.mod", "module example.com/site\n\ngo 1.22\n");
    write(
        root,
        "pwa/main.server.go",
        "//go:build !wasm\n\npackage main\n\nimport \"example.com/site/database\"\n\nfunc main() { database.Connect() }\n",
    );
    write(
        root,
        "pwa/main.wasm.go",
        "//go:build wasm\n\npackage main\n\nimport \"example.com/site/dom\"\n\nfunc main() { dom.Render() }\n",
    );
    write(
        root,
        "database/database.go",
        "package database\n\nimport \"example.com/site/database/driver\"\n\nfunc Connect() { driver.Dial() }\n",
    );
    write(root, "database/driver/driver.go", "package driver\n\nfunc Dial() {}\n");
    write(root, "dom/dom.go", "package dom\n\nfunc Render() {}\n");
    write(
        root,
        "cmd/main.go",
        "package main\n\nimport \"example.com/site/cmdtool\"\n\nfunc main() { cmdtool.Run() }\n",
    );
    write(root, "cmdtool/cmdtool.go", "package cmdtool\n\nfunc Run() {}\n");
    dir
}

#[test]
fn test_platform_handlers_split_shared_folder() {
    let dir = routing_project();
    let mut resolver = resolver(dir.path());
    let server = "pwa/main.server.go";
    let wasm = "pwa/main.wasm.go";
    let cmd = "cmd/main.go";

    let cases = [
        (server, "database/database.go", true),
        (server, "database/driver/driver.go", true),
        (server, "dom/dom.go", false),
        (server, "cmdtool/cmdtool.go", false),
        (wasm, "dom/dom.go", true),
        (wasm, "database/database.go", false),
        (wasm, "database/driver/driver.go", false),
        (cmd, "cmdtool/cmdtool.go", true),
        (cmd, "dom/dom.go", false),
        (cmd, "pwa/main.server.go", false),
        (server, "cmd/main.go", false),
    ];
    for (handler, file, expected) in cases {
        let owned = resolver.owns_file(handler, file, FileEvent::Write).unwrap();
        assert_eq!(owned, expected, "{handler} owning {file}");
    }

    // Outside the host build, but still claimed by its own handler.
    assert!(resolver.owns_file(wasm, wasm, FileEvent::Write).unwrap());
    assert_eq!(resolver.cache().generation(), 2);
}

#[test]
fn test_dependency_added_by_editing_entry_point() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "go.mod", "module example.com/app\n");
    write(root, "app/main.go", "package main\n\nfunc main() {}\n");
    write(root, "metrics/metrics.go", "package metrics\n\nfunc Count() {}\n");

    let mut resolver = resolver(root);
    assert!(!resolver.owns_file("app/main.go", "metrics/metrics.go", FileEvent::Write).unwrap());

    write(
        root,
        "app/main.go",
        "package main\n\nimport \"example.com/app/metrics\"\n\nfunc main() { metrics.Count() }\n",
    );
    assert!(resolver.owns_file("app/main.go", "app/main.go", FileEvent::Write).unwrap());
    assert!(resolver.owns_file("app/main.go", "metrics/metrics.go", FileEvent::Write).unwrap());
    assert_eq!(
        resolver.cache().graph().dependents(&UnitId::from("example.com/app/metrics")),
        vec![UnitId::from("example.com/app/app")]
    );
}

#[test]
fn test_new_package_and_removal() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "go.mod", "module example.com/app\n");
    write(
        root,
        "app/main.go",
        "package main\n\nimport \"example.com/app/feature\"\n\nfunc main() { feature.On() }\n",
    );
    let mut resolver = resolver(root);
    resolver.cache_mut().ensure_populated().unwrap();

    write(root, "feature/feature.go", "package feature\n\nfunc On() {}\n");
    assert!(resolver.owns_file("app/main.go", "feature/feature.go", FileEvent::Create).unwrap());
    assert!(resolver.cache().graph().is_unit(&UnitId::from("example.com/app/feature")));

    fs::remove_file(root.join("feature/feature.go")).unwrap();
    assert!(resolver.owns_file("app/main.go", "feature/feature.go", FileEvent::Remove).unwrap());
    assert!(!resolver.cache().graph().is_unit(&UnitId::from("example.com/app/feature")));
    assert!(!resolver.owns_file("app/main.go", "feature/feature.go", FileEvent::Remove).unwrap());
}

#[test]
fn test_half_written_file_is_skipped() {
    let dir = routing_project();
    let mut resolver = resolver(dir.path());
    write(dir.path(), "dom/dom.go", "package dom\n\nfunc Render() {\n");

    assert!(!resolver.owns_file("pwa/main.wasm.go", "dom/dom.go", FileEvent::Write).unwrap());
    let impact = resolver
        .analyze_impact("pwa/main.wasm.go", "dom/dom.go", FileEvent::Write)
        .unwrap();
    assert_eq!(impact.impact, ImpactLevel::None);
    assert_eq!(impact.reason.as_deref(), Some("file is empty or does not parse"));

    write(dir.path(), "dom/dom.go", "func Render(");
    let impact = resolver
        .analyze_impact("pwa/main.wasm.go", "dom/dom.go", FileEvent::Write)
        .unwrap();
    assert_eq!(impact.reason.as_deref(), Some("file is still being written"));
}

#[test]
fn test_reverse_dependencies_and_mains() {
    let dir = routing_project();
    let mut resolver = resolver(dir.path());

    let found = resolver
        .reverse_dependents(&Selector::All, &["example.com/site/database/driver".parse().unwrap()])
        .unwrap();
    let rendered: Vec<&str> = found.iter().map(UnitId::as_str).collect();
    insta::assert_snapshot!(rendered.join("\n"), @r"
    example.com/site/database
    example.com/site/database/driver
    example.com/site/pwa
    ");

    let found = resolver
        .reverse_dependents(&"./cmd/...".parse().unwrap(), &["./database/...".parse().unwrap()])
        .unwrap();
    assert!(found.is_empty());

    let mains = resolver.units_depending_on_file("driver.go").unwrap();
    assert_eq!(mains, vec![UnitId::from("example.com/site/pwa")]);
}

#[test]
fn test_impact_report() {
    let dir = routing_project();
    let mut resolver = resolver(dir.path());
    let report = resolver
        .analyze_impact("cmd/main.go", "database/database.go", FileEvent::Write)
        .unwrap();
    insta::assert_json_snapshot!(report, @r#"
    {
      "status": "analyzed",
      "belongs_to_handler": false,
      "affected_entry_points": [
        "example.com/site/pwa"
      ],
      "impact": "high"
    }
    "#);
}

#[tokio::test]
async fn test_dispatcher_over_go_module() {
    let dir = routing_project();
    let mut dispatcher = GoDispatcher::for_go_module(dir.path(), &linux()).unwrap();
    dispatcher.register(Handler::new("server", "pwa/main.server.go")).unwrap();
    dispatcher.register(Handler::new("cmd", "cmd/main.go")).unwrap();

    let verdicts = dispatcher.dispatch(&WatchEvent {
        path: dir.path().join("database/driver/driver.go"),
        event: FileEvent::Write,
    });
    let owners: Vec<&str> = verdicts
        .iter()
        .filter(|v| v.owned)
        .map(|v| v.handler.as_str())
        .collect();
    assert_eq!(owners, vec!["server"]);
}
