//! Unit tests for the Go catalog provider

use crate::*;
use depscope_core::{CatalogError, CatalogProvider, Selector, UnitId, UnitKind};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct GoProject {
    dir: TempDir,
}

impl GoProject {
    fn new(module: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("go.mod"), format!("module {module}\n\ngo 1.22\n")).unwrap();
        GoProject { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, content: &str) -> &Self {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    fn catalog(&self, settings: Settings) -> GoCatalog {
        GoCatalog::open(self.root(), &settings).unwrap()
    }
}

fn linux() -> Settings {
    Settings {
        goos: "linux".to_string(),
        goarch: "amd64".to_string(),
        ..Settings::default()
    }
}

fn ids(units: &[depscope_core::CompilationUnit]) -> Vec<&str> {
    let mut ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
    ids.sort();
    ids
}

#[test]
fn test_lists_packages_with_kinds_and_imports() {
    let project = GoProject::new("example.com/app");
    project
        .write(
            "cmd/app/main.go",
            "package main\n\nimport (\n\t\"fmt\"\n\t\"example.com/app/store\"\n)\n\nfunc main() { fmt.Println(store.Name) }\n",
        )
        .write("store/store.go", "package store\n\nimport \"example.com/app/store/sql\"\n\nvar Name = sql.Driver\n")
        .write("store/sql/sql.go", "package sql\n\nconst Driver = \"pg\"\n")
        .write("README.md", "docs\n");

    let catalog = project.catalog(linux());
    let units = catalog.list_units(&Selector::All).unwrap();
    assert_eq!(
        ids(&units),
        vec!["example.com/app/cmd/app", "example.com/app/store", "example.com/app/store/sql"]
    );

    let main = units.iter().find(|u| u.id.as_str() == "example.com/app/cmd/app").unwrap();
    assert_eq!(main.kind, UnitKind::EntryPoint);
    assert_eq!(
        main.dependencies,
        vec![UnitId::from("example.com/app/store"), UnitId::from("fmt")]
    );
    assert_eq!(main.files, vec![project.path("cmd/app/main.go")]);

    let store = units.iter().find(|u| u.id.as_str() == "example.com/app/store").unwrap();
    assert_eq!(store.kind, UnitKind::Library);
}

#[test]
fn test_selector_filters_listing() {
    let project = GoProject::new("example.com/app");
    project
        .write("cmd/app/main.go", "package main\n\nfunc main() {}\n")
        .write("lib/lib.go", "package lib\n");
    let catalog = project.catalog(linux());

    let units = catalog.list_units(&"./cmd/...".parse().unwrap()).unwrap();
    assert_eq!(ids(&units), vec!["example.com/app/cmd/app"]);
    let units = catalog.list_units(&"example.com/app/lib".parse().unwrap()).unwrap();
    assert_eq!(ids(&units), vec!["example.com/app/lib"]);
}

#[test]
fn test_skipped_directories() {
    let project = GoProject::new("example.com/app");
    project
        .write("app/app.go", "package app\n")
        .write("vendor/dep/dep.go", "package dep\n")
        .write("app/testdata/fixture.go", "package fixture\n")
        .write("_scratch/s.go", "package scratch\n")
        .write(".cache/c.go", "package cache\n")
        .write("tools/go.mod", "module example.com/tools\n")
        .write("tools/gen.go", "package tools\n")
        .write("generated/api/api.go", "package api\n");

    let settings = Settings {
        exclude: vec!["generated/**".to_string()],
        ..linux()
    };
    let catalog = project.catalog(settings);
    let units = catalog.list_units(&Selector::All).unwrap();
    assert_eq!(ids(&units), vec!["example.com/app/app"]);

    assert!(catalog.resolve_unit(&project.path("vendor/dep")).unwrap().is_none());
    assert!(catalog.resolve_unit(&project.path("tools")).unwrap().is_none());
    assert!(catalog.resolve_unit(&project.path("generated/api")).unwrap().is_none());
}

#[test]
fn test_platform_and_tag_selection() {
    let project = GoProject::new("example.com/app");
    project
        .write("pwa/main.server.go", "//go:build !wasm\n\npackage main\n\nimport \"example.com/app/database\"\n")
        .write("pwa/main.wasm.go", "//go:build wasm\n\npackage main\n\nimport \"example.com/app/dom\"\n")
        .write("sys/sys.go", "package sys\n")
        .write("sys/sys_linux.go", "package sys\n\nimport \"syscall\"\n")
        .write("sys/sys_windows.go", "package sys\n\nimport \"golang.org/x/sys/windows\"\n")
        .write("sys/legacy.go", "// +build ignore\n\npackage main\n");

    let catalog = project.catalog(linux());
    let pwa = catalog.resolve_unit(&project.path("pwa")).unwrap().unwrap();
    assert_eq!(pwa.files, vec![project.path("pwa/main.server.go")]);
    assert_eq!(pwa.dependencies, vec![UnitId::from("example.com/app/database")]);

    let sys = catalog.resolve_unit(&project.path("sys")).unwrap().unwrap();
    assert_eq!(sys.files, vec![project.path("sys/sys.go"), project.path("sys/sys_linux.go")]);
    assert_eq!(sys.dependencies, vec![UnitId::from("syscall")]);

    let wasm = project.catalog(Settings {
        build_tags: vec!["wasm".to_string()],
        ..linux()
    });
    let pwa = wasm.resolve_unit(&project.path("pwa")).unwrap().unwrap();
    assert_eq!(pwa.dependencies, vec![UnitId::from("example.com/app/dom")]);
}

#[test]
fn test_test_files_follow_settings() {
    let project = GoProject::new("example.com/app");
    project
        .write("db/db.go", "package db\n")
        .write("db/db_test.go", "package db\n\nimport \"testing\"\n")
        .write("db/api_test.go", "package db_test\n\nimport \"example.com/app/db\"\n");

    let plain = project.catalog(linux());
    let db = plain.resolve_unit(&project.path("db")).unwrap().unwrap();
    assert_eq!(db.files.len(), 1);
    assert!(db.dependencies.is_empty());

    let with_tests = project.catalog(Settings {
        include_tests: true,
        ..linux()
    });
    let db = with_tests.resolve_unit(&project.path("db")).unwrap().unwrap();
    assert_eq!(db.files.len(), 3);
    assert_eq!(db.dependencies, vec![UnitId::from("testing")]);
}

#[test]
fn test_mixed_packages_fail_resolution() {
    let project = GoProject::new("example.com/app");
    project
        .write("ok/ok.go", "package ok\n")
        .write("mixed/a.go", "package alpha\n")
        .write("mixed/b.go", "package beta\n");
    let catalog = project.catalog(linux());

    let err = catalog.resolve_unit(&project.path("mixed")).unwrap_err();
    assert!(matches!(err, CatalogError::MixedPackages { .. }));
    insta::assert_snapshot!(
        err.to_string().replace(&project.path("mixed").display().to_string(), "<dir>"),
        @"found packages alpha (a.go) and beta (b.go) in <dir>"
    );

    // One broken directory does not sink the whole listing.
    let units = catalog.list_units(&Selector::All).unwrap();
    assert_eq!(ids(&units), vec!["example.com/app/ok"]);
}

#[test]
fn test_listing_fails_when_nothing_resolves() {
    let project = GoProject::new("example.com/app");
    project.write("broken/b.go", "func nope() {}\n");
    let catalog = project.catalog(linux());
    let err = catalog.list_units(&Selector::All).unwrap_err();
    assert!(matches!(err, CatalogError::Parse { .. }));

    let empty = GoProject::new("example.com/empty");
    assert!(empty.catalog(linux()).list_units(&Selector::All).unwrap().is_empty());
}

#[test]
fn test_resolve_vanished_directory() {
    let project = GoProject::new("example.com/app");
    project.write("gone/g.go", "package gone\n");
    let catalog = project.catalog(linux());
    assert!(catalog.resolve_unit(&project.path("gone")).unwrap().is_some());

    fs::remove_dir_all(project.path("gone")).unwrap();
    assert!(catalog.resolve_unit(&project.path("gone")).unwrap().is_none());
    assert!(catalog.resolve_unit(Path::new("/definitely/elsewhere")).unwrap().is_none());
}

#[test]
fn test_file_dependencies_ignore_constraints() {
    let project = GoProject::new("example.com/app");
    project.write(
        "pwa/main.wasm.go",
        "//go:build wasm\n\npackage main\n\nimport (\n\t\"example.com/app/dom\"\n\t\"syscall/js\"\n)\n",
    );
    let catalog = project.catalog(linux());
    let deps = catalog.file_dependencies(&project.path("pwa/main.wasm.go")).unwrap();
    assert_eq!(deps, vec![UnitId::from("example.com/app/dom"), UnitId::from("syscall/js")]);

    project.write("pwa/notes.go", "// nothing yet\n");
    assert!(catalog.file_dependencies(&project.path("pwa/notes.go")).is_err());
    assert!(matches!(
        catalog.file_dependencies(&project.path("pwa/missing.go")),
        Err(CatalogError::Io { .. })
    ));
}

#[test]
fn test_module_fallback_and_root_package() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("webapp");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("main.go"), "package main\n\nfunc main() {}\n").unwrap();

    let catalog = GoCatalog::open(&root, &linux()).unwrap();
    assert_eq!(catalog.module().path, "webapp");
    let units = catalog.list_units(&Selector::All).unwrap();
    assert_eq!(ids(&units), vec!["webapp"]);
    assert!(units[0].is_entry_point());
}

#[test]
fn test_missing_root_reports_no_units() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("absent");
    let catalog = GoCatalog::new(
        GoModule {
            path: "example.com/absent".to_string(),
            root: root.clone(),
        },
        linux().build_context(),
        globset::GlobSet::empty(),
    );
    assert!(matches!(
        catalog.list_units(&Selector::All),
        Err(CatalogError::NoUnits { .. })
    ));
}
