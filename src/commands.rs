//! CLI command implementations

use anyhow::Context as _;
use depscope_core::{DependencyCache, FileEvent, OwnershipResolver, Selector};
use depscope_golang::{GoCatalog, GoFileValidator, Settings};
use depscope_watcher::{FileWatcher, GoDispatcher, Handler};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

type GoResolver = OwnershipResolver<GoCatalog, GoFileValidator>;

/// Root plus effective settings, shared by every command.
pub struct Context {
    pub root: PathBuf,
    pub settings: Settings,
}

impl Context {
    pub fn load(root: PathBuf, tags: &[String], include_tests: bool) -> anyhow::Result<Self> {
        let settings = Settings::load(&root)
            .with_context(|| format!("loading settings from {}", root.display()))?
            .with_overrides(tags, include_tests);
        Ok(Context { root, settings })
    }

    fn resolver(&self) -> anyhow::Result<GoResolver> {
        let catalog = GoCatalog::open(&self.root, &self.settings)
            .with_context(|| format!("opening Go module at {}", self.root.display()))?;
        tracing::debug!("Module {} ({:?})", catalog.module().path, catalog.context());
        let root = catalog.root().to_path_buf();
        Ok(OwnershipResolver::new(
            DependencyCache::new(root, catalog),
            GoFileValidator::new(),
        ))
    }
}

pub fn owns(ctx: &Context, entry: &Path, file: &Path, event: FileEvent) -> anyhow::Result<()> {
    let mut resolver = ctx.resolver()?;
    let owned = resolver.owns_file(entry, file, event)?;
    println!("{owned}");
    Ok(())
}

pub fn mains(ctx: &Context, file_name: &str) -> anyhow::Result<()> {
    let mut resolver = ctx.resolver()?;
    for id in resolver.units_depending_on_file(file_name)? {
        println!("{id}");
    }
    Ok(())
}

pub fn reverse_deps(ctx: &Context, source: &str, targets: &[String]) -> anyhow::Result<()> {
    let source: Selector = source.parse()?;
    let targets = targets
        .iter()
        .map(|t| t.parse::<Selector>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut resolver = ctx.resolver()?;
    for id in resolver.reverse_dependents(&source, &targets)? {
        println!("{id}");
    }
    Ok(())
}

pub fn impact(ctx: &Context, entry: &Path, file: &Path, event: FileEvent) -> anyhow::Result<()> {
    let mut resolver = ctx.resolver()?;
    let report = resolver.analyze_impact(entry, file, event)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Run the watch loop until Ctrl-C, printing one JSON verdict per line.
pub async fn watch(ctx: &Context, entries: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut dispatcher = GoDispatcher::for_go_module(&ctx.root, &ctx.settings)?;
    for entry in entries {
        let name = entry.display().to_string();
        dispatcher.register(Handler::new(name, entry))?;
    }

    let mut watcher = FileWatcher::new(&ctx.root)?;
    watcher.start()?;
    tracing::info!("Watching {} for {} handlers", ctx.root.display(), dispatcher.handlers().len());

    let (verdict_tx, mut verdict_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(verdict) = verdict_rx.recv().await {
            println!("{}", serde_json::to_string(&verdict)?);
        }
        Ok::<(), anyhow::Error>(())
    });

    tokio::select! {
        result = dispatcher.run(watcher.event_receiver(), verdict_tx) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Stopping watcher"),
    }

    printer.await??;
    Ok(())
}
