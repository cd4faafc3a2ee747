//! CLI command implementations.

use crate::console::ConsoleSink;
use crate::GraphFormat;
use cascade_core::sandbox::Sandbox;
use cascade_graph::{GraphEdge, GraphError};
use cascade_reload::{CascadeConfig, FanoutSink, ReloadPolicy, Reloader, TracingSink};
use cascade_watcher::{discover_units, ReloadWatcher, WatcherConfig};
use colored::Colorize;
use std::fs;
use std::path::Path;
use tracing::debug;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// A unit tree loaded into the sandbox, with the graph its loads produced.
struct Session {
    config: CascadeConfig,
    sandbox: Sandbox,
    reloader: Reloader,
}

impl Session {
    /// Loads `entries`, or every unit under `root` when none are given.
    fn open(root: &Path, entries: &[String]) -> Result<Self> {
        let config = CascadeConfig::discover(root)?;

        let mut sink = FanoutSink::new().with(ConsoleSink).with(TracingSink);
        if let Some(notifier) = config.notifier() {
            sink = sink.with(notifier);
        }

        let mut reloader = Reloader::new(config.graph_builder()).with_sink(sink);
        let mut sandbox = Sandbox::new(root);

        let entries = if entries.is_empty() {
            discover_units(root, &config.extensions)
        } else {
            entries.to_vec()
        };
        if entries.is_empty() {
            return Err(format!("No units found under {}", root.display()).into());
        }

        debug!("Loading {} entry units from {}", entries.len(), root.display());
        let mut failed = 0;
        for unit in &entries {
            if let Err(e) = sandbox.import(unit, reloader.observer()) {
                eprintln!("{} {}", "⚠".yellow(), e);
                failed += 1;
            }
        }

        let stats = reloader.graph().stats();
        eprintln!(
            "{} Loaded {} units ({} edges)",
            "✓".green(),
            sandbox.len().to_string().cyan(),
            stats.edge_count.to_string().cyan()
        );
        if failed > 0 {
            eprintln!("  {} entries failed to load", failed.to_string().red());
        }

        Ok(Self {
            config,
            sandbox,
            reloader,
        })
    }

    fn policy(self) -> Result<(ReloadPolicy, Sandbox, CascadeConfig)> {
        let policy = ReloadPolicy::from_config(self.reloader, &self.config)?;
        Ok((policy, self.sandbox, self.config))
    }
}

/// Initialize Cascade in a directory.
pub fn init(path: &Path) -> Result<()> {
    let config_path = CascadeConfig::project_path(path);

    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    CascadeConfig::default().save(&config_path)?;

    println!("{} Initialized Cascade in {}", "✓".green(), path.display());
    println!(
        "  Edit {} to tune cooldown and sensitive units",
        config_path.display().to_string().cyan()
    );
    println!("  Run {} to start reloading", "cascade watch".cyan());

    Ok(())
}

/// Print the dependency graph learned from loading the tree.
pub fn graph(
    root: &Path,
    entries: &[String],
    format: GraphFormat,
    output: Option<&Path>,
) -> Result<()> {
    let session = Session::open(root, entries)?;
    let graph = session.reloader.graph();

    let rendered = match format {
        GraphFormat::Json => {
            let export = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "stats": graph.stats(),
                "units": graph.units().collect::<Vec<_>>(),
                "edges": graph.export_edges(),
            });
            serde_json::to_string_pretty(&export)?
        }
        GraphFormat::Dot => graph.to_dot(),
    };

    match output {
        Some(path) => {
            fs::write(path, rendered)?;
            println!("{} Exported to {}", "✓".green(), path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

/// Show the reload order for a unit without reloading anything.
pub fn plan(unit: &str, root: &Path, entries: &[String], json_output: bool) -> Result<()> {
    let session = Session::open(root, entries)?;
    let graph = session.reloader.graph();

    let plan = match session.reloader.plan(unit) {
        Ok(plan) => plan,
        Err(GraphError::Cycle { cycle, .. }) => {
            print_cycle(&cycle);
            return Err(format!("ancestors of '{}' form a cycle", unit).into());
        }
        Err(e) => return Err(e.into()),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{}", "Reload Plan".cyan().bold());
    println!("Changed: {}", unit.cyan());
    println!();

    if plan.is_empty() {
        println!("  Nothing depends on {}", unit);
        return Ok(());
    }

    let ancestors = plan.ancestors();
    for (i, step) in plan.steps.iter().enumerate() {
        let dependencies = graph
            .dependencies(&step.unit)
            .into_iter()
            .filter(|dep| *dep == unit || ancestors.contains(dep))
            .collect::<Vec<_>>();
        println!(
            "  {:>3}. {} {}",
            i + 1,
            step.unit,
            format!("(depth {}, after {})", step.depth, dependencies.join(", ")).dimmed()
        );
    }
    println!();
    println!("Total: {} units", (plan.len() + 1).to_string().bold());

    Ok(())
}

fn print_cycle(cycle: &[GraphEdge]) {
    eprintln!("{}", "Dependency cycle:".red().bold());
    for edge in cycle {
        eprintln!("  {} {} {} ({})", edge.source, "→".dimmed(), edge.target, edge.kind);
    }
}

/// Reload a unit and its ancestors once.
pub fn reload(unit: &str, root: &Path, entries: &[String], json_output: bool) -> Result<()> {
    let (mut policy, mut sandbox, _config) = Session::open(root, entries)?.policy()?;

    let outcome = policy.reload(&mut sandbox, unit)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(())
}

/// Watch the tree and reload changed units with their ancestors.
pub async fn watch(root: &Path, entries: &[String]) -> Result<()> {
    let (policy, sandbox, config) = Session::open(root, entries)?.policy()?;

    let watcher_config = WatcherConfig::new(root, &config);
    println!(
        "{} Watching {} (cooldown {}s, debounce {}ms)",
        "✓".green(),
        root.display(),
        policy.cooldown().as_secs(),
        config.debounce_ms
    );
    println!("  Press {} to stop", "Ctrl+C".cyan());

    let watcher = ReloadWatcher::new(watcher_config, policy, sandbox)
        .run()
        .await?;

    let stats = watcher.stats();
    println!(
        "{} {} changes, {} reloads, {} failures, {} ignored",
        "✓".green(),
        stats.changes,
        stats.reloads.to_string().green(),
        stats.failures.to_string().red(),
        stats.ignored
    );

    Ok(())
}
