//! Tree command - print the resolved dependency tree

use crate::cli::args::TreeArgs;
use crate::config::Config;
use crate::error::JavelinResult;
use crate::install::{registry_for, run_cancellable};
use crate::model::Identity;
use crate::resolver::{ResolvedGraph, Resolver};
use crate::ui;
use console::style;
use std::collections::BTreeSet;

use super::install::load_manifest;

/// Execute the tree command
pub async fn execute(args: TreeArgs, config: &Config) -> JavelinResult<()> {
    let manifest = load_manifest(None).await?;
    let declared = manifest.declared_dependencies()?;
    if declared.is_empty() {
        ui::step_info("No dependencies declared");
        return Ok(());
    }

    let registry = registry_for(&manifest, config);
    let resolver = Resolver::new(registry, config.network.max_parallel);
    let graph = run_cancellable(resolver.resolve(&declared)).await?;

    println!("{}", style(manifest.project_name()).bold());
    let mut visited = BTreeSet::new();
    for root in graph.roots() {
        print_node(&graph, root, 1, &mut visited, args.transitive);
    }

    println!();
    println!("{} artifact(s) resolved", graph.len());
    Ok(())
}

fn print_node(
    graph: &ResolvedGraph,
    identity: &Identity,
    depth: usize,
    visited: &mut BTreeSet<Identity>,
    transitive: bool,
) {
    let Some(node) = graph.get(identity) else {
        return;
    };

    let indent = "  ".repeat(depth);
    let repeat = !visited.insert(identity.clone());
    let suffix = if repeat { " (*)" } else { "" };
    println!(
        "{}{} {}{}",
        indent,
        node.coordinate,
        style(format!("({})", node.scope)).dim(),
        style(suffix).dim()
    );

    if !transitive || repeat {
        return;
    }

    for child in graph.children(identity) {
        // children pruned by exclusions, optionality or scope are not in
        // the graph and are not shown
        if graph.get(&child.identity).is_some() {
            print_node(graph, &child.identity, depth + 1, visited, transitive);
        }
    }
}
