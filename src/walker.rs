//! Dependency graph walker.
//!
//! Computes the transitive set of files a root file imports by visiting
//! every node of each file's syntax tree and resolving import expressions
//! through the evaluator's own resolution rules.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::evaluator::{normalize_path, EvalError, ImportGraph, ImportKind, SyntaxNode};

/// Returns `root` plus every file it imports, transitively, sorted.
///
/// A file is marked as seen before it is descended into, so cyclic imports
/// terminate. Any resolution failure aborts the walk: an unreadable
/// dependency would make any hash computed from the set meaningless.
pub fn walk(graph: &mut dyn ImportGraph, root: &Path) -> Result<BTreeSet<PathBuf>, EvalError> {
    let root = normalize_path(root);
    let mut seen = BTreeSet::new();
    seen.insert(root.clone());
    descend(graph, &root, &mut seen)?;
    Ok(seen)
}

fn descend(
    graph: &mut dyn ImportGraph,
    file: &Path,
    seen: &mut BTreeSet<PathBuf>,
) -> Result<(), EvalError> {
    let tree = graph.syntax_tree(file)?;

    let mut targets = Vec::new();
    collect_imports(&tree, &mut targets);

    let mut discovered = Vec::new();
    for (target, kind) in targets {
        let resolved = graph.resolve_import(file, target)?;
        // Text imports are dependencies too, but they are never parsed.
        if seen.insert(resolved.clone()) && kind == ImportKind::Code {
            discovered.push(resolved);
        }
    }

    for next in discovered {
        descend(graph, &next, seen)?;
    }
    Ok(())
}

fn collect_imports<'a>(node: &'a SyntaxNode, out: &mut Vec<(&'a str, ImportKind)>) {
    if let Some(target) = &node.import {
        out.push((target.as_str(), node.kind));
    }
    for child in &node.children {
        collect_imports(child, out);
    }
}
