// src/dag/graph.rs

use std::collections::BTreeMap;

use crate::config::model::ConfigFile;

#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Tasks listed in `after`.
    deps: Vec<String>,
    /// Tasks that list this one in their `after`.
    dependents: Vec<String>,
}

/// Adjacency lists of the task graph. Acyclicity is checked during config
/// validation, so nothing here re-checks it.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<String, DagNode>,
}

impl DagGraph {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::from_edges(
            cfg.tasks()
                .iter()
                .map(|(name, task)| (name.clone(), task.after.clone())),
        )
    }

    /// Build from `(task, dependencies)` pairs.
    pub fn from_edges(edges: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut nodes: BTreeMap<String, DagNode> = edges
            .into_iter()
            .map(|(name, deps)| {
                (
                    name,
                    DagNode {
                        deps,
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        let pairs: Vec<(String, String)> = nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |d| (d.clone(), name.clone())))
            .collect();
        for (dep, dependent) in pairs {
            if let Some(node) = nodes.get_mut(&dep) {
                node.dependents.push(dependent);
            }
        }

        Self { nodes }
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks without dependencies.
    pub fn roots(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.deps.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}
