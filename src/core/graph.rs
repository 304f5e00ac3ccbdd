//! Task graph - per-run dependency subgraph resolved from one root task

use super::Registry;
use crate::error::{Result, WeaveError};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Mapping from task name to its resolved direct dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskGraph {
    deps: BTreeMap<String, Vec<String>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the subgraph reachable from `root`.
    ///
    /// Every referenced name must exist in `registry`.
    pub fn resolve(registry: &Registry, root: &str) -> Result<Self> {
        if !registry.contains(root) {
            return Err(WeaveError::UnknownTask {
                name: root.to_string(),
                required_by: None,
            });
        }

        let mut graph = Self::new();
        let mut visited = BTreeSet::new();
        // (task, index of the next dependency to visit)
        let mut stack: Vec<(String, usize)> = vec![(root.to_string(), 0)];
        visited.insert(root.to_string());

        while let Some((name, next)) = stack.pop() {
            let Some(task) = registry.get(&name) else {
                return Err(WeaveError::UnknownTask {
                    name,
                    required_by: None,
                });
            };

            if next == 0 {
                for dep in &task.depends {
                    if !registry.contains(dep) {
                        return Err(WeaveError::UnknownTask {
                            name: dep.clone(),
                            required_by: Some(name.clone()),
                        });
                    }
                }
                graph.deps.insert(name.clone(), task.depends.clone());
            }

            if let Some(dep) = task.depends.get(next) {
                let dep = dep.clone();
                stack.push((name, next + 1));
                if visited.insert(dep.clone()) {
                    stack.push((dep, 0));
                }
            }
        }

        Ok(graph)
    }

    /// Insert a node with its dependencies
    pub fn insert<I, S>(&mut self, name: impl Into<String>, deps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps
            .insert(name.into(), deps.into_iter().map(Into::into).collect());
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.deps.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All node names, including dependencies that have no entry of their own
    pub fn nodes(&self) -> BTreeSet<&str> {
        let mut all = BTreeSet::new();
        for (name, deps) in &self.deps {
            all.insert(name.as_str());
            all.extend(deps.iter().map(String::as_str));
        }
        all
    }

    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes().contains(name)
    }

    /// Fail with a concrete cyclic path if the graph is not acyclic
    pub fn validate(&self) -> Result<()> {
        match self.find_cycle() {
            Some(cycle) => Err(WeaveError::Cycle(cycle)),
            None => Ok(()),
        }
    }

    /// Depth-first search for one cycle.
    ///
    /// Roots are visited in lexicographic order and dependencies in declared
    /// order, so the reported path is deterministic. The returned path starts
    /// and ends with the same name.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum State {
            Unvisited,
            Visiting,
            Done,
        }

        let mut state: HashMap<&str, State> = HashMap::new();

        for root in self.deps.keys() {
            if state.contains_key(root.as_str()) {
                continue;
            }

            let mut path: Vec<&str> = vec![root.as_str()];
            let mut cursor: Vec<usize> = vec![0];
            state.insert(root.as_str(), State::Visiting);

            while let Some(&node) = path.last() {
                let depth = path.len() - 1;
                let deps = self.dependencies(node);
                let next = cursor[depth];

                if next >= deps.len() {
                    state.insert(node, State::Done);
                    path.pop();
                    cursor.pop();
                    continue;
                }
                cursor[depth] += 1;

                let dep = deps[next].as_str();
                match state.get(dep).copied().unwrap_or(State::Unvisited) {
                    State::Visiting => {
                        let start = path.iter().rposition(|n| *n == dep).unwrap_or(0);
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|n| n.to_string()).collect();
                        cycle.push(dep.to_string());
                        return Some(cycle);
                    }
                    State::Unvisited => {
                        state.insert(dep, State::Visiting);
                        path.push(dep);
                        cursor.push(0);
                    }
                    State::Done => {}
                }
            }
        }

        None
    }
}
