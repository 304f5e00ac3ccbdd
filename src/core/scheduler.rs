//! Task Scheduler - level-by-level (Kahn) execution of a task graph
//!
//! Each batch is the current ready set, sorted by name, run with at most
//! `max_concurrency` tasks in flight. The next batch is only computed once
//! the whole current batch has finished. After a failing batch drains, no
//! further batch is dispatched.

use super::TaskGraph;
use crate::error::{Result, WeaveError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs one named task to completion on the calling thread
pub trait TaskRunner: Send + Sync + 'static {
    fn run_task(&self, name: &str) -> Result<()>;
}

/// Execute every node of `graph`, dependencies first.
///
/// `max_concurrency < 1` is treated as 1. Returns the first failure by
/// completion time, or a cycle error if some nodes could never become ready.
pub async fn run_graph(
    runner: Arc<dyn TaskRunner>,
    graph: &TaskGraph,
    max_concurrency: usize,
) -> Result<()> {
    let max_concurrency = max_concurrency.max(1);

    let nodes = graph.nodes();
    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (*n, 0)).collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for node in &nodes {
        let deps = graph.dependencies(node);
        in_degree.insert(*node, deps.len());
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(*node);
        }
    }

    let mut ready: Vec<&str> = nodes
        .iter()
        .copied()
        .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
        .collect();
    ready.sort_unstable();

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut processed = 0usize;

    while !ready.is_empty() {
        let batch = std::mem::take(&mut ready);
        log::debug!("dispatching batch: {}", batch.join(", "));

        run_batch(&runner, &batch, &semaphore).await?;

        processed += batch.len();
        for done in &batch {
            for dependent in dependents.get(done).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(count) = in_degree.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.push(*dependent);
                    }
                }
            }
        }
        ready.sort_unstable();
    }

    if processed != nodes.len() {
        return Err(match graph.find_cycle() {
            Some(cycle) => WeaveError::Cycle(cycle),
            None => WeaveError::Scheduler(format!(
                "{} of {} tasks never became ready",
                nodes.len() - processed,
                nodes.len()
            )),
        });
    }

    Ok(())
}

/// Run every task of one batch, waiting for all of them
async fn run_batch(
    runner: &Arc<dyn TaskRunner>,
    batch: &[&str],
    semaphore: &Arc<Semaphore>,
) -> Result<()> {
    let mut set = JoinSet::new();
    let mut first_err: Option<WeaveError> = None;

    for name in batch {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                first_err.get_or_insert(WeaveError::Scheduler(e.to_string()));
                break;
            }
        };

        let runner = runner.clone();
        let name = name.to_string();
        set.spawn_blocking(move || {
            let _permit = permit;
            let result = runner.run_task(&name);
            (name, result)
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((name, Err(e))) => {
                log::debug!("task {} failed: {}", name, e);
                first_err.get_or_insert(e);
            }
            Err(e) => {
                first_err.get_or_insert(WeaveError::Scheduler(format!("worker failed: {}", e)));
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
