//! Dependency-graph executor.
//!
//! A node runs only after every node it depends on has finished. With the
//! `parallel` feature nodes run on rayon; the node that completes a
//! dependent's last dependency spawns it. Without it, nodes run on the
//! calling thread in the same dependency order.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

/// What a finished node tells the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Release dependents.
    Continue,
    /// Leave dependents unscheduled.
    Halt,
}

/// Logical start/end timestamps of one node, from a clock shared by the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

#[derive(Clone, Debug, Default)]
pub struct TaskGraph {
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl TaskGraph {
    pub fn new(nodes: usize) -> Self {
        Self {
            dependencies: vec![Vec::new(); nodes],
            dependents: vec![Vec::new(); nodes],
        }
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Declares that `node` may only start after `on` has finished.
    pub fn add_dependency(&mut self, node: usize, on: usize) {
        assert!(node < self.len() && on < self.len(), "node out of range");
        assert_ne!(node, on, "node cannot depend on itself");
        self.dependencies[node].push(on);
        self.dependents[on].push(node);
    }

    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.dependencies[node]
    }

    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.dependents[node]
    }

    fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.dependencies
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(i, _)| i)
    }

    /// Runs `task` once per reachable node and blocks until no runnable node
    /// remains. Returns the span of each node that ran (`None` for nodes
    /// never released).
    pub fn execute<F>(&self, task: F) -> Vec<Option<Span>>
    where
        F: Fn(usize) -> Flow + Sync,
    {
        let run = Run {
            graph: self,
            task,
            pending: self
                .dependencies
                .iter()
                .map(|deps| AtomicUsize::new(deps.len()))
                .collect(),
            clock: AtomicU64::new(0),
            spans: (0..self.len()).map(|_| OnceLock::new()).collect(),
        };
        run.start();
        run.spans.into_iter().map(|s| s.into_inner()).collect()
    }
}

struct Run<'g, F> {
    graph: &'g TaskGraph,
    task: F,
    pending: Vec<AtomicUsize>,
    clock: AtomicU64,
    spans: Vec<OnceLock<Span>>,
}

impl<F> Run<'_, F>
where
    F: Fn(usize) -> Flow + Sync,
{
    /// Runs one node and returns the dependents it made ready.
    fn run_node(&self, node: usize) -> Vec<usize> {
        let start = self.clock.fetch_add(1, Ordering::SeqCst);
        let flow = (self.task)(node);
        let end = self.clock.fetch_add(1, Ordering::SeqCst);
        let _ = self.spans[node].set(Span { start, end });
        if flow == Flow::Halt {
            return Vec::new();
        }
        self.graph.dependents[node]
            .iter()
            .copied()
            .filter(|&d| self.pending[d].fetch_sub(1, Ordering::AcqRel) == 1)
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn start(&self) {
        rayon::scope(|s| {
            for root in self.graph.roots() {
                self.spawn(s, root);
            }
        });
    }

    #[cfg(feature = "parallel")]
    fn spawn<'s>(&'s self, scope: &rayon::Scope<'s>, node: usize) {
        scope.spawn(move |s| {
            for ready in self.run_node(node) {
                self.spawn(s, ready);
            }
        });
    }

    #[cfg(not(feature = "parallel"))]
    fn start(&self) {
        let mut ready: std::collections::VecDeque<usize> = self.graph.roots().collect();
        while let Some(node) = ready.pop_front() {
            ready.extend(self.run_node(node));
        }
    }
}
