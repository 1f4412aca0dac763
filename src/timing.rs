//! Timing information consumed by the clustering cost.
//!
//! The engine never runs timing analysis itself. A [`TimingProvider`] reports
//! the worst register paths and the flops on them; flops on negative-slack
//! paths get a larger weight so the solver keeps their pins close.

use crate::*;
use crate::k_selector::TopKRecorder;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, new)]
pub struct TimingPath {
    pub slack: float,
    /// Names of the flip-flop instances launching or capturing the path.
    pub flops: Vec<String>,
}

pub trait TimingProvider: Sync {
    /// At most `count` paths, worst slack first.
    fn worst_paths(&self, count: usize) -> Vec<TimingPath>;
}

/// Timing disabled: every flop has weight 1.
pub struct NoTiming;
impl TimingProvider for NoTiming {
    fn worst_paths(&self, _count: usize) -> Vec<TimingPath> {
        Vec::new()
    }
}

/// A fixed table of path slacks, as read from a design file or a report.
#[derive(Debug, Default, Clone)]
pub struct PathSlackTable {
    paths: Vec<TimingPath>,
}
impl PathSlackTable {
    pub fn new(paths: Vec<TimingPath>) -> Self {
        Self { paths }
    }
    pub fn len(&self) -> usize {
        self.paths.len()
    }
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
impl TimingProvider for PathSlackTable {
    fn worst_paths(&self, count: usize) -> Vec<TimingPath> {
        let mut recorder = TopKRecorder::new(count);
        for (i, path) in self.paths.iter().enumerate() {
            recorder.record(OrderedFloat(-path.slack), i);
        }
        recorder
            .top_k()
            .into_iter()
            .map(|(_, i)| self.paths[i].clone())
            .collect()
    }
}

/// Per-flop timing summary derived from the worst paths.
#[derive(Debug, Default, Clone)]
pub struct SlackMap {
    worst: Dict<String, float>,
    worst_overall: float,
}
impl SlackMap {
    pub fn from_paths(paths: &[TimingPath]) -> Self {
        let mut worst: Dict<String, float> = Dict::new();
        let mut worst_overall: float = 0.0;
        for path in paths {
            worst_overall = worst_overall.min(path.slack);
            for flop in &path.flops {
                let entry = worst.entry(flop.clone()).or_insert(float::INFINITY);
                *entry = entry.min(path.slack);
            }
        }
        Self { worst, worst_overall }
    }
    /// Worst slack of any reported path through the flop.
    pub fn slack_of(&self, flop: &str) -> Option<float> {
        self.worst.get(flop).copied()
    }
    /// 1 for flops without negative slack, up to `1 + gain` for the worst one.
    pub fn weight_of(&self, flop: &str, gain: float) -> float {
        match self.slack_of(flop) {
            Some(slack) if slack < 0.0 && self.worst_overall < 0.0 => {
                1.0 + gain * (slack / self.worst_overall)
            }
            _ => 1.0,
        }
    }
}
