//! Thread-safe scan progress counters
//!
//! Updated by the crawler and orchestrator from concurrent tasks and
//! observed read-only by an external display collaborator through
//! [`ScanStats::snapshot`]. Rendering is out of scope here.

use crate::models::{ScanState, Severity, SeverityCounts};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// Coarse-grained named task progress (current/total)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskProgress {
    pub name: String,
    pub current: usize,
    pub total: usize,
}

/// Read-only view of the counters at one instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub phase: String,
    pub current_module: String,
    pub pages_crawled: usize,
    pub api_endpoints: usize,
    pub findings: SeverityCounts,
    pub total_findings: usize,
    pub modules_completed: usize,
    pub modules_total: usize,
    pub task: TaskProgress,
}

/// Shared scan counters. All increments are atomic; strings sit behind
/// an RwLock and are written only at phase boundaries.
#[derive(Default)]
pub struct ScanStats {
    pages_crawled: AtomicUsize,
    api_endpoints: AtomicUsize,
    critical: AtomicUsize,
    high: AtomicUsize,
    medium: AtomicUsize,
    low: AtomicUsize,
    info: AtomicUsize,
    modules_completed: AtomicUsize,
    modules_total: AtomicUsize,
    phase: RwLock<String>,
    current_module: RwLock<String>,
    task: RwLock<TaskProgress>,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_page(&self) {
        self.pages_crawled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_endpoint(&self) {
        self.api_endpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finding(&self, severity: &Severity) {
        let counter = match severity {
            Severity::Critical => &self.critical,
            Severity::High => &self.high,
            Severity::Medium => &self.medium,
            Severity::Low => &self.low,
            Severity::Info => &self.info,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds a completed module's severity counts into the totals
    pub fn record_module_completed(&self, counts: &SeverityCounts) {
        self.critical.fetch_add(counts.critical, Ordering::Relaxed);
        self.high.fetch_add(counts.high, Ordering::Relaxed);
        self.medium.fetch_add(counts.medium, Ordering::Relaxed);
        self.low.fetch_add(counts.low, Ordering::Relaxed);
        self.info.fetch_add(counts.info, Ordering::Relaxed);
        self.modules_completed.fetch_add(1, Ordering::Relaxed);
        self.advance_task();
    }

    pub fn set_phase(&self, state: ScanState) {
        *self.write(&self.phase) = state.to_string();
    }

    pub fn set_current_module(&self, name: &str) {
        *self.write(&self.current_module) = name.to_string();
    }

    pub fn set_modules_total(&self, total: usize) {
        self.modules_total.store(total, Ordering::Relaxed);
    }

    pub fn begin_task(&self, name: &str, total: usize) {
        *self.write(&self.task) = TaskProgress {
            name: name.to_string(),
            current: 0,
            total,
        };
    }

    pub fn advance_task(&self) {
        let mut task = self.write(&self.task);
        task.current = (task.current + 1).min(task.total);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let findings = SeverityCounts {
            critical: self.critical.load(Ordering::Relaxed),
            high: self.high.load(Ordering::Relaxed),
            medium: self.medium.load(Ordering::Relaxed),
            low: self.low.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
        };
        StatsSnapshot {
            phase: self.read(&self.phase).clone(),
            current_module: self.read(&self.current_module).clone(),
            pages_crawled: self.pages_crawled.load(Ordering::Relaxed),
            api_endpoints: self.api_endpoints.load(Ordering::Relaxed),
            total_findings: findings.total(),
            findings,
            modules_completed: self.modules_completed.load(Ordering::Relaxed),
            modules_total: self.modules_total.load(Ordering::Relaxed),
            task: self.read(&self.task).clone(),
        }
    }

    fn read<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
        lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
        lock.write().unwrap_or_else(PoisonError::into_inner)
    }
}
