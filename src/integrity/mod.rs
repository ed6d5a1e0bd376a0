//! Read-only audit of the link graph and ownership invariants.
//!
//! Checks never repair. Each returns what it looked at and the offending records; the
//! runner sums them and stores an [`IntegrityRun`] so results can be tracked over time.

use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use tracing::{info, warn};

use crate::model::{Id, IntegrityRun, Record};
use crate::store::{Store, Tables};

mod checks;

pub use checks::ALL;

/// Outcome of one check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub name: &'static str,
    pub records_inspected: u64,
    /// One line per offending record.
    pub errors: Vec<String>,
}

impl CheckReport {
    pub fn errors_found(&self) -> u64 { self.errors.len() as u64 }
}

pub type Check = fn(&Tables) -> CheckReport;

/// Edges whose swapped pair has no active counterpart.
pub(crate) fn missing_reciprocals(edges: &[(Id, Id, Id)]) -> (u64, Vec<String>) {
    let present: HashSet<(Id, Id)> = edges.iter().map(|&(_, a, b)| (a, b)).collect();
    let errors = edges
        .iter()
        .filter(|&&(_, a, b)| !present.contains(&(b, a)))
        .map(|(id, a, b)| format!("{}, {}, {}", id, a, b))
        .collect();
    (edges.len() as u64, errors)
}

/// Pairs that appear more than once, reported with every id holding the pair.
pub(crate) fn duplicate_pairs(edges: &[(Id, Id, Id)]) -> (u64, Vec<String>) {
    let mut by_pair: BTreeMap<(Id, Id), Vec<Id>> = BTreeMap::new();
    for &(id, a, b) in edges {
        by_pair.entry((a, b)).or_default().push(id);
    }
    let errors = by_pair
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((a, b), ids)| format!("{}, {}: ids {:?}", a, b, ids))
        .collect();
    (edges.len() as u64, errors)
}

pub(crate) fn active<T: Record>(row: &T) -> bool { row.lifecycle().is_active() }

/// Run every check, write the report to `out`, and persist the run summary.
pub fn run_all(store: &Store, out: &mut dyn Write) -> anyhow::Result<IntegrityRun> {
    let start_time = Utc::now();
    writeln!(out, "Beginning tests\n{}", start_time)?;
    let reports: Vec<CheckReport> = store.read(|t| ALL.iter().map(|check| check(t)).collect());
    let mut errors_found = 0;
    let mut records_inspected = 0;
    for report in &reports {
        writeln!(out, "\n{}: inspected {}, errors {}", report.name, report.records_inspected, report.errors_found())?;
        for line in &report.errors {
            writeln!(out, "{}", line)?;
        }
        if !report.errors.is_empty() {
            warn!(target: "membership::integrity", "{} found {} problems", report.name, report.errors_found());
        }
        errors_found += report.errors_found();
        records_inspected += report.records_inspected;
    }
    let finish_time = Utc::now();
    writeln!(out, "\nTests completed\n{}", finish_time)?;

    let run = store.write(|t| {
        t.integrity_runs.insert_with(|id| IntegrityRun { id, errors_found, records_inspected, start_time, finish_time })
    });
    store.persist()?;
    info!(target: "membership::integrity", "run {}: {} records inspected, {} errors", run.id, records_inspected, errors_found);
    Ok(run)
}
