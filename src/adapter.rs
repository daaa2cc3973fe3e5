use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;

use crate::canon::CanonicalizedInput;
use crate::otl::ScheduleEntry;

/// One (schedule entry, geometry) row feeding the worker-to-line model.
#[derive(Debug, Clone)]
pub struct LineDataRow {
    pub order: usize,
    pub start: i64,
    pub finish: i64,
    pub line: usize,
    pub geometry: String,
    pub required_workers: usize,
}

/// Expands an OTL schedule into per-geometry rows, dropping any
/// (line, geometry) combination with no recorded worker count.
///
/// Grounded on `swagger_api.py`'s `line_allocation` construction: one row per
/// geometry carried by the order, skipped via `except KeyError: pass` when
/// `required_workers_mapping` has no entry for that (line, geometry).
pub fn expand_schedule(schedule: &[ScheduleEntry], canon: &CanonicalizedInput) -> Vec<LineDataRow> {
    let mut rows = Vec::new();
    for entry in schedule {
        let Some(geometries) = canon.order_geometries.get(&entry.order) else {
            continue;
        };
        for geometry in geometries {
            let Some(&required) = canon
                .geometry_required_workers
                .get(&(entry.line, geometry.clone()))
            else {
                continue;
            };
            rows.push(LineDataRow {
                order: entry.order,
                start: entry.start,
                finish: entry.finish,
                line: entry.line,
                geometry: geometry.clone(),
                required_workers: required,
            });
        }
    }
    rows
}

/// Builds the elementary interval partition: the sorted union of every row's
/// start/finish and every worker's availability endpoints, paired up into
/// adjacent `(start, end)` sub-intervals over which the running-job set and
/// the available-worker set are each constant.
pub fn interval_partition(rows: &[LineDataRow], workers: &[crate::canon::WorkerData]) -> Vec<(i64, i64)> {
    let mut bounds: BTreeSet<i64> = BTreeSet::new();
    for row in rows {
        bounds.insert(row.start);
        bounds.insert(row.finish);
    }
    for worker in workers {
        for &(s, e) in &worker.availability {
            bounds.insert(s);
            bounds.insert(e);
        }
    }
    bounds.into_iter().tuple_windows().collect()
}

/// For a given elementary interval and line, the demand row whose span
/// covers the interval (`row.start <= interval.start && row.finish >=
/// interval.end`), if any. When the geometry fan-out produces more than one
/// covering row for the same (interval, line) — a multi-geometry order
/// running at that moment — the first one encountered wins; the spec leaves
/// that case unresolved and this is a deterministic, documented choice.
pub fn demand_at<'a>(rows: &'a [LineDataRow], line: usize, interval: (i64, i64)) -> Option<&'a LineDataRow> {
    rows.iter()
        .find(|r| r.line == line && r.start <= interval.0 && r.finish >= interval.1)
}

pub fn lines_in_rows(rows: &[LineDataRow]) -> Vec<usize> {
    let set: HashMap<usize, ()> = rows.iter().map(|r| (r.line, ())).collect();
    let mut lines: Vec<usize> = set.into_keys().collect();
    lines.sort_unstable();
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::WorkerData;

    fn worker(availability: Vec<(i64, i64)>) -> WorkerData {
        WorkerData { index: 0, affinities: HashMap::new(), availability }
    }

    #[test]
    fn partition_unions_schedule_and_availability_bounds() {
        let rows = vec![LineDataRow {
            order: 0,
            start: 0,
            finish: 10,
            line: 0,
            geometry: "g".into(),
            required_workers: 1,
        }];
        let workers = vec![worker(vec![(0, 5), (5, 10)])];
        let partition = interval_partition(&rows, &workers);
        assert_eq!(partition, vec![(0, 5), (5, 10)]);
    }

    #[test]
    fn missing_required_workers_drops_the_row() {
        let schedule = vec![ScheduleEntry { order: 0, start: 0, finish: 5, line: 0 }];
        let mut canon = CanonicalizedInput::default();
        canon.order_geometries.insert(0, vec!["geoX".into()]);
        let rows = expand_schedule(&schedule, &canon);
        assert!(rows.is_empty());
    }
}
