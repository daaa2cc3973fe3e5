use serde::Serialize;

use crate::adapter::LineDataRow;
use crate::canon::CanonicalizedInput;
use crate::otl::ScheduleEntry;
use crate::wla::WlaResult;

/// One row of the final, externally-addressed response.
///
/// Grounded on `swagger_api.py`'s `final_result` construction: dense `"Order
/// N"`/`"Line N"` labels are re-mapped back to the caller's own identifiers
/// via the reverse index maps built during canonicalization.
#[derive(Debug, Clone, Serialize)]
pub struct AssembledEntry {
    #[serde(rename = "Task")]
    pub task: String,
    #[serde(rename = "Start")]
    pub start: i64,
    #[serde(rename = "Finish")]
    pub finish: i64,
    #[serde(rename = "Resource")]
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<Vec<String>>,
}

/// Assembles the order-to-line-only response (`/order-to-line`): just the
/// placement, external identifiers, no geometry or worker fields.
pub fn assemble_otl(schedule: &[ScheduleEntry], canon: &CanonicalizedInput) -> Vec<AssembledEntry> {
    schedule
        .iter()
        .map(|entry| AssembledEntry {
            task: canon.orders_map.external(entry.order).to_string(),
            start: entry.start,
            finish: entry.finish,
            resource: canon.lines.external(entry.line).to_string(),
            geometry: None,
            required_workers: None,
            workers: None,
        })
        .collect()
}

/// Assembles the full response (`/worker-assignment`): the geometry fan-out
/// rows joined with the worker-allocation solution, all identifiers re-
/// mapped back to external strings.
pub fn assemble_full(rows: &[LineDataRow], wla: &WlaResult, canon: &CanonicalizedInput) -> Vec<AssembledEntry> {
    rows.iter()
        .map(|row| {
            let workers = wla.assignments.get(&row.line).map(|ws| {
                ws.iter()
                    .map(|&w| canon.workers_map.external(w).to_string())
                    .collect::<Vec<_>>()
            });
            AssembledEntry {
                task: canon.orders_map.external(row.order).to_string(),
                start: row.start,
                finish: row.finish,
                resource: canon.lines.external(row.line).to_string(),
                geometry: Some(row.geometry.clone()),
                required_workers: Some(row.required_workers),
                workers: Some(workers.unwrap_or_default()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::IndexMap;
    use std::collections::HashMap;

    #[test]
    fn otl_assembly_remaps_external_identifiers() {
        let mut canon = CanonicalizedInput::default();
        canon.orders_map = IndexMap::new();
        canon.orders_map.intern("order 7");
        canon.lines = IndexMap::new();
        canon.lines.intern("line 3");
        let schedule = vec![ScheduleEntry { order: 0, start: 0, finish: 4, line: 0 }];
        let assembled = assemble_otl(&schedule, &canon);
        assert_eq!(assembled[0].task, "order 7");
        assert_eq!(assembled[0].resource, "line 3");
        assert!(assembled[0].workers.is_none());
    }

    #[test]
    fn full_assembly_joins_worker_names() {
        let mut canon = CanonicalizedInput::default();
        canon.orders_map.intern("order 1");
        canon.lines.intern("line 1");
        canon.workers_map.intern("worker A");
        let rows = vec![LineDataRow {
            order: 0,
            start: 0,
            finish: 4,
            line: 0,
            geometry: "geo1".into(),
            required_workers: 1,
        }];
        let mut assignments = HashMap::new();
        assignments.insert(0usize, vec![0usize]);
        let wla = WlaResult { assignments, medical_constraint_relaxed: false };
        let assembled = assemble_full(&rows, &wla, &canon);
        assert_eq!(assembled[0].workers.as_ref().unwrap(), &vec!["worker A".to_string()]);
    }
}
