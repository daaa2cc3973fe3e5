use std::collections::HashMap;

use log::warn;
use serde::Deserialize;

/// A dense, first-appearance index assigned to an external string identifier.
///
/// The solvers index everything by small contiguous `usize`s instead of
/// hashing strings on every constraint; this keeps the forward and reverse
/// mapping needed to translate results back at the boundary.
#[derive(Debug, Default, Clone)]
pub struct IndexMap {
    forward: Vec<String>,
    reverse: HashMap<String, usize>,
}

impl IndexMap {
    pub fn new() -> Self {
        IndexMap::default()
    }

    /// Returns the existing index for `id`, assigning the next free one on
    /// first sight.
    pub fn intern(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.reverse.get(id) {
            return idx;
        }
        let idx = self.forward.len();
        self.forward.push(id.to_string());
        self.reverse.insert(id.to_string(), idx);
        idx
    }

    pub fn get(&self, id: &str) -> Option<usize> {
        self.reverse.get(id).copied()
    }

    pub fn external(&self, idx: usize) -> &str {
        &self.forward[idx]
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// One admissible (duration, line, priority, due-date) option for an order.
#[derive(Debug, Clone)]
pub struct Alternative {
    pub duration_hours: i64,
    pub line: usize,
    /// `true` when the incoming `priority` flag was falsey — the original
    /// inverts the bit (`priority = 0; if not order['priority']: priority =
    /// 1`), so a "priority" order in the wire format is the *non*-priority
    /// one here. Preserved as observed.
    pub priority_bit: bool,
    /// Denominated in minutes despite the name, matching the preserved
    /// `duration_mins = (deadline - start) / 60` conversion used as a due
    /// "hour" bound alongside an hour-denominated duration.
    pub due_hours: i64,
}

#[derive(Debug, Clone)]
pub struct CanonicalOrder {
    pub index: usize,
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
pub struct Affinity {
    pub experience: f64,
    pub preference: f64,
    pub resilience: f64,
    /// Inverted from the request's `medical_condition` field: that flag
    /// reports whether a disqualifying condition *exists* (`true` =
    /// excluded), so `medical_ok` is `!medical_condition`.
    pub medical_ok: bool,
}

#[derive(Debug, Clone)]
pub struct WorkerData {
    pub index: usize,
    pub affinities: HashMap<String, Affinity>,
    pub availability: Vec<(i64, i64)>,
}

#[derive(Debug, Clone, Default)]
pub struct CanonicalizedInput {
    pub orders: Vec<CanonicalOrder>,
    /// Order index -> geometries, in encounter order, not deduplicated (an
    /// order can carry more than one geometry row).
    pub order_geometries: HashMap<usize, Vec<String>>,
    pub lines: IndexMap,
    pub orders_map: IndexMap,
    pub workers: Vec<WorkerData>,
    pub workers_map: IndexMap,
    /// (line index, geometry) -> required worker count.
    pub geometry_required_workers: HashMap<(usize, String), usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOrderRow {
    pub order: String,
    pub geometry: String,
    pub amount: i64,
    pub deadline: f64,
    pub priority: bool,
    pub mold: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGeometryLineMapping {
    pub geometry: String,
    pub main_line: i64,
    pub alternative_lines: Vec<i64>,
    pub number_of_workers: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawThroughput {
    pub line: String,
    pub geometry: String,
    pub throughput: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawHumanFactor {
    pub worker: String,
    pub geometry: String,
    pub experience: f64,
    pub preference: f64,
    pub resilience: f64,
    pub medical_condition: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAvailability {
    pub worker: String,
    pub from_timestamp: f64,
    pub end_timestamp: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanningRequest {
    pub start_time_stamp: f64,
    #[serde(rename = "order-data")]
    pub order_data: Vec<RawOrderRow>,
    pub geometry_line_mapping: Vec<RawGeometryLineMapping>,
    pub throughput_mapping: Vec<RawThroughput>,
    #[serde(default)]
    pub human_factor: Vec<RawHumanFactor>,
    #[serde(default)]
    pub availabilities: Vec<RawAvailability>,
    /// Accepted for wire compatibility but not used by any solver — the
    /// original prototype never read it back out of the request either.
    #[serde(default)]
    pub hardcoded_allocation: serde_json::Value,
    /// Per-request override of the order-to-line objective weights; absent
    /// fields (or the whole object) fall back to the 1:1 default.
    #[serde(default)]
    pub otl_config: crate::config::OtlConfig,
    /// Per-request override of the worker-to-line objective weights, solver
    /// model choice, and medical-relaxation opt-in.
    #[serde(default)]
    pub wla_config: crate::config::WlaConfig,
}

/// Turns one request's worth of wire data into dense-indexed model input.
///
/// Grounded on `swagger_api.py`'s `/order-to-line` and `/worker-assignment`
/// handlers and on `cp_order_to_line.py`'s alternative-construction loop.
pub fn canonicalize(req: &PlanningRequest) -> CanonicalizedInput {
    let mut lines = IndexMap::new();
    for tp in &req.throughput_mapping {
        lines.intern(&tp.line);
    }

    let mut geometry_admissible_lines: HashMap<String, Vec<i64>> = HashMap::new();
    let mut geometry_worker_count: HashMap<String, i64> = HashMap::new();
    for glm in &req.geometry_line_mapping {
        let mut admissible = vec![glm.main_line];
        admissible.extend(glm.alternative_lines.iter().copied());
        geometry_admissible_lines.insert(glm.geometry.clone(), admissible);
        geometry_worker_count.insert(glm.geometry.clone(), glm.number_of_workers);
    }

    let mut geometry_required_workers: HashMap<(usize, String), usize> = HashMap::new();
    for tp in &req.throughput_mapping {
        if let Some(idx) = lines.get(&tp.line) {
            if let Some(&count) = geometry_worker_count.get(&tp.geometry) {
                geometry_required_workers.insert((idx, tp.geometry.clone()), count.max(0) as usize);
            }
        }
    }

    let mut orders_map = IndexMap::new();
    let mut order_geometries: HashMap<usize, Vec<String>> = HashMap::new();
    let mut per_order_alternatives: HashMap<usize, Vec<Alternative>> = HashMap::new();

    for row in &req.order_data {
        let order_idx = orders_map.intern(&row.order);
        order_geometries
            .entry(order_idx)
            .or_default()
            .push(row.geometry.clone());

        let priority_bit = !row.priority;
        let due_hours = ((row.deadline - req.start_time_stamp) / 60.0).ceil() as i64;

        let admissible_lines = geometry_admissible_lines
            .get(&row.geometry)
            .cloned()
            .unwrap_or_default();

        for line_num in &admissible_lines {
            let wire_line_name = format!("Line {line_num}");
            for tp in &req.throughput_mapping {
                if tp.line == wire_line_name && tp.geometry == row.geometry {
                    let mut throughput = tp.throughput;
                    if throughput == 0 {
                        warn!("throughput adjusted to 300 for line {wire_line_name}, geometry {}", row.geometry);
                        throughput = 300;
                    }
                    let duration_hours = (5.0 * row.mold as f64
                        + (15.0 + row.amount as f64 / throughput as f64) / 60.0)
                        .ceil() as i64;
                    let Some(line_idx) = lines.get(&tp.line) else {
                        continue;
                    };
                    per_order_alternatives.entry(order_idx).or_default().push(Alternative {
                        duration_hours,
                        line: line_idx,
                        priority_bit,
                        due_hours,
                    });
                }
            }
        }
    }

    let mut orders = Vec::new();
    for idx in 0..orders_map.len() {
        let alternatives = per_order_alternatives.remove(&idx).unwrap_or_default();
        if alternatives.is_empty() {
            continue;
        }
        orders.push(CanonicalOrder { index: idx, alternatives });
    }

    let mut workers_map = IndexMap::new();
    for hf in &req.human_factor {
        workers_map.intern(&hf.worker);
    }
    let mut workers: Vec<WorkerData> = (0..workers_map.len())
        .map(|idx| WorkerData {
            index: idx,
            affinities: HashMap::new(),
            availability: Vec::new(),
        })
        .collect();
    for hf in &req.human_factor {
        let idx = workers_map.intern(&hf.worker);
        workers[idx].affinities.insert(
            hf.geometry.clone(),
            Affinity {
                experience: hf.experience,
                preference: hf.preference,
                resilience: hf.resilience,
                medical_ok: !hf.medical_condition,
            },
        );
    }
    for av in &req.availabilities {
        let Some(idx) = workers_map.get(&av.worker) else {
            // Worker referenced in availabilities but absent from
            // human_factor: no affinity data exists to assign them to any
            // line, so there is nothing useful to canonicalize here.
            continue;
        };
        let from_hours = ((av.from_timestamp - req.start_time_stamp) / 3600.0)
            .floor()
            .max(0.0) as i64;
        let end_hours = ((av.end_timestamp - req.start_time_stamp) / 3600.0)
            .ceil()
            .max(0.0) as i64;
        workers[idx].availability.push((from_hours, end_hours));
    }

    CanonicalizedInput {
        orders,
        order_geometries,
        lines,
        orders_map,
        workers,
        workers_map,
        geometry_required_workers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> PlanningRequest {
        PlanningRequest {
            start_time_stamp: 0.0,
            order_data: vec![RawOrderRow {
                order: "order 1".into(),
                geometry: "geo1".into(),
                amount: 3000,
                deadline: 36_000.0,
                priority: true,
                mold: 4,
            }],
            geometry_line_mapping: vec![RawGeometryLineMapping {
                geometry: "geo1".into(),
                main_line: 7,
                alternative_lines: vec![17],
                number_of_workers: 3,
            }],
            throughput_mapping: vec![
                RawThroughput { line: "Line 7".into(), geometry: "geo1".into(), throughput: 3000 },
                RawThroughput { line: "Line 17".into(), geometry: "geo1".into(), throughput: 3000 },
            ],
            human_factor: vec![],
            availabilities: vec![],
            hardcoded_allocation: serde_json::Value::Null,
            otl_config: crate::config::OtlConfig::default(),
            wla_config: crate::config::WlaConfig::default(),
        }
    }

    #[test]
    fn builds_dense_lines_in_first_appearance_order() {
        let req = sample_request();
        let canon = canonicalize(&req);
        assert_eq!(canon.lines.external(0), "Line 7");
        assert_eq!(canon.lines.external(1), "Line 17");
    }

    #[test]
    fn priority_bit_is_inverted() {
        let req = sample_request();
        let canon = canonicalize(&req);
        assert_eq!(canon.orders.len(), 1);
        for alt in &canon.orders[0].alternatives {
            assert!(!alt.priority_bit);
        }
    }

    #[test]
    fn order_with_no_admissible_line_is_dropped() {
        let mut req = sample_request();
        req.order_data.push(RawOrderRow {
            order: "order 2".into(),
            geometry: "unknown-geo".into(),
            amount: 100,
            deadline: 1000.0,
            priority: false,
            mold: 1,
        });
        let canon = canonicalize(&req);
        assert_eq!(canon.orders.len(), 1);
    }

    #[test]
    fn zero_throughput_is_adjusted_to_300() {
        let mut req = sample_request();
        req.throughput_mapping[0].throughput = 0;
        let canon = canonicalize(&req);
        let alt = canon.orders[0]
            .alternatives
            .iter()
            .find(|a| a.line == 0)
            .expect("line 7 alternative");
        let expected = (5.0 * 4.0 + (15.0 + 3000.0 / 300.0) / 60.0_f64).ceil() as i64;
        assert_eq!(alt.duration_hours, expected);
    }

    #[test]
    fn no_medical_condition_means_fit() {
        let mut req = sample_request();
        req.human_factor.push(RawHumanFactor {
            worker: "worker 1".into(),
            geometry: "geo1".into(),
            experience: 1.0,
            preference: 1.0,
            resilience: 1.0,
            medical_condition: false,
        });
        let canon = canonicalize(&req);
        let worker = &canon.workers[0];
        assert!(worker.affinities["geo1"].medical_ok);
    }

    #[test]
    fn medical_condition_present_means_excluded() {
        let mut req = sample_request();
        req.human_factor.push(RawHumanFactor {
            worker: "worker 1".into(),
            geometry: "geo1".into(),
            experience: 1.0,
            preference: 1.0,
            resilience: 1.0,
            medical_condition: true,
        });
        let canon = canonicalize(&req);
        let worker = &canon.workers[0];
        assert!(!worker.affinities["geo1"].medical_ok);
    }
}
