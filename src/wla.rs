use std::collections::HashMap;

use good_lp::{constraint, default_solver, variable, variables, Expression, Solution, SolverModel, Variable};
use log::{debug, info, warn};

use crate::adapter::{demand_at, interval_partition, lines_in_rows, LineDataRow};
use crate::canon::WorkerData;
use crate::config::{WlaConfig, WlaModel};
use crate::error::WlaError;

/// Worker-to-line allocation result.
#[derive(Debug, Clone, Default)]
pub struct WlaResult {
    /// Line index -> the set of workers assigned to it at any point during
    /// the horizon, sorted for determinism.
    pub assignments: HashMap<usize, Vec<usize>>,
    pub medical_constraint_relaxed: bool,
}

impl WlaResult {
    fn is_empty(&self) -> bool {
        self.assignments.values().all(Vec::is_empty)
    }
}

/// Runs the configured worker-to-line model, retrying once with the medical
/// hard constraint lifted if the first solve places nobody and the caller
/// opted into that relaxation.
///
/// Replaces the original prototype's `medical_flag` process-global retry
/// (`temp_cp_worker_allocation.py`) with an explicit, caller-visible
/// two-phase call.
pub fn solve_wla(
    rows: &[LineDataRow],
    workers: &[WorkerData],
    config: &WlaConfig,
) -> Result<WlaResult, WlaError> {
    let first = match config.model {
        WlaModel::Interval => solve_wla_interval(rows, workers, config, false)?,
        WlaModel::Coarse => solve_wla_coarse(rows, workers, config, false)?,
    };
    if !first.is_empty() || !config.allow_medical_relaxation {
        return Ok(first);
    }
    warn!("WLA solve placed nobody; retrying with the medical constraint relaxed");
    match config.model {
        WlaModel::Interval => solve_wla_interval(rows, workers, config, true),
        WlaModel::Coarse => solve_wla_coarse(rows, workers, config, true),
    }
}

/// Worker qualifies for `geometry` only when an affinity record exists and
/// marks them fit. Absence of a record is treated as unknown fitness, which
/// disqualifies the worker for that geometry.
fn medically_fit(worker: &WorkerData, geometry: &str) -> bool {
    worker.affinities.get(geometry).is_some_and(|a| a.medical_ok)
}

fn affinity_values(worker: &WorkerData, geometry: &str) -> (f64, f64, f64) {
    worker
        .affinities
        .get(geometry)
        .map_or((0.0, 0.0, 0.0), |a| (a.experience, a.preference, a.resilience))
}

struct AssignVar {
    interval: usize,
    worker: usize,
    line: usize,
    var: Variable,
}

/// The elementary-interval model (§4.D): one binary per (interval, worker,
/// line) where that line has nonzero demand in that interval. Staffing is a
/// soft signed offset in the objective, not a hard floor — this mirrors
/// `cp_woker_allocation.py`, where the matching `model.Add(sum(...) >=
/// required_workers)` line is commented out.
fn solve_wla_interval(
    rows: &[LineDataRow],
    workers: &[WorkerData],
    config: &WlaConfig,
    relax_medical: bool,
) -> Result<WlaResult, WlaError> {
    let lines = lines_in_rows(rows);
    let partition = interval_partition(rows, workers);

    if lines.is_empty() || partition.is_empty() || workers.is_empty() {
        return Ok(WlaResult { assignments: HashMap::new(), medical_constraint_relaxed: relax_medical });
    }

    let mut vars = variables!();
    let mut assigns: Vec<AssignVar> = Vec::new();
    let mut not_present: HashMap<(usize, usize), Variable> = HashMap::new();
    let mut pref_terms: Vec<(Variable, f64)> = Vec::new();
    let mut exp_terms: Vec<(Variable, f64)> = Vec::new();
    let mut res_terms: Vec<(Variable, f64)> = Vec::new();
    let mut staffing_offsets: Vec<(Variable, usize, usize)> = Vec::new(); // var, interval, line

    for (k, &interval) in partition.iter().enumerate() {
        let length = (interval.1 - interval.0).max(0) as f64;
        for (w, worker) in workers.iter().enumerate() {
            let available = worker
                .availability
                .iter()
                .any(|&(s, e)| s <= interval.0 && e >= interval.1);

            let np = vars.add(variable().binary());
            not_present.insert((k, w), np);

            if available {
                for &line in &lines {
                    let Some(demand) = demand_at(rows, line, interval) else {
                        continue;
                    };
                    if demand.required_workers == 0 {
                        continue;
                    }
                    if !relax_medical && !medically_fit(worker, &demand.geometry) {
                        continue;
                    }
                    let assign = vars.add(variable().binary());
                    let (experience, preference, resilience) = affinity_values(worker, &demand.geometry);
                    pref_terms.push((assign, preference * 100.0 * length));
                    exp_terms.push((assign, experience * 100.0 * length));
                    res_terms.push((assign, resilience * 100.0 * length));
                    assigns.push(AssignVar { interval: k, worker: w, line, var: assign });
                }
            }
        }
    }

    // One staffing-offset variable per (interval, line) that has demand.
    for (k, &interval) in partition.iter().enumerate() {
        for &line in &lines {
            if let Some(demand) = demand_at(rows, line, interval) {
                if demand.required_workers > 0 {
                    let offset = vars.add(variable().min(-(demand.required_workers as f64)).max(workers.len() as f64));
                    staffing_offsets.push((offset, k, line));
                }
            }
        }
    }

    let total_preference = pref_terms.iter().fold(Expression::from(0.0), |acc, &(v, c)| acc + c * v);
    let total_experience = exp_terms.iter().fold(Expression::from(0.0), |acc, &(v, c)| acc + c * v);
    let total_resilience = res_terms.iter().fold(Expression::from(0.0), |acc, &(v, c)| acc + c * v);
    let total_staffing = staffing_offsets.iter().fold(Expression::from(0.0), |acc, &(v, _, _)| acc + v);

    let objective = config.preference_weight as f64 * total_preference.clone()
        + config.experience_weight as f64 * total_experience.clone()
        + config.resilience_weight as f64 * total_resilience.clone()
        + config.staffing_weight as f64 * total_staffing.clone();

    let mut problem = vars.maximise(objective).using(default_solver);

    // Exactly one of {not-present, assigned-to-one-line} per (interval, worker).
    for (k, _) in partition.iter().enumerate() {
        for (w, _) in workers.iter().enumerate() {
            let np = not_present[&(k, w)];
            let sum = assigns
                .iter()
                .filter(|a| a.interval == k && a.worker == w)
                .fold(Expression::from(np), |acc, a| acc + a.var);
            problem = problem.with(constraint!(sum == 1.0));
        }
    }

    for &(offset, k, line) in &staffing_offsets {
        let required = demand_at(rows, line, partition[k]).map_or(0, |d| d.required_workers);
        let assigned_sum = assigns
            .iter()
            .filter(|a| a.interval == k && a.line == line)
            .fold(Expression::from(0.0), |acc, a| acc + a.var);
        problem = problem.with(constraint!(offset == assigned_sum - required as f64));
    }

    debug!(
        "solving interval WLA model: {} intervals, {} workers, {} lines, medical relaxed={relax_medical}",
        partition.len(),
        workers.len(),
        lines.len()
    );
    let solution = match problem.solve() {
        Ok(sol) => sol,
        Err(e) => {
            warn!("WLA interval model infeasible or unsolved: {e}");
            return Ok(WlaResult { assignments: HashMap::new(), medical_constraint_relaxed: relax_medical });
        }
    };

    let mut assignments: HashMap<usize, Vec<usize>> = HashMap::new();
    for a in &assigns {
        if solution.value(a.var).round() > 0.5 {
            let entry = assignments.entry(a.line).or_default();
            if !entry.contains(&a.worker) {
                entry.push(a.worker);
            }
        }
    }
    for list in assignments.values_mut() {
        list.sort_unstable();
    }
    info!("interval WLA solved: {} lines staffed", assignments.len());
    Ok(WlaResult { assignments, medical_constraint_relaxed: relax_medical })
}

/// The coarse, whole-horizon model (§4.D.2): one binary per (worker, line)
/// for the entire planning window. Staffing is a hard `[min, max]` band, a
/// worker whose availability does not cover a line's full span is hard-
/// excluded from it, and affinity contributes as a flat per-assignment
/// weight rather than a per-interval scaled one, since this model carries no
/// interval dimension. Grounded on `temp_cp_worker_allocation.py`.
fn solve_wla_coarse(
    rows: &[LineDataRow],
    workers: &[WorkerData],
    config: &WlaConfig,
    relax_medical: bool,
) -> Result<WlaResult, WlaError> {
    let lines = lines_in_rows(rows);
    if lines.is_empty() || workers.is_empty() {
        return Ok(WlaResult { assignments: HashMap::new(), medical_constraint_relaxed: relax_medical });
    }

    let mut line_span: HashMap<usize, (i64, i64)> = HashMap::new();
    let mut min_workers: HashMap<usize, usize> = HashMap::new();
    let mut max_workers: HashMap<usize, usize> = HashMap::new();
    let mut geometries_on_line: HashMap<usize, Vec<String>> = HashMap::new();
    for &line in &lines {
        let on_line: Vec<&LineDataRow> = rows.iter().filter(|r| r.line == line).collect();
        let start = on_line.iter().map(|r| r.start).min().unwrap_or(0);
        let finish = on_line.iter().map(|r| r.finish).max().unwrap_or(0);
        line_span.insert(line, (start, finish));
        min_workers.insert(line, on_line.iter().map(|r| r.required_workers).max().unwrap_or(0));
        max_workers.insert(line, on_line.iter().map(|r| r.required_workers).sum());
        geometries_on_line.insert(line, on_line.iter().map(|r| r.geometry.clone()).collect());
    }

    let mut vars = variables!();
    let mut assigns: HashMap<(usize, usize), Variable> = HashMap::new();
    let mut terms: Vec<(Variable, f64)> = Vec::new();
    let flat_weight =
        (config.preference_weight + config.experience_weight + config.resilience_weight - config.staffing_weight) as f64;

    for (w, worker) in workers.iter().enumerate() {
        for &line in &lines {
            let span = line_span[&line];
            let covers_span = worker
                .availability
                .iter()
                .any(|&(s, e)| s <= span.0 && e >= span.1);
            if !covers_span {
                continue;
            }
            if !relax_medical {
                let disqualified = geometries_on_line[&line]
                    .iter()
                    .any(|g| !medically_fit(worker, g));
                if disqualified {
                    continue;
                }
            }
            let assign = vars.add(variable().binary());
            assigns.insert((w, line), assign);
            terms.push((assign, flat_weight));
        }
    }

    let objective = terms.iter().fold(Expression::from(0.0), |acc, &(v, c)| acc + c * v);
    let mut problem = vars.maximise(objective).using(default_solver);

    for (w, _) in workers.iter().enumerate() {
        let sum = lines.iter().filter_map(|l| assigns.get(&(w, *l))).fold(Expression::from(0.0), |acc, &v| acc + v);
        problem = problem.with(constraint!(sum <= 1.0));
    }

    for &line in &lines {
        let sum = workers
            .iter()
            .enumerate()
            .filter_map(|(w, _)| assigns.get(&(w, line)))
            .fold(Expression::from(0.0), |acc, &v| acc + v);
        let min_req = min_workers[&line] as f64;
        let max_req = max_workers[&line] as f64;
        if min_req > 0.0 {
            problem = problem.with(constraint!(sum.clone() >= min_req));
        }
        problem = problem.with(constraint!(sum <= max_req));
    }

    debug!(
        "solving coarse WLA model: {} workers, {} lines, medical relaxed={relax_medical}",
        workers.len(),
        lines.len()
    );
    let solution = match problem.solve() {
        Ok(sol) => sol,
        Err(e) => {
            warn!("WLA coarse model infeasible or unsolved: {e}");
            return Ok(WlaResult { assignments: HashMap::new(), medical_constraint_relaxed: relax_medical });
        }
    };

    let mut assignments: HashMap<usize, Vec<usize>> = HashMap::new();
    for (&(w, line), &var) in &assigns {
        if solution.value(var).round() > 0.5 {
            assignments.entry(line).or_default().push(w);
        }
    }
    for list in assignments.values_mut() {
        list.sort_unstable();
    }
    info!("coarse WLA solved: {} lines staffed", assignments.len());
    Ok(WlaResult { assignments, medical_constraint_relaxed: relax_medical })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::Affinity;

    fn row(order: usize, start: i64, finish: i64, line: usize, geometry: &str, required: usize) -> LineDataRow {
        LineDataRow { order, start, finish, line, geometry: geometry.into(), required_workers: required }
    }

    fn worker(availability: Vec<(i64, i64)>, geometry: &str, medical_ok: bool) -> WorkerData {
        let mut affinities = HashMap::new();
        affinities.insert(
            geometry.to_string(),
            Affinity { experience: 1.0, preference: 1.0, resilience: 1.0, medical_ok },
        );
        WorkerData { index: 0, affinities, availability }
    }

    #[test]
    fn available_qualified_worker_gets_assigned() {
        let rows = vec![row(0, 0, 10, 0, "g1", 1)];
        let workers = vec![worker(vec![(0, 10)], "g1", true)];
        let result = solve_wla(&rows, &workers, &WlaConfig::default()).expect("solves");
        assert_eq!(result.assignments.get(&0), Some(&vec![0]));
        assert!(!result.medical_constraint_relaxed);
    }

    #[test]
    fn medically_unfit_worker_is_excluded_without_relaxation() {
        let rows = vec![row(0, 0, 10, 0, "g1", 1)];
        let workers = vec![worker(vec![(0, 10)], "g1", false)];
        let mut config = WlaConfig::default();
        config.allow_medical_relaxation = false;
        let result = solve_wla(&rows, &workers, &config).expect("solves");
        assert!(result.assignments.get(&0).map_or(true, Vec::is_empty));
    }

    #[test]
    fn medical_relaxation_kicks_in_when_nobody_placed() {
        let rows = vec![row(0, 0, 10, 0, "g1", 1)];
        let workers = vec![worker(vec![(0, 10)], "g1", false)];
        let mut config = WlaConfig::default();
        config.allow_medical_relaxation = true;
        let result = solve_wla(&rows, &workers, &config).expect("solves");
        assert_eq!(result.assignments.get(&0), Some(&vec![0]));
        assert!(result.medical_constraint_relaxed);
    }

    #[test]
    fn unavailable_worker_is_never_assigned() {
        let rows = vec![row(0, 0, 10, 0, "g1", 1)];
        let workers = vec![worker(vec![(20, 30)], "g1", true)];
        let result = solve_wla(&rows, &workers, &WlaConfig::default()).expect("solves");
        assert!(result.assignments.get(&0).map_or(true, Vec::is_empty));
    }

    #[test]
    fn worker_with_no_affinity_record_for_the_geometry_is_excluded() {
        let rows = vec![row(0, 0, 10, 0, "g1", 1)];
        let worker_no_record = WorkerData { index: 0, affinities: HashMap::new(), availability: vec![(0, 10)] };
        let workers = vec![worker_no_record];
        let result = solve_wla(&rows, &workers, &WlaConfig::default()).expect("solves");
        assert!(result.assignments.get(&0).map_or(true, Vec::is_empty));
    }

    #[test]
    fn coarse_model_respects_staffing_band() {
        let rows = vec![row(0, 0, 10, 0, "g1", 2)];
        let workers = vec![
            worker(vec![(0, 10)], "g1", true),
            worker(vec![(0, 10)], "g1", true),
            worker(vec![(0, 10)], "g1", true),
        ];
        let mut config = WlaConfig::default();
        config.model = WlaModel::Coarse;
        let result = solve_wla(&rows, &workers, &config).expect("solves");
        let staffed = result.assignments.get(&0).map_or(0, Vec::len);
        assert!(staffed >= 2);
    }
}
