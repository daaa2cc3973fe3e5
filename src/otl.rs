use good_lp::{constraint, default_solver, variable, variables, Solution, SolverModel, Variable};
use log::{debug, info, warn};

use crate::canon::CanonicalOrder;
use crate::config::OtlConfig;
use crate::error::OtlError;

/// One placed order in the resulting schedule.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub order: usize,
    pub start: i64,
    pub finish: i64,
    pub line: usize,
}

struct AltVars {
    order: usize,
    line: usize,
    duration: i64,
    due: i64,
    present: Variable,
    start: Variable,
    end: Variable,
}

/// Solves the order-to-line placement problem.
///
/// Reformulates the original CP-SAT model (optional intervals, `AddNoOverlap`,
/// `AddExactlyOne`, max-equality for tardiness/makespan) as an equivalent MIP:
/// optional intervals become big-M-gated equalities tying a shared
/// `order_start`/`order_end` pair to whichever alternative's own interval is
/// selected; `NoOverlap` becomes pairwise big-M disjunctions guarded by a
/// `before` indicator and both alternatives' presence; the two max-equality
/// terms (tardiness, makespan) drop out for free because minimizing a
/// lower-bounded variable pins it to the true maximum.
pub fn solve_otl(orders: &[CanonicalOrder], config: &OtlConfig) -> Result<Vec<ScheduleEntry>, OtlError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    for order in orders {
        if order.alternatives.is_empty() {
            return Err(OtlError::NoAlternatives(order.index));
        }
    }

    let horizon: i64 = orders
        .iter()
        .map(|o| o.alternatives.iter().map(|a| a.duration_hours).max().unwrap_or(0))
        .sum();
    let big_m = horizon.max(1) as f64;

    let mut vars = variables!();
    let makespan = vars.add(variable().min(0).max(horizon as f64));
    let total_tardiness = vars.add(variable().min(0).max((horizon * orders.len() as i64) as f64));

    let order_starts: Vec<Variable> = orders
        .iter()
        .map(|_| vars.add(variable().min(0).max(horizon as f64)))
        .collect();
    let order_ends: Vec<Variable> = orders
        .iter()
        .map(|_| vars.add(variable().min(0).max(horizon as f64)))
        .collect();
    let order_tardiness: Vec<Variable> = orders
        .iter()
        .map(|_| vars.add(variable().min(0).max(horizon as f64)))
        .collect();

    let mut alt_vars: Vec<AltVars> = Vec::new();
    for (oi, order) in orders.iter().enumerate() {
        for alt in &order.alternatives {
            let present = vars.add(variable().binary());
            let start = vars.add(variable().min(0).max(horizon as f64));
            let end = vars.add(variable().min(0).max(horizon as f64));
            alt_vars.push(AltVars {
                order: oi,
                line: alt.line,
                duration: alt.duration_hours,
                due: alt.due_hours,
                present,
                start,
                end,
            });
        }
    }

    let objective = config.makespan_weight.max(1) as f64 * makespan
        + config.tardiness_weight.max(1) as f64 * total_tardiness;
    let mut problem = vars.minimise(objective).using(default_solver);

    // Fixed-length intervals: each alternative's own end = start + duration,
    // independent of whether it ends up selected.
    for av in &alt_vars {
        problem = problem.with(constraint!(av.end - av.start == av.duration as f64));
    }

    // Tie the shared order start/end to whichever alternative is present.
    for av in &alt_vars {
        problem = problem.with(constraint!(
            order_starts[av.order] - av.start <= big_m * (1.0 - av.present)
        ));
        problem = problem.with(constraint!(
            av.start - order_starts[av.order] <= big_m * (1.0 - av.present)
        ));
        problem = problem.with(constraint!(
            order_ends[av.order] - av.end <= big_m * (1.0 - av.present)
        ));
        problem = problem.with(constraint!(
            av.end - order_ends[av.order] <= big_m * (1.0 - av.present)
        ));
        // Tardiness lower bound binds only for the selected alternative;
        // minimizing total_tardiness pins the rest to their true value.
        problem = problem.with(constraint!(
            order_tardiness[av.order] >= av.end - av.due as f64 - big_m * (1.0 - av.present)
        ));
    }

    // Exactly one alternative per order.
    for oi in 0..orders.len() {
        let presences: Vec<Variable> = alt_vars
            .iter()
            .filter(|av| av.order == oi)
            .map(|av| av.present)
            .collect();
        let sum = presences.into_iter().fold(good_lp::Expression::from(0.0), |acc, p| acc + p);
        problem = problem.with(constraint!(sum == 1.0));
    }

    // NoOverlap per line: every pair of alternatives from distinct orders
    // sharing a line cannot both run if both are selected.
    let line_count = alt_vars.iter().map(|av| av.line).max().map_or(0, |m| m + 1);
    for line in 0..line_count {
        let entries: Vec<&AltVars> = alt_vars.iter().filter(|av| av.line == line).collect();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let a = entries[i];
                let b = entries[j];
                if a.order == b.order {
                    continue;
                }
                let before = vars.add(variable().binary());
                problem = problem.with(constraint!(
                    b.start - a.end >= -big_m * before - big_m * (2.0 - a.present - b.present)
                ));
                problem = problem.with(constraint!(
                    a.start - b.end >= -big_m * (1.0 - before) - big_m * (2.0 - a.present - b.present)
                ));
            }
        }
    }

    // Priority precedence: every priority alternative's order must not start
    // later than every non-priority alternative's order. Modeled directly on
    // order_start since at most one alternative per order is ever selected.
    for (i, oi) in orders.iter().enumerate() {
        let i_is_priority = oi.alternatives.iter().any(|a| a.priority_bit);
        if !i_is_priority {
            continue;
        }
        for (j, oj) in orders.iter().enumerate() {
            if i == j {
                continue;
            }
            let j_is_non_priority = oj.alternatives.iter().any(|a| !a.priority_bit);
            if !j_is_non_priority {
                continue;
            }
            problem = problem.with(constraint!(order_starts[i] <= order_starts[j]));
        }
    }

    for &ov in &order_ends {
        problem = problem.with(constraint!(makespan >= ov));
    }
    let tardiness_sum = order_tardiness
        .iter()
        .fold(good_lp::Expression::from(0.0), |acc, &t| acc + t);
    problem = problem.with(constraint!(total_tardiness == tardiness_sum));

    debug!("solving OTL model: {} orders, {} alternatives, horizon {horizon}", orders.len(), alt_vars.len());
    let solution = match problem.solve() {
        Ok(sol) => sol,
        Err(e) => {
            warn!("OTL model infeasible or unsolved: {e}");
            return Ok(Vec::new());
        }
    };

    let mut schedule = Vec::new();
    for av in &alt_vars {
        if solution.value(av.present).round() > 0.5 {
            schedule.push(ScheduleEntry {
                order: orders[av.order].index,
                start: solution.value(av.start).round() as i64,
                finish: solution.value(av.end).round() as i64,
                line: av.line,
            });
        }
    }
    info!("OTL solved: {} entries placed", schedule.len());
    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::Alternative;

    fn order(idx: usize, alts: Vec<Alternative>) -> CanonicalOrder {
        CanonicalOrder { index: idx, alternatives: alts }
    }

    #[test]
    fn single_order_single_alternative_places_it_at_zero() {
        let orders = vec![order(
            0,
            vec![Alternative { duration_hours: 5, line: 0, priority_bit: false, due_hours: 10 }],
        )];
        let schedule = solve_otl(&orders, &OtlConfig::default()).expect("solves");
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].start, 0);
        assert_eq!(schedule[0].finish, 5);
        assert_eq!(schedule[0].line, 0);
    }

    #[test]
    fn two_orders_same_line_do_not_overlap() {
        let orders = vec![
            order(0, vec![Alternative { duration_hours: 4, line: 0, priority_bit: false, due_hours: 100 }]),
            order(1, vec![Alternative { duration_hours: 4, line: 0, priority_bit: false, due_hours: 100 }]),
        ];
        let schedule = solve_otl(&orders, &OtlConfig::default()).expect("solves");
        assert_eq!(schedule.len(), 2);
        let (a, b) = (&schedule[0], &schedule[1]);
        assert!(a.finish <= b.start || b.finish <= a.start);
    }

    #[test]
    fn priority_order_starts_before_non_priority_sharing_a_line() {
        let orders = vec![
            order(0, vec![Alternative { duration_hours: 10, line: 0, priority_bit: true, due_hours: 20 }]),
            order(1, vec![Alternative { duration_hours: 5, line: 0, priority_bit: false, due_hours: 20 }]),
        ];
        let schedule = solve_otl(&orders, &OtlConfig::default()).expect("solves");
        let a = schedule.iter().find(|e| e.order == 0).expect("priority order placed");
        let b = schedule.iter().find(|e| e.order == 1).expect("non-priority order placed");
        assert_eq!(a.start, 0);
        assert_eq!(a.finish, 10);
        assert_eq!(b.start, 10);
        assert_eq!(b.finish, 15);
    }

    #[test]
    fn empty_orders_give_empty_schedule() {
        let schedule = solve_otl(&[], &OtlConfig::default()).expect("solves");
        assert!(schedule.is_empty());
    }

    #[test]
    fn order_without_alternatives_is_an_error() {
        let orders = vec![order(0, vec![])];
        let err = solve_otl(&orders, &OtlConfig::default()).unwrap_err();
        assert!(matches!(err, OtlError::NoAlternatives(0)));
    }
}
