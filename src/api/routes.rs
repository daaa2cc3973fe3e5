use axum::extract::Json;
use axum::routing::post;
use axum::Router;

use crate::adapter::expand_schedule;
use crate::api::dto::{OrderToLineResponse, PlanningRequest, WorkerAssignmentResponse};
use crate::assembler::{assemble_full, assemble_otl};
use crate::canon::canonicalize;
use crate::error::ApiError;
use crate::otl::solve_otl;
use crate::wla::solve_wla;

/// Builds the router the binary serves. Two routes, matching the original
/// Flask resources one-to-one: `/order-to-line` runs the scheduler alone,
/// `/worker-assignment` runs the scheduler and then staffs the result.
pub fn router() -> Router {
    Router::new()
        .route("/order-to-line", post(order_to_line))
        .route("/worker-assignment", post(worker_assignment))
}

async fn order_to_line(Json(request): Json<PlanningRequest>) -> Result<Json<OrderToLineResponse>, ApiError> {
    let config = request.otl_config.clone();
    let canon = canonicalize(&request);
    let (schedule, canon) = tokio::task::spawn_blocking(move || solve_otl(&canon.orders, &config).map(|s| (s, canon)))
        .await
        .map_err(|e| ApiError::Internal(format!("solver task panicked: {e}")))??;

    let message = if schedule.is_empty() {
        "No Optimal / Feasible solution found!!".to_string()
    } else {
        "Successfully performed order-to-line operation.".to_string()
    };
    let solution = assemble_otl(&schedule, &canon);
    Ok(Json(OrderToLineResponse { message, solution }))
}

async fn worker_assignment(
    Json(request): Json<PlanningRequest>,
) -> Result<Json<WorkerAssignmentResponse>, ApiError> {
    let otl_config = request.otl_config.clone();
    let wla_config = request.wla_config.clone();
    let canon = canonicalize(&request);

    let (schedule, canon) = tokio::task::spawn_blocking(move || {
        let schedule = solve_otl(&canon.orders, &otl_config)?;
        Ok::<_, crate::error::OtlError>((schedule, canon))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("solver task panicked: {e}")))??;

    let rows = expand_schedule(&schedule, &canon);

    let (wla_result, rows, canon) = tokio::task::spawn_blocking(move || {
        let result = solve_wla(&rows, &canon.workers, &wla_config)?;
        Ok::<_, crate::error::WlaError>((result, rows, canon))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("solver task panicked: {e}")))??;

    let message = if rows.is_empty() {
        "No Optimal / Feasible solution found!!".to_string()
    } else {
        "Successfully performed worker allocation operation.".to_string()
    };
    let relaxed = wla_result.medical_constraint_relaxed;
    let solution = assemble_full(&rows, &wla_result, &canon);
    Ok(Json(WorkerAssignmentResponse {
        message,
        solution,
        medical_constraint_relaxed: relaxed,
    }))
}
