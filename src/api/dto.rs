use serde::Serialize;

use crate::assembler::AssembledEntry;

pub use crate::canon::PlanningRequest;

#[derive(Debug, Clone, Serialize)]
pub struct OrderToLineResponse {
    pub message: String,
    pub solution: Vec<AssembledEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerAssignmentResponse {
    pub message: String,
    pub solution: Vec<AssembledEntry>,
    pub medical_constraint_relaxed: bool,
}
