//! Errors shared by the planning solvers

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors a lateral or longitudinal solver may report.
///
/// Solvers may also return non-finite values without an error, callers check
/// for those separately.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("The problem has no feasible solution")]
    Infeasible,

    #[error("The solver did not converge after {0} iterations")]
    NotConverged(usize),

    #[error("Invalid solver input: {0}")]
    InvalidInput(String),
}
