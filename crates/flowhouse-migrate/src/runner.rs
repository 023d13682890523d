//! Sequential step runner.

use tracing::{debug, info};

use crate::driver::Database;
use crate::error::{MigrateError, Result};
use crate::steps::Step;

/// Outcome of a runner pass over the plan.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    /// Steps in the plan.
    pub total: usize,
    /// Steps whose applier actually ran.
    pub applied: usize,
}

/// Drive the steps in order against the database.
///
/// A step's applier runs iff its check query reports the post-state missing
/// (falsy value or no row). Any failure aborts the remainder of the
/// sequence; the next run resumes from the first still-unapplied step, since
/// state lives only in the database.
pub async fn run(db: &dyn Database, steps: &[Step]) -> Result<RunReport> {
    let mut applied = 0;
    for (idx, step) in steps.iter().enumerate() {
        debug!("checking step {}/{}: {}", idx + 1, steps.len(), step.name());
        let done = db
            .check(step.check_query(), step.check_args())
            .await
            .map_err(|e| MigrateError::check_failed(step.name(), e))?;
        if done {
            debug!("step already applied: {}", step.name());
            continue;
        }
        info!("applying step {}/{}: {}", idx + 1, steps.len(), step.name());
        step.apply(db)
            .await
            .map_err(|e| MigrateError::apply_failed(step.name(), e))?;
        applied += 1;
    }
    if applied == 0 {
        info!("schema is up to date ({} steps checked)", steps.len());
    } else {
        info!("applied {applied} of {} steps", steps.len());
    }
    Ok(RunReport { total: steps.len(), applied })
}
