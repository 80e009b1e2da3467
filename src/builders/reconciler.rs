use crate::builders::pipeline::{FormatterFailure, PipelineOutcome};

/// What to do with one file after its pipeline ran.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconciliationDecision {
    pub update_staged: bool,
    pub update_working: bool,
    pub warning: Option<String>,
}

/// Decides which copies of a file receive the formatted content.
///
/// The staged snapshot is what the user asked to format, so it is always
/// updated when the content changed. The working-tree file only follows when
/// it still holds exactly what was staged. Otherwise the user has unstaged
/// edits there, and overwriting them would lose work.
pub struct Reconciler {
    update_working_tree: bool,
}

impl Reconciler {
    /// # Arguments
    /// * `update_working_tree`: `false` keeps every working-tree file untouched
    ///   (`--no-update-working-tree`).
    pub fn new(update_working_tree: bool) -> Self {
        Self { update_working_tree }
    }

    /// # Arguments
    /// * `path`: The file, used in the divergence warning.
    /// * `original_staged`: The staged content the pipeline started from.
    /// * `original_working`: The working-tree content now, or `None` when the
    ///   file is absent from the working tree.
    /// * `outcome`: The pipeline result.
    ///
    /// # Returns
    /// The decision, or the pipeline's failure, which is fatal to the run.
    pub fn reconcile(
        &self,
        path: &str,
        original_staged: &[u8],
        original_working: Option<&[u8]>,
        outcome: &PipelineOutcome,
    ) -> Result<ReconciliationDecision, FormatterFailure> {
        if let Some(failure) = &outcome.failure {
            return Err(failure.clone());
        }

        if !outcome.changed {
            return Ok(ReconciliationDecision::default());
        }

        let mut decision = ReconciliationDecision {
            update_staged: true,
            ..Default::default()
        };

        if !self.update_working_tree {
            return Ok(decision);
        }

        match original_working {
            Some(working) if working == original_staged => decision.update_working = true,
            Some(_) => {
                decision.warning = Some(format!(
                    "warning: could not apply formatting changes to working tree file {path}: \
                     it has unstaged changes; the formatted content was staged only"
                ));
            }
            None => {}
        }

        Ok(decision)
    }
}
