//! Presentation collaborator. Purely observational: nothing it does flows
//! back into a run.

use crate::record::{RunStatus, StepRecord};
use anoncodex_model::GenerationResult;

pub trait Presenter {
    /// Every model call's result, before it is interpreted
    fn generation(&self, _result: &GenerationResult) {}

    /// A reply that contained no actions
    fn unparsed(&self, _raw: &str) {}

    /// An action was applied
    fn step(&self, _record: &StepRecord) {}

    /// The run moved to `status`
    fn status(&self, _status: RunStatus) {}
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}

impl<P: Presenter + ?Sized> Presenter for &P {
    fn generation(&self, result: &GenerationResult) {
        (**self).generation(result)
    }

    fn unparsed(&self, raw: &str) {
        (**self).unparsed(raw)
    }

    fn step(&self, record: &StepRecord) {
        (**self).step(record)
    }

    fn status(&self, status: RunStatus) {
        (**self).status(status)
    }
}
