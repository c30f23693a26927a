//! Multi-step form orchestration.
//!
//! A wizard accumulates form fields across HTTP round trips in a named
//! [`WizardState`]; nothing reaches the upstream API until the final step.
//! Step ordering is strict: a submission for a step the user has not
//! reached yet is rejected, and resubmitting an earlier step overwrites
//! only that step's fields before resuming from the one after it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Static description of one wizard: its session key, step count, and the
/// upstream path its accumulated payload is posted to on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardDef {
    pub key: &'static str,
    pub steps: u32,
    pub commit_path: &'static str,
}

/// The wizards this front-end drives.
pub const WIZARDS: &[WizardDef] = &[
    WizardDef {
        key: "offering",
        steps: 4,
        commit_path: "/ofertas",
    },
    WizardDef {
        key: "thesis",
        steps: 3,
        commit_path: "/tccs",
    },
    WizardDef {
        key: "internship",
        steps: 2,
        commit_path: "/estagios",
    },
];

pub fn find(name: &str) -> Option<&'static WizardDef> {
    WIZARDS.iter().find(|def| def.key == name)
}

/// In-progress wizard submission. Lives in the session under the wizard's
/// key; fields accumulate monotonically across steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    pub step: u32,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Fields merged; the user moves on to `next`.
    Advanced { next: u32 },
    /// Final step merged; `payload` is the union of every submitted field.
    /// The state is left intact so a failed commit loses nothing.
    ReadyToCommit { payload: Value },
    /// Submission for a step the user has not reached (or an invalid step
    /// number); the state is untouched.
    OutOfSequence { current: u32 },
}

impl WizardDef {
    pub fn begin(&self) -> WizardState {
        WizardState {
            step: 1,
            fields: Map::new(),
        }
    }

    /// Clamps a requested step for rendering: steps the user has not
    /// reached yet render as the current step instead.
    pub fn render_step(&self, state: &WizardState, requested: Option<u32>) -> u32 {
        match requested {
            Some(step) if step >= 1 && step <= state.step => step,
            _ => state.step,
        }
    }

    pub fn submit_step(
        &self,
        state: &mut WizardState,
        step: u32,
        fields: Map<String, Value>,
    ) -> StepOutcome {
        if step < 1 || step > self.steps || step > state.step {
            return StepOutcome::OutOfSequence {
                current: state.step,
            };
        }

        for (key, value) in fields {
            state.fields.insert(key, value);
        }

        if step == self.steps {
            StepOutcome::ReadyToCommit {
                payload: Value::Object(state.fields.clone()),
            }
        } else {
            state.step = step + 1;
            StepOutcome::Advanced { next: state.step }
        }
    }

    /// Explicit `action=back` transition; saturates at step 1.
    pub fn step_back(&self, state: &mut WizardState) {
        state.step = state.step.saturating_sub(1).max(1);
    }
}
