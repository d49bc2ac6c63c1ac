use crate::artifacts::ArtifactStore;
use crate::fields::UsedFields;
use std::collections::HashMap;

/// Progress of the manual login handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginState {
    #[default]
    NoLogin,
    Detected,
    AwaitingManual,
    Completed,
}

/// Mutable state threaded through one plan run.
pub struct ExecutionContext {
    pub current_step_index: usize,
    pub login: LoginState,
    /// Set once the handshake ran inside the current step.
    pub skip_remaining_login_actions: bool,
    pub used_fields: UsedFields,
    pub credentials: HashMap<String, String>,
    /// Phrase of the most recent text lookup that found nothing.
    pub last_failed_text: Option<String>,
    /// Most recent `if_*` outcome, consumed by a following `else`.
    pub last_condition: Option<bool>,
    pub artifacts: ArtifactStore,
}

impl ExecutionContext {
    pub fn new(credentials: HashMap<String, String>, artifacts: ArtifactStore) -> Self {
        Self {
            current_step_index: 0,
            login: LoginState::NoLogin,
            skip_remaining_login_actions: false,
            used_fields: UsedFields::default(),
            credentials,
            last_failed_text: None,
            last_condition: None,
            artifacts,
        }
    }

    pub fn login_completed(&self) -> bool {
        self.login == LoginState::Completed
    }

    /// Reset per-step state before entering the step at `index`.
    pub fn enter_step(&mut self, index: usize) {
        self.current_step_index = index;
        self.skip_remaining_login_actions = false;
        self.used_fields.clear();
        self.last_failed_text = None;
        self.last_condition = None;
    }
}
