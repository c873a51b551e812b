//! Conversational batch state — one small state machine per requester.
//!
//! A requester enters batch mode, is asked for the start link, then for
//! the count. Invalid input re-prompts without losing the session; a valid
//! count consumes the session and yields a launchable request. At most one
//! session exists per requester; re-entering batch mode replaces it.

use crate::types::{MessageRef, RequesterId};

use super::MediaRelay;

/// What to ask (or re-ask) the requester next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchPrompt {
    /// Ask for the link to the first message of the range
    AskStartLink,
    /// Ask for the number of messages to process
    AskCount,
    /// The link did not parse; ask for it again
    InvalidLink,
    /// The count was not a positive number; ask for it again
    InvalidCount,
}

/// Result of feeding one line of requester input into the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAdvance {
    /// The session needs more input
    Prompt(BatchPrompt),
    /// The session is complete; launch a batch with these parameters
    Launch {
        /// Validated start link
        start_reference: String,
        /// Number of messages to process
        count: u32,
    },
}

/// Per-requester conversational state
#[derive(Clone, Debug)]
pub(crate) struct BatchSession {
    step: SessionStep,
}

#[derive(Clone, Debug)]
enum SessionStep {
    AwaitingLink,
    AwaitingCount { start_reference: String },
}

impl MediaRelay {
    /// Enter batch mode for `requester`, replacing any previous session.
    pub fn begin_batch(&self, requester: RequesterId) -> BatchPrompt {
        self.lock_sessions().insert(
            requester,
            BatchSession {
                step: SessionStep::AwaitingLink,
            },
        );
        BatchPrompt::AskStartLink
    }

    /// Feed one line of requester input into their batch session.
    ///
    /// Returns `None` when the requester has no session (the input belongs
    /// to some other flow). Invalid input keeps the session alive and
    /// re-prompts; a valid count destroys the session and returns the
    /// launch parameters.
    pub fn advance_batch(&self, requester: RequesterId, input: &str) -> Option<SessionAdvance> {
        let mut sessions = self.lock_sessions();
        let session = sessions.get_mut(&requester)?;

        let input = input.trim();
        match &session.step {
            SessionStep::AwaitingLink => {
                if MessageRef::parse(input).is_err() {
                    return Some(SessionAdvance::Prompt(BatchPrompt::InvalidLink));
                }
                session.step = SessionStep::AwaitingCount {
                    start_reference: input.to_string(),
                };
                Some(SessionAdvance::Prompt(BatchPrompt::AskCount))
            }
            SessionStep::AwaitingCount { start_reference } => {
                let count: u32 = match input.parse() {
                    Ok(n) if n > 0 => n,
                    _ => return Some(SessionAdvance::Prompt(BatchPrompt::InvalidCount)),
                };
                let start_reference = start_reference.clone();
                sessions.remove(&requester);
                Some(SessionAdvance::Launch {
                    start_reference,
                    count,
                })
            }
        }
    }

    /// Explicitly abandon the requester's batch session.
    ///
    /// Returns whether a session existed.
    pub fn cancel_batch_session(&self, requester: RequesterId) -> bool {
        self.lock_sessions().remove(&requester).is_some()
    }

    /// Whether the requester currently has a batch session.
    pub fn has_batch_session(&self, requester: RequesterId) -> bool {
        self.lock_sessions().contains_key(&requester)
    }

    fn lock_sessions(
        &self,
    ) -> std::sync::MutexGuard<'_, std::collections::HashMap<RequesterId, BatchSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
