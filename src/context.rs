// ==============================================================================
// context.rs - Per-Request Processing Context
// ==============================================================================
// Description: Request identity and lifecycle state for one gateway request
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

use std::fmt;

use tracing::debug;
use uuid::Uuid;

use crate::identity::SubjectId;

/// Lifecycle of a single request through the gateway.
///
/// ```text
/// Received -> [Authenticating] -> Routed -> Forwarding -> Relaying -> Completed
///                   |                 \__________\___________\
///                   v                                         v
///               Rejected                                    Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Authenticating,
    Routed,
    Forwarding,
    Relaying,
    Completed,
    Rejected,
    Failed,
}

impl RequestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPhase::Received => "received",
            RequestPhase::Authenticating => "authenticating",
            RequestPhase::Routed => "routed",
            RequestPhase::Forwarding => "forwarding",
            RequestPhase::Relaying => "relaying",
            RequestPhase::Completed => "completed",
            RequestPhase::Rejected => "rejected",
            RequestPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestPhase::Completed | RequestPhase::Rejected | RequestPhase::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_advance_to(&self, next: RequestPhase) -> bool {
        use RequestPhase::*;

        matches!(
            (self, next),
            (Received, Authenticating)
                | (Received, Routed)
                | (Received, Failed)
                | (Authenticating, Routed)
                | (Authenticating, Rejected)
                | (Routed, Forwarding)
                | (Routed, Failed)
                | (Forwarding, Relaying)
                | (Forwarding, Failed)
                | (Relaying, Completed)
                | (Relaying, Failed)
        )
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned by exactly one request task; never shared
#[derive(Debug)]
pub struct RequestContext {
    request_id: Uuid,
    phase: RequestPhase,
    subject: Option<SubjectId>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            phase: RequestPhase::Received,
            subject: None,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    pub fn set_subject(&mut self, subject: SubjectId) {
        self.subject = Some(subject);
    }

    /// Move to `next`, ignoring illegal transitions (logged at debug)
    pub fn advance(&mut self, next: RequestPhase) {
        if self.phase.can_advance_to(next) {
            debug!("{} -> {}", self.phase, next);
            self.phase = next;
        } else {
            debug!("ignored transition {} -> {}", self.phase, next);
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
