//! Agent lifecycle transition rules.
//!
//! `created -> active <-> inactive -> deleted`, with `created -> deleted`
//! also allowed. `deleted` is terminal. The dispatcher is the only caller;
//! the registry never changes status on its own.

use agency_protocols::spec::AgentStatus;

/// Whether a lifecycle transition is legal.
pub fn can_transition(from: AgentStatus, to: AgentStatus) -> bool {
    use AgentStatus::*;
    matches!(
        (from, to),
        (Created, Active)
            | (Inactive, Active)
            | (Active, Inactive)
            | (Created, Deleted)
            | (Active, Deleted)
            | (Inactive, Deleted)
    )
}
