use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Execution state of a task as reported by the queue.
///
/// Variant order is the enumeration order used to break priority ties.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Received,
    Started,
    Retry,
    Success,
    Failure,
    Revoked,
}

impl TaskState {
    /// All states in enumeration order.
    pub const ALL: [TaskState; 7] = [
        Self::Pending,
        Self::Received,
        Self::Started,
        Self::Retry,
        Self::Success,
        Self::Failure,
        Self::Revoked,
    ];

    /// Convert to the wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Received => "RECEIVED",
            Self::Started => "STARTED",
            Self::Retry => "RETRY",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Revoked => "REVOKED",
        }
    }

    fn color_token(&self) -> &'static str {
        match self {
            Self::Pending => "dag-state-pending",
            Self::Received => "dag-state-received",
            Self::Started => "dag-state-started",
            Self::Retry => "dag-state-retry",
            Self::Success => "dag-state-success",
            Self::Failure => "dag-state-failure",
            Self::Revoked => "dag-state-revoked",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Received => "Received",
            Self::Started => "Started",
            Self::Retry => "Retry",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Revoked => "Revoked",
        }
    }
}

impl FromStr for TaskState {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RECEIVED" => Ok(Self::Received),
            "STARTED" => Ok(Self::Started),
            "RETRY" => Ok(Self::Retry),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "REVOKED" => Ok(Self::Revoked),
            other => Err(GraphError::UnknownState(other.to_string())),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display attributes resolved for a state.
///
/// `color` is a symbolic token the renderer maps to a concrete paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateAttributes {
    pub color: &'static str,
    pub label: &'static str,
    /// Lower is more urgent.
    pub priority: u8,
}

/// Urgency order used when no custom order is configured.
pub const DEFAULT_STATE_ORDER: [TaskState; 7] = [
    TaskState::Started,
    TaskState::Retry,
    TaskState::Failure,
    TaskState::Pending,
    TaskState::Received,
    TaskState::Success,
    TaskState::Revoked,
];

/// Canonical mapping from task state to display attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRegistry {
    /// Priority per state, indexed by enumeration position.
    priorities: [u8; 7],
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::from_permutation(&DEFAULT_STATE_ORDER)
    }
}

impl StateRegistry {
    /// Create a registry with the default urgency order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with a custom urgency order, most urgent first.
    ///
    /// The order must name every state exactly once so priorities stay
    /// pairwise distinct.
    pub fn with_order(order: &[TaskState]) -> Result<Self> {
        if order.len() != TaskState::ALL.len() {
            return Err(GraphError::InvalidStateOrder(format!(
                "expected {} states, got {}",
                TaskState::ALL.len(),
                order.len()
            )));
        }

        let mut seen = [false; 7];
        for state in order {
            let slot = &mut seen[*state as usize];
            if *slot {
                return Err(GraphError::InvalidStateOrder(format!(
                    "{} listed more than once",
                    state
                )));
            }
            *slot = true;
        }

        Ok(Self::from_permutation(order))
    }

    fn from_permutation(order: &[TaskState]) -> Self {
        let mut priorities = [0u8; 7];
        for (rank, state) in order.iter().enumerate() {
            priorities[*state as usize] = rank as u8;
        }
        Self { priorities }
    }

    /// Attributes for a known state.
    pub fn attributes_for(&self, state: TaskState) -> StateAttributes {
        StateAttributes {
            color: state.color_token(),
            label: state.label(),
            priority: self.priority(state),
        }
    }

    /// Attributes for a raw state identifier.
    pub fn attributes_for_name(&self, name: &str) -> Result<StateAttributes> {
        let state: TaskState = name.parse()?;
        Ok(self.attributes_for(state))
    }

    /// Priority of a state; lower is more urgent.
    pub fn priority(&self, state: TaskState) -> u8 {
        self.priorities[state as usize]
    }

    /// Pick the most urgent state, breaking ties by enumeration order.
    pub fn most_urgent<I>(&self, states: I) -> Option<TaskState>
    where
        I: IntoIterator<Item = TaskState>,
    {
        states
            .into_iter()
            .min_by_key(|state| (self.priority(*state), *state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_states() {
        for state in TaskState::ALL {
            assert_eq!(state.as_str().parse::<TaskState>().unwrap(), state);
        }
    }

    #[test]
    fn test_parse_unknown_state() {
        let err = "BOGUS".parse::<TaskState>().unwrap_err();
        assert_eq!(err, GraphError::UnknownState("BOGUS".to_string()));

        // Identifiers are case sensitive.
        assert!("pending".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_default_priorities_are_distinct() {
        let registry = StateRegistry::new();
        let mut priorities: Vec<u8> = TaskState::ALL
            .iter()
            .map(|s| registry.priority(*s))
            .collect();
        priorities.sort_unstable();
        priorities.dedup();
        assert_eq!(priorities.len(), TaskState::ALL.len());
    }

    #[test]
    fn test_attention_states_rank_first() {
        let registry = StateRegistry::new();
        for urgent in [TaskState::Started, TaskState::Retry, TaskState::Failure] {
            for calm in [
                TaskState::Pending,
                TaskState::Received,
                TaskState::Success,
                TaskState::Revoked,
            ] {
                assert!(registry.priority(urgent) < registry.priority(calm));
            }
        }
    }

    #[test]
    fn test_attributes_for_name() {
        let registry = StateRegistry::new();
        let attrs = registry.attributes_for_name("FAILURE").unwrap();
        assert_eq!(attrs.color, "dag-state-failure");
        assert_eq!(attrs.label, "Failure");
        assert_eq!(attrs.priority, 2);

        assert_eq!(
            registry.attributes_for_name("LOST"),
            Err(GraphError::UnknownState("LOST".to_string()))
        );
    }

    #[test]
    fn test_most_urgent() {
        let registry = StateRegistry::new();
        assert_eq!(
            registry.most_urgent([TaskState::Success, TaskState::Failure]),
            Some(TaskState::Failure)
        );
        assert_eq!(registry.most_urgent(std::iter::empty()), None);
    }

    #[test]
    fn test_custom_order() {
        let registry = StateRegistry::with_order(&[
            TaskState::Success,
            TaskState::Failure,
            TaskState::Started,
            TaskState::Retry,
            TaskState::Pending,
            TaskState::Received,
            TaskState::Revoked,
        ])
        .unwrap();

        assert_eq!(registry.priority(TaskState::Success), 0);
        assert_eq!(
            registry.most_urgent([TaskState::Success, TaskState::Failure]),
            Some(TaskState::Success)
        );
    }

    #[test]
    fn test_custom_order_rejects_duplicates_and_gaps() {
        let short = StateRegistry::with_order(&[TaskState::Started]);
        assert!(matches!(short, Err(GraphError::InvalidStateOrder(_))));

        let repeated = StateRegistry::with_order(&[
            TaskState::Started,
            TaskState::Started,
            TaskState::Failure,
            TaskState::Pending,
            TaskState::Received,
            TaskState::Success,
            TaskState::Revoked,
        ]);
        assert!(matches!(repeated, Err(GraphError::InvalidStateOrder(_))));
    }

    #[test]
    fn test_serde_uses_wire_identifiers() {
        let json = serde_json::to_string(&TaskState::Retry).unwrap();
        assert_eq!(json, "\"RETRY\"");
        let state: TaskState = serde_json::from_str("\"REVOKED\"").unwrap();
        assert_eq!(state, TaskState::Revoked);
    }
}
