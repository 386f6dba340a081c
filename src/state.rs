//! State reconciliation
//!
//! The orchestrator reports many native lifecycle states, most of them
//! transitional. This module projects them onto the model's three-state
//! lifecycle and derives the currently legal verb set, via per-resource-type
//! tables. Projection is pure: given the same native state it always yields
//! the same result and touches nothing.
//!
//! Transitional and unknown states project to `inactive` with no verbs at
//! all. Offering verbs mid-transition would race the orchestrator's own
//! state machine, so nothing is offered until a later retrieve observes a
//! steady state.

use crate::model::Category;

/// The model's three-state lifecycle projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Inactive,
    Suspended,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::Inactive => "inactive",
            LifecycleState::Suspended => "suspended",
        }
    }
}

/// Classification of a native state string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// Steady and serving.
    Running,
    /// Steady and powered off / offline.
    Stopped,
    /// Steady but suspended or paused.
    Suspended,
    /// Any in-flight transition.
    Transitional,
    /// Not in the table at all.
    Unknown,
}

/// Native-state vocabulary of one resource type.
pub struct StateTable {
    pub running: &'static [&'static str],
    pub stopped: &'static [&'static str],
    pub suspended: &'static [&'static str],
    pub transitional: &'static [&'static str],
}

impl StateTable {
    pub fn classify(&self, native: &str) -> StateClass {
        let native = native.to_ascii_lowercase();
        let hit = |set: &[&str]| set.contains(&native.as_str());
        if hit(self.running) {
            StateClass::Running
        } else if hit(self.stopped) {
            StateClass::Stopped
        } else if hit(self.suspended) {
            StateClass::Suspended
        } else if hit(self.transitional) {
            StateClass::Transitional
        } else {
            StateClass::Unknown
        }
    }
}

/// Verbs a resource type offers in each steady class. Transitional and
/// unknown classes never offer verbs, so they have no entry here.
pub struct VerbSet {
    pub running: Vec<Category>,
    pub stopped: Vec<Category>,
    pub suspended: Vec<Category>,
}

/// Result of reconciling one native state.
#[derive(Debug, Clone)]
pub struct Projection {
    pub state: LifecycleState,
    pub actions: Vec<Category>,
}

/// Project a native state onto the three-state lifecycle and the legal verb
/// set for it.
pub fn project(table: &StateTable, verbs: &VerbSet, native: &str) -> Projection {
    match table.classify(native) {
        StateClass::Running => Projection {
            state: LifecycleState::Active,
            actions: verbs.running.clone(),
        },
        StateClass::Stopped => Projection {
            state: LifecycleState::Inactive,
            actions: verbs.stopped.clone(),
        },
        StateClass::Suspended => Projection {
            state: LifecycleState::Suspended,
            actions: verbs.suspended.clone(),
        },
        StateClass::Transitional | StateClass::Unknown => Projection {
            state: LifecycleState::Inactive,
            actions: Vec::new(),
        },
    }
}

/// Virtual machine lifecycle vocabulary.
pub static COMPUTE_STATES: StateTable = StateTable {
    running: &["running", "active"],
    stopped: &["stopped", "shutoff", "terminated"],
    suspended: &["suspended", "paused"],
    transitional: &[
        "scheduling",
        "building",
        "spawning",
        "booting",
        "starting",
        "powering-on",
        "stopping",
        "powering-off",
        "rebooting",
        "rebooting-hard",
        "pausing",
        "unpausing",
        "suspending",
        "resuming",
        "rebuilding",
        "resizing",
        "resize-migrating",
        "resize-finishing",
        "resize-reverting",
        "updating-password",
        "migrating",
        "deleting",
    ],
};

/// Volume lifecycle vocabulary. An `error` status is deliberately unmapped:
/// it classifies as unknown and offers nothing.
pub static VOLUME_STATES: StateTable = StateTable {
    running: &["available", "in-use"],
    stopped: &["offline"],
    suspended: &[],
    transitional: &[
        "creating",
        "attaching",
        "detaching",
        "deleting",
        "backing-up",
        "restoring",
    ],
};

/// Network lifecycle vocabulary.
pub static NETWORK_STATES: StateTable = StateTable {
    running: &["up", "active"],
    stopped: &["down"],
    suspended: &[],
    transitional: &["building"],
};
