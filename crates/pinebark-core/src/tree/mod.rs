//! Tree agents and their life-cycle state.
//!
//! This module provides the agent types for the forest simulation:
//! - [`AgentId`]: Stable identifier used as spatial key and scheduler tie-break
//! - [`LifeStatus`]: The `Healthy -> Attacked -> Dead` state machine
//! - [`StatusMask`]: Sets of statuses for neighbor filtering
//! - [`TreeState`]: Biological state of one tree
//! - [`Tree`]: A located tree with its state and step event handle
//!
//! # Example
//!
//! ```
//! use pinebark_core::tree::{AgentId, LifeStatus, Tree, TreeState};
//! use glam::DVec2;
//!
//! let tree = Tree::new(AgentId::new(3), DVec2::new(10.0, 20.0), TreeState::healthy(40.0, 0.8));
//!
//! assert_eq!(tree.id().as_u64(), 3);
//! assert_eq!(tree.state().status, LifeStatus::Healthy);
//! ```

pub mod policy;

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::scheduler::EventHandle;

pub use policy::{InfestationPolicy, NeighborPressure, NeighborPressureConfig, StepRules};

/// Unique identifier for a tree.
///
/// Ids are assigned monotonically by the forest and never reused. Their
/// numeric order is the deterministic tie-break for events scheduled at the
/// same time.
///
/// # Example
///
/// ```
/// use pinebark_core::tree::AgentId;
///
/// let a = AgentId::new(1);
/// let b = AgentId::new(2);
///
/// assert!(a < b);
/// assert_eq!(a.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(u64);

impl AgentId {
    /// Creates a new `AgentId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({})", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AgentId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<AgentId> for u64 {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

/// Life status of a tree.
///
/// Transitions are linear: `Healthy -> Attacked -> Dead`. A dead tree never
/// comes back, and no status is skipped on the way forward except through
/// explicit multi-step updates that pass each stage in order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    /// No beetles
    Healthy,
    /// Under beetle attack, losing resistance
    Attacked,
    /// Killed; inert for the rest of the run
    Dead,
}

impl LifeStatus {
    /// All statuses in life-cycle order.
    pub const ALL: [Self; 3] = [Self::Healthy, Self::Attacked, Self::Dead];

    /// Returns true if a tree may move from `self` to `next`.
    ///
    /// Staying put is always allowed. Moving forward is allowed from
    /// `Healthy` to `Attacked` and from `Attacked` to `Dead`; an attacked
    /// tree that dies within the tick it was attacked goes through both.
    #[must_use]
    pub const fn can_become(self, next: Self) -> bool {
        (self as u8) <= (next as u8)
    }

    /// Returns true for statuses that still take part in the simulation.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        !matches!(self, Self::Dead)
    }

    /// The single-status mask for this status.
    #[must_use]
    pub const fn mask(self) -> StatusMask {
        match self {
            Self::Healthy => StatusMask::HEALTHY,
            Self::Attacked => StatusMask::ATTACKED,
            Self::Dead => StatusMask::DEAD,
        }
    }
}

impl fmt::Display for LifeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "Healthy"),
            Self::Attacked => write!(f, "Attacked"),
            Self::Dead => write!(f, "Dead"),
        }
    }
}

bitflags::bitflags! {
    /// A set of [`LifeStatus`] values, used to filter neighbor queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StatusMask: u8 {
        /// Healthy trees
        const HEALTHY = 1 << 0;
        /// Attacked trees
        const ATTACKED = 1 << 1;
        /// Dead trees
        const DEAD = 1 << 2;
        /// Trees that are still alive
        const LIVE = Self::HEALTHY.bits() | Self::ATTACKED.bits();
    }
}

impl StatusMask {
    /// Returns true if `status` is in the set.
    #[must_use]
    pub const fn matches(self, status: LifeStatus) -> bool {
        self.contains(status.mask())
    }
}

/// Biological state of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeState {
    /// Trunk diameter at breast height; fixed at creation
    pub diameter: f64,
    /// Remaining resistance to attack, in `[0, max_resistance]`
    pub resistance: f64,
    /// Number of beetles infesting the tree
    pub infestation: u32,
    /// Current life status
    pub status: LifeStatus,
}

impl TreeState {
    /// A healthy, uninfested tree.
    #[must_use]
    pub const fn healthy(diameter: f64, resistance: f64) -> Self {
        Self {
            diameter,
            resistance,
            infestation: 0,
            status: LifeStatus::Healthy,
        }
    }

    /// The state after beetles attack a healthy tree.
    ///
    /// The first attack brings at least one beetle. States that are already
    /// attacked or dead are returned unchanged.
    #[must_use]
    pub fn attacked(self) -> Self {
        match self.status {
            LifeStatus::Healthy => Self {
                infestation: self.infestation.max(1),
                status: LifeStatus::Attacked,
                ..self
            },
            LifeStatus::Attacked | LifeStatus::Dead => self,
        }
    }

    /// The terminal state; resistance and infestation are frozen.
    #[must_use]
    pub fn dead(self) -> Self {
        Self {
            status: LifeStatus::Dead,
            ..self
        }
    }
}

/// A tree agent: a stationary position plus biological state.
///
/// Trees never move after planting. The forest owns all trees; the tree
/// keeps the handle of its repeating step event so the step can stop it.
#[derive(Debug, Clone)]
pub struct Tree {
    id: AgentId,
    position: DVec2,
    state: TreeState,
    event: Option<EventHandle>,
}

impl Tree {
    /// Creates a new tree without a scheduled event.
    #[must_use]
    pub fn new(id: AgentId, position: DVec2, state: TreeState) -> Self {
        Self {
            id,
            position,
            state,
            event: None,
        }
    }

    /// Returns the tree's id.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Returns the tree's position.
    #[must_use]
    pub const fn position(&self) -> DVec2 {
        self.position
    }

    /// Returns the tree's current state.
    #[must_use]
    pub const fn state(&self) -> &TreeState {
        &self.state
    }

    /// Returns the tree's status.
    #[must_use]
    pub const fn status(&self) -> LifeStatus {
        self.state.status
    }

    /// Returns true unless the tree is dead.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.state.status.is_alive()
    }

    /// Returns the handle of the tree's step event, if one is scheduled.
    #[must_use]
    pub fn event(&self) -> Option<&EventHandle> {
        self.event.as_ref()
    }

    pub(crate) fn attach_event(&mut self, handle: EventHandle) {
        self.event = Some(handle);
    }

    /// Replace the state, enforcing the life-cycle invariants.
    ///
    /// # Panics
    ///
    /// Panics if the update moves the status backwards, or changes the
    /// infestation of a dead tree or lowers it for a living one. Both are
    /// programming defects in a policy or caller.
    pub(crate) fn commit(&mut self, next: TreeState) {
        assert!(
            self.state.status.can_become(next.status),
            "tree {} cannot go from {} to {}",
            self.id,
            self.state.status,
            next.status
        );
        assert!(
            next.infestation >= self.state.infestation,
            "tree {} infestation decreased from {} to {}",
            self.id,
            self.state.infestation,
            next.infestation
        );
        assert!(
            self.state.status.is_alive() || next == self.state,
            "tree {} changed after death",
            self.id
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_ordering_and_display() {
        let a = AgentId::new(2);
        assert!(AgentId::new(1) < a);
        assert_eq!(format!("{a}"), "2");
        assert_eq!(format!("{a:?}"), "AgentId(2)");
        assert_eq!(u64::from(a), 2);
        assert_eq!(AgentId::from(2), a);
    }

    #[test]
    fn status_transitions_are_forward_only() {
        use LifeStatus::{Attacked, Dead, Healthy};
        assert!(Healthy.can_become(Healthy));
        assert!(Healthy.can_become(Attacked));
        assert!(Attacked.can_become(Dead));
        assert!(!Attacked.can_become(Healthy));
        assert!(!Dead.can_become(Attacked));
        assert!(!Dead.can_become(Healthy));
    }

    #[test]
    fn status_mask_matches() {
        assert!(StatusMask::LIVE.matches(LifeStatus::Healthy));
        assert!(StatusMask::LIVE.matches(LifeStatus::Attacked));
        assert!(!StatusMask::LIVE.matches(LifeStatus::Dead));
        assert!(StatusMask::ATTACKED.matches(LifeStatus::Attacked));
        assert!(!StatusMask::ATTACKED.matches(LifeStatus::Healthy));
    }

    #[test]
    fn attacked_state_brings_a_beetle() {
        let state = TreeState::healthy(30.0, 0.5).attacked();
        assert_eq!(state.status, LifeStatus::Attacked);
        assert_eq!(state.infestation, 1);
        let again = state.attacked();
        assert_eq!(again, state);
        let dead = state.dead();
        assert_eq!(dead.attacked(), dead);
    }

    #[test]
    fn commit_accepts_forward_moves() {
        let mut tree = Tree::new(AgentId::new(0), DVec2::ZERO, TreeState::healthy(10.0, 1.0));
        let attacked = tree.state().attacked();
        tree.commit(attacked);
        assert_eq!(tree.status(), LifeStatus::Attacked);
        tree.commit(tree.state().dead());
        assert!(!tree.is_alive());
    }

    #[test]
    #[should_panic(expected = "cannot go from Dead to Attacked")]
    fn commit_rejects_resurrection() {
        let mut tree = Tree::new(AgentId::new(0), DVec2::ZERO, TreeState::healthy(10.0, 1.0).dead());
        tree.commit(TreeState {
            status: LifeStatus::Attacked,
            ..*tree.state()
        });
    }

    #[test]
    fn tree_state_serializes() {
        let state = TreeState::healthy(12.5, 0.25).attacked();
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"attacked\""));
        let back: TreeState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
