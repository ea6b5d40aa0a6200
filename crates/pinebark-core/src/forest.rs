//! The forest: every tree, the spatial index over living trees, and the
//! run's random stream.
//!
//! `Forest` is the context value the scheduler hands to tree step
//! callbacks. All mutation of tree state goes through it, which keeps the
//! spatial field and the tree table consistent: a tree is in the field
//! exactly while it is alive.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use glam::DVec2;
//! use pinebark_core::forest::Forest;
//! use pinebark_core::tree::{LifeStatus, NeighborPressure, StatusMask, TreeState};
//! use pinebark_core::ForestConfig;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let config = ForestConfig::default();
//! let mut forest = Forest::new(
//!     &config,
//!     Arc::new(NeighborPressure::default()),
//!     ChaCha8Rng::seed_from_u64(0),
//! )
//! .unwrap();
//!
//! let a = forest.plant(DVec2::new(10.0, 10.0), TreeState::healthy(30.0, 0.5)).unwrap();
//! let b = forest.plant(DVec2::new(14.0, 10.0), TreeState::healthy(30.0, 0.5)).unwrap();
//! forest.attack(b).unwrap();
//!
//! let view = forest.neighborhood();
//! assert_eq!(view.count_within(DVec2::new(10.0, 10.0), 5.0, StatusMask::ATTACKED, Some(a)), 1);
//! assert_eq!(forest.counts().of(LifeStatus::Attacked), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use canopy::SpatialField;
use glam::DVec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::ForestConfig;
use crate::error::{Result, SimError};
use crate::observer::StateCounts;
use crate::scheduler::EventHandle;
use crate::tree::policy::next_state;
use crate::tree::{AgentId, InfestationPolicy, LifeStatus, StatusMask, StepRules, Tree, TreeState};

/// All trees of one run plus the spatial index over the living ones.
pub struct Forest {
    trees: BTreeMap<AgentId, Tree>,
    field: SpatialField<AgentId>,
    rng: ChaCha8Rng,
    policy: Arc<dyn InfestationPolicy>,
    rules: StepRules,
    neighbor_radius: f64,
    next_id: u64,
}

impl fmt::Debug for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("trees", &self.trees.len())
            .field("field", &self.field)
            .field("policy", &self.policy)
            .field("rules", &self.rules)
            .field("neighbor_radius", &self.neighbor_radius)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl Forest {
    /// Creates an empty forest for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Configuration`] for an invalid configuration and
    /// [`SimError::Field`] if the field geometry is rejected.
    pub fn new(
        config: &ForestConfig,
        policy: Arc<dyn InfestationPolicy>,
        rng: ChaCha8Rng,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            trees: BTreeMap::new(),
            field: SpatialField::new(config.field_config())?,
            rng,
            policy,
            rules: config.step_rules(),
            neighbor_radius: config.neighbor_radius,
            next_id: 0,
        })
    }

    /// Plant a tree and return its id.
    ///
    /// The position is normalized under the field's boundary policy. Trees
    /// planted dead are kept in the table but never enter the field.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Field`] for a position the field rejects; no id
    /// is consumed in that case.
    pub fn plant(&mut self, position: DVec2, state: TreeState) -> Result<AgentId> {
        let id = AgentId::new(self.next_id);
        let position = if state.status.is_alive() {
            self.field.insert(id, position)?
        } else {
            self.field.normalize(position)?
        };
        self.next_id += 1;
        self.trees.insert(id, Tree::new(id, position, state));
        Ok(id)
    }

    /// Force a healthy tree into the attacked state with one beetle.
    ///
    /// Attacked and dead trees are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownAgent`] if no tree has this id.
    pub fn attack(&mut self, id: AgentId) -> Result<LifeStatus> {
        let tree = self.trees.get_mut(&id).ok_or(SimError::UnknownAgent(id))?;
        let next = tree.state().attacked();
        tree.commit(next);
        Ok(tree.status())
    }

    /// Run one tick of a tree's life and return its new status.
    ///
    /// Pressure is the number of attacked trees within the neighbor radius,
    /// excluding the tree itself. Every living tree consumes exactly one
    /// random draw per step, so the stream stays aligned however the
    /// transitions go. A tree that dies is removed from the field.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownAgent`] if no tree has this id.
    pub fn step_tree(&mut self, id: AgentId) -> Result<LifeStatus> {
        let tree = self.trees.get(&id).ok_or(SimError::UnknownAgent(id))?;
        if !tree.is_alive() {
            return Ok(LifeStatus::Dead);
        }
        let position = tree.position();
        let pressure = self.neighborhood().count_within(
            position,
            self.neighbor_radius,
            StatusMask::ATTACKED,
            Some(id),
        );
        let pressure = u32::try_from(pressure).unwrap_or(u32::MAX);
        let draw: f64 = self.rng.gen();

        let tree = self.trees.get_mut(&id).ok_or(SimError::UnknownAgent(id))?;
        let before = tree.status();
        let next = next_state(tree.state(), pressure, draw, &self.rules, self.policy.as_ref());
        tree.commit(next);

        if before != next.status {
            debug!(agent = %id, from = %before, to = %next.status, pressure, "tree transition");
        }
        if next.status == LifeStatus::Dead {
            self.field.remove(id)?;
        }
        Ok(next.status)
    }

    /// Look up a tree.
    #[must_use]
    pub fn tree(&self, id: AgentId) -> Option<&Tree> {
        self.trees.get(&id)
    }

    /// All trees, dead ones included, in id order.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> + '_ {
        self.trees.values()
    }

    /// Number of trees ever planted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Returns true if no tree was planted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Per-status tree counts.
    #[must_use]
    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for tree in self.trees.values() {
            counts.record(tree.status());
        }
        counts
    }

    /// The spatial index over living trees.
    #[must_use]
    pub fn field(&self) -> &SpatialField<AgentId> {
        &self.field
    }

    /// Read-only view for neighbor queries.
    #[must_use]
    pub fn neighborhood(&self) -> Neighborhood<'_> {
        Neighborhood {
            trees: &self.trees,
            field: &self.field,
        }
    }

    /// Radius within which attacked trees exert pressure.
    #[must_use]
    pub fn neighbor_radius(&self) -> f64 {
        self.neighbor_radius
    }

    /// Constants used by every tree step.
    #[must_use]
    pub fn rules(&self) -> &StepRules {
        &self.rules
    }

    /// The infestation policy.
    #[must_use]
    pub fn policy(&self) -> &dyn InfestationPolicy {
        self.policy.as_ref()
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub(crate) fn attach_event(&mut self, id: AgentId, handle: EventHandle) -> Result<()> {
        let tree = self.trees.get_mut(&id).ok_or(SimError::UnknownAgent(id))?;
        tree.attach_event(handle);
        Ok(())
    }
}

/// Read-only view of the forest for spatial queries.
///
/// Only living trees are indexed, so dead trees never show up here.
#[derive(Debug, Clone, Copy)]
pub struct Neighborhood<'a> {
    trees: &'a BTreeMap<AgentId, Tree>,
    field: &'a SpatialField<AgentId>,
}

impl<'a> Neighborhood<'a> {
    /// Living trees within `radius` of `center` whose status is in `mask`.
    /// Order is unspecified.
    pub fn within(
        &self,
        center: DVec2,
        radius: f64,
        mask: StatusMask,
    ) -> impl Iterator<Item = &'a Tree> + 'a {
        let trees = self.trees;
        let field = self.field;
        field
            .query_radius(center, radius)
            .filter_map(move |id| trees.get(&id))
            .filter(move |tree| mask.matches(tree.status()))
    }

    /// Number of trees within `radius` of `center` whose status is in
    /// `mask`, not counting `exclude`.
    #[must_use]
    pub fn count_within(
        &self,
        center: DVec2,
        radius: f64,
        mask: StatusMask,
        exclude: Option<AgentId>,
    ) -> usize {
        self.within(center, radius, mask)
            .filter(|tree| Some(tree.id()) != exclude)
            .count()
    }

    /// Up to `k` living trees whose status is in `mask`, nearest first.
    /// Ties are broken by id.
    #[must_use]
    pub fn nearest(&self, center: DVec2, k: usize, mask: StatusMask) -> Vec<&'a Tree> {
        let (trees, field) = (self.trees, self.field);
        let available = field.len();
        let mut wanted = k;
        loop {
            let found: Vec<&'a Tree> = field
                .nearest(center, wanted)
                .filter_map(|id| trees.get(&id))
                .filter(|tree| mask.matches(tree.status()))
                .take(k)
                .collect();
            if found.len() == k || wanted >= available {
                return found;
            }
            wanted = wanted.saturating_mul(2).min(available);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NeighborPressure;
    use canopy::Boundary;
    use rand::SeedableRng;

    fn forest_with(boundary: Boundary) -> Forest {
        let config = ForestConfig::default()
            .with_field(100.0, 100.0)
            .with_boundary(boundary);
        Forest::new(
            &config,
            Arc::new(NeighborPressure::default()),
            ChaCha8Rng::seed_from_u64(3),
        )
        .unwrap()
    }

    #[test]
    fn plant_assigns_sequential_ids() {
        let mut forest = forest_with(Boundary::Toroidal);
        let a = forest.plant(DVec2::new(1.0, 1.0), TreeState::healthy(1.0, 0.5)).unwrap();
        let b = forest.plant(DVec2::new(2.0, 1.0), TreeState::healthy(1.0, 0.5)).unwrap();
        assert_eq!(a, AgentId::new(0));
        assert_eq!(b, AgentId::new(1));
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.field().len(), 2);
    }

    #[test]
    fn plant_outside_clamped_field_fails_without_consuming_an_id() {
        let mut forest = forest_with(Boundary::Clamped);
        let err = forest
            .plant(DVec2::new(150.0, 1.0), TreeState::healthy(1.0, 0.5))
            .unwrap_err();
        assert!(err.is_out_of_bounds());
        let id = forest.plant(DVec2::new(50.0, 1.0), TreeState::healthy(1.0, 0.5)).unwrap();
        assert_eq!(id, AgentId::new(0));
    }

    #[test]
    fn plant_wraps_on_torus() {
        let mut forest = forest_with(Boundary::Toroidal);
        let id = forest.plant(DVec2::new(-5.0, 105.0), TreeState::healthy(1.0, 0.5)).unwrap();
        assert_eq!(forest.tree(id).unwrap().position(), DVec2::new(95.0, 5.0));
    }

    #[test]
    fn attack_unknown_tree_fails() {
        let mut forest = forest_with(Boundary::Toroidal);
        assert_eq!(
            forest.attack(AgentId::new(9)),
            Err(SimError::UnknownAgent(AgentId::new(9)))
        );
        assert!(forest.step_tree(AgentId::new(9)).is_err());
    }

    #[test]
    fn isolated_attacked_tree_dies_and_leaves_the_field() {
        let mut forest = forest_with(Boundary::Toroidal);
        let id = forest.plant(DVec2::new(50.0, 50.0), TreeState::healthy(1.0, 0.3)).unwrap();
        forest.attack(id).unwrap();

        let mut status = LifeStatus::Attacked;
        for _ in 0..10 {
            status = forest.step_tree(id).unwrap();
        }
        assert_eq!(status, LifeStatus::Dead);
        assert!(!forest.field().contains(id));
        assert_eq!(forest.counts().dead, 1);
        assert_eq!(forest.step_tree(id).unwrap(), LifeStatus::Dead);
    }

    #[test]
    fn pressure_spreads_attack_to_vulnerable_neighbor() {
        let mut forest = forest_with(Boundary::Toroidal);
        // resistance 0 means attack probability 1 once pressure exceeds 0
        let victim = forest.plant(DVec2::new(50.0, 50.0), TreeState::healthy(1.0, 0.0)).unwrap();
        let source = forest.plant(DVec2::new(55.0, 50.0), TreeState::healthy(1.0, 1.0)).unwrap();
        let far = forest.plant(DVec2::new(10.0, 10.0), TreeState::healthy(1.0, 0.0)).unwrap();
        forest.attack(source).unwrap();

        assert_eq!(forest.step_tree(victim).unwrap(), LifeStatus::Attacked);
        assert_eq!(forest.step_tree(far).unwrap(), LifeStatus::Healthy);
    }

    #[test]
    fn neighborhood_filters_by_status() {
        let mut forest = forest_with(Boundary::Toroidal);
        let center = DVec2::new(20.0, 20.0);
        let a = forest.plant(center, TreeState::healthy(1.0, 0.5)).unwrap();
        let b = forest.plant(DVec2::new(22.0, 20.0), TreeState::healthy(1.0, 0.5)).unwrap();
        let c = forest.plant(DVec2::new(25.0, 20.0), TreeState::healthy(1.0, 0.5)).unwrap();
        forest.attack(c).unwrap();

        let view = forest.neighborhood();
        assert_eq!(view.count_within(center, 10.0, StatusMask::LIVE, None), 3);
        assert_eq!(view.count_within(center, 10.0, StatusMask::LIVE, Some(a)), 2);
        assert_eq!(view.count_within(center, 10.0, StatusMask::ATTACKED, None), 1);

        let nearest: Vec<AgentId> = view
            .nearest(center, 1, StatusMask::ATTACKED)
            .iter()
            .map(|t| t.id())
            .collect();
        assert_eq!(nearest, vec![c]);
        let nearest: Vec<AgentId> = view
            .nearest(center, 5, StatusMask::HEALTHY)
            .iter()
            .map(|t| t.id())
            .collect();
        assert_eq!(nearest, vec![a, b]);
    }

    #[test]
    fn dead_planted_tree_is_counted_but_not_indexed() {
        let mut forest = forest_with(Boundary::Toroidal);
        let id = forest
            .plant(DVec2::new(3.0, 3.0), TreeState::healthy(1.0, 0.0).dead())
            .unwrap();
        assert!(!forest.field().contains(id));
        assert_eq!(forest.counts().dead, 1);
    }
}
