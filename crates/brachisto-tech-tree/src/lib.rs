//! Research trees for the Brachisto economy.
//!
//! # Overview
//!
//! A research tree is an ordered list of tiers. Each tier is paid for in
//! tranches of intelligence (FLOP·days); completing tranches raises the
//! skills named in the tier's `effects` proportionally to completion.
//!
//! Per tier the state machine is:
//!
//! ```text
//! NotStarted -> Enabled -> (tranche complete)* -> Complete
//!                  ^  |
//!                  |  v
//!                 Paused
//! ```
//!
//! # Design
//!
//! - A tier may be enabled only when the tier before it is complete.
//! - Enabling and disabling are idempotent; disabling keeps progress.
//! - Intelligence is split equally across all enabled, incomplete tiers
//!   regardless of their cost.
//! - A single large deposit may complete several tranches at once; the
//!   remainder carries over, and is discarded when the tier completes.
//! - Progress lives in a [`ResearchProgress`] map so it can travel with the
//!   game state; definitions are immutable once registered.

use std::collections::BTreeMap;

use brachisto_core::id::{TierId, TreeId};
use brachisto_core::numeric::non_negative;
use brachisto_core::research::{ResearchProgress, TierProgress};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// The resource group a research tree belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchCategory {
    Energy,
    Dexterity,
    Intelligence,
}

/// One tier of a research tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDef {
    pub id: TierId,
    #[serde(default)]
    pub name: String,
    pub tranches: u32,
    /// Cost of a single tranche in FLOP·days.
    pub tranche_cost_intelligence: f64,
    /// `skill name -> bonus` granted when the tier is fully complete.
    #[serde(default)]
    pub effects: BTreeMap<String, f64>,
}

impl TierDef {
    pub fn total_cost(&self) -> f64 {
        self.tranche_cost_intelligence * self.tranches as f64
    }
}

/// A research tree definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchTreeDef {
    pub id: TreeId,
    #[serde(default)]
    pub name: String,
    pub category: ResearchCategory,
    pub tiers: Vec<TierDef>,
}

impl ResearchTreeDef {
    pub fn tier_index(&self, tier: &TierId) -> Option<usize> {
        self.tiers.iter().position(|t| &t.id == tier)
    }
}

// ---------------------------------------------------------------------------
// Status, events and errors
// ---------------------------------------------------------------------------

/// Where a tier is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierStatus {
    NotStarted,
    Enabled,
    /// Disabled with some progress kept.
    Paused,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TechEvent {
    TrancheCompleted {
        tree: TreeId,
        tier: TierId,
        tranches_completed: u32,
        tick: u64,
    },
    TierCompleted {
        tree: TreeId,
        tier: TierId,
        tick: u64,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TechTreeError {
    #[error("unknown research tree '{0}'")]
    UnknownTree(TreeId),
    #[error("unknown tier '{tier}' in research tree '{tree}'")]
    UnknownTier { tree: TreeId, tier: TierId },
    #[error("research tree '{0}' is already registered")]
    DuplicateTree(TreeId),
    #[error("tier '{tier}' appears twice in research tree '{tree}'")]
    DuplicateTier { tree: TreeId, tier: TierId },
    #[error("tier '{tier}' in '{tree}' is invalid: {reason}")]
    InvalidTier {
        tree: TreeId,
        tier: TierId,
        reason: &'static str,
    },
    #[error("tier '{tier}' in '{tree}' requires the previous tier to be complete")]
    PrerequisiteIncomplete { tree: TreeId, tier: TierId },
    #[error("tier '{tier}' in '{tree}' is already complete")]
    AlreadyComplete { tree: TreeId, tier: TierId },
}

// ---------------------------------------------------------------------------
// TechTree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechTree {
    trees: BTreeMap<TreeId, ResearchTreeDef>,
    progress: ResearchProgress,
    #[serde(skip)]
    events: Vec<TechEvent>,
}

impl TechTree {
    pub fn new() -> Self {
        Self {
            trees: BTreeMap::new(),
            progress: ResearchProgress::new(),
            events: Vec::new(),
        }
    }

    /// Build a tree from a list of definitions.
    pub fn with_trees(defs: impl IntoIterator<Item = ResearchTreeDef>) -> Result<Self, TechTreeError> {
        let mut tree = Self::new();
        for def in defs {
            tree.register(def)?;
        }
        Ok(tree)
    }

    pub fn register(&mut self, def: ResearchTreeDef) -> Result<(), TechTreeError> {
        if self.trees.contains_key(&def.id) {
            return Err(TechTreeError::DuplicateTree(def.id));
        }
        for (i, tier) in def.tiers.iter().enumerate() {
            if def.tiers[..i].iter().any(|t| t.id == tier.id) {
                return Err(TechTreeError::DuplicateTier {
                    tree: def.id.clone(),
                    tier: tier.id.clone(),
                });
            }
            let reason = if tier.tranches == 0 {
                Some("tranches must be at least 1")
            } else if !(tier.tranche_cost_intelligence > 0.0) || !tier.tranche_cost_intelligence.is_finite() {
                Some("tranche cost must be positive")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(TechTreeError::InvalidTier {
                    tree: def.id.clone(),
                    tier: tier.id.clone(),
                    reason,
                });
            }
        }
        self.trees.insert(def.id.clone(), def);
        Ok(())
    }

    pub fn tree(&self, id: &TreeId) -> Option<&ResearchTreeDef> {
        self.trees.get(id)
    }

    pub fn trees(&self) -> impl Iterator<Item = &ResearchTreeDef> {
        self.trees.values()
    }

    fn lookup(&self, tree: &TreeId, tier: &TierId) -> Result<(&ResearchTreeDef, usize), TechTreeError> {
        let def = self.trees.get(tree).ok_or_else(|| TechTreeError::UnknownTree(tree.clone()))?;
        let index = def.tier_index(tier).ok_or_else(|| TechTreeError::UnknownTier {
            tree: tree.clone(),
            tier: tier.clone(),
        })?;
        Ok((def, index))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Progress record for a tier; untouched tiers read as default.
    pub fn tier_progress(&self, tree: &TreeId, tier: &TierId) -> TierProgress {
        self.progress
            .get(tree)
            .and_then(|tiers| tiers.get(tier))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_tier_complete(&self, tree: &TreeId, tier: &TierId) -> bool {
        match self.lookup(tree, tier) {
            Ok((def, index)) => self.tier_progress(tree, tier).tranches_completed >= def.tiers[index].tranches,
            Err(_) => false,
        }
    }

    pub fn status(&self, tree: &TreeId, tier: &TierId) -> Result<TierStatus, TechTreeError> {
        self.lookup(tree, tier)?;
        let p = self.tier_progress(tree, tier);
        Ok(if self.is_tier_complete(tree, tier) {
            TierStatus::Complete
        } else if p.enabled {
            TierStatus::Enabled
        } else if p.tranches_completed > 0 || p.progress > 0.0 {
            TierStatus::Paused
        } else {
            TierStatus::NotStarted
        })
    }

    /// Whether the tier's predecessor (if any) is complete.
    pub fn prerequisite_met(&self, tree: &TreeId, tier: &TierId) -> Result<bool, TechTreeError> {
        let (def, index) = self.lookup(tree, tier)?;
        Ok(match index.checked_sub(1) {
            Some(prev) => self.is_tier_complete(tree, &def.tiers[prev].id),
            None => true,
        })
    }

    /// All enabled, incomplete tiers in tree then tier order.
    pub fn enabled_projects(&self) -> Vec<(TreeId, TierId)> {
        let mut out = Vec::new();
        for def in self.trees.values() {
            for tier in &def.tiers {
                let p = self.tier_progress(&def.id, &tier.id);
                if p.enabled && p.tranches_completed < tier.tranches {
                    out.push((def.id.clone(), tier.id.clone()));
                }
            }
        }
        out
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Enable or disable research on a tier.
    ///
    /// Disabling never fails on a known tier and keeps progress. Enabling
    /// fails if the previous tier is incomplete or the tier itself is done.
    pub fn set_enabled(&mut self, tree: &TreeId, tier: &TierId, enabled: bool) -> Result<(), TechTreeError> {
        self.lookup(tree, tier)?;
        if enabled {
            if self.is_tier_complete(tree, tier) {
                return Err(TechTreeError::AlreadyComplete {
                    tree: tree.clone(),
                    tier: tier.clone(),
                });
            }
            if !self.prerequisite_met(tree, tier)? {
                return Err(TechTreeError::PrerequisiteIncomplete {
                    tree: tree.clone(),
                    tier: tier.clone(),
                });
            }
        } else if !self.progress.get(tree).is_some_and(|t| t.contains_key(tier)) {
            return Ok(());
        }
        self.entry(tree, tier).enabled = enabled;
        Ok(())
    }

    /// Enable the next researchable tier of every tree in `category`, or
    /// disable every tier of those trees. Returns the number of tiers whose
    /// flag changed.
    pub fn set_category_enabled(&mut self, category: ResearchCategory, enabled: bool) -> usize {
        let ids: Vec<TreeId> = self
            .trees
            .values()
            .filter(|d| d.category == category)
            .map(|d| d.id.clone())
            .collect();
        let mut changed = 0;
        for tree in ids {
            let Some(def) = self.trees.get(&tree) else {
                continue;
            };
            let tiers: Vec<TierId> = def.tiers.iter().map(|t| t.id.clone()).collect();
            if enabled {
                let next = tiers.into_iter().find(|t| !self.is_tier_complete(&tree, t));
                if let Some(tier) = next {
                    let was = self.tier_progress(&tree, &tier).enabled;
                    if !was && self.set_enabled(&tree, &tier, true).is_ok() {
                        changed += 1;
                    }
                }
            } else {
                for tier in tiers {
                    if self.tier_progress(&tree, &tier).enabled {
                        self.entry(&tree, &tier).enabled = false;
                        changed += 1;
                    }
                }
            }
        }
        changed
    }

    fn entry(&mut self, tree: &TreeId, tier: &TierId) -> &mut TierProgress {
        self.progress
            .entry(tree.clone())
            .or_default()
            .entry(tier.clone())
            .or_default()
    }

    /// Add `flops * delta_days` of progress to a tier. Returns the number of
    /// tranches completed by this deposit.
    ///
    /// Progress is added whether or not the tier is enabled; gating happens
    /// in [`advance`](Self::advance). A completed tier ignores the deposit.
    pub fn add_research_progress(
        &mut self,
        tree: &TreeId,
        tier: &TierId,
        flops: f64,
        delta_days: f64,
        tick: u64,
    ) -> Result<u32, TechTreeError> {
        let (def, index) = self.lookup(tree, tier)?;
        let tier_def = &def.tiers[index];
        let (tranches, cost) = (tier_def.tranches, tier_def.tranche_cost_intelligence);
        let deposit = non_negative(flops * delta_days);

        let mut events = Vec::new();
        let p = self.entry(tree, tier);
        if p.tranches_completed >= tranches {
            return Ok(0);
        }
        p.progress += deposit;
        let before = p.tranches_completed;
        while p.progress >= cost && p.tranches_completed < tranches {
            p.progress -= cost;
            p.tranches_completed += 1;
            events.push(TechEvent::TrancheCompleted {
                tree: tree.clone(),
                tier: tier.clone(),
                tranches_completed: p.tranches_completed,
                tick,
            });
        }
        let completed = p.tranches_completed - before;
        if p.tranches_completed >= tranches {
            p.progress = 0.0;
            p.enabled = false;
            events.push(TechEvent::TierCompleted {
                tree: tree.clone(),
                tier: tier.clone(),
                tick,
            });
            tracing::info!(%tree, %tier, "research tier complete");
        } else if completed > 0 {
            tracing::info!(%tree, %tier, tranches = p.tranches_completed, "research tranche complete");
        }
        self.events.extend(events);
        Ok(completed)
    }

    /// Split `intelligence_flops` equally across every enabled project and
    /// advance each by `delta_days`.
    pub fn advance(&mut self, intelligence_flops: f64, delta_days: f64, tick: u64) {
        let projects = self.enabled_projects();
        if projects.is_empty() || !(intelligence_flops > 0.0) || !(delta_days > 0.0) {
            return;
        }
        let share = intelligence_flops / projects.len() as f64;
        self.deposit_each(&projects, share, delta_days, tick);
    }

    /// Give every project the same deposit. A project that no longer
    /// resolves is skipped without touching the others.
    fn deposit_each(&mut self, projects: &[(TreeId, TierId)], flops: f64, delta_days: f64, tick: u64) {
        for (tree, tier) in projects {
            if let Err(error) = self.add_research_progress(tree, tier, flops, delta_days, tick) {
                tracing::debug!(%tree, %tier, %error, "research project skipped");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    /// Flat `skill name -> multiplier` from completed tranches.
    ///
    /// Each tier contributes `completed / tranches * bonus * decay^index`;
    /// contributions to the same name add up on a baseline of `1.0`.
    pub fn legacy_skills(&self, tier_decay: f64) -> BTreeMap<String, f64> {
        let mut skills: BTreeMap<String, f64> = BTreeMap::new();
        for def in self.trees.values() {
            for (index, tier) in def.tiers.iter().enumerate() {
                let done = self.tier_progress(&def.id, &tier.id).tranches_completed.min(tier.tranches);
                if done == 0 {
                    continue;
                }
                let completion = done as f64 / tier.tranches as f64;
                let decay = tier_decay.powi(index as i32);
                for (skill, bonus) in &tier.effects {
                    *skills.entry(skill.clone()).or_insert(1.0) += completion * bonus * decay;
                }
            }
        }
        skills
    }

    pub fn progress(&self) -> &ResearchProgress {
        &self.progress
    }

    /// Copy of all progress, for persistence.
    pub fn export_state(&self) -> ResearchProgress {
        self.progress.clone()
    }

    /// Replace all progress. Entries for unknown trees or tiers are dropped
    /// and completed counts are clamped to the tier's tranche count.
    pub fn load_state(&mut self, state: ResearchProgress) {
        let mut loaded = ResearchProgress::new();
        for (tree, tiers) in state {
            let Some(def) = self.trees.get(&tree) else {
                tracing::warn!(%tree, "dropping progress for unknown research tree");
                continue;
            };
            for (tier, mut p) in tiers {
                let Some(index) = def.tier_index(&tier) else {
                    tracing::warn!(%tree, %tier, "dropping progress for unknown research tier");
                    continue;
                };
                let tranches = def.tiers[index].tranches;
                if p.tranches_completed >= tranches {
                    p.tranches_completed = tranches;
                    p.enabled = false;
                }
                p.progress = non_negative(p.progress);
                loaded.entry(tree.clone()).or_default().insert(tier, p);
            }
        }
        self.progress = loaded;
    }

    pub fn drain_events(&mut self) -> Vec<TechEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for TechTree {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(id: &str, tranches: u32, cost: f64, bonus: f64) -> TierDef {
        TierDef {
            id: TierId::from(id),
            name: id.to_string(),
            tranches,
            tranche_cost_intelligence: cost,
            effects: BTreeMap::from([("locomotion".to_string(), bonus)]),
        }
    }

    fn propulsion() -> ResearchTreeDef {
        ResearchTreeDef {
            id: TreeId::from("propulsion"),
            name: "Propulsion".to_string(),
            category: ResearchCategory::Dexterity,
            tiers: vec![tier("t1", 2, 100.0, 0.2), tier("t2", 4, 1_000.0, 0.2)],
        }
    }

    fn computing() -> ResearchTreeDef {
        ResearchTreeDef {
            id: TreeId::from("computing"),
            name: "Computing".to_string(),
            category: ResearchCategory::Intelligence,
            tiers: vec![TierDef {
                effects: BTreeMap::from([("cpu".to_string(), 0.5)]),
                ..tier("c1", 10, 100.0, 0.0)
            }],
        }
    }

    fn make_tree() -> TechTree {
        TechTree::with_trees([propulsion(), computing()]).unwrap()
    }

    fn id(tree: &str, tier: &str) -> (TreeId, TierId) {
        (TreeId::from(tree), TierId::from(tier))
    }

    // Test 1: Registration rejects duplicates and bad tiers
    #[test]
    fn register_validates() {
        let mut tree = make_tree();
        assert!(matches!(tree.register(propulsion()), Err(TechTreeError::DuplicateTree(_))));

        let mut bad = propulsion();
        bad.id = TreeId::from("bad");
        bad.tiers[1].tranches = 0;
        assert!(matches!(tree.register(bad), Err(TechTreeError::InvalidTier { .. })));

        let mut dup = propulsion();
        dup.id = TreeId::from("dup");
        dup.tiers[1].id = TierId::from("t1");
        assert!(matches!(tree.register(dup), Err(TechTreeError::DuplicateTier { .. })));
    }

    // Test 2: A tier is gated on the previous one
    #[test]
    fn tier_gating() {
        let mut tree = make_tree();
        let (p, t2) = id("propulsion", "t2");
        assert!(matches!(
            tree.set_enabled(&p, &t2, true),
            Err(TechTreeError::PrerequisiteIncomplete { .. })
        ));
        let t1 = TierId::from("t1");
        tree.add_research_progress(&p, &t1, 200.0, 1.0, 0).unwrap();
        assert!(tree.is_tier_complete(&p, &t1));
        tree.set_enabled(&p, &t2, true).unwrap();
        assert_eq!(tree.status(&p, &t2).unwrap(), TierStatus::Enabled);
    }

    // Test 3: Enable and disable are idempotent; disabling keeps progress
    #[test]
    fn enable_disable_idempotent() {
        let mut tree = make_tree();
        let (p, t1) = id("propulsion", "t1");
        assert_eq!(tree.status(&p, &t1).unwrap(), TierStatus::NotStarted);
        tree.set_enabled(&p, &t1, false).unwrap();
        assert!(tree.progress().is_empty());

        tree.set_enabled(&p, &t1, true).unwrap();
        tree.set_enabled(&p, &t1, true).unwrap();
        assert_eq!(tree.enabled_projects().len(), 1);

        tree.advance(50.0, 1.0, 1);
        tree.set_enabled(&p, &t1, false).unwrap();
        tree.set_enabled(&p, &t1, false).unwrap();
        assert_eq!(tree.status(&p, &t1).unwrap(), TierStatus::Paused);
        assert_eq!(tree.tier_progress(&p, &t1).progress, 50.0);
        assert!(tree.enabled_projects().is_empty());
    }

    // Test 4: A large deposit completes several tranches and carries the rest
    #[test]
    fn multi_tranche_carry() {
        let mut tree = make_tree();
        let (c, c1) = id("computing", "c1");
        let done = tree.add_research_progress(&c, &c1, 350.0, 1.0, 7).unwrap();
        assert_eq!(done, 3);
        let p = tree.tier_progress(&c, &c1);
        assert_eq!(p.tranches_completed, 3);
        assert_eq!(p.progress, 50.0);

        let events = tree.drain_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[2],
            TechEvent::TrancheCompleted { tranches_completed: 3, tick: 7, .. }
        ));
        assert!(tree.drain_events().is_empty());
    }

    // Test 5: The final tranche caps progress and completes the tier
    #[test]
    fn completion_caps_progress() {
        let mut tree = make_tree();
        let (p, t1) = id("propulsion", "t1");
        tree.set_enabled(&p, &t1, true).unwrap();
        assert_eq!(tree.add_research_progress(&p, &t1, 10_000.0, 1.0, 0).unwrap(), 2);

        let progress = tree.tier_progress(&p, &t1);
        assert_eq!(progress.tranches_completed, 2);
        assert_eq!(progress.progress, 0.0);
        assert!(!progress.enabled);
        assert_eq!(tree.status(&p, &t1).unwrap(), TierStatus::Complete);
        assert!(tree.drain_events().iter().any(|e| matches!(e, TechEvent::TierCompleted { .. })));

        assert_eq!(tree.add_research_progress(&p, &t1, 10_000.0, 1.0, 0).unwrap(), 0);
        assert!(matches!(
            tree.set_enabled(&p, &t1, true),
            Err(TechTreeError::AlreadyComplete { .. })
        ));
    }

    // Test 6: Intelligence is split equally across enabled projects
    #[test]
    fn equal_split() {
        let mut tree = make_tree();
        let (p, t1) = id("propulsion", "t1");
        let (c, c1) = id("computing", "c1");
        tree.set_enabled(&p, &t1, true).unwrap();
        tree.set_enabled(&c, &c1, true).unwrap();

        tree.advance(80.0, 1.0, 1);
        assert_eq!(tree.tier_progress(&p, &t1).progress, 40.0);
        assert_eq!(tree.tier_progress(&c, &c1).progress, 40.0);
    }

    // Test 7: Nothing enabled means nothing advances
    #[test]
    fn advance_without_projects_is_noop() {
        let mut tree = make_tree();
        tree.advance(1e30, 1.0, 1);
        assert!(tree.progress().is_empty());
        assert!(tree.drain_events().is_empty());
    }

    // Test 8: Legacy skills scale with completion and tier decay
    #[test]
    fn legacy_skills_decay_by_tier() {
        let mut tree = make_tree();
        let (p, t1) = id("propulsion", "t1");
        let t2 = TierId::from("t2");
        assert!(tree.legacy_skills(0.9).is_empty());

        tree.add_research_progress(&p, &t1, 200.0, 1.0, 0).unwrap();
        tree.add_research_progress(&p, &t2, 2_000.0, 1.0, 0).unwrap();
        let skills = tree.legacy_skills(0.9);
        // t1: 1.0 * 0.2, t2: 0.5 * 0.2 * 0.9
        assert!((skills["locomotion"] - 1.29).abs() < 1e-12);
        assert!(!skills.contains_key("cpu"));
    }

    // Test 9: Category toggle enables the next tier of each tree
    #[test]
    fn category_toggle() {
        let mut tree = make_tree();
        let (p, t1) = id("propulsion", "t1");
        let t2 = TierId::from("t2");

        assert_eq!(tree.set_category_enabled(ResearchCategory::Dexterity, true), 1);
        assert_eq!(tree.enabled_projects(), vec![(p.clone(), t1.clone())]);
        assert_eq!(tree.set_category_enabled(ResearchCategory::Dexterity, true), 0);

        tree.add_research_progress(&p, &t1, 200.0, 1.0, 0).unwrap();
        assert_eq!(tree.set_category_enabled(ResearchCategory::Dexterity, true), 1);
        assert_eq!(tree.enabled_projects(), vec![(p.clone(), t2.clone())]);

        assert_eq!(tree.set_category_enabled(ResearchCategory::Dexterity, false), 1);
        assert!(tree.enabled_projects().is_empty());
        assert_eq!(tree.set_category_enabled(ResearchCategory::Energy, true), 0);
    }

    // Test 10: Export then load reproduces the same state
    #[test]
    fn export_load_round_trip() {
        let mut tree = make_tree();
        let (p, t1) = id("propulsion", "t1");
        let (c, c1) = id("computing", "c1");
        tree.set_enabled(&c, &c1, true).unwrap();
        tree.add_research_progress(&p, &t1, 150.0, 1.0, 0).unwrap();
        tree.add_research_progress(&c, &c1, 420.0, 1.0, 0).unwrap();

        let exported = tree.export_state();
        let mut restored = make_tree();
        restored.load_state(exported.clone());
        assert_eq!(restored.export_state(), exported);
        assert_eq!(restored.legacy_skills(0.9), tree.legacy_skills(0.9));
        assert_eq!(restored.enabled_projects(), tree.enabled_projects());
    }

    // Test 11: Loading drops unknown entries and clamps completion
    #[test]
    fn load_sanitizes() {
        let mut tree = make_tree();
        let mut state = ResearchProgress::new();
        state.entry(TreeId::from("ghost")).or_default().insert(
            TierId::from("x"),
            TierProgress {
                tranches_completed: 1,
                ..TierProgress::default()
            },
        );
        state.entry(TreeId::from("propulsion")).or_default().insert(
            TierId::from("t1"),
            TierProgress {
                tranches_completed: 99,
                progress: 5.0,
                enabled: true,
            },
        );
        tree.load_state(state);

        let (p, t1) = id("propulsion", "t1");
        assert!(!tree.progress().contains_key(&TreeId::from("ghost")));
        let loaded = tree.tier_progress(&p, &t1);
        assert_eq!(loaded.tranches_completed, 2);
        assert!(!loaded.enabled);
    }

    // Test 12: The tree serializes without pending events
    #[test]
    fn serde_round_trip() {
        let mut tree = make_tree();
        let (c, c1) = id("computing", "c1");
        tree.add_research_progress(&c, &c1, 250.0, 1.0, 0).unwrap();

        let json = serde_json::to_string(&tree).unwrap();
        let mut restored: TechTree = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.export_state(), tree.export_state());
        assert!(restored.drain_events().is_empty());
    }

    // Test 13: Definitions deserialize with defaulted optional fields
    #[test]
    fn definitions_from_json() {
        let json = r#"{
            "id": "energy_collection",
            "category": "energy",
            "tiers": [
                {"id": "pv", "tranches": 10, "tranche_cost_intelligence": 1e20,
                 "effects": {"energy_collection": 0.25}}
            ]
        }"#;
        let def: ResearchTreeDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.category, ResearchCategory::Energy);
        assert_eq!(def.tiers[0].total_cost(), 1e21);
        assert!(def.name.is_empty());
    }

    // Test 14: An unresolved project does not block the rest
    #[test]
    fn unresolved_project_is_skipped() {
        let mut tree = make_tree();
        let (p, t1) = id("propulsion", "t1");
        let stale = id("warp_drive", "w1");
        tree.deposit_each(&[stale.clone(), (p.clone(), t1.clone())], 40.0, 1.0, 1);
        assert_eq!(tree.tier_progress(&p, &t1).progress, 40.0);
        assert!(!tree.progress().contains_key(&stale.0));
    }
}
