//! Bayesian event predictor for esports match outcomes.
//!
//! Maintains the posterior probability that side A (blue / radiant /
//! team1) wins, updated sequentially from discrete game events. Each
//! event category carries a fixed likelihood pair
//! `P(event | A wins)` / `P(event | B wins)`; high-impact objectives have a
//! more extreme ratio than routine kills.
//!
//! Unknown categories and duplicate event ids are no-ops by policy, not
//! errors: both happen routinely when re-polling a live match.

use std::collections::HashSet;

use super::types::{EventType, GameEvent, ProbabilityUpdate};

/// Default prior when nothing is known about the match.
pub const DEFAULT_PRIOR: f64 = 0.5;

/// Posterior bounds. A posterior of exactly 0 or 1 could never move again.
const MIN_POSTERIOR: f64 = f64::EPSILON;
const MAX_POSTERIOR: f64 = 1.0 - f64::EPSILON;

/// Likelihood of observing an event credited to side A.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventLikelihoods {
    /// P(side-A event | side A wins).
    pub given_a_wins: f64,
    /// P(side-A event | side B wins).
    pub given_b_wins: f64,
}

impl EventLikelihoods {
    const fn new(given_a_wins: f64, given_b_wins: f64) -> Self {
        Self {
            given_a_wins,
            given_b_wins,
        }
    }

    /// Likelihood table entry, `None` for categories without one.
    pub const fn for_event(event_type: EventType) -> Option<Self> {
        match event_type {
            EventType::Kill => Some(Self::new(0.55, 0.45)),
            EventType::Dragon => Some(Self::new(0.6, 0.4)),
            EventType::Baron => Some(Self::new(0.7, 0.3)),
            EventType::Tower => Some(Self::new(0.58, 0.42)),
            EventType::Inhibitor => Some(Self::new(0.75, 0.25)),
            EventType::Roshan => Some(Self::new(0.65, 0.35)),
            EventType::Unknown => None,
        }
    }

    /// Pair seen from side B: complement of each likelihood.
    fn flipped(self) -> Self {
        Self::new(1.0 - self.given_a_wins, 1.0 - self.given_b_wins)
    }
}

/// One Bayes step, kept inside `[EPSILON, 1 - EPSILON]`. Returns `prior`
/// unchanged when the normalizer is not positive.
pub fn bayes_update(prior: f64, likelihoods: EventLikelihoods) -> f64 {
    let evidence =
        likelihoods.given_a_wins * prior + likelihoods.given_b_wins * (1.0 - prior);
    if evidence > 0.0 {
        (likelihoods.given_a_wins * prior / evidence).clamp(MIN_POSTERIOR, MAX_POSTERIOR)
    } else {
        prior
    }
}

/// Sequential Bayesian updater with event-id deduplication.
///
/// The seen-id set grows for the lifetime of one match and is cleared on
/// [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct BayesianPredictor {
    posterior: f64,
    update_count: u64,
    processed_event_ids: HashSet<String>,
    history: Vec<ProbabilityUpdate>,
}

impl BayesianPredictor {
    /// Creates a predictor starting at `prior`.
    pub fn new(prior: f64) -> Self {
        Self {
            posterior: prior,
            update_count: 0,
            processed_event_ids: HashSet::new(),
            history: vec![ProbabilityUpdate::untagged(prior)],
        }
    }

    /// Applies `event`. Returns `true` only when the posterior was updated
    /// and a history point appended.
    pub fn update(&mut self, event: &GameEvent) -> bool {
        if !self.processed_event_ids.insert(event.event_id.clone()) {
            return false;
        }

        let Some(table) = EventLikelihoods::for_event(event.event_type) else {
            return false;
        };

        let likelihoods = if event.team.favours_side_a() {
            table
        } else {
            table.flipped()
        };

        self.posterior = bayes_update(self.posterior, likelihoods);
        self.update_count += 1;
        self.history.push(ProbabilityUpdate {
            posterior: self.posterior,
            timestamp: event.timestamp,
            event_type: Some(event.event_type),
            team: Some(event.team),
        });

        true
    }

    /// Current probability that side A wins.
    pub fn posterior(&self) -> f64 {
        self.posterior
    }

    /// Number of genuine updates since the last reset.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Copy of the posterior history, oldest first. Starts with the prior.
    pub fn history(&self) -> Vec<ProbabilityUpdate> {
        self.history.clone()
    }

    /// Most recent history point.
    pub fn latest(&self) -> Option<&ProbabilityUpdate> {
        self.history.last()
    }

    /// Forgets every event and restarts from `prior`.
    pub fn reset(&mut self, prior: f64) {
        self.posterior = prior;
        self.update_count = 0;
        self.processed_event_ids.clear();
        self.history = vec![ProbabilityUpdate::untagged(prior)];
    }
}

impl Default for BayesianPredictor {
    fn default() -> Self {
        Self::new(DEFAULT_PRIOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Team;
    use chrono::Utc;

    fn event(id: &str, event_type: EventType, team: Team) -> GameEvent {
        GameEvent {
            event_type,
            team,
            timestamp: Utc::now(),
            event_id: id.to_string(),
            details: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_dragon_for_blue_moves_prior_to_likelihood() {
        let mut p = BayesianPredictor::default();
        assert!(p.update(&event("1", EventType::Dragon, Team::Blue)));
        assert!((p.posterior() - 0.6).abs() < 1e-12);
        assert_eq!(p.update_count(), 1);
    }

    #[test]
    fn test_side_b_event_lowers_posterior() {
        let mut p = BayesianPredictor::default();
        p.update(&event("1", EventType::Baron, Team::Red));
        // flipped pair (0.3, 0.7) from a flat prior
        assert!((p.posterior() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_event_is_noop() {
        let mut p = BayesianPredictor::default();
        assert!(p.update(&event("dup", EventType::Kill, Team::Blue)));
        let after_first = p.posterior();
        assert!(!p.update(&event("dup", EventType::Kill, Team::Blue)));
        assert_eq!(p.posterior(), after_first);
        assert_eq!(p.history().len(), 2);
    }

    #[test]
    fn test_unknown_category_is_ignored() {
        let mut p = BayesianPredictor::default();
        assert!(!p.update(&event("x", EventType::Unknown, Team::Blue)));
        assert_eq!(p.posterior(), DEFAULT_PRIOR);
        assert_eq!(p.history().len(), 1);
        assert_eq!(p.update_count(), 0);
    }

    #[test]
    fn test_degenerate_evidence_keeps_prior() {
        let zero = EventLikelihoods {
            given_a_wins: 0.0,
            given_b_wins: 0.0,
        };
        assert_eq!(bayes_update(0.42, zero), 0.42);
    }

    #[test]
    fn test_posterior_never_saturates() {
        let mut p = BayesianPredictor::default();
        for i in 0..200 {
            p.update(&event(&format!("inh-{i}"), EventType::Inhibitor, Team::Blue));
            assert!(p.posterior() < 1.0, "saturated after {} events", i + 1);
        }
        let top = p.posterior();

        // still responsive to the other side
        p.update(&event("dire-baron", EventType::Baron, Team::Red));
        assert!(p.posterior() < top);
        assert!(p.posterior() > 0.0);
    }

    #[test]
    fn test_reset_clears_seen_ids() {
        let mut p = BayesianPredictor::default();
        p.update(&event("a", EventType::Tower, Team::Radiant));
        p.reset(0.7);
        assert_eq!(p.posterior(), 0.7);
        assert_eq!(p.history().len(), 1);
        assert!(p.update(&event("a", EventType::Tower, Team::Radiant)));
    }

    #[test]
    fn test_history_tags_cause() {
        let mut p = BayesianPredictor::default();
        p.update(&event("r", EventType::Roshan, Team::Dire));
        let last = p.history().pop().unwrap();
        assert_eq!(last.event_type, Some(EventType::Roshan));
        assert_eq!(last.team, Some(Team::Dire));
    }
}
