//! Validation gates
//!
//! A gate inspects a candidate before promotion. It can append error
//! messages, which always block promotion, and it can vote on whether the
//! change may be applied without an explicit user confirmation.

use super::change::ChangeSet;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Instant-update vote cast by a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateVote {
    /// No opinion; the default permission stands
    #[default]
    Abstain,
    /// Allow instant promotion, unless another gate denies it
    Allow,
    /// Require explicit confirmation before promotion
    Deny,
}

impl fmt::Display for GateVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateVote::Abstain => write!(f, "abstain"),
            GateVote::Allow => write!(f, "allow"),
            GateVote::Deny => write!(f, "deny"),
        }
    }
}

/// What a gate sees besides the candidate itself
#[derive(Debug, Clone)]
pub struct GateContext {
    /// Fields that differ between the candidate and the effective config
    pub changes: ChangeSet,
    /// Permission that applies when no gate votes
    pub default_allow: bool,
}

/// Pluggable check run against every candidate
pub trait ValidationGate<T>: Send + Sync {
    fn check(&self, candidate: &T, ctx: &GateContext, errors: &mut Vec<String>) -> GateVote;
}

impl<T, F> ValidationGate<T> for F
where
    F: Fn(&T, &GateContext, &mut Vec<String>) -> GateVote + Send + Sync,
{
    fn check(&self, candidate: &T, ctx: &GateContext, errors: &mut Vec<String>) -> GateVote {
        self(candidate, ctx, errors)
    }
}

/// Registration handle for a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GateId(u64);

/// Combined result of every registered gate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateDecision {
    pub errors: Vec<String>,
    /// `None` when every gate abstained
    pub vote: Option<bool>,
    pub default_allow: bool,
}

impl GateDecision {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Final instant-update permission
    pub fn allow_instant(&self) -> bool {
        self.vote.unwrap_or(self.default_allow)
    }
}

/// Fold one vote into the running decision
///
/// Explicit votes are ANDed: once any gate denies, a later `Allow` cannot
/// restore permission.
pub fn compose_vote(current: Option<bool>, vote: GateVote) -> Option<bool> {
    match vote {
        GateVote::Abstain => current,
        GateVote::Allow => Some(current.unwrap_or(true)),
        GateVote::Deny => Some(false),
    }
}

/// Wrap a closure as a shareable gate
pub fn gate_fn<T, F>(check: F) -> Arc<dyn ValidationGate<T>>
where
    T: 'static,
    F: Fn(&T, &GateContext, &mut Vec<String>) -> GateVote + Send + Sync + 'static,
{
    Arc::new(check)
}

type SharedGate<T> = Arc<dyn ValidationGate<T>>;

/// Ordered registry of gates for one pair
pub struct GateChain<T> {
    next_id: AtomicU64,
    gates: RwLock<Vec<(GateId, SharedGate<T>)>>,
}

impl<T> GateChain<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            gates: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, gate: Arc<dyn ValidationGate<T>>) -> GateId {
        let id = GateId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.gates.write().push((id, gate));
        id
    }

    pub fn unregister(&self, id: GateId) -> bool {
        let mut gates = self.gates.write();
        let before = gates.len();
        gates.retain(|(existing, _)| *existing != id);
        gates.len() != before
    }

    pub fn clear(&self) {
        self.gates.write().clear();
    }

    pub fn len(&self) -> usize {
        self.gates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.read().is_empty()
    }

    /// Run every gate in registration order
    ///
    /// All gates run even after one reports errors, so the caller sees the
    /// complete list.
    pub fn evaluate(&self, candidate: &T, changes: &ChangeSet, default_allow: bool) -> GateDecision {
        let gates: Vec<SharedGate<T>> = self.gates.read().iter().map(|(_, g)| g.clone()).collect();
        let ctx = GateContext {
            changes: changes.clone(),
            default_allow,
        };

        let mut decision = GateDecision {
            default_allow,
            ..Default::default()
        };
        for gate in gates {
            let vote = gate.check(candidate, &ctx, &mut decision.errors);
            decision.vote = compose_vote(decision.vote, vote);
        }

        debug!(
            "Gate chain: {} errors, vote {:?}, default {}",
            decision.errors.len(),
            decision.vote,
            default_allow
        );
        decision
    }
}

impl<T> Default for GateChain<T> {
    fn default() -> Self {
        Self::new()
    }
}
