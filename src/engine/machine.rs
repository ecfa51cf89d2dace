use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Bound shared by state and transition symbols.
pub trait Symbol: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<X> Symbol for X where X: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// Veto predicate over `(from, to)`, registered per transition symbol.
pub type Guard<S> = Box<dyn Fn(S, S) -> bool + Send + Sync>;
/// Called with the state being left.
pub type EnterHook<S> = Box<dyn Fn(S) + Send + Sync>;
/// Called with the state being entered.
pub type ExitHook<S> = Box<dyn Fn(S) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid state transition: {transition} is not allowed from {from}")]
    InvalidTransition { from: String, transition: String },
}

impl EngineError {
    fn invalid<S: fmt::Display, T: fmt::Display>(from: S, transition: T) -> Self {
        EngineError::InvalidTransition {
            from: from.to_string(),
            transition: transition.to_string(),
        }
    }
}

/// One registered edge of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionInfo<S, T> {
    pub from: S,
    pub transition: T,
    pub to: S,
}

struct Table<S, T> {
    transitions: HashMap<S, HashMap<T, S>>,
    guards: HashMap<T, Vec<Guard<S>>>,
    on_enter: HashMap<S, Vec<EnterHook<S>>>,
    on_exit: HashMap<S, Vec<ExitHook<S>>>,
}

impl<S: Symbol, T: Symbol> Table<S, T> {
    fn new() -> Self {
        Self {
            transitions: HashMap::new(),
            guards: HashMap::new(),
            on_enter: HashMap::new(),
            on_exit: HashMap::new(),
        }
    }

    /// Resolves an edge and runs every guard of its transition symbol.
    /// Every read path goes through here so listings cannot drift from `next_state`.
    fn resolve(&self, from: S, transition: T) -> Option<S> {
        let to = *self.transitions.get(&from)?.get(&transition)?;
        let allowed = self
            .guards
            .get(&transition)
            .map_or(true, |guards| guards.iter().all(|guard| guard(from, to)));
        allowed.then_some(to)
    }
}

/// Generic directed graph of `(state, transition) -> state` with guards and hooks.
///
/// Reads (`can_transition`, `next_state`, `available_transitions`) share a reader lock.
/// Registration and `execute_transition` take the writer lock.
///
/// # Reentrancy
///
/// Enter/exit hooks run while the writer lock is held. A hook must not call any method of
/// the engine that invoked it (that deadlocks) and must return quickly.
pub struct TransitionEngine<S, T> {
    initial_state: S,
    table: RwLock<Table<S, T>>,
}

impl<S: Symbol, T: Symbol> TransitionEngine<S, T> {
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_state,
            table: RwLock::new(Table::new()),
        }
    }

    // Poisoning only happens when a guard or hook panics; the table itself is never
    // left half-written, so the data is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Table<S, T>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table<S, T>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn initial_state(&self) -> S {
        self.initial_state
    }

    /// Registers one edge. An existing edge for the same `(from, transition)` is replaced.
    pub fn add_transition(&self, from: S, transition: T, to: S) {
        let mut table = self.write();
        if let Some(previous) = table.transitions.entry(from).or_default().insert(transition, to) {
            if previous != to {
                tracing::debug!(
                    from = %from,
                    transition = %transition,
                    previous = %previous,
                    to = %to,
                    "Transition edge overwritten"
                );
            }
        }
    }

    pub fn add_transitions<I>(&self, edges: I)
    where
        I: IntoIterator<Item = (S, T, S)>,
    {
        for (from, transition, to) in edges {
            self.add_transition(from, transition, to);
        }
    }

    /// Attaches a guard to every edge labelled `transition`, whatever its source state.
    pub fn add_guard<F>(&self, transition: T, guard: F)
    where
        F: Fn(S, S) -> bool + Send + Sync + 'static,
    {
        self.write().guards.entry(transition).or_default().push(Box::new(guard));
    }

    /// Registers a hook fired after `state` is entered; it receives the previous state.
    pub fn on_enter<F>(&self, state: S, callback: F)
    where
        F: Fn(S) + Send + Sync + 'static,
    {
        self.write().on_enter.entry(state).or_default().push(Box::new(callback));
    }

    /// Registers a hook fired when `state` is left; it receives the next state.
    pub fn on_exit<F>(&self, state: S, callback: F)
    where
        F: Fn(S) + Send + Sync + 'static,
    {
        self.write().on_exit.entry(state).or_default().push(Box::new(callback));
    }

    pub fn can_transition(&self, from: S, transition: T) -> bool {
        self.read().resolve(from, transition).is_some()
    }

    pub fn next_state(&self, from: S, transition: T) -> Result<S, EngineError> {
        self.read()
            .resolve(from, transition)
            .ok_or_else(|| EngineError::invalid(from, transition))
    }

    pub fn available_transitions(&self, from: S) -> BTreeSet<T> {
        let table = self.read();
        let Some(edges) = table.transitions.get(&from) else {
            return BTreeSet::new();
        };
        edges
            .keys()
            .copied()
            .filter(|transition| table.resolve(from, *transition).is_some())
            .collect()
    }

    /// Validates like [`next_state`](Self::next_state), then fires exit and enter hooks,
    /// all inside one exclusive critical section.
    pub fn execute_transition(&self, current: S, transition: T) -> Result<S, EngineError> {
        let table = self.write();
        let next = table
            .resolve(current, transition)
            .ok_or_else(|| EngineError::invalid(current, transition))?;

        if let Some(hooks) = table.on_exit.get(&current) {
            for hook in hooks {
                hook(next);
            }
        }
        if let Some(hooks) = table.on_enter.get(&next) {
            for hook in hooks {
                hook(current);
            }
        }
        Ok(next)
    }

    /// Every state that appears as the source or target of an edge.
    pub fn all_states(&self) -> BTreeSet<S> {
        let table = self.read();
        table
            .transitions
            .iter()
            .flat_map(|(from, edges)| std::iter::once(*from).chain(edges.values().copied()))
            .collect()
    }

    /// All registered edges, sorted by `(from, transition)`.
    pub fn all_transitions(&self) -> Vec<TransitionInfo<S, T>> {
        let table = self.read();
        let mut edges: Vec<_> = table
            .transitions
            .iter()
            .flat_map(|(from, edges)| {
                edges.iter().map(|(transition, to)| TransitionInfo {
                    from: *from,
                    transition: *transition,
                    to: *to,
                })
            })
            .collect();
        edges.sort();
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.read().transitions.values().map(HashMap::len).sum()
    }

    /// Copies the edge table only. Guards and hooks are not carried over because they may
    /// capture state that must not be shared with the copy.
    pub fn clone_topology(&self) -> Self {
        let clone = Self::new(self.initial_state);
        {
            let source = self.read();
            let mut target = clone.write();
            target.transitions = source.transitions.clone();
        }
        clone
    }
}

impl<S: Symbol, T: Symbol> fmt::Debug for TransitionEngine<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.read();
        f.debug_struct("TransitionEngine")
            .field("initial_state", &self.initial_state)
            .field("edges", &table.transitions.values().map(HashMap::len).sum::<usize>())
            .field("guarded_transitions", &table.guards.len())
            .finish()
    }
}
