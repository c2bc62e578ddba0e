//! Which analysis is current, and whether a response still matters.

use std::fmt;

use crate::protocol::EngineResponse;

/// Identifier of one analysis query, sent on the wire as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(u64);

impl QueryId {
    pub fn new(n: u64) -> Self {
        Self(n)
    }

    /// Whether a wire id refers to this query.
    pub fn matches(&self, wire_id: &str) -> bool {
        wire_id == self.to_string()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryState {
    #[default]
    Idle,
    AwaitingResult(QueryId),
}

/// What to do with a response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not for the current query; drop it.
    Stale,
    /// In-search update for the current query.
    Update,
    /// Terminal line for the current query; the session is idle again.
    Final,
}

#[derive(Debug, Default)]
pub struct QuerySession {
    state: QueryState,
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn current(&self) -> Option<QueryId> {
        match self.state {
            QueryState::Idle => None,
            QueryState::AwaitingResult(id) => Some(id),
        }
    }

    pub fn is_current(&self, wire_id: &str) -> bool {
        self.current().is_some_and(|id| id.matches(wire_id))
    }

    /// Make `id` the only addressable query.
    ///
    /// Returns the query it replaced, which the caller should ask the engine
    /// to terminate.
    pub fn begin_query(&mut self, id: QueryId) -> Option<QueryId> {
        let superseded = self.current().filter(|old| *old != id);
        self.state = QueryState::AwaitingResult(id);
        superseded
    }

    /// Classify a response and advance the state machine.
    pub fn accept(&mut self, response: &EngineResponse) -> Disposition {
        if !self.is_current(&response.id) {
            return Disposition::Stale;
        }
        if response.is_final() {
            self.state = QueryState::Idle;
            Disposition::Final
        } else {
            Disposition::Update
        }
    }

    /// Forget the current query. Returns it so it can be terminated.
    pub fn reset(&mut self) -> Option<QueryId> {
        let current = self.current();
        self.state = QueryState::Idle;
        current
    }
}
