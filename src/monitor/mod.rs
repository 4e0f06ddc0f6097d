//! Monitors: a query, a check interval and a trigger rule bound to one
//! document block.

mod interval;
mod trigger;

pub use interval::Interval;
pub use trigger::{Trigger, TriggerKind};

use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::fetch::Fetcher;
use crate::query::{evaluate_query, QueryError, ResultKind, TypedResult};
use crate::version_pair::{VersionPair, VersionPairError};

/// Errors building a monitor from its fields. These skip the monitor only.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid interval '{text}': {reason}")]
    InvalidInterval { text: String, reason: String },
    #[error("invalid trigger '{text}': {reason}")]
    InvalidTrigger { text: String, reason: String },
    #[error("monitor name is empty")]
    EmptyName,
    #[error("missing <{0}>")]
    MissingField(&'static str),
    #[error("<{0}> is empty")]
    EmptyField(&'static str),
    #[error("<{0}> given more than once")]
    DuplicateField(&'static str),
}

/// Which side of a version pair a query ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    Old,
    Current,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Old => write!(f, "cached"),
            Snapshot::Current => write!(f, "current"),
        }
    }
}

/// Errors evaluating a monitor. The monitor is not evaluable this run.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    VersionPair(#[from] VersionPairError),
    #[error("query failed on {snapshot} document: {source}")]
    Query {
        snapshot: Snapshot,
        source: QueryError,
    },
    #[error("result type changed from {old} to {current}")]
    ShapeMismatch { old: ResultKind, current: ResultKind },
    #[error("monitor '{0}' does not belong to the open document block")]
    StaleBlock(String),
    #[error("monitor '{0}' has not been evaluated")]
    NotEvaluated(String),
}

#[derive(Debug)]
pub struct Monitor {
    name: String,
    query: String,
    interval: Interval,
    trigger: Trigger,
    /// Document block whose version pair this monitor runs against
    block: u64,
    results: Option<(TypedResult, TypedResult)>,
}

impl Monitor {
    pub fn new(
        name: &str,
        query: &str,
        interval: Interval,
        trigger: Trigger,
        block: u64,
    ) -> Result<Self, MonitorError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MonitorError::EmptyName);
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(MonitorError::EmptyField("query"));
        }

        Ok(Self {
            name: name.to_string(),
            query: query.to_string(),
            interval,
            trigger,
            block,
            results: None,
        })
    }

    /// Build a monitor from the raw text of its fields.
    pub fn parse(
        name: &str,
        query: &str,
        interval: &str,
        trigger: &str,
        block: u64,
    ) -> Result<Self, MonitorError> {
        Self::new(name, query, interval.parse()?, trigger.parse()?, block)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    /// Old and current results of the last successful evaluation
    pub fn results(&self) -> Option<(&TypedResult, &TypedResult)> {
        self.results.as_ref().map(|(old, current)| (old, current))
    }

    /// Run the query against both snapshots of `pair`.
    ///
    /// On failure any previous results are cleared.
    pub fn evaluate(
        &mut self,
        pair: &mut VersionPair,
        fetcher: &dyn Fetcher,
    ) -> Result<(), EvalError> {
        self.results = None;
        if pair.block() != self.block {
            return Err(EvalError::StaleBlock(self.name.clone()));
        }

        let (old_tree, current_tree) = pair.parse_both(fetcher)?;
        let old = evaluate_query(old_tree, &self.query).map_err(|source| EvalError::Query {
            snapshot: Snapshot::Old,
            source,
        })?;
        let current =
            evaluate_query(current_tree, &self.query).map_err(|source| EvalError::Query {
                snapshot: Snapshot::Current,
                source,
            })?;

        if old.kind() != current.kind() {
            return Err(EvalError::ShapeMismatch {
                old: old.kind(),
                current: current.kind(),
            });
        }

        debug!(monitor = %self.name, kind = %old.kind(), "evaluated query");
        self.results = Some((old, current));
        Ok(())
    }

    /// Whether the last evaluation fires the trigger
    pub fn triggered(&self) -> Result<bool, EvalError> {
        match &self.results {
            Some((old, current)) => self.trigger.fires(old, current),
            None => Err(EvalError::NotEvaluated(self.name.clone())),
        }
    }

    /// Unix time of the next check after `last_check`
    pub fn next_check(&self, last_check: i64) -> i64 {
        let interval = i64::try_from(self.interval.as_secs()).unwrap_or(i64::MAX);
        last_check.saturating_add(interval)
    }

    pub fn is_due(&self, last_check: i64, now: i64, force: bool) -> bool {
        force || now >= self.next_check(last_check)
    }
}
