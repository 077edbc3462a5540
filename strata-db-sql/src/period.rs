//! Temporal periods and their resolution to tx windows.
//!
//! A period restricts a scan to entries written by transactions inside
//! `[t_start, t_end]`, derived from SQL `AS OF` / `SINCE` / `UNTIL`
//! clauses. Instants are expressions over parameters and the transaction,
//! so resolution is deferred until the reader's first `read`: parameter
//! bindings may arrive after reader construction.
//!
//! ## Resolution rules
//!
//! - Absent sides default to `[0, u64::MAX]`: no window at all when both
//!   are absent.
//! - Tx-id instants use the id directly; exclusivity shifts the boundary
//!   by one. Ids outside the snapshot's committed range resolve to
//!   `TxNotFound`, which the reader treats as an empty window.
//! - Time instants resolve through the snapshot's commit log: "earliest
//!   matching" for starts, "latest matching" for ends, inclusivity
//!   applied by the lookup.

use crate::error::{Result, SqlError};
use crate::tx::{Params, SqlTx};
use std::collections::HashMap;
use strata_db_core::{Error as CoreError, SqlType, SqlValue};

/// Instant expression: a literal or a named parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum InstantExp {
    Literal(SqlValue),
    Param(String),
}

/// What an instant expression denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantKind {
    /// A transaction id (INTEGER).
    TxId,
    /// A commit timestamp (TIMESTAMP).
    Time,
}

/// One temporal instant: expression + interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct Instant {
    pub exp: InstantExp,
    pub kind: InstantKind,
}

impl Instant {
    pub fn tx_id(exp: InstantExp) -> Self {
        Self {
            exp,
            kind: InstantKind::TxId,
        }
    }

    pub fn time(exp: InstantExp) -> Self {
        Self {
            exp,
            kind: InstantKind::Time,
        }
    }

    fn value(&self, params: &Params) -> Result<SqlValue> {
        match &self.exp {
            InstantExp::Literal(v) => Ok(v.clone()),
            InstantExp::Param(name) => params
                .get(name)
                .cloned()
                .ok_or_else(|| SqlError::MissingParameter(name.clone())),
        }
    }

    /// Resolve to a concrete tx id. `earliest` selects the
    /// start-of-window interpretation, `inclusive` whether the boundary
    /// tx itself belongs to the window.
    pub fn resolve(
        &self,
        tx: &SqlTx,
        params: &Params,
        earliest: bool,
        inclusive: bool,
    ) -> Result<u64> {
        match self.kind {
            InstantKind::TxId => {
                let SqlValue::Integer(id) = self.value(params)? else {
                    return Err(SqlError::InvalidPeriod("tx instant must be an INTEGER"));
                };
                if id <= 0 {
                    return Err(SqlError::InvalidPeriod("tx id must be positive"));
                }
                let base = id as u64;

                let resolved = if earliest {
                    if inclusive {
                        base
                    } else {
                        base + 1
                    }
                } else if inclusive {
                    base
                } else {
                    base - 1
                };

                if resolved < 1 || resolved > tx.current_tx_id() {
                    return Err(SqlError::Core(CoreError::TxNotFound));
                }
                Ok(resolved)
            }
            InstantKind::Time => {
                let SqlValue::Timestamp(ts) = self.value(params)? else {
                    return Err(SqlError::InvalidPeriod("time instant must be a TIMESTAMP"));
                };
                if earliest {
                    tx.first_tx_since(ts, inclusive)
                } else {
                    tx.last_tx_until(ts, inclusive)
                }
            }
        }
    }

    /// Record the parameter type this instant implies, if it names one.
    pub fn infer_type(&self, params: &mut HashMap<String, SqlType>) -> Result<()> {
        let InstantExp::Param(name) = &self.exp else {
            return Ok(());
        };
        let expected = match self.kind {
            InstantKind::TxId => SqlType::Integer,
            InstantKind::Time => SqlType::Timestamp,
        };
        if let Some(existing) = params.get(name) {
            if *existing != expected {
                return Err(SqlError::IllegalArguments(
                    "conflicting types inferred for parameter",
                ));
            }
        }
        params.insert(name.clone(), expected);
        Ok(())
    }
}

/// One side of a period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodBound {
    pub instant: Instant,
    pub inclusive: bool,
}

/// Temporal restriction over transaction ids; both sides optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Period {
    pub start: Option<PeriodBound>,
    pub end: Option<PeriodBound>,
}

/// Resolved tx window, inclusive on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRange {
    pub initial_tx_id: u64,
    pub final_tx_id: u64,
}

impl Period {
    /// No temporal restriction.
    pub fn none() -> Self {
        Self::default()
    }

    /// `AS OF <instant>`: the window collapses to a single boundary.
    pub fn as_of(instant: Instant) -> Self {
        Self {
            start: Some(PeriodBound {
                instant: instant.clone(),
                inclusive: true,
            }),
            end: Some(PeriodBound {
                instant,
                inclusive: true,
            }),
        }
    }

    /// `SINCE <instant>`.
    pub fn since(instant: Instant, inclusive: bool) -> Self {
        Self {
            start: Some(PeriodBound { instant, inclusive }),
            end: None,
        }
    }

    /// `UNTIL <instant>`.
    pub fn until(instant: Instant, inclusive: bool) -> Self {
        Self {
            start: None,
            end: Some(PeriodBound { instant, inclusive }),
        }
    }

    /// `SINCE … UNTIL …`.
    pub fn between(start: PeriodBound, end: PeriodBound) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// True when no side restricts the scan.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Resolve both sides to a concrete window; absent sides default to
    /// the full range.
    pub fn resolve(&self, tx: &SqlTx, params: &Params) -> Result<TxRange> {
        let mut range = TxRange {
            initial_tx_id: 0,
            final_tx_id: u64::MAX,
        };

        if let Some(start) = &self.start {
            range.initial_tx_id = start.instant.resolve(tx, params, true, start.inclusive)?;
        }
        if let Some(end) = &self.end {
            range.final_tx_id = end.instant.resolve(tx, params, false, end.inclusive)?;
        }

        Ok(range)
    }

    /// Record implied parameter types for both sides.
    pub fn infer_parameters(&self, params: &mut HashMap<String, SqlType>) -> Result<()> {
        if let Some(start) = &self.start {
            start.instant.infer_type(params)?;
        }
        if let Some(end) = &self.end {
            end.instant.infer_type(params)?;
        }
        Ok(())
    }
}
