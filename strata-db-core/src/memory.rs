//! In-memory versioned store.
//!
//! `MemoryStore` is the reference implementation of the [`storage`]
//! traits: a tx-versioned ordered map with a commit log. It backs the
//! test suites and gives embedders a zero-setup store; production
//! embedders plug their own [`Snapshot`] implementation instead.
//!
//! ## Versioning model
//!
//! Every commit gets the next tx id (1-based) and a timestamp. Each key
//! holds its full revision history; a snapshot captures the highest tx id
//! visible to it at creation, so later commits never leak into an open
//! snapshot. History iteration yields one entry per revision with a
//! 1-based history counter; plain iteration yields the latest revision
//! visible in the requested tx window.
//!
//! [`storage`]: crate::storage

use crate::context::ScanContext;
use crate::error::{Error, Result};
use crate::storage::{Filter, KeyReader, KeyReaderSpec, Snapshot, TxMetadata, ValueRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

// ============================================================================
// Store state
// ============================================================================

#[derive(Debug, Clone)]
struct Version {
    tx_id: u64,
    value: Arc<Vec<u8>>,
    deleted: bool,
    expires_at: Option<DateTime<Utc>>,
    tx_metadata: Option<Arc<TxMetadata>>,
}

#[derive(Debug, Clone, Copy)]
struct TxRecord {
    tx_id: u64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: BTreeMap<Vec<u8>, Vec<Version>>,
    tx_log: Vec<TxRecord>,
}

/// Tx-versioned ordered in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

/// One atomic set of writes, committed under a single tx id.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    tx_metadata: Option<TxMetadata>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum BatchOp {
    Set {
        key: Vec<u8>,
        value: Vec<u8>,
        expires_at: Option<DateTime<Utc>>,
    },
    Delete {
        key: Vec<u8>,
    },
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `key = value`.
    pub fn set(mut self, key: Vec<u8>, value: Vec<u8>) -> Self {
        self.ops.push(BatchOp::Set {
            key,
            value,
            expires_at: None,
        });
        self
    }

    /// Write `key = value` with an expiration instant.
    pub fn set_expiring(mut self, key: Vec<u8>, value: Vec<u8>, at: DateTime<Utc>) -> Self {
        self.ops.push(BatchOp::Set {
            key,
            value,
            expires_at: Some(at),
        });
        self
    }

    /// Write a delete marker for `key`.
    pub fn delete(mut self, key: Vec<u8>) -> Self {
        self.ops.push(BatchOp::Delete { key });
        self
    }

    /// Attach per-transaction metadata to the commit.
    pub fn with_tx_metadata(mut self, md: TxMetadata) -> Self {
        self.tx_metadata = Some(md);
        self
    }

    /// Override the commit timestamp (defaults to now). Tests drive
    /// temporal queries with this.
    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a batch, returning its assigned tx id.
    pub fn commit(&self, batch: WriteBatch) -> u64 {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let tx_id = inner.tx_log.len() as u64 + 1;
        let timestamp = batch.timestamp.unwrap_or_else(Utc::now);
        let tx_metadata = batch.tx_metadata.map(Arc::new);

        let op_count = batch.ops.len();
        for op in batch.ops {
            let (key, value, deleted, expires_at) = match op {
                BatchOp::Set {
                    key,
                    value,
                    expires_at,
                } => (key, value, false, expires_at),
                BatchOp::Delete { key } => (key, Vec::new(), true, None),
            };
            inner.entries.entry(key).or_default().push(Version {
                tx_id,
                value: Arc::new(value),
                deleted,
                expires_at,
                tx_metadata: tx_metadata.clone(),
            });
        }

        inner.tx_log.push(TxRecord { tx_id, timestamp });
        tracing::trace!(tx_id, ops = op_count, "committed write batch");
        tx_id
    }

    /// Capture a snapshot of everything committed so far.
    pub fn snapshot(&self) -> MemorySnapshot {
        let up_to_tx = self
            .inner
            .read()
            .expect("store lock poisoned")
            .tx_log
            .len() as u64;
        MemorySnapshot {
            inner: self.inner.clone(),
            up_to_tx,
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Immutable view of the store as of one committed tx.
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    inner: Arc<RwLock<StoreInner>>,
    up_to_tx: u64,
}

impl Snapshot for MemorySnapshot {
    fn new_key_reader(&self, spec: KeyReaderSpec) -> Result<Box<dyn KeyReader>> {
        Ok(Box::new(MemoryKeyReader {
            inner: self.inner.clone(),
            up_to_tx: self.up_to_tx,
            spec,
            last_key: None,
            pending: VecDeque::new(),
            closed: false,
        }))
    }

    fn current_tx_id(&self) -> u64 {
        self.up_to_tx
    }

    fn first_tx_since(&self, ts: DateTime<Utc>, inclusive: bool) -> Result<u64> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner
            .tx_log
            .iter()
            .filter(|r| r.tx_id <= self.up_to_tx)
            .find(|r| {
                if inclusive {
                    r.timestamp >= ts
                } else {
                    r.timestamp > ts
                }
            })
            .map(|r| r.tx_id)
            .ok_or(Error::TxNotFound)
    }

    fn last_tx_until(&self, ts: DateTime<Utc>, inclusive: bool) -> Result<u64> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner
            .tx_log
            .iter()
            .filter(|r| r.tx_id <= self.up_to_tx)
            .rev()
            .find(|r| {
                if inclusive {
                    r.timestamp <= ts
                } else {
                    r.timestamp < ts
                }
            })
            .map(|r| r.tx_id)
            .ok_or(Error::TxNotFound)
    }
}

// ============================================================================
// Key reader
// ============================================================================

struct MemoryValueRef {
    value: Arc<Vec<u8>>,
    hc: u64,
    tx_metadata: Option<Arc<TxMetadata>>,
}

impl ValueRef for MemoryValueRef {
    fn resolve(&self) -> Result<Vec<u8>> {
        Ok(self.value.as_ref().clone())
    }

    fn hc(&self) -> u64 {
        self.hc
    }

    fn tx_metadata(&self) -> Option<&TxMetadata> {
        self.tx_metadata.as_deref()
    }
}

struct MemoryKeyReader {
    inner: Arc<RwLock<StoreInner>>,
    up_to_tx: u64,
    spec: KeyReaderSpec,
    /// Last key handed to (or skipped for) the caller; iteration resumes
    /// strictly past it.
    last_key: Option<Vec<u8>>,
    /// Remaining history revisions of the current key.
    pending: VecDeque<(Vec<u8>, MemoryValueRef)>,
    closed: bool,
}

impl MemoryKeyReader {
    fn next_entry(&mut self, lo: u64, hi: u64) -> Result<(Vec<u8>, Box<dyn ValueRef>)> {
        if self.closed {
            return Err(Error::AlreadyClosed);
        }
        if let Some((key, vref)) = self.pending.pop_front() {
            return Ok((key, Box::new(vref)));
        }

        let now = Utc::now();
        let inner = self.inner.read().expect("store lock poisoned");

        // Resume strictly past the last visited key; on the first call,
        // start at the seek key with the configured inclusivity.
        let resume: Bound<Vec<u8>> = match &self.last_key {
            Some(k) => Bound::Excluded(k.clone()),
            None if self.spec.inclusive_seek => Bound::Included(self.spec.seek_key.clone()),
            None => Bound::Excluded(self.spec.seek_key.clone()),
        };

        let range: Box<dyn Iterator<Item = (&Vec<u8>, &Vec<Version>)> + '_> = if self.spec.desc_order {
            Box::new(inner.entries.range((Bound::Unbounded, resume)).rev())
        } else {
            Box::new(inner.entries.range((resume, Bound::Unbounded)))
        };

        for (key, versions) in range {
            if self.past_end(key) {
                break;
            }
            self.last_key = Some(key.clone());

            if !key.starts_with(&self.spec.prefix) {
                continue;
            }

            let visible: Vec<&Version> = versions
                .iter()
                .filter(|v| v.tx_id <= self.up_to_tx && v.tx_id >= lo && v.tx_id <= hi)
                .collect();
            if visible.is_empty() {
                continue;
            }

            if self.spec.include_history {
                for (i, v) in visible.iter().copied().enumerate() {
                    if self.filtered_out(v, now) {
                        continue;
                    }
                    self.pending.push_back((
                        key.clone(),
                        MemoryValueRef {
                            value: v.value.clone(),
                            hc: (i + 1) as u64,
                            tx_metadata: v.tx_metadata.clone(),
                        },
                    ));
                }
                if let Some((key, vref)) = self.pending.pop_front() {
                    return Ok((key, Box::new(vref)));
                }
            } else {
                let Some(&latest) = visible.last() else {
                    continue;
                };
                if self.filtered_out(latest, now) {
                    continue;
                }
                return Ok((
                    key.clone(),
                    Box::new(MemoryValueRef {
                        value: latest.value.clone(),
                        hc: visible.len() as u64,
                        tx_metadata: latest.tx_metadata.clone(),
                    }),
                ));
            }
        }

        Err(Error::NoMoreEntries)
    }

    /// True once `key` falls outside the interval's far end.
    fn past_end(&self, key: &[u8]) -> bool {
        let end = self.spec.end_key.as_slice();
        if self.spec.desc_order {
            if self.spec.inclusive_end {
                key < end
            } else {
                key <= end
            }
        } else if self.spec.inclusive_end {
            key > end
        } else {
            key >= end
        }
    }

    fn filtered_out(&self, v: &Version, now: DateTime<Utc>) -> bool {
        for filter in &self.spec.filters {
            match filter {
                Filter::IgnoreDeleted if v.deleted => return true,
                Filter::IgnoreExpired if v.expires_at.is_some_and(|t| t <= now) => return true,
                _ => {}
            }
        }
        false
    }
}

#[async_trait]
impl KeyReader for MemoryKeyReader {
    async fn read(&mut self, ctx: &ScanContext) -> Result<(Vec<u8>, Box<dyn ValueRef>)> {
        ctx.check()?;
        self.next_entry(0, u64::MAX)
    }

    async fn read_between(
        &mut self,
        ctx: &ScanContext,
        initial_tx_id: u64,
        final_tx_id: u64,
    ) -> Result<(Vec<u8>, Box<dyn ValueRef>)> {
        ctx.check()?;
        self.next_entry(initial_tx_id, final_tx_id)
    }

    fn reset(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::AlreadyClosed);
        }
        self.last_key = None;
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.pending.clear();
        Ok(())
    }
}
