//! Row readers.
//!
//! A row reader drives one ordered key traversal and decodes each
//! physical entry back into a typed [`Row`]. The raw reader here is the
//! bottom of the reader stack; projected/grouped/joined readers in upper
//! layers wrap the same capability set.
//!
//! ## Lifecycle
//!
//! 1. Construct with `(tx, params, table, period, alias, scan specs)`
//! 2. Call `read` until it returns [`SqlError::NoMoreRows`]
//! 3. Call `close`; readers hold store resources, dropping is not enough
//!
//! The tx window implied by the period resolves lazily on the first
//! `read`, so parameter bindings supplied after construction are honored.
//! A missing transaction in the window surfaces as `NoMoreRows`: an empty
//! window holds no data, it is not a failure.

use crate::descriptor::{encode_selector, ColDescriptor, REV_COLUMN, TX_METADATA_COLUMN};
use crate::error::{Result, SqlError};
use crate::period::{Period, TxRange};
use crate::row::Row;
use crate::scan::{key_reader_spec_from, ScanSpecs};
use crate::tx::{Params, SqlTx};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use strata_db_core::codec::{decode_value, decode_value_len, ENC_ID_LEN, ENC_LEN_LEN};
use strata_db_core::storage::{EmptyKeyReader, KeyReader, TxMetadata};
use strata_db_core::{Error as CoreError, ScanContext, SqlType, SqlValue, Table};

/// Hook fired exactly once from `close`.
pub type CloseHook = Box<dyn FnOnce() + Send>;

/// Capability set shared by every reader variant.
#[async_trait]
pub trait RowReader: Send {
    /// The enclosing transaction.
    fn tx(&self) -> &SqlTx;

    /// Alias the table is projected under.
    fn table_alias(&self) -> &str;

    /// Parameter bindings this reader resolves expressions against.
    fn parameters(&self) -> &Params;

    /// Produce the next row, in index order.
    ///
    /// Ends with [`SqlError::NoMoreRows`]; corruption and cancellation
    /// surface as errors and are not retried.
    async fn read(&mut self, ctx: &ScanContext) -> Result<Row>;

    /// Release the underlying iterator and fire the close hook.
    fn close(&mut self) -> Result<()>;

    /// Copy of the projected column descriptors, in position order.
    fn columns(&self) -> Vec<ColDescriptor>;

    /// Copy of the selector-addressed descriptor map.
    fn cols_by_selector(&self) -> HashMap<String, ColDescriptor>;

    /// Descriptors of the index columns, in index order.
    fn order_by(&self) -> Vec<ColDescriptor>;

    /// The scan specification this reader traverses.
    fn scan_specs(&self) -> &ScanSpecs;

    /// Record parameter types implied by the reader's expressions.
    fn infer_parameters(&self, params: &mut HashMap<String, SqlType>) -> Result<()>;

    /// Register the close hook; at most one, later registrations are
    /// ignored.
    fn on_close(&mut self, hook: CloseHook);
}

/// Reader over one table's physical index entries.
pub struct RawRowReader {
    tx: SqlTx,
    table: Arc<Table>,
    table_alias: String,
    cols_by_pos: Vec<ColDescriptor>,
    cols_by_sel: HashMap<String, ColDescriptor>,
    scan_specs: ScanSpecs,

    /// Temporal restriction; resolution is deferred to the first `read`.
    period: Period,
    /// Resolved tx window, set once by `reduce_tx_range`.
    tx_range: Option<TxRange>,

    params: Params,

    reader: Box<dyn KeyReader>,
    on_close_hook: Option<CloseHook>,
    closed: bool,
}

impl std::fmt::Debug for RawRowReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawRowReader")
            .field("table_alias", &self.table_alias)
            .field("cols_by_pos", &self.cols_by_pos)
            .field("scan_specs", &self.scan_specs)
            .field("period", &self.period)
            .field("tx_range", &self.tx_range)
            .field("closed", &self.closed)
            .finish()
    }
}

impl RawRowReader {
    /// Build a raw reader. Fails with `IllegalArguments` when the scan's
    /// index does not belong to the table.
    pub fn new(
        tx: SqlTx,
        params: Params,
        table: Arc<Table>,
        period: Period,
        table_alias: impl Into<String>,
        scan_specs: ScanSpecs,
    ) -> Result<Self> {
        if table.index(scan_specs.index.id) != Some(&scan_specs.index) {
            return Err(SqlError::IllegalArguments(
                "scan index does not belong to the scanned table",
            ));
        }

        let rspec = key_reader_spec_from(tx.prefix(), &table, &scan_specs)?;

        let reader: Box<dyn KeyReader> = if table.is_virtual() {
            Box::new(EmptyKeyReader)
        } else {
            tx.new_key_reader(rspec)?
        };

        let mut table_alias = table_alias.into();
        if table_alias.is_empty() {
            table_alias = table.name().to_string();
        }

        let n_cols = table.cols().len() + scan_specs.extra_cols();
        let mut cols_by_pos = Vec::with_capacity(n_cols);
        let mut cols_by_sel = HashMap::with_capacity(n_cols);

        if scan_specs.include_history {
            cols_by_pos.push(ColDescriptor::new(&table_alias, REV_COLUMN, SqlType::Integer));
        }
        if scan_specs.include_tx_metadata {
            cols_by_pos.push(ColDescriptor::new(
                &table_alias,
                TX_METADATA_COLUMN,
                SqlType::Json,
            ));
        }
        for col in table.cols() {
            cols_by_pos.push(ColDescriptor::new(&table_alias, &col.name, col.ty));
        }
        for descriptor in &cols_by_pos {
            cols_by_sel.insert(descriptor.selector(), descriptor.clone());
        }

        tracing::debug!(
            table = table.name(),
            index = scan_specs.index.id,
            alias = %table_alias,
            history = scan_specs.include_history,
            desc = scan_specs.desc_order,
            "opened raw row reader"
        );

        Ok(Self {
            tx,
            table,
            table_alias,
            cols_by_pos,
            cols_by_sel,
            scan_specs,
            period,
            tx_range: None,
            params,
            reader,
            on_close_hook: None,
            closed: false,
        })
    }

    /// Resolve the period to a tx window, once. Idempotent; a no-op for
    /// unbounded periods.
    fn reduce_tx_range(&mut self) -> Result<()> {
        if self.tx_range.is_some() || self.period.is_unbounded() {
            return Ok(());
        }
        self.tx_range = Some(self.period.resolve(&self.tx, &self.params)?);
        Ok(())
    }

    fn parse_tx_metadata(&self, md: Option<&TxMetadata>) -> Result<SqlValue> {
        let Some(extra) = md.and_then(TxMetadata::extra) else {
            return Ok(SqlValue::Null(SqlType::Json));
        };
        Ok(SqlValue::Json(self.tx.parse_tx_metadata(extra)?))
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

#[async_trait]
impl RowReader for RawRowReader {
    fn tx(&self) -> &SqlTx {
        &self.tx
    }

    fn table_alias(&self) -> &str {
        &self.table_alias
    }

    fn parameters(&self) -> &Params {
        &self.params
    }

    async fn read(&mut self, ctx: &ScanContext) -> Result<Row> {
        ctx.check()?;

        // Evaluation of the tx window is postponed so parameters provided
        // after reader construction are honored.
        match self.reduce_tx_range() {
            Err(SqlError::Core(CoreError::TxNotFound)) => return Err(SqlError::NoMoreRows),
            other => other?,
        }

        let entry = match &self.tx_range {
            Some(range) => {
                self.reader
                    .read_between(ctx, range.initial_tx_id, range.final_tx_id)
                    .await
            }
            None => self.reader.read(ctx).await,
        };
        let (_mkey, vref) = match entry {
            Err(CoreError::NoMoreEntries) => return Err(SqlError::NoMoreRows),
            other => other?,
        };

        let v = vref.resolve()?;

        let mut values_by_position = Vec::with_capacity(self.cols_by_pos.len());
        let mut values_by_selector = HashMap::with_capacity(self.cols_by_sel.len());

        for col in &self.cols_by_pos {
            let value = match col.column.as_str() {
                REV_COLUMN => SqlValue::Integer(vref.hc() as i64),
                TX_METADATA_COLUMN => self.parse_tx_metadata(vref.tx_metadata())?,
                _ => SqlValue::Null(col.ty),
            };
            values_by_selector.insert(col.selector(), value.clone());
            values_by_position.push(value);
        }

        if v.len() < ENC_LEN_LEN {
            return Err(SqlError::corrupted("row payload shorter than its header"));
        }

        let extra_cols = self.scan_specs.extra_cols();
        let mut voff = 0usize;

        let col_count = read_u32(&v, voff) as usize;
        voff += ENC_LEN_LEN;

        // The payload stores column ids in arbitrary order; match them
        // against the id-sorted column list with a forward cursor that
        // skips columns absent from the payload (they stay NULL).
        let mut pos = 0usize;

        for _ in 0..col_count {
            if v.len() - voff < ENC_ID_LEN {
                return Err(SqlError::corrupted("column id truncated in row payload"));
            }
            let col_id = read_u32(&v, voff);
            voff += ENC_ID_LEN;

            let Some(col) = self.table.column_by_id(col_id) else {
                if col_id <= self.table.max_col_id() {
                    // dropped column, skip it
                    let (vlen, n) = decode_value_len(&v[voff..])?;
                    voff += n + vlen;
                    continue;
                }
                return Err(SqlError::corrupted("column id above table watermark"));
            };

            let (value, n) = decode_value(&v[voff..], col.ty)?;
            voff += n;

            // make sure the value lands in the correct position
            while pos < self.table.cols().len() && self.table.cols()[pos].id < col_id {
                pos += 1;
            }
            if pos == self.table.cols().len() || self.table.cols()[pos].id != col_id {
                return Err(SqlError::corrupted("column ids out of order in row payload"));
            }

            values_by_selector.insert(
                encode_selector("", &self.table_alias, &col.name),
                value.clone(),
            );
            values_by_position[pos + extra_cols] = value;
            pos += 1;
        }

        if v.len() != voff {
            return Err(SqlError::corrupted("trailing bytes after row payload"));
        }

        Ok(Row {
            values_by_position,
            values_by_selector,
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(hook) = self.on_close_hook.take() {
            hook();
        }
        if !self.closed {
            self.closed = true;
            self.reader.close()?;
            tracing::debug!(table = self.table.name(), "closed raw row reader");
        }
        Ok(())
    }

    fn columns(&self) -> Vec<ColDescriptor> {
        self.cols_by_pos.clone()
    }

    fn cols_by_selector(&self) -> HashMap<String, ColDescriptor> {
        self.cols_by_sel.clone()
    }

    fn order_by(&self) -> Vec<ColDescriptor> {
        self.scan_specs
            .index
            .cols
            .iter()
            .map(|col| ColDescriptor::new(&self.table_alias, &col.name, col.ty))
            .collect()
    }

    fn scan_specs(&self) -> &ScanSpecs {
        &self.scan_specs
    }

    fn infer_parameters(&self, params: &mut HashMap<String, SqlType>) -> Result<()> {
        self.period.infer_parameters(params)
    }

    fn on_close(&mut self, hook: CloseHook) {
        if self.on_close_hook.is_none() {
            self.on_close_hook = Some(hook);
        }
    }
}

/// Drain a reader into memory. Only `NoMoreRows` terminates the loop;
/// every other error propagates.
pub async fn read_all_rows(ctx: &ScanContext, reader: &mut dyn RowReader) -> Result<Vec<Row>> {
    let batch_size = reader.tx().batch_size();
    let mut rows = Vec::new();
    read_rows_batch(ctx, reader, batch_size, |batch| {
        rows.extend(batch);
        Ok(())
    })
    .await?;
    Ok(rows)
}

/// Drain a reader in fixed-size batches, invoking `on_batch` per group.
pub async fn read_rows_batch<F>(
    ctx: &ScanContext,
    reader: &mut dyn RowReader,
    batch_size: usize,
    mut on_batch: F,
) -> Result<()>
where
    F: FnMut(Vec<Row>) -> Result<()> + Send,
{
    if batch_size == 0 {
        return Err(SqlError::IllegalArguments("batch size must be positive"));
    }

    loop {
        let mut batch = Vec::with_capacity(batch_size);
        let mut terminal = None;

        while batch.len() < batch_size {
            match reader.read(ctx).await {
                Ok(row) => batch.push(row),
                Err(e) => {
                    terminal = Some(e);
                    break;
                }
            }
        }

        if !batch.is_empty() {
            on_batch(batch)?;
        }

        match terminal {
            None => {}
            Some(SqlError::NoMoreRows) => return Ok(()),
            Some(e) => return Err(e),
        }
    }
}
