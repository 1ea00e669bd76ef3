use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use crate::attendance::Dimension;
use crate::basket::SelectionBasket;
use crate::debounce::DebounceTable;
use crate::import::{row_to_fields, Cell};
use crate::store::{ChildFields, ChildRecord, Field, RecordStore, StoreError};

/// Default coalescing window for debounced field edits.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to load roster: {0}")]
    Fetch(#[source] StoreError),
    #[error("failed to create record: {0}")]
    Create(#[source] StoreError),
    #[error("failed to delete record {id}: {source}")]
    Delete {
        id: String,
        #[source]
        source: StoreError,
    },
    #[error("unknown record: {0}")]
    UnknownChild(String),
    #[error("attendance dimension not tracked for this stage")]
    DimensionNotTracked,
    #[error("invalid period key: {0}")]
    BadPeriod(String),
    #[error("nothing selected for transfer")]
    EmptySelection,
}

/// A remote write held back by the debounce table.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    Field { field: Field, value: String },
    Mark {
        dimension: Dimension,
        period: String,
        present: bool,
    },
}

/// A debounced write that failed when it finally fired. The optimistic local
/// value stays as-is; the next edit is the only retry path.
#[derive(Debug)]
pub struct WriteFailure {
    pub child_id: String,
    pub message: String,
}

/// Per-item outcome inside a batch operation. `id` is the child id, or the
/// sheet row label for imports.
#[derive(Debug)]
pub struct ItemFailure {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ResetReport {
    pub updated: usize,
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub created: Vec<String>,
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Default)]
pub struct TransferReport {
    pub moved: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

/// Owns the in-memory roster for one stage view and mediates every read and
/// write against the record store: optimistic local mutation, per-key
/// debounced persistence, bulk import, period reset, and cross-partition
/// transfer. One instance per open view; `close` tears it down.
pub struct RosterSynchronizer {
    partition: String,
    has_activity: bool,
    roster: Vec<ChildRecord>,
    debounce: DebounceTable<PendingWrite>,
    basket: SelectionBasket,
}

impl RosterSynchronizer {
    pub fn new(partition: &str, has_activity: bool, window: Duration) -> RosterSynchronizer {
        RosterSynchronizer {
            partition: partition.to_string(),
            has_activity,
            roster: Vec::new(),
            debounce: DebounceTable::new(window),
            basket: SelectionBasket::default(),
        }
    }

    pub fn records(&self) -> &[ChildRecord] {
        &self.roster
    }

    pub fn pending_writes(&self) -> usize {
        self.debounce.len()
    }

    pub fn selection_len(&self) -> usize {
        self.basket.len()
    }

    /// Load every record whose partition key equals this view's partition
    /// (server-side filter). On transport failure the roster is left empty;
    /// the caller surfaces a notice instead of crashing.
    pub fn fetch(&mut self, store: &mut dyn RecordStore) -> Result<(), RosterError> {
        match store.list(&self.partition) {
            Ok(records) => {
                self.roster = records;
                Ok(())
            }
            Err(e) => {
                self.roster.clear();
                Err(RosterError::Fetch(e))
            }
        }
    }

    /// Create a blank record. Not optimistic: the id is store-assigned, so
    /// the record only appears locally after the round-trip succeeds.
    pub fn add_child(&mut self, store: &mut dyn RecordStore) -> Result<String, RosterError> {
        let fields = ChildFields::default();
        let id = store.create(&self.partition, &fields).map_err(RosterError::Create)?;
        self.roster.push(blank_record(&id, &self.partition, &fields));
        Ok(id)
    }

    /// Optimistic local mutation plus a debounced remote write keyed by
    /// `(id, field)`: within one window only the last value is sent, and the
    /// window restarts on every new edit.
    pub fn edit_field(
        &mut self,
        id: &str,
        field: Field,
        value: &str,
        now: Instant,
    ) -> Result<(), RosterError> {
        let rec = self.record_mut(id)?;
        rec.set_field(field, value);
        self.debounce.push(
            id,
            field.as_str(),
            PendingWrite::Field {
                field,
                value: value.to_string(),
            },
            now,
        );
        Ok(())
    }

    /// Merge one period's presence flag into the record's attendance map,
    /// locally at once and remotely through the debounce table. The remote
    /// call is a partial-path merge, so concurrent sessions editing other
    /// periods are never clobbered.
    pub fn set_attendance(
        &mut self,
        id: &str,
        dimension: Dimension,
        period: &str,
        present: bool,
        now: Instant,
    ) -> Result<(), RosterError> {
        if dimension == Dimension::Activity && !self.has_activity {
            return Err(RosterError::DimensionNotTracked);
        }
        if !dimension.valid_period(period) {
            return Err(RosterError::BadPeriod(period.to_string()));
        }
        let rec = self.record_mut(id)?;
        rec.marks_mut(dimension).insert(period.to_string(), present);
        self.debounce.push(
            id,
            &format!("{}:{}", dimension, period),
            PendingWrite::Mark {
                dimension,
                period: period.to_string(),
                present,
            },
            now,
        );
        Ok(())
    }

    /// Fire every debounced write whose window has elapsed. Failures are
    /// surfaced, not retried; the optimistic local value stays in place.
    pub fn flush_due(&mut self, store: &mut dyn RecordStore, now: Instant) -> Vec<WriteFailure> {
        let due = self.debounce.take_due(now);
        self.apply_writes(store, due)
    }

    /// Fire everything pending regardless of deadline.
    pub fn flush_all(&mut self, store: &mut dyn RecordStore) -> Vec<WriteFailure> {
        let all = self.debounce.take_all();
        self.apply_writes(store, all)
    }

    fn apply_writes(
        &mut self,
        store: &mut dyn RecordStore,
        writes: Vec<(String, PendingWrite)>,
    ) -> Vec<WriteFailure> {
        let mut failures = Vec::new();
        for (id, write) in writes {
            let outcome = match &write {
                PendingWrite::Field { field, value } => store.update_field(&id, *field, value),
                PendingWrite::Mark {
                    dimension,
                    period,
                    present,
                } => store.merge_mark(&id, *dimension, period, *present),
            };
            if let Err(e) = outcome {
                warn!(child_id = %id, error = %e, "debounced write failed");
                failures.push(WriteFailure {
                    child_id: id,
                    message: e.to_string(),
                });
            }
        }
        failures
    }

    /// Remove a record remotely, then locally. Not optimistic: on failure the
    /// record stays visible so the operator can retry. The confirmation
    /// prompt is the caller's precondition.
    pub fn delete_child(
        &mut self,
        store: &mut dyn RecordStore,
        id: &str,
    ) -> Result<(), RosterError> {
        let idx = self
            .roster
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RosterError::UnknownChild(id.to_string()))?;
        store.delete(id).map_err(|source| RosterError::Delete {
            id: id.to_string(),
            source,
        })?;
        self.debounce.cancel_for(id);
        self.basket.toggle(id, false);
        self.roster.remove(idx);
        Ok(())
    }

    /// Overwrite `period` to absent for every record, sequentially and
    /// best-effort: one bad record is logged and reported without blocking
    /// the rest, and its local value is only changed after the remote write
    /// succeeds.
    pub fn reset_period(
        &mut self,
        store: &mut dyn RecordStore,
        dimension: Dimension,
        period: &str,
    ) -> Result<ResetReport, RosterError> {
        if dimension == Dimension::Activity && !self.has_activity {
            return Err(RosterError::DimensionNotTracked);
        }
        if !dimension.valid_period(period) {
            return Err(RosterError::BadPeriod(period.to_string()));
        }
        let mut report = ResetReport::default();
        let ids: Vec<String> = self.roster.iter().map(|r| r.id.clone()).collect();
        for id in ids {
            match store.merge_mark(&id, dimension, period, false) {
                Ok(()) => {
                    if let Ok(rec) = self.record_mut(&id) {
                        rec.marks_mut(dimension).insert(period.to_string(), false);
                    }
                    report.updated += 1;
                }
                Err(e) => {
                    warn!(child_id = %id, error = %e, "reset step failed");
                    report.failures.push(ItemFailure {
                        id,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Sequential create per normalized sheet row. Row 0 is the header; rows
    /// whose cells are all blank are skipped; a failing row is reported and
    /// the rest continue. No transaction spans the import, so a partial
    /// import is an accepted outcome.
    pub fn bulk_import(
        &mut self,
        store: &mut dyn RecordStore,
        rows: &[Vec<Cell>],
    ) -> ImportReport {
        let mut report = ImportReport::default();
        for (idx, row) in rows.iter().enumerate().skip(1) {
            let Some(fields) = row_to_fields(row) else {
                report.skipped += 1;
                continue;
            };
            match store.create(&self.partition, &fields) {
                Ok(id) => {
                    self.roster.push(blank_record(&id, &self.partition, &fields));
                    report.created.push(id);
                }
                Err(e) => {
                    warn!(row = idx + 1, error = %e, "import row failed");
                    report.failures.push(ItemFailure {
                        id: format!("row {}", idx + 1),
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Selection flag for the transfer basket. Only records of this roster
    /// can be selected.
    pub fn toggle_selection(&mut self, id: &str, selected: bool) -> Result<(), RosterError> {
        if !self.roster.iter().any(|r| r.id == id) {
            return Err(RosterError::UnknownChild(id.to_string()));
        }
        self.basket.toggle(id, selected);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.basket.clear();
    }

    /// Reassign every selected record's partition to `target`. Per-id success
    /// is tracked: only the ids whose remote write succeeded leave the local
    /// roster, so the view stays consistent with actual partition membership.
    /// The basket is cleared on completion either way.
    pub fn transfer_selected(
        &mut self,
        store: &mut dyn RecordStore,
        target: &str,
    ) -> Result<TransferReport, RosterError> {
        if self.basket.is_empty() {
            return Err(RosterError::EmptySelection);
        }
        let ids = self.basket.selected_ids();
        let mut report = TransferReport::default();
        for id in ids {
            match store.set_partition(&id, target) {
                Ok(()) => {
                    self.debounce.cancel_for(&id);
                    report.moved.push(id);
                }
                Err(e) => {
                    warn!(child_id = %id, target, error = %e, "transfer step failed");
                    report.failures.push(ItemFailure {
                        id,
                        message: e.to_string(),
                    });
                }
            }
        }
        self.roster.retain(|r| !report.moved.contains(&r.id));
        self.basket.clear();
        Ok(report)
    }

    /// View teardown: drop pending debounced writes without sending them.
    pub fn close(&mut self) {
        self.debounce.clear();
        self.basket.clear();
    }

    /// Case-insensitive substring search over names plus locale-aware
    /// ascending sort, the order the roster table renders in.
    pub fn filtered(&self, search: &str) -> Vec<&ChildRecord> {
        let needle = search.to_lowercase();
        let mut rows: Vec<&ChildRecord> = self
            .roster
            .iter()
            .filter(|r| r.name.to_lowercase().contains(&needle))
            .collect();
        rows.sort_by(|a, b| name_sort_key(&a.name).cmp(&name_sort_key(&b.name)));
        rows
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut ChildRecord, RosterError> {
        self.roster
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RosterError::UnknownChild(id.to_string()))
    }
}

fn blank_record(id: &str, partition: &str, fields: &ChildFields) -> ChildRecord {
    ChildRecord {
        id: id.to_string(),
        page: partition.to_string(),
        name: fields.name.clone(),
        phone: fields.phone.clone(),
        address: fields.address.clone(),
        date_of_birth: fields.date_of_birth.clone(),
        stage_label: fields.stage_label.clone(),
        birth_certificate: fields.birth_certificate.clone(),
        ..ChildRecord::default()
    }
}

/// Collation key approximating Arabic dictionary order: hamza-carrier and
/// alef variants collapse to the base letter, tashkeel and tatweel are
/// ignored, Latin letters compare case-insensitively.
pub fn name_sort_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\u{0640}' | '\u{064B}'..='\u{0652}' | '\u{0670}' => {}
            'أ' | 'إ' | 'آ' | 'ٱ' => key.push('ا'),
            'ى' => key.push('ي'),
            'ئ' => key.push('ي'),
            'ؤ' => key.push('و'),
            'ة' => key.push('ه'),
            _ => key.extend(c.to_lowercase()),
        }
    }
    key
}
