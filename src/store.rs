use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::attendance::{AttendanceMap, Dimension};
use crate::db;

/// One child's document as held in memory and on the wire. Field names match
/// the UI shell's row shape.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildRecord {
    pub id: String,
    /// Partition key. The sole source of truth for which roster shows this
    /// record; the free-text `stage` label below is descriptive and may lag.
    pub page: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: String,
    #[serde(rename = "stage")]
    pub stage_label: String,
    pub birth_certificate: String,
    pub visited: AttendanceMap,
    pub gathering: AttendanceMap,
    pub activity: AttendanceMap,
}

impl ChildRecord {
    pub fn marks_mut(&mut self, dimension: Dimension) -> &mut AttendanceMap {
        match dimension {
            Dimension::Visited => &mut self.visited,
            Dimension::Gathering => &mut self.gathering,
            Dimension::Activity => &mut self.activity,
        }
    }

    pub fn set_field(&mut self, field: Field, value: &str) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Phone => &mut self.phone,
            Field::Address => &mut self.address,
            Field::DateOfBirth => &mut self.date_of_birth,
            Field::StageLabel => &mut self.stage_label,
            Field::BirthCertificate => &mut self.birth_certificate,
        };
        *slot = value.to_string();
    }
}

/// The per-field editable attributes of a child record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Phone,
    Address,
    DateOfBirth,
    StageLabel,
    BirthCertificate,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Phone => "phone",
            Field::Address => "address",
            Field::DateOfBirth => "dateOfBirth",
            Field::StageLabel => "stage",
            Field::BirthCertificate => "birthCertificate",
        }
    }

    pub fn parse(s: &str) -> Option<Field> {
        match s {
            "name" => Some(Field::Name),
            "phone" => Some(Field::Phone),
            "address" => Some(Field::Address),
            "dateOfBirth" => Some(Field::DateOfBirth),
            "stage" => Some(Field::StageLabel),
            "birthCertificate" => Some(Field::BirthCertificate),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Phone => "phone",
            Field::Address => "address",
            Field::DateOfBirth => "date_of_birth",
            Field::StageLabel => "stage_label",
            Field::BirthCertificate => "birth_certificate",
        }
    }
}

/// Create payload: everything except the store-assigned id and the partition.
#[derive(Debug, Clone, Default)]
pub struct ChildFields {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: String,
    pub stage_label: String,
    pub birth_certificate: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage backend: {0}")]
    Backend(#[from] rusqlite::Error),
}

/// Document-store seam. The durable owner of record content; the in-memory
/// roster is a cache that converges to it.
pub trait RecordStore {
    /// All records whose partition key equals `partition` (server-side
    /// filter), with missing optional fields defaulted at this boundary.
    fn list(&self, partition: &str) -> Result<Vec<ChildRecord>, StoreError>;
    /// Create a record in `partition` and return the assigned id.
    fn create(&mut self, partition: &str, fields: &ChildFields) -> Result<String, StoreError>;
    fn update_field(&mut self, id: &str, field: Field, value: &str) -> Result<(), StoreError>;
    /// Partial-path merge into one attendance map: writes a single
    /// `(dimension, period)` entry and never disturbs sibling periods.
    fn merge_mark(
        &mut self,
        id: &str,
        dimension: Dimension,
        period: &str,
        present: bool,
    ) -> Result<(), StoreError>;
    fn set_partition(&mut self, id: &str, partition: &str) -> Result<(), StoreError>;
    fn delete(&mut self, id: &str) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<SqliteStore> {
        let conn = db::open_db(workspace)?;
        Ok(SqliteStore { conn })
    }

    /// Opens a store in a fresh per-test temp workspace, exercising the same
    /// on-disk path as production.
    #[cfg(test)]
    pub fn open_temp() -> anyhow::Result<SqliteStore> {
        let dir = std::env::temp_dir().join(format!("rosterd-store-{}", Uuid::new_v4()));
        SqliteStore::open(&dir)
    }

    fn child_exists(&self, id: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM children WHERE id = ?", [id], |r| {
                r.get::<_, i64>(0)
            })
            .optional()?;
        Ok(found.is_some())
    }
}

impl RecordStore for SqliteStore {
    fn list(&self, partition: &str) -> Result<Vec<ChildRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, page, name, phone, address, date_of_birth, stage_label, birth_certificate
             FROM children
             WHERE page = ?",
        )?;
        let mut records = stmt
            .query_map([partition], |r| {
                Ok(ChildRecord {
                    id: r.get(0)?,
                    page: r
                        .get::<_, Option<String>>(1)?
                        .unwrap_or_else(|| partition.to_string()),
                    name: r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    phone: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    address: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    date_of_birth: r.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    stage_label: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    birth_certificate: r.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    ..ChildRecord::default()
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

        let mut mark_stmt = self.conn.prepare(
            "SELECT m.child_id, m.dimension, m.period, m.present
             FROM attendance_marks m
             JOIN children c ON c.id = m.child_id
             WHERE c.page = ?",
        )?;
        let marks = mark_stmt
            .query_map([partition], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)? != 0,
                ))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

        for (child_id, dimension, period, present) in marks {
            // Rows with a dimension this build does not know are skipped
            // rather than failing the whole fetch.
            let Some(dim) = Dimension::parse(&dimension) else {
                continue;
            };
            if let Some(rec) = records.iter_mut().find(|r| r.id == child_id) {
                rec.marks_mut(dim).insert(period, present);
            }
        }

        Ok(records)
    }

    fn create(&mut self, partition: &str, fields: &ChildFields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO children(
               id, page, name, phone, address, date_of_birth, stage_label,
               birth_certificate, updated_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (
                &id,
                partition,
                &fields.name,
                &fields.phone,
                &fields.address,
                &fields.date_of_birth,
                &fields.stage_label,
                &fields.birth_certificate,
            ),
        )?;
        Ok(id)
    }

    fn update_field(&mut self, id: &str, field: Field, value: &str) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE children SET {} = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ?",
            field.column()
        );
        let changed = self.conn.execute(&sql, (value, id))?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn merge_mark(
        &mut self,
        id: &str,
        dimension: Dimension,
        period: &str,
        present: bool,
    ) -> Result<(), StoreError> {
        if !self.child_exists(id)? {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.conn.execute(
            "INSERT INTO attendance_marks(child_id, dimension, period, present)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(child_id, dimension, period) DO UPDATE SET
               present = excluded.present",
            (id, dimension.as_str(), period, present as i64),
        )?;
        Ok(())
    }

    fn set_partition(&mut self, id: &str, partition: &str) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE children SET page = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
             WHERE id = ?",
            (partition, id),
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM attendance_marks WHERE child_id = ?", [id])?;
        let changed = self.conn.execute("DELETE FROM children WHERE id = ?", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
