//! SQLite-backed reading store.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

use envcam_types::{NewReading, Reading};

use crate::error::{Error, Result};
use crate::schema;

const SELECT_READING: &str = "SELECT id, timestamp, temperature, humidity, pressure,
     gas_resistance, iaq FROM sensor_data";

/// Append-only store of sensor readings.
///
/// The store owns a single SQLite connection for its whole lifetime. Callers
/// that share it between tasks wrap it in a mutex and hold the guard for one
/// operation at a time.
pub struct ReadingStore {
    pub(crate) conn: Connection,
}

impl ReadingStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Append a reading and return it as stored.
    ///
    /// The identifier and timestamp are assigned by the database; the
    /// air-quality index starts unset.
    pub fn record(&self, reading: &NewReading) -> Result<Reading> {
        reading.validate()?;

        self.conn.execute(
            "INSERT INTO sensor_data (temperature, humidity, pressure, gas_resistance)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                reading.temperature,
                reading.humidity,
                reading.pressure,
                reading.gas_resistance,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Recorded reading {}", id);

        let sql = format!("{SELECT_READING} WHERE id = ?1");
        let stored = self.conn.query_row(&sql, [id], map_reading)?;
        Ok(stored)
    }

    /// The reading with the greatest identifier, or `None` on an empty store.
    pub fn latest(&self) -> Result<Option<Reading>> {
        let sql = format!("{SELECT_READING} ORDER BY id DESC LIMIT 1");
        let reading = self.conn.query_row(&sql, [], map_reading).optional()?;
        Ok(reading)
    }

    /// All readings, oldest first.
    pub fn all(&self) -> Result<Vec<Reading>> {
        let mut readings = Vec::new();
        self.for_each(|reading| {
            readings.push(reading);
            Ok(())
        })?;
        Ok(readings)
    }

    /// Visit every reading, oldest first, without materializing the table.
    ///
    /// Stops at the first error returned by `visit`. Returns the number of
    /// readings visited.
    pub fn for_each<F>(&self, mut visit: F) -> Result<usize>
    where
        F: FnMut(Reading) -> Result<()>,
    {
        let sql = format!("{SELECT_READING} ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_reading)?;

        let mut visited = 0;
        for row in rows {
            visit(row?)?;
            visited += 1;
        }
        Ok(visited)
    }

    /// Number of stored readings.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sensor_data", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn map_reading(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let raw: String = row.get(1)?;
    let timestamp = parse_stored_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(Reading {
        id: row.get(0)?,
        timestamp,
        temperature: row.get(2)?,
        humidity: row.get(3)?,
        pressure: row.get(4)?,
        gas_resistance: row.get(5)?,
        iaq: row.get(6)?,
    })
}

/// Parse SQLite's `CURRENT_TIMESTAMP` text, which is naive UTC.
///
/// Rows written by other tools may carry fractional seconds.
fn parse_stored_timestamp(raw: &str) -> std::result::Result<OffsetDateTime, Error> {
    let plain = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let fractional =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");

    PrimitiveDateTime::parse(raw, plain)
        .or_else(|_| PrimitiveDateTime::parse(raw, fractional))
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| Error::InvalidTimestamp(format!("{raw:?}: {e}")))
}
