//! SQLite-based persistence for tasks and statistics counters.
//!
//! The database mirrors the in-memory stores; it is never the authority
//! during a session. Tasks are saved as a whole ordered list, and one
//! completed interval is three counter upserts applied in a single
//! transaction so the counters can never drift apart.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::data_dir;
use crate::error::DatabaseError;
use crate::stats::{Slot, StatisticsStore};
use crate::task::{Task, TaskCategory};

const DAY_FORMAT: &str = "%Y-%m-%d";

/// SQLite database for tasks and statistics.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/floato/floato.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = data_dir()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?
            .join("floato.db");
        Self::open_at(&path)
    }

    /// Open a database at an explicit path. Used by tests with temp dirs.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id                 TEXT PRIMARY KEY,
                    position           INTEGER NOT NULL,
                    title              TEXT NOT NULL,
                    category           TEXT NOT NULL,
                    target_intervals   INTEGER NOT NULL,
                    finished_intervals INTEGER NOT NULL,
                    is_done            INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_counts (
                    day   TEXT PRIMARY KEY,
                    count INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS half_hour_counts (
                    day   TEXT NOT NULL,
                    slot  INTEGER NOT NULL,
                    count INTEGER NOT NULL,
                    PRIMARY KEY (day, slot)
                );

                CREATE TABLE IF NOT EXISTS category_counts (
                    day      TEXT NOT NULL,
                    category TEXT NOT NULL,
                    count    INTEGER NOT NULL,
                    PRIMARY KEY (day, category)
                );",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Replace the persisted task list with `tasks`, preserving order.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; the previous contents are
    /// left intact in that case.
    pub fn save_tasks(&mut self, tasks: &[Task]) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM tasks", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tasks (id, position, title, category, target_intervals, finished_intervals, is_done)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (position, task) in tasks.iter().enumerate() {
                stmt.execute(params![
                    task.id.to_string(),
                    position as i64,
                    task.title,
                    task.category.as_str(),
                    task.target_intervals,
                    task.finished_intervals,
                    task.is_done,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Load the persisted task list in display order. Rows that fail to parse
    /// are skipped with a warning rather than poisoning the whole load.
    ///
    /// # Errors
    /// Returns an error if the query itself fails.
    pub fn load_tasks(&self) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, category, target_intervals, finished_intervals, is_done
             FROM tasks ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, title, category, target_intervals, finished_intervals, is_done) = row?;
            let Ok(id) = Uuid::parse_str(&id) else {
                log::warn!("skipping task row with malformed id: {id}");
                continue;
            };
            let Ok(category) = category.parse::<TaskCategory>() else {
                log::warn!("skipping task row with unknown category: {category}");
                continue;
            };
            tasks.push(Task {
                id,
                title,
                category,
                target_intervals,
                finished_intervals,
                is_done,
            });
        }
        Ok(tasks)
    }

    /// Apply one completed interval to all three counter tables atomically.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; in that case none of the
    /// counters move.
    pub fn record_interval(
        &mut self,
        day: NaiveDate,
        slot: Slot,
        category: TaskCategory,
    ) -> Result<(), DatabaseError> {
        let day = day.format(DAY_FORMAT).to_string();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO daily_counts (day, count) VALUES (?1, 1)
             ON CONFLICT(day) DO UPDATE SET count = count + 1",
            params![day],
        )?;
        tx.execute(
            "INSERT INTO half_hour_counts (day, slot, count) VALUES (?1, ?2, 1)
             ON CONFLICT(day, slot) DO UPDATE SET count = count + 1",
            params![day, slot],
        )?;
        tx.execute(
            "INSERT INTO category_counts (day, category, count) VALUES (?1, ?2, 1)
             ON CONFLICT(day, category) DO UPDATE SET count = count + 1",
            params![day, category.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Rebuild the in-memory statistics store from the counter tables.
    ///
    /// # Errors
    /// Returns an error if any query fails.
    pub fn load_statistics(&self) -> Result<StatisticsStore, DatabaseError> {
        let mut daily = BTreeMap::new();
        let mut stmt = self.conn.prepare("SELECT day, count FROM daily_counts")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;
        for row in rows {
            let (day, count) = row?;
            match NaiveDate::parse_from_str(&day, DAY_FORMAT) {
                Ok(day) => {
                    daily.insert(day, count);
                }
                Err(_) => log::warn!("skipping daily count with malformed day: {day}"),
            }
        }

        let mut half_hour = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT day, slot, count FROM half_hour_counts")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Slot>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?;
        for row in rows {
            let (day, slot, count) = row?;
            match NaiveDate::parse_from_str(&day, DAY_FORMAT) {
                Ok(day) => {
                    half_hour.insert((day, slot), count);
                }
                Err(_) => log::warn!("skipping slot count with malformed day: {day}"),
            }
        }

        let mut by_category = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT day, category, count FROM category_counts")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?;
        for row in rows {
            let (day, category, count) = row?;
            let day = match NaiveDate::parse_from_str(&day, DAY_FORMAT) {
                Ok(day) => day,
                Err(_) => {
                    log::warn!("skipping category count with malformed day: {day}");
                    continue;
                }
            };
            match category.parse::<TaskCategory>() {
                Ok(category) => {
                    by_category.insert((day, category), count);
                }
                Err(_) => log::warn!("skipping count with unknown category: {category}"),
            }
        }

        Ok(StatisticsStore::from_counts(daily, half_hour, by_category))
    }

    /// Persist a full statistics store, replacing the counter tables. Used to
    /// catch the database up after earlier write failures.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub fn save_statistics(&mut self, stats: &StatisticsStore) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM daily_counts", [])?;
        tx.execute("DELETE FROM half_hour_counts", [])?;
        tx.execute("DELETE FROM category_counts", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO daily_counts (day, count) VALUES (?1, ?2)")?;
            for (day, count) in stats.daily_counts() {
                stmt.execute(params![day.format(DAY_FORMAT).to_string(), count])?;
            }
            let mut stmt =
                tx.prepare("INSERT INTO half_hour_counts (day, slot, count) VALUES (?1, ?2, ?3)")?;
            for ((day, slot), count) in stats.half_hour_counts() {
                stmt.execute(params![day.format(DAY_FORMAT).to_string(), slot, count])?;
            }
            let mut stmt =
                tx.prepare("INSERT INTO category_counts (day, category, count) VALUES (?1, ?2, ?3)")?;
            for ((day, category), count) in stats.category_counts() {
                stmt.execute(params![
                    day.format(DAY_FORMAT).to_string(),
                    category.as_str(),
                    count
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Drop all statistics counters.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub fn clear_statistics(&mut self) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM daily_counts", [])?;
        tx.execute("DELETE FROM half_hour_counts", [])?;
        tx.execute("DELETE FROM category_counts", [])?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskList;
    use chrono::NaiveDate;

    fn sample_tasks() -> Vec<Task> {
        let mut list = TaskList::new();
        list.add("write report", 3, TaskCategory::Work).unwrap();
        list.add("run", 1, TaskCategory::Health).unwrap();
        list.record_interval_completed();
        list.tasks().to_vec()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn tasks_roundtrip_in_order() {
        let mut db = Database::open_memory().unwrap();
        let tasks = sample_tasks();
        db.save_tasks(&tasks).unwrap();
        let loaded = db.load_tasks().unwrap();
        assert_eq!(loaded, tasks);

        // Saving again replaces instead of appending.
        db.save_tasks(&tasks[1..]).unwrap();
        assert_eq!(db.load_tasks().unwrap(), tasks[1..]);
    }

    #[test]
    fn record_interval_moves_all_three_counters() {
        let mut db = Database::open_memory().unwrap();
        let d = day(2026, 8, 7);
        db.record_interval(d, 18, TaskCategory::Work).unwrap();
        db.record_interval(d, 18, TaskCategory::Work).unwrap();
        db.record_interval(d, 19, TaskCategory::Study).unwrap();

        let stats = db.load_statistics().unwrap();
        assert_eq!(stats.count_for_day(d), 3);
        assert_eq!(stats.half_hourly_at(d)[&18], 2);
        assert_eq!(stats.half_hourly_at(d)[&19], 1);
        let breakdown = stats.category_breakdown_at(d);
        assert_eq!(breakdown[&TaskCategory::Work], 2);
        assert_eq!(breakdown[&TaskCategory::Study], 1);
    }

    #[test]
    fn statistics_roundtrip_via_save() {
        let mut db = Database::open_memory().unwrap();
        let mut stats = StatisticsStore::new();
        let at = day(2026, 8, 1)
            .and_hms_opt(9, 40, 0)
            .unwrap()
            .and_local_timezone(chrono::Local)
            .unwrap();
        stats.record(TaskCategory::Hobby, at);
        stats.record(TaskCategory::Hobby, at);
        db.save_statistics(&stats).unwrap();

        let loaded = db.load_statistics().unwrap();
        assert_eq!(loaded.count_for_day(day(2026, 8, 1)), 2);
        assert_eq!(
            loaded.category_breakdown_at(day(2026, 8, 1))[&TaskCategory::Hobby],
            2
        );
    }

    #[test]
    fn clear_statistics_empties_counters() {
        let mut db = Database::open_memory().unwrap();
        db.record_interval(day(2026, 8, 7), 0, TaskCategory::Personal)
            .unwrap();
        db.clear_statistics().unwrap();
        assert_eq!(db.load_statistics().unwrap().total(), 0);
    }

    #[test]
    fn open_at_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floato.db");
        {
            let mut db = Database::open_at(&path).unwrap();
            db.save_tasks(&sample_tasks()).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.load_tasks().unwrap().len(), 2);
    }
}
