use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::grid::Cell;
use crate::scoring::{SubmitReceipt, Submission};
use crate::symbol::{Digit, Symbol};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One stored assessment, as listed on the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub score: u32,
    pub time_spent_secs: u32,
}

/// Where completed runs are sent
pub trait ResultSink {
    fn submit(&mut self, submission: &Submission) -> Result<SubmitReceipt>;
}

/// Read side used by the dashboard
pub trait ResultQuery {
    fn fetch_results(&self) -> Result<Vec<TestResult>>;
}

/// SQLite-backed result storage
#[derive(Debug)]
pub struct SqliteResultStore {
    conn: Connection,
}

impl SqliteResultStore {
    /// Open the store at the default location under the user's state dir
    pub fn open_default() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("dsst_results.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path == Path::new(":memory:") {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                score INTEGER NOT NULL,
                time_spent INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS answers (
                result_id INTEGER NOT NULL REFERENCES results(id),
                position INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                answer INTEGER,
                PRIMARY KEY (result_id, position)
            );
            CREATE INDEX IF NOT EXISTS idx_results_date ON results(date);
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Answers stored with a result, in submission order
    pub fn fetch_answers(&self, result_id: i64) -> Result<Vec<Cell>> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, answer FROM answers WHERE result_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map([result_id], |row| {
            let glyph: String = row.get(0)?;
            let answer: Option<u8> = row.get(1)?;
            Ok((glyph, answer))
        })?;

        let mut cells = Vec::new();
        for row in rows {
            let (glyph, answer) = row?;
            if let Some(symbol) = Symbol::from_glyph(&glyph) {
                cells.push(Cell {
                    symbol,
                    answer: answer.and_then(Digit::new),
                });
            }
        }
        Ok(cells)
    }
}

impl ResultSink for SqliteResultStore {
    fn submit(&mut self, submission: &Submission) -> Result<SubmitReceipt> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO results (user_id, date, score, time_spent) VALUES (?1, ?2, ?3, ?4)",
            params![
                submission.user_id,
                submission.date.format(DATE_FORMAT).to_string(),
                submission.score,
                submission.time_spent_secs,
            ],
        )?;
        let id = tx.last_insert_rowid();

        for (position, cell) in submission.answers.iter().enumerate() {
            tx.execute(
                "INSERT INTO answers (result_id, position, symbol, answer) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id,
                    position as i64,
                    cell.symbol.to_string(),
                    cell.answer.map(Digit::get),
                ],
            )?;
        }
        tx.commit()?;

        info!(id, user_id = %submission.user_id, score = submission.score, "result saved");
        Ok(SubmitReceipt { success: true, id })
    }
}

impl ResultQuery for SqliteResultStore {
    fn fetch_results(&self) -> Result<Vec<TestResult>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, date, score, time_spent FROM results ORDER BY date DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let date_str: String = row.get(2)?;
            let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|_| {
                rusqlite::Error::InvalidColumnType(2, "date".to_string(), rusqlite::types::Type::Text)
            })?;
            Ok(TestResult {
                id: row.get(0)?,
                user_id: row.get(1)?,
                date,
                score: row.get(3)?,
                time_spent_secs: row.get(4)?,
            })
        })?;

        let mut results = Vec::new();
        for result in rows {
            results.push(result?);
        }
        Ok(results)
    }
}

/// Results on `date`, or all of them when no date is given
pub fn filter_by_date(results: &[TestResult], date: Option<NaiveDate>) -> Vec<TestResult> {
    results
        .iter()
        .filter(|r| date.map_or(true, |d| r.date == d))
        .cloned()
        .collect()
}

/// Scores at or above this are highlighted on the dashboard
pub const HIGH_SCORE_THRESHOLD: u32 = 15;

/// Averages over a set of results; all zero when the set is empty
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResultSummary {
    pub average_score: f64,
    pub average_time_secs: f64,
    pub total: usize,
}

pub fn summary(results: &[TestResult]) -> ResultSummary {
    if results.is_empty() {
        return ResultSummary::default();
    }
    let total = results.len();
    let score_sum: u64 = results.iter().map(|r| u64::from(r.score)).sum();
    let time_sum: u64 = results.iter().map(|r| u64::from(r.time_spent_secs)).sum();
    ResultSummary {
        average_score: score_sum as f64 / total as f64,
        average_time_secs: time_sum as f64 / total as f64,
        total,
    }
}

pub const CSV_HEADERS: [&str; 5] = ["ID", "User ID", "Date", "Score", "Time Spent (sec)"];

pub fn write_csv<W: Write>(results: &[TestResult], writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    wtr.write_record(CSV_HEADERS)?;
    for r in results {
        wtr.write_record([
            r.id.to_string(),
            r.user_id.clone(),
            r.date.format(DATE_FORMAT).to_string(),
            r.score.to_string(),
            r.time_spent_secs.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_filename(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => format!("dsst_results_{}.csv", d.format(DATE_FORMAT)),
        None => "dsst_results_all.csv".to_string(),
    }
}

/// Write the (already filtered) results into `dir`, returning the file path
pub fn export_csv(results: &[TestResult], dir: &Path, date: Option<NaiveDate>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(date));
    write_csv(results, File::create(&path)?)?;
    info!(path = %path.display(), rows = results.len(), "results exported");
    Ok(path)
}
