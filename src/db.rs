use crate::index::{discover_fields, record_full_name, StudentFields};
use crate::normalize::normalize_for_match;
use crate::record::{field_str, ExamMeta, Record};
use chrono::{NaiveDate, Utc};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("examstat.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    // Student records are stored as received; the engine discovers their keys.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            record_json TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            exam_date TEXT,
            exam_type TEXT,
            grade_level INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS results(
            id TEXT PRIMARY KEY,
            exam_id TEXT NOT NULL,
            record_json TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_exam ON results(exam_id, sort_order)",
        [],
    )?;

    // Workspaces created before re-matching existed have no updated_at on results.
    ensure_results_updated_at(&conn)?;

    Ok(conn)
}

fn ensure_results_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "results", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE results ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339()
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(",")
}

fn parse_record(raw: &str) -> anyhow::Result<Record> {
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        _ => anyhow::bail!("stored record is not a JSON object"),
    }
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Storage key for a student snapshot: its `id`, else its national id, registration number
/// or normalized name, else a hash of the record. Re-importing the same list is idempotent.
fn student_storage_key(record: &Record, fields: &StudentFields) -> anyhow::Result<String> {
    if let Some(id) = field_str(record, "id") {
        return Ok(id);
    }
    if let Some(v) = fields.national_id.iter().find_map(|k| field_str(record, k)) {
        return Ok(format!("tc:{v}"));
    }
    if let Some(v) = fields.registration_no.iter().find_map(|k| field_str(record, k)) {
        return Ok(format!("no:{v}"));
    }
    let name = normalize_for_match(record_full_name(record).as_deref());
    if !name.is_empty() {
        return Ok(format!("name:{name}"));
    }
    let raw = serde_json::to_string(record)?;
    Ok(format!(
        "record:{}",
        Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes())
    ))
}

/// Upsert student snapshots keyed by [`student_storage_key`]; the record itself is left
/// untouched.
pub fn upsert_students(conn: &Connection, students: &[Record]) -> anyhow::Result<usize> {
    let fields = students.first().map(discover_fields).unwrap_or_default();
    let tx = conn.unchecked_transaction()?;
    let mut next_order: i64 = tx.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students",
        [],
        |r| r.get(0),
    )?;
    let stamp = now_stamp();
    for record in students {
        let key = student_storage_key(record, &fields)?;
        tx.execute(
            "INSERT INTO students(id, record_json, sort_order, updated_at) VALUES(?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET record_json = excluded.record_json,
                                           updated_at = excluded.updated_at",
            (&key, serde_json::to_string(record)?, next_order, &stamp),
        )?;
        next_order += 1;
    }
    tx.commit()?;
    Ok(students.len())
}

pub fn load_students(conn: &Connection) -> anyhow::Result<Vec<Record>> {
    let mut stmt = conn.prepare("SELECT record_json FROM students ORDER BY sort_order")?;
    let raw = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    raw.iter().map(|s| parse_record(s)).collect()
}

pub fn upsert_exams(conn: &Connection, exams: &[ExamMeta]) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    for exam in exams {
        tx.execute(
            "INSERT INTO exams(id, name, exam_date, exam_type, grade_level) VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                                           exam_date = excluded.exam_date,
                                           exam_type = excluded.exam_type,
                                           grade_level = excluded.grade_level",
            (
                &exam.id,
                &exam.name,
                exam.date.map(|d| d.format("%Y-%m-%d").to_string()),
                &exam.exam_type,
                exam.grade_level,
            ),
        )?;
    }
    tx.commit()?;
    Ok(exams.len())
}

fn exam_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ExamMeta> {
    let date: Option<String> = r.get(2)?;
    Ok(ExamMeta {
        id: r.get(0)?,
        name: r.get(1)?,
        date: date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        exam_type: r.get(3)?,
        grade_level: r.get(4)?,
    })
}

pub fn list_exams(conn: &Connection) -> anyhow::Result<Vec<ExamMeta>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, exam_date, exam_type, grade_level
         FROM exams
         ORDER BY exam_date IS NULL, exam_date, name",
    )?;
    let exams = stmt
        .query_map([], exam_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(exams)
}

/// Metadata for the requested exams, in request order. Ids without stored metadata
/// still yield an entry so they show up in reports with zero values.
pub fn load_exams(conn: &Connection, exam_ids: &[String]) -> anyhow::Result<Vec<ExamMeta>> {
    if exam_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, name, exam_date, exam_type, grade_level FROM exams WHERE id IN ({})",
        placeholders(exam_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let found: HashMap<String, ExamMeta> = stmt
        .query_map(
            params_from_iter(exam_ids.iter().map(|id| Value::Text(id.clone()))),
            exam_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|e| (e.id.clone(), e))
        .collect();
    Ok(exam_ids
        .iter()
        .map(|id| found.get(id).cloned().unwrap_or_else(|| ExamMeta::bare(id)))
        .collect())
}

/// Append result rows for one exam. Each stored record carries its own `id` and `exam_id`.
pub fn insert_results(
    conn: &Connection,
    exam_id: &str,
    rows: &[Record],
) -> anyhow::Result<Vec<String>> {
    let tx = conn.unchecked_transaction()?;
    let mut next_order: i64 = tx.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM results",
        [],
        |r| r.get(0),
    )?;
    let stamp = now_stamp();
    let mut ids = Vec::with_capacity(rows.len());
    for row in rows {
        let id = Uuid::new_v4().to_string();
        let mut record = row.clone();
        record.insert("id".to_string(), serde_json::Value::String(id.clone()));
        record.insert(
            "exam_id".to_string(),
            serde_json::Value::String(exam_id.to_string()),
        );
        tx.execute(
            "INSERT INTO results(id, exam_id, record_json, sort_order, updated_at)
             VALUES(?, ?, ?, ?, ?)",
            (&id, exam_id, serde_json::to_string(&record)?, next_order, &stamp),
        )?;
        next_order += 1;
        ids.push(id);
    }
    tx.commit()?;
    Ok(ids)
}

pub fn load_results(conn: &Connection, exam_ids: &[String]) -> anyhow::Result<Vec<Record>> {
    if exam_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT record_json FROM results WHERE exam_id IN ({}) ORDER BY sort_order",
        placeholders(exam_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(
            params_from_iter(exam_ids.iter().map(|id| Value::Text(id.clone()))),
            |r| r.get::<_, String>(0),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    raw.iter().map(|s| parse_record(s)).collect()
}

/// Point a stored result row at a canonical student. Returns false if the row does not exist.
pub fn rematch_result(
    conn: &Connection,
    result_id: &str,
    student_id: &str,
) -> anyhow::Result<bool> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT record_json FROM results WHERE id = ?",
            [result_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(raw) = raw else {
        return Ok(false);
    };
    let mut record = parse_record(&raw)?;
    record.insert(
        "student_id".to_string(),
        serde_json::Value::String(student_id.to_string()),
    );
    conn.execute(
        "UPDATE results SET record_json = ?, updated_at = ? WHERE id = ?",
        (serde_json::to_string(&record)?, now_stamp(), result_id),
    )?;
    Ok(true)
}
