use crate::db;
use crate::ipc::error::{err, report_err};
use crate::ipc::types::{AppState, Request};
use crate::record::RowLayout;
use crate::report::{parse_exam_ids, parse_limit, Analysis, Snapshot};
use crate::subjects::SubjectCatalog;
use rusqlite::Connection;

pub const CATALOG_SETTING: &str = "subjects.catalog";

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn exam_ids(req: &Request) -> Result<Vec<String>, serde_json::Value> {
    parse_exam_ids(&req.params).map_err(|e| report_err(&req.id, e))
}

pub fn limit(req: &Request) -> Result<Option<usize>, serde_json::Value> {
    parse_limit(&req.params).map_err(|e| report_err(&req.id, e))
}

/// Workspace catalog override, or the built-in one. A malformed stored value falls
/// back to the default rather than failing every report.
pub fn subject_catalog(conn: &Connection) -> SubjectCatalog {
    match db::settings_get_json(conn, CATALOG_SETTING) {
        Ok(Some(raw)) => match serde_json::from_value::<SubjectCatalog>(raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "stored subject catalog is invalid; using default");
                SubjectCatalog::default()
            }
        },
        Ok(None) => SubjectCatalog::default(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read subject catalog; using default");
            SubjectCatalog::default()
        }
    }
}

/// Fetch the snapshot for the requested exams and prepare it.
pub fn load_analysis(
    conn: &Connection,
    req: &Request,
    exam_ids: &[String],
) -> Result<Analysis, serde_json::Value> {
    let db_err = |e: anyhow::Error| err(&req.id, "db_query_failed", e.to_string(), None);
    let students = db::load_students(conn).map_err(db_err)?;
    let exams = db::load_exams(conn, exam_ids).map_err(db_err)?;
    let rows = db::load_results(conn, exam_ids).map_err(db_err)?;
    let snapshot = Snapshot {
        students,
        exams,
        rows,
    };
    Ok(Analysis::prepare(
        &snapshot,
        &subject_catalog(conn),
        &RowLayout::default(),
    ))
}
