use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str, CATALOG_SETTING};
use crate::ipc::types::{AppState, Request};
use crate::record::{ExamMeta, Record};
use crate::subjects::SubjectCatalog;
use serde_json::json;

fn records_param(req: &Request, key: &str) -> Result<Vec<Record>, serde_json::Value> {
    let Some(raw) = req.params.get(key).and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    let mut out = Vec::with_capacity(raw.len());
    for (i, v) in raw.iter().enumerate() {
        let Some(obj) = v.as_object() else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("{} must contain only objects", key),
                Some(json!({ "index": i })),
            ));
        };
        out.push(obj.clone());
    }
    Ok(out)
}

fn handle_students_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let students = match records_param(req, "students") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::upsert_students(conn, &students) {
        Ok(n) => {
            tracing::info!(students = n, "students imported");
            ok(&req.id, json!({ "imported": n }))
        }
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

fn handle_exams_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("exams").cloned() else {
        return err(&req.id, "bad_params", "missing exams", None);
    };
    let exams: Vec<ExamMeta> = match serde_json::from_value(raw) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid exams: {}", e), None),
    };
    if let Some(i) = exams.iter().position(|e| e.id.trim().is_empty()) {
        return err(
            &req.id,
            "bad_params",
            "exam id must not be empty",
            Some(json!({ "index": i })),
        );
    }
    match db::upsert_exams(conn, &exams) {
        Ok(n) => ok(&req.id, json!({ "upserted": n })),
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

fn handle_exams_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::list_exams(conn) {
        Ok(exams) => ok(&req.id, json!({ "exams": exams })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_results_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = match records_param(req, "rows") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::insert_results(conn, &exam_id, &rows) {
        Ok(ids) => {
            tracing::info!(exam_id = %exam_id, rows = ids.len(), "results imported");
            ok(&req.id, json!({ "examId": exam_id, "resultIds": ids }))
        }
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

fn handle_results_rematch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let result_id = match required_str(req, "resultId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::rematch_result(conn, &result_id, &student_id) {
        Ok(true) => ok(&req.id, json!({ "resultId": result_id, "studentId": student_id })),
        Ok(false) => err(&req.id, "not_found", "result not found", None),
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let key = match required_str(req, "key") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::settings_get_json(conn, &key) {
        Ok(value) => ok(&req.id, json!({ "key": key, "value": value })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_settings_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let key = match required_str(req, "key") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(value) = req.params.get("value") else {
        return err(&req.id, "bad_params", "missing value", None);
    };
    if key == CATALOG_SETTING {
        if let Err(e) = serde_json::from_value::<SubjectCatalog>(value.clone()) {
            return err(
                &req.id,
                "bad_params",
                format!("invalid subject catalog: {}", e),
                None,
            );
        }
    }
    match db::settings_set_json(conn, &key, value) {
        Ok(()) => ok(&req.id, json!({ "key": key })),
        Err(e) => err(&req.id, "db_write_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.import" => Some(handle_students_import(state, req)),
        "exams.upsert" => Some(handle_exams_upsert(state, req)),
        "exams.list" => Some(handle_exams_list(state, req)),
        "results.import" => Some(handle_results_import(state, req)),
        "results.rematch" => Some(handle_results_rematch(state, req)),
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.set" => Some(handle_settings_set(state, req)),
        _ => None,
    }
}
