use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, exam_ids, load_analysis};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_subjects_infer(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ids = match exam_ids(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let analysis = match load_analysis(conn, req, &ids) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!({ "subjects": analysis.subjects }))
}

/// Per-row badge data for the result screens; the manual re-match action works off `rowId`.
fn handle_matching_classify(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ids = match exam_ids(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let analysis = match load_analysis(conn, req, &ids) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let rows = analysis
        .rows
        .iter()
        .map(|r| {
            json!({
                "rowId": r.row_id,
                "examId": r.exam_id,
                "className": r.class_name,
                "label": r.label(),
                "badge": r.label().badge(),
                "matchedBy": r.classification.matched_by,
                "studentId": r.classification.student.as_ref().and_then(|s| s.id.clone()),
                "studentKey": r.student_key,
                "displayName": r.display_name,
                "totalNet": r.total_net
            })
        })
        .collect::<Vec<_>>();

    ok(
        &req.id,
        json!({
            "rows": rows,
            "summary": analysis.matching()
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.infer" => Some(handle_subjects_infer(state, req)),
        "matching.classify" => Some(handle_matching_classify(state, req)),
        _ => None,
    }
}
