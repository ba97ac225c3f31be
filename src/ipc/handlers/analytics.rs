use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, exam_ids, limit, load_analysis, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report::Analysis;
use rusqlite::Connection;
use serde_json::json;

fn open_analysis(state: &AppState, req: &Request) -> Result<Analysis, serde_json::Value> {
    let conn: &Connection = db_conn(state, req)?;
    let ids = exam_ids(req)?;
    load_analysis(conn, req, &ids)
}

fn handle_exams_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let analysis = match open_analysis(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({
            "subjects": analysis.subjects,
            "overall": analysis.overall(),
            "exams": analysis.exams()
        }),
    )
}

fn handle_classes_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let analysis = match open_analysis(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({
            "subjects": analysis.subjects,
            "classes": analysis.classes()
        }),
    )
}

fn handle_students_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let limit = match limit(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let analysis = match open_analysis(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut students = analysis.student_ranking(None);
    let student_count = students.len();
    if let Some(limit) = limit {
        students.truncate(limit);
    }
    ok(
        &req.id,
        json!({
            "studentCount": student_count,
            "students": students
        }),
    )
}

fn handle_rows_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = match limit(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let analysis = match load_analysis(conn, req, std::slice::from_ref(&exam_id)) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let rows = analysis
        .row_ranking(&exam_id, limit)
        .into_iter()
        .map(|r| {
            let subjects: serde_json::Map<String, serde_json::Value> = analysis
                .subjects
                .iter()
                .zip(r.item.subject_nets.iter())
                .map(|(s, v)| (s.key.clone(), json!(v)))
                .collect();
            json!({
                "rank": r.rank,
                "rowId": r.item.row_id,
                "studentKey": r.item.student_key,
                "displayName": r.item.display_name,
                "label": r.item.label(),
                "badge": r.item.label().badge(),
                "className": r.item.class_name,
                "totalNet": r.item.total_net,
                "totalScore": r.item.total_score,
                "subjects": subjects
            })
        })
        .collect::<Vec<_>>();

    ok(
        &req.id,
        json!({
            "exam": analysis.exams.first(),
            "subjects": analysis.subjects,
            "rows": rows
        }),
    )
}

fn handle_student_timeline(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_key = match required_str(req, "studentKey") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let analysis = match open_analysis(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!(analysis.timeline(&student_key)))
}

fn handle_subjects_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let analysis = match open_analysis(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({
            "subjects": analysis.subjects_view()
        }),
    )
}

fn handle_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let analysis = match open_analysis(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(&req.id, json!(analysis.report()))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.exams.open" => Some(handle_exams_open(state, req)),
        "analytics.classes.open" => Some(handle_classes_open(state, req)),
        "analytics.students.ranking" => Some(handle_students_ranking(state, req)),
        "analytics.rows.ranking" => Some(handle_rows_ranking(state, req)),
        "analytics.student.timeline" => Some(handle_student_timeline(state, req)),
        "analytics.subjects.open" => Some(handle_subjects_open(state, req)),
        "analytics.report" => Some(handle_report(state, req)),
        _ => None,
    }
}
