mod test_support;

use serde_json::json;
use test_support::{request, spawn_sidecar, temp_dir};

fn error_code(value: &serde_json::Value) -> Option<String> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .map(String::from)
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("examstat-router-smoke");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let early = request(
        &mut stdin,
        &mut reader,
        "0",
        "analytics.report",
        json!({ "examIds": ["E1"] }),
    );
    assert_eq!(error_code(&early).as_deref(), Some("no_workspace"));

    let calls = vec![
        ("health", json!({})),
        ("workspace.select", json!({ "path": workspace.to_string_lossy() })),
        ("students.import", json!({ "students": [{ "id": "S1", "full_name": "Ali Can" }] })),
        ("exams.upsert", json!({ "exams": [{ "id": "E1", "name": "Deneme" }] })),
        ("exams.list", json!({})),
        (
            "results.import",
            json!({ "examId": "E1", "rows": [{ "student_id": "S1", "total_net": 10 }] }),
        ),
        ("settings.get", json!({ "key": "subjects.catalog" })),
        ("subjects.infer", json!({ "examIds": ["E1"] })),
        ("matching.classify", json!({ "examIds": ["E1"] })),
        ("analytics.exams.open", json!({ "examIds": ["E1"] })),
        ("analytics.classes.open", json!({ "examIds": ["E1"] })),
        ("analytics.students.ranking", json!({ "examIds": ["E1"] })),
        ("analytics.rows.ranking", json!({ "examId": "E1" })),
        ("analytics.student.timeline", json!({ "examIds": ["E1"], "studentKey": "student:id:S1" })),
        ("analytics.subjects.open", json!({ "examIds": ["E1"] })),
        ("analytics.report", json!({ "examIds": ["E1"] })),
    ];
    for (i, (method, params)) in calls.into_iter().enumerate() {
        let id = format!("{}", i + 1);
        let resp = request(&mut stdin, &mut reader, &id, method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            resp
        );
    }

    let unknown = request(&mut stdin, &mut reader, "99", "nope.method", json!({}));
    assert_eq!(error_code(&unknown).as_deref(), Some("not_implemented"));

    let bad = request(
        &mut stdin,
        &mut reader,
        "100",
        "analytics.exams.open",
        json!({ "examIds": [] }),
    );
    assert_eq!(error_code(&bad).as_deref(), Some("bad_params"));
}
