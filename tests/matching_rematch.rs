mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

fn labels(result: &serde_json::Value) -> Vec<String> {
    result
        .get("rows")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|r| r.get("label").and_then(|v| v.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn rematch_turns_guest_row_into_resolved_row() {
    let workspace = temp_dir("examstat-matching-rematch");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.import",
        json!({ "students": [
            { "id": "S1", "tc_kimlik_no": "12345678901", "full_name": "Ahmet Yılmaz" },
            { "id": "S2", "tc_kimlik_no": "10987654321", "full_name": "Mehmet Öztürk" }
        ]}),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "results.import",
        json!({ "examId": "E1", "rows": [
            { "tc_kimlik_no": "12345678901", "total_net": 50 },
            { "student_name": "  ahmet   yılmaz ", "total_net": 40 },
            { "student_name": "Mehmet Ozturk", "total_net": 30 }
        ]}),
    );
    let result_ids = imported
        .get("resultIds")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(result_ids.len(), 3);

    let before = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "matching.classify",
        json!({ "examIds": ["E1"] }),
    );
    assert_eq!(labels(&before), vec!["resolved", "resolved", "unresolved"]);
    let rows = before
        .get("rows")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows[0].get("matchedBy").and_then(|v| v.as_str()), Some("nationalId"));
    assert_eq!(rows[1].get("matchedBy").and_then(|v| v.as_str()), Some("name"));
    assert_eq!(rows[1].get("badge").and_then(|v| v.as_str()), Some("asil"));
    assert_eq!(rows[2].get("badge").and_then(|v| v.as_str()), Some("misafir"));
    assert_eq!(
        before
            .get("summary")
            .and_then(|s| s.get("unresolvedRows"))
            .and_then(|v| v.as_u64()),
        Some(1)
    );

    let guest_row_id = rows[2]
        .get("rowId")
        .and_then(|v| v.as_str())
        .expect("rowId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "results.rematch",
        json!({ "resultId": guest_row_id, "studentId": "S2" }),
    );

    let after = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "matching.classify",
        json!({ "examIds": ["E1"] }),
    );
    assert_eq!(labels(&after), vec!["resolved", "resolved", "resolved"]);
    let rows = after
        .get("rows")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(rows[2].get("studentId").and_then(|v| v.as_str()), Some("S2"));
    assert_eq!(rows[2].get("matchedBy").and_then(|v| v.as_str()), Some("id"));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "results.rematch",
        json!({ "resultId": "does-not-exist", "studentId": "S2" }),
    );
    assert_eq!(code, "not_found");
}
