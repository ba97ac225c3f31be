mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

fn codes(result: &serde_json::Value) -> Vec<String> {
    result
        .get("subjects")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.get("code").and_then(|v| v.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn workspace_catalog_replaces_builtin_subjects() {
    let workspace = temp_dir("examstat-subjects-catalog");
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
        "results.import",
        json!({ "examId": "T1", "rows": [
            { "fizik_net": 7, "kimya_net": 6, "matematik_net": 20, "total_net": 33 }
        ]}),
    );

    let builtin = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.infer",
        json!({ "examIds": ["T1"] }),
    );
    assert_eq!(codes(&builtin), vec!["MAT", "FIZIK", "KIMYA"]);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "settings.set",
        json!({ "key": "subjects.catalog", "value": { "rules": "nope" } }),
    );
    assert_eq!(code, "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "settings.set",
        json!({ "key": "subjects.catalog", "value": {
            "rules": [
                { "code": "KIM", "label": "Kimya", "fragments": ["kimya"] },
                { "code": "FIZ", "label": "Fizik", "fragments": ["fizik"] }
            ],
            "order": ["FIZ", "KIM"]
        }}),
    );
    let overridden = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "subjects.infer",
        json!({ "examIds": ["T1"] }),
    );
    assert_eq!(codes(&overridden), vec!["FIZ", "KIM", "MATEMATIK"]);

    let stored = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "settings.get",
        json!({ "key": "subjects.catalog" }),
    );
    assert_eq!(
        stored
            .get("value")
            .and_then(|v| v.get("order"))
            .cloned(),
        Some(json!(["FIZ", "KIM"]))
    );
}
