mod test_support;

use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn analytics_exams_open_reports_requested_exams_in_order() {
    let workspace = temp_dir("examstat-analytics-exams-open");
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
            { "id": "S1", "full_name": "Ahmet Yılmaz", "ogrenci_no": "101" },
            { "id": "S2", "first_name": "Ayşe", "last_name": "Kaya", "ogrenci_no": "102" }
        ]}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "exams.upsert",
        json!({ "exams": [
            { "id": "D1", "name": "LGS Deneme 1", "date": "2025-01-10", "type": "LGS", "gradeLevel": 8 },
            { "id": "D2", "name": "LGS Deneme 2", "date": "2025-02-10", "type": "LGS", "gradeLevel": 8 }
        ]}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "results.import",
        json!({ "examId": "D1", "rows": [
            { "student_id": "S1", "sinif": "8-A", "turkce_net": 15, "matematik_net": 10, "total_net": 25, "total_score": 400 },
            { "ogrenci_no": "102", "sinif": "8-A", "turkce_net": 12, "matematik_net": 3, "total_net": 15, "total_score": 300 },
            { "student_name": "Misafir Kişi", "turkce_net": 5, "matematik_net": 5, "total_net": 10, "total_score": 250 }
        ]}),
    );

    let open = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "analytics.exams.open",
        json!({ "examIds": ["D2", "D1"] }),
    );
    let codes = open
        .get("subjects")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.get("code").and_then(|v| v.as_str()))
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    assert_eq!(codes, vec!["TUR", "MAT"]);

    let exams = open
        .get("exams")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(exams.len(), 2);
    assert_eq!(exams[0].get("examId").and_then(|v| v.as_str()), Some("D2"));
    assert_eq!(exams[0].get("count").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(exams[0].get("avgNet").and_then(|v| v.as_f64()), Some(0.0));

    let d1 = &exams[1];
    assert_eq!(d1.get("name").and_then(|v| v.as_str()), Some("LGS Deneme 1"));
    assert_eq!(d1.get("count").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(d1.get("avgNet").and_then(|v| v.as_f64()), Some(16.7));
    assert_eq!(d1.get("avgScore").and_then(|v| v.as_f64()), Some(316.7));
    assert_eq!(d1.get("stdDevNet").and_then(|v| v.as_f64()), Some(6.2));
    assert_eq!(d1.get("resolvedCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(d1.get("unresolvedCount").and_then(|v| v.as_u64()), Some(1));
    let math = d1
        .get("subjects")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.get(1))
        .cloned()
        .expect("math subject");
    assert_eq!(math.get("avgNet").and_then(|v| v.as_f64()), Some(6.0));

    let classes = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "analytics.classes.open",
        json!({ "examIds": ["D1"] }),
    );
    let classes = classes
        .get("classes")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(classes.len(), 2);
    assert_eq!(classes[0].get("className").and_then(|v| v.as_str()), Some("8-A"));
    assert_eq!(classes[0].get("avgNet").and_then(|v| v.as_f64()), Some(20.0));
    assert_eq!(classes[0].get("resolvedStudents").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        classes[1].get("className").and_then(|v| v.as_str()),
        Some("Belirtilmemiş")
    );
    assert_eq!(classes[1].get("unresolvedStudents").and_then(|v| v.as_u64()), Some(1));

    let ranking = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "analytics.students.ranking",
        json!({ "examIds": ["D1"], "limit": 2 }),
    );
    assert_eq!(ranking.get("studentCount").and_then(|v| v.as_u64()), Some(3));
    let students = ranking
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(students.len(), 2);
    assert_eq!(students[0].get("rank").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(students[0].get("studentId").and_then(|v| v.as_str()), Some("S1"));
    assert_eq!(students[1].get("displayName").and_then(|v| v.as_str()), Some("AYŞE KAYA"));
}
