use crate::aggregate::{
    class_aggregates, exam_aggregates, prepare_rows, rank_rows, student_ranking,
    student_timeline, subject_aggregates, ClassAggregate, ExamAggregate, Ranked, ScoredRow,
    StudentAggregate, SubjectAggregate, Timeline,
};
use crate::index::{IndexCollisions, StudentFields, StudentIndex};
use crate::record::{ExamMeta, Record, RowLayout};
use crate::resolve::MatchLabel;
use crate::stats::{AggregateBucket, BucketStats};
use crate::subjects::{infer_subjects, SubjectCatalog, SubjectDefinition};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize)]
pub struct ReportError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ReportError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Point-in-time inputs for one request, already fetched by the store.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub students: Vec<Record>,
    /// Exams to report on, in the order the caller asked for them.
    pub exams: Vec<ExamMeta>,
    pub rows: Vec<Record>,
}

/// Index, subject schema and resolved rows for one request. Built once, then read-only.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub exams: Vec<ExamMeta>,
    pub subjects: Vec<SubjectDefinition>,
    pub rows: Vec<ScoredRow>,
    pub collisions: IndexCollisions,
    pub student_fields: StudentFields,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub row_count: usize,
    pub resolved_rows: usize,
    pub unresolved_rows: usize,
    pub collisions: IndexCollisions,
    pub student_fields: StudentFields,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamReport {
    pub subjects: Vec<SubjectDefinition>,
    pub overall: BucketStats,
    pub exams: Vec<ExamAggregate>,
    pub classes: Vec<ClassAggregate>,
    pub students: Vec<Ranked<StudentAggregate>>,
    pub per_subject: Vec<SubjectAggregate>,
    pub matching: MatchSummary,
}

impl Analysis {
    pub fn prepare(snapshot: &Snapshot, catalog: &SubjectCatalog, layout: &RowLayout) -> Self {
        let index = StudentIndex::build(&snapshot.students);
        let columns: Vec<&str> = snapshot
            .rows
            .first()
            .map(|r| r.keys().map(String::as_str).collect())
            .unwrap_or_default();
        let subjects = infer_subjects(catalog, layout, &columns);
        let rows = prepare_rows(&snapshot.rows, &index, &subjects, layout);
        tracing::debug!(
            rows = rows.len(),
            exams = snapshot.exams.len(),
            subjects = subjects.len(),
            "analysis prepared"
        );
        Self {
            exams: snapshot.exams.clone(),
            subjects,
            rows,
            collisions: index.collisions(),
            student_fields: index.fields().clone(),
        }
    }

    pub fn matching(&self) -> MatchSummary {
        let resolved_rows = self
            .rows
            .iter()
            .filter(|r| r.label() == MatchLabel::Resolved)
            .count();
        MatchSummary {
            row_count: self.rows.len(),
            resolved_rows,
            unresolved_rows: self.rows.len() - resolved_rows,
            collisions: self.collisions,
            student_fields: self.student_fields.clone(),
        }
    }

    pub fn overall(&self) -> BucketStats {
        let mut bucket = AggregateBucket::new(self.subjects.len());
        for row in &self.rows {
            bucket.add(row.total_net, row.total_score, &row.subject_nets);
        }
        bucket.finish(&self.subjects)
    }

    pub fn exams(&self) -> Vec<ExamAggregate> {
        exam_aggregates(&self.rows, &self.subjects, &self.exams)
    }

    pub fn classes(&self) -> Vec<ClassAggregate> {
        class_aggregates(&self.rows, &self.subjects)
    }

    pub fn student_ranking(&self, limit: Option<usize>) -> Vec<Ranked<StudentAggregate>> {
        student_ranking(&self.rows, limit)
    }

    pub fn row_ranking(&self, exam_id: &str, limit: Option<usize>) -> Vec<Ranked<&ScoredRow>> {
        let mut ranked = rank_rows(&self.rows, exam_id);
        if let Some(limit) = limit {
            ranked.truncate(limit);
        }
        ranked
    }

    pub fn subjects_view(&self) -> Vec<SubjectAggregate> {
        subject_aggregates(&self.rows, &self.subjects, &self.exams)
    }

    pub fn timeline(&self, student_key: &str) -> Timeline {
        student_timeline(&self.rows, &self.exams, student_key)
    }

    pub fn report(&self) -> ExamReport {
        ExamReport {
            subjects: self.subjects.clone(),
            overall: self.overall(),
            exams: self.exams(),
            classes: self.classes(),
            students: self.student_ranking(None),
            per_subject: self.subjects_view(),
            matching: self.matching(),
        }
    }
}

/// De-duplicated, trimmed exam ids from `params.examIds`; order is kept.
pub fn parse_exam_ids(params: &serde_json::Value) -> Result<Vec<String>, ReportError> {
    let Some(raw) = params.get("examIds").and_then(|v| v.as_array()) else {
        return Err(ReportError::new("bad_params", "missing examIds"));
    };
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for v in raw {
        let id = match v {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => {
                return Err(ReportError::new(
                    "bad_params",
                    "examIds must contain only strings",
                ))
            }
        };
        if id.is_empty() {
            return Err(ReportError::new(
                "bad_params",
                "examIds must not contain empty ids",
            ));
        }
        if seen.insert(id.clone()) {
            out.push(id);
        }
    }
    if out.is_empty() {
        return Err(ReportError::new(
            "bad_params",
            "examIds must contain at least one exam id",
        ));
    }
    Ok(out)
}

/// Optional positive `params.limit`.
pub fn parse_limit(params: &serde_json::Value) -> Result<Option<usize>, ReportError> {
    match params.get("limit") {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) if n > 0 => Ok(Some(n as usize)),
            _ => Err(ReportError::new(
                "bad_params",
                "limit must be a positive integer",
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exam_ids_are_trimmed_and_deduplicated() {
        let ids = parse_exam_ids(&json!({ "examIds": [" E1 ", "E2", "E1", 7] })).expect("ids");
        assert_eq!(ids, vec!["E1", "E2", "7"]);
    }

    #[test]
    fn exam_ids_reject_bad_input() {
        assert_eq!(
            parse_exam_ids(&json!({})).map_err(|e| e.code),
            Err("bad_params".to_string())
        );
        assert!(parse_exam_ids(&json!({ "examIds": [] })).is_err());
        assert!(parse_exam_ids(&json!({ "examIds": [" "] })).is_err());
        assert!(parse_exam_ids(&json!({ "examIds": [true] })).is_err());
    }

    #[test]
    fn limit_is_optional_and_positive() {
        assert_eq!(parse_limit(&json!({})).ok(), Some(None));
        assert_eq!(parse_limit(&json!({ "limit": null })).ok(), Some(None));
        assert_eq!(parse_limit(&json!({ "limit": 5 })).ok(), Some(Some(5)));
        assert!(parse_limit(&json!({ "limit": 0 })).is_err());
        assert!(parse_limit(&json!({ "limit": "5" })).is_err());
    }

    #[test]
    fn empty_snapshot_reports_zeros() {
        let analysis = Analysis::prepare(
            &Snapshot {
                exams: vec![ExamMeta::bare("E1")],
                ..Snapshot::default()
            },
            &SubjectCatalog::default(),
            &RowLayout::default(),
        );
        let report = analysis.report();
        assert!(report.subjects.is_empty());
        assert!(report.per_subject.is_empty());
        assert_eq!(report.overall.count, 0);
        assert_eq!(report.overall.std_dev_net, 0.0);
        assert_eq!(report.exams.len(), 1);
        assert_eq!(report.exams[0].stats.avg_net, 0.0);
        assert!(report.classes.is_empty());
        assert!(report.students.is_empty());
        assert_eq!(report.matching.row_count, 0);
    }
}
