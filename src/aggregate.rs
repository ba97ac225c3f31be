use crate::index::StudentIndex;
use crate::normalize::{normalize_for_display, normalize_for_match};
use crate::record::{field_f64, field_str, first_f64, first_str, ExamMeta, Record, RowLayout};
use crate::resolve::{classify, Candidate, Classification, MatchLabel};
use crate::stats::{mean, round_off_1_decimal, AggregateBucket, BucketStats};
use crate::subjects::SubjectDefinition;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Bucket for rows without a class label.
pub const UNSPECIFIED_CLASS: &str = "Belirtilmemiş";

const ROW_ID_FIELD: &str = "id";

/// A result row after resolution, reduced to the typed fields the engine reads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRow {
    pub position: usize,
    pub row_id: Option<String>,
    pub exam_id: Option<String>,
    pub class_name: Option<String>,
    pub total_net: f64,
    pub total_score: f64,
    /// Aligned with the subject list used to prepare the rows.
    pub subject_nets: Vec<Option<f64>>,
    pub student_key: String,
    pub display_name: String,
    pub classification: Classification,
}

impl ScoredRow {
    pub fn label(&self) -> MatchLabel {
        self.classification.label
    }
}

fn identity_key(
    prefix: &str,
    id: Option<&str>,
    national_id: Option<&str>,
    registration_no: Option<&str>,
    name: Option<&str>,
) -> Option<String> {
    if let Some(v) = id {
        return Some(format!("{prefix}:id:{v}"));
    }
    if let Some(v) = national_id {
        return Some(format!("{prefix}:tc:{v}"));
    }
    if let Some(v) = registration_no {
        return Some(format!("{prefix}:no:{v}"));
    }
    let name = normalize_for_match(name);
    if name.is_empty() {
        None
    } else {
        Some(format!("{prefix}:name:{name}"))
    }
}

/// Stable per-entrant key: the canonical student for resolved rows, a guest key otherwise.
pub fn student_key(cls: &Classification, candidate: &Candidate, position: usize) -> String {
    let key = match &cls.student {
        Some(s) => identity_key(
            "student",
            s.id.as_deref(),
            s.national_id.as_deref(),
            s.registration_no.as_deref(),
            s.full_name.as_deref(),
        ),
        None => identity_key(
            "guest",
            candidate.id.as_deref(),
            candidate.national_id.as_deref(),
            candidate.registration_no.as_deref(),
            candidate.name.as_deref(),
        ),
    };
    key.unwrap_or_else(|| format!("guest:row:{position}"))
}

fn display_name(cls: &Classification, candidate: &Candidate, key: &str) -> String {
    let name = cls
        .student
        .as_ref()
        .and_then(|s| s.full_name.clone())
        .or_else(|| candidate.name.clone());
    match name {
        Some(n) => normalize_for_display(Some(&n)),
        None => candidate
            .registration_no
            .clone()
            .unwrap_or_else(|| key.to_string()),
    }
}

/// Resolve and type every row. Subject values are read only through the inferred keys.
pub fn prepare_rows(
    records: &[Record],
    index: &StudentIndex,
    subjects: &[SubjectDefinition],
    layout: &RowLayout,
) -> Vec<ScoredRow> {
    records
        .iter()
        .enumerate()
        .map(|(position, record)| {
            let candidate = Candidate::from_record(record, layout);
            let classification = classify(index, &candidate);
            let key = student_key(&classification, &candidate, position);
            let name = display_name(&classification, &candidate, &key);
            ScoredRow {
                position,
                row_id: field_str(record, ROW_ID_FIELD),
                exam_id: first_str(record, &layout.exam_id),
                class_name: first_str(record, &layout.class_name),
                total_net: first_f64(record, &layout.total_net).unwrap_or(0.0),
                total_score: first_f64(record, &layout.total_score).unwrap_or(0.0),
                subject_nets: subjects.iter().map(|s| field_f64(record, &s.key)).collect(),
                student_key: key,
                display_name: name,
                classification,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranked<T> {
    pub rank: usize,
    #[serde(flatten)]
    pub item: T,
}

/// Stable descending sort by net; ranks are 1-based positions, so equal nets get
/// consecutive ranks in input order.
pub fn rank_by<T, F>(mut items: Vec<T>, net: F) -> Vec<Ranked<T>>
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| net(b).partial_cmp(&net(a)).unwrap_or(Ordering::Equal));
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| Ranked { rank: i + 1, item })
        .collect()
}

/// Rank the rows of one exam by total net.
pub fn rank_rows<'a>(rows: &'a [ScoredRow], exam_id: &str) -> Vec<Ranked<&'a ScoredRow>> {
    let in_exam = rows
        .iter()
        .filter(|r| r.exam_id.as_deref() == Some(exam_id))
        .collect::<Vec<_>>();
    rank_by(in_exam, |r| r.total_net)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamAggregate {
    pub exam_id: String,
    pub name: String,
    pub date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub exam_type: Option<String>,
    #[serde(flatten)]
    pub stats: BucketStats,
    pub resolved_count: usize,
    pub unresolved_count: usize,
}

/// Per-exam statistics for exactly the listed exams, in list order. Exams without
/// rows are reported with zero values.
pub fn exam_aggregates(
    rows: &[ScoredRow],
    subjects: &[SubjectDefinition],
    exams: &[ExamMeta],
) -> Vec<ExamAggregate> {
    let slot_by_id: HashMap<&str, usize> = exams
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.as_str(), i))
        .collect();
    let mut buckets: Vec<(AggregateBucket, usize, usize)> = exams
        .iter()
        .map(|_| (AggregateBucket::new(subjects.len()), 0, 0))
        .collect();

    for row in rows {
        let Some(slot) = row.exam_id.as_deref().and_then(|id| slot_by_id.get(id)) else {
            continue;
        };
        let entry = &mut buckets[*slot];
        entry
            .0
            .add(row.total_net, row.total_score, &row.subject_nets);
        match row.label() {
            MatchLabel::Resolved => entry.1 += 1,
            MatchLabel::Unresolved => entry.2 += 1,
        }
    }

    exams
        .iter()
        .zip(buckets)
        .map(|(exam, (bucket, resolved, unresolved))| ExamAggregate {
            exam_id: exam.id.clone(),
            name: exam.name.clone(),
            date: exam.date,
            exam_type: exam.exam_type.clone(),
            stats: bucket.finish(subjects),
            resolved_count: resolved,
            unresolved_count: unresolved,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAggregate {
    pub class_name: String,
    #[serde(flatten)]
    pub stats: BucketStats,
    pub student_count: usize,
    pub resolved_students: usize,
    pub unresolved_students: usize,
}

/// Orders "8-A" before "10-A"; the unspecified bucket goes last.
fn class_order(a: &str, b: &str) -> Ordering {
    fn key(name: &str) -> (bool, u64, String) {
        let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
        let grade = digits.parse::<u64>().unwrap_or(u64::MAX);
        (name == UNSPECIFIED_CLASS, grade, name.to_string())
    }
    key(a).cmp(&key(b))
}

pub fn class_aggregates(rows: &[ScoredRow], subjects: &[SubjectDefinition]) -> Vec<ClassAggregate> {
    struct Group<'a> {
        name: String,
        bucket: AggregateBucket,
        resolved: HashSet<&'a str>,
        unresolved: HashSet<&'a str>,
    }

    let mut slot_by_name: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group<'_>> = Vec::new();
    for row in rows {
        let name = row
            .class_name
            .clone()
            .unwrap_or_else(|| UNSPECIFIED_CLASS.to_string());
        let slot = *slot_by_name.entry(name.clone()).or_insert_with(|| {
            groups.push(Group {
                name,
                bucket: AggregateBucket::new(subjects.len()),
                resolved: HashSet::new(),
                unresolved: HashSet::new(),
            });
            groups.len() - 1
        });
        let g = &mut groups[slot];
        g.bucket
            .add(row.total_net, row.total_score, &row.subject_nets);
        match row.label() {
            MatchLabel::Resolved => g.resolved.insert(row.student_key.as_str()),
            MatchLabel::Unresolved => g.unresolved.insert(row.student_key.as_str()),
        };
    }

    let mut out: Vec<ClassAggregate> = groups
        .into_iter()
        .map(|g| ClassAggregate {
            stats: g.bucket.finish(subjects),
            student_count: g.resolved.len() + g.unresolved.len(),
            resolved_students: g.resolved.len(),
            unresolved_students: g.unresolved.len(),
            class_name: g.name,
        })
        .collect();
    out.sort_by(|a, b| class_order(&a.class_name, &b.class_name));
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAggregate {
    pub student_key: String,
    pub display_name: String,
    pub label: MatchLabel,
    pub student_id: Option<String>,
    pub class_name: Option<String>,
    pub count: usize,
    pub exam_count: usize,
    pub avg_net: f64,
    pub avg_score: f64,
}

/// Per-student means, in order of first appearance.
pub fn student_aggregates(rows: &[ScoredRow]) -> Vec<StudentAggregate> {
    struct Acc<'a> {
        first: &'a ScoredRow,
        class_name: Option<String>,
        count: usize,
        sum_net: f64,
        sum_score: f64,
        exams: HashSet<&'a str>,
    }

    let mut slot_by_key: HashMap<&str, usize> = HashMap::new();
    let mut accs: Vec<Acc<'_>> = Vec::new();
    for row in rows {
        let slot = *slot_by_key.entry(row.student_key.as_str()).or_insert_with(|| {
            accs.push(Acc {
                first: row,
                class_name: None,
                count: 0,
                sum_net: 0.0,
                sum_score: 0.0,
                exams: HashSet::new(),
            });
            accs.len() - 1
        });
        let acc = &mut accs[slot];
        acc.count += 1;
        acc.sum_net += row.total_net;
        acc.sum_score += row.total_score;
        if acc.class_name.is_none() {
            acc.class_name = row.class_name.clone();
        }
        if let Some(exam) = row.exam_id.as_deref() {
            acc.exams.insert(exam);
        }
    }

    accs.into_iter()
        .map(|a| {
            let n = a.count as f64;
            StudentAggregate {
                student_key: a.first.student_key.clone(),
                display_name: a.first.display_name.clone(),
                label: a.first.label(),
                student_id: a
                    .first
                    .classification
                    .student
                    .as_ref()
                    .and_then(|s| s.id.clone()),
                class_name: a.class_name,
                count: a.count,
                exam_count: a.exams.len(),
                avg_net: round_off_1_decimal(a.sum_net / n),
                avg_score: round_off_1_decimal(a.sum_score / n),
            }
        })
        .collect()
}

/// Students ranked by their mean net, optionally cut to the top `limit`.
pub fn student_ranking(rows: &[ScoredRow], limit: Option<usize>) -> Vec<Ranked<StudentAggregate>> {
    let mut ranked = rank_by(student_aggregates(rows), |s| s.avg_net);
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectExamAverage {
    pub exam_id: String,
    pub avg_net: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAggregate {
    pub key: String,
    pub code: String,
    pub label: String,
    pub avg_net: f64,
    pub count: usize,
    pub per_exam: Vec<SubjectExamAverage>,
}

pub fn subject_aggregates(
    rows: &[ScoredRow],
    subjects: &[SubjectDefinition],
    exams: &[ExamMeta],
) -> Vec<SubjectAggregate> {
    let mut overall = AggregateBucket::new(subjects.len());
    for row in rows {
        overall.add(row.total_net, row.total_score, &row.subject_nets);
    }
    let overall = overall.finish(subjects);
    let per_exam = exam_aggregates(rows, subjects, exams);

    overall
        .subjects
        .into_iter()
        .enumerate()
        .map(|(i, s)| SubjectAggregate {
            per_exam: per_exam
                .iter()
                .map(|e| SubjectExamAverage {
                    exam_id: e.exam_id.clone(),
                    avg_net: e.stats.subjects[i].avg_net,
                    count: e.stats.subjects[i].count,
                })
                .collect(),
            key: s.key,
            code: s.code,
            label: s.label,
            avg_net: s.avg_net,
            count: s.count,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub exam_id: String,
    pub exam_name: String,
    pub date: Option<NaiveDate>,
    pub net: Option<f64>,
    pub score: Option<f64>,
    pub exam_avg_net: f64,
    pub rank: Option<usize>,
    pub participants: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub student_key: String,
    pub display_name: Option<String>,
    pub points: Vec<TimelinePoint>,
    pub avg_net: f64,
    pub best_net: Option<f64>,
    pub worst_net: Option<f64>,
}

/// Dated exams first (oldest first), then undated ones by name.
pub fn chronological(exams: &[ExamMeta]) -> Vec<&ExamMeta> {
    let mut sorted = exams.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| {
        a.date
            .is_none()
            .cmp(&b.date.is_none())
            .then_with(|| a.date.cmp(&b.date))
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted
}

/// One point per exam for the given student key.
pub fn student_timeline(rows: &[ScoredRow], exams: &[ExamMeta], student_key: &str) -> Timeline {
    let display_name = rows
        .iter()
        .find(|r| r.student_key == student_key)
        .map(|r| r.display_name.clone());

    let points: Vec<TimelinePoint> = chronological(exams)
        .into_iter()
        .map(|exam| {
            let ranked = rank_rows(rows, &exam.id);
            let nets = ranked.iter().map(|r| r.item.total_net).collect::<Vec<_>>();
            let own = ranked
                .iter()
                .filter(|r| r.item.student_key == student_key)
                .collect::<Vec<_>>();
            let (net, score) = if own.is_empty() {
                (None, None)
            } else {
                let own_nets = own.iter().map(|r| r.item.total_net).collect::<Vec<_>>();
                let own_scores = own.iter().map(|r| r.item.total_score).collect::<Vec<_>>();
                (
                    Some(round_off_1_decimal(mean(&own_nets))),
                    Some(round_off_1_decimal(mean(&own_scores))),
                )
            };
            TimelinePoint {
                exam_id: exam.id.clone(),
                exam_name: exam.name.clone(),
                date: exam.date,
                net,
                score,
                exam_avg_net: round_off_1_decimal(mean(&nets)),
                rank: own.first().map(|r| r.rank),
                participants: ranked.len(),
            }
        })
        .collect();

    let nets = points.iter().filter_map(|p| p.net).collect::<Vec<_>>();
    Timeline {
        student_key: student_key.to_string(),
        display_name,
        avg_net: round_off_1_decimal(mean(&nets)),
        best_net: nets
            .iter()
            .cloned()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        worst_net: nets
            .iter()
            .cloned()
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        points,
    }
}
