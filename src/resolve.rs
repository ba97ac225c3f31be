use crate::index::{CanonicalStudent, StudentIndex};
use crate::record::{first_str, Record, RowLayout};
use serde::Serialize;

/// The identifying fields a result row presents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub id: Option<String>,
    pub national_id: Option<String>,
    pub registration_no: Option<String>,
    pub name: Option<String>,
}

impl Candidate {
    pub fn from_record(record: &Record, layout: &RowLayout) -> Self {
        Self {
            id: first_str(record, &layout.student_id),
            national_id: first_str(record, &layout.national_id),
            registration_no: first_str(record, &layout.registration_no),
            name: first_str(record, &layout.student_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKey {
    Id,
    NationalId,
    RegistrationNo,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchLabel {
    Resolved,
    Unresolved,
}

impl MatchLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchLabel::Resolved => "resolved",
            MatchLabel::Unresolved => "unresolved",
        }
    }

    /// Badge text used by the school-facing screens.
    pub fn badge(self) -> &'static str {
        match self {
            MatchLabel::Resolved => "asil",
            MatchLabel::Unresolved => "misafir",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub label: MatchLabel,
    pub matched_by: Option<MatchKey>,
    pub student: Option<CanonicalStudent>,
}

impl Classification {
    pub fn is_resolved(&self) -> bool {
        self.label == MatchLabel::Resolved
    }
}

/// Resolve a candidate, reporting which key matched.
///
/// Keys are tried strictly in order: id, national id, registration number, name.
pub fn resolve_with_key<'a>(
    index: &'a StudentIndex,
    candidate: &Candidate,
) -> Option<(&'a CanonicalStudent, MatchKey)> {
    if let Some(s) = candidate.id.as_deref().and_then(|v| index.by_id(v)) {
        return Some((s, MatchKey::Id));
    }
    if let Some(s) = candidate
        .national_id
        .as_deref()
        .and_then(|v| index.by_national_id(v))
    {
        return Some((s, MatchKey::NationalId));
    }
    if let Some(s) = candidate
        .registration_no
        .as_deref()
        .and_then(|v| index.by_registration_no(v))
    {
        return Some((s, MatchKey::RegistrationNo));
    }
    candidate
        .name
        .as_deref()
        .and_then(|v| index.by_name(v))
        .map(|s| (s, MatchKey::Name))
}

pub fn resolve<'a>(index: &'a StudentIndex, candidate: &Candidate) -> Option<&'a CanonicalStudent> {
    resolve_with_key(index, candidate).map(|(s, _)| s)
}

pub fn classify(index: &StudentIndex, candidate: &Candidate) -> Classification {
    match resolve_with_key(index, candidate) {
        Some((student, key)) => Classification {
            label: MatchLabel::Resolved,
            matched_by: Some(key),
            student: Some(student.clone()),
        },
        None => Classification {
            label: MatchLabel::Unresolved,
            matched_by: None,
            student: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index(v: serde_json::Value) -> StudentIndex {
        let records: Vec<Record> = v
            .as_array()
            .map(|a| a.iter().filter_map(|r| r.as_object().cloned()).collect())
            .unwrap_or_default();
        StudentIndex::build(&records)
    }

    fn cand(
        id: Option<&str>,
        nat: Option<&str>,
        reg: Option<&str>,
        name: Option<&str>,
    ) -> Candidate {
        Candidate {
            id: id.map(String::from),
            national_id: nat.map(String::from),
            registration_no: reg.map(String::from),
            name: name.map(String::from),
        }
    }

    #[test]
    fn id_wins_over_conflicting_weaker_keys() {
        let idx = index(json!([
            { "id": "S1", "tc_no": "100", "student_no": "1", "full_name": "Ali Can" },
            { "id": "S2", "tc_no": "200", "student_no": "2", "full_name": "Veli Can" }
        ]));
        let c = cand(Some("S1"), Some("200"), Some("2"), Some("Veli Can"));
        let (s, key) = resolve_with_key(&idx, &c).expect("resolved");
        assert_eq!(s.id.as_deref(), Some("S1"));
        assert_eq!(key, MatchKey::Id);
    }

    #[test]
    fn falls_through_in_priority_order() {
        let idx = index(json!([
            { "id": "S1", "tc_no": "100", "student_no": "1", "full_name": "Ali Can" },
            { "id": "S2", "tc_no": "200", "student_no": "2", "full_name": "Veli Can" }
        ]));
        let by_nat = classify(&idx, &cand(Some("nope"), Some("200"), Some("1"), None));
        assert_eq!(by_nat.matched_by, Some(MatchKey::NationalId));
        assert_eq!(by_nat.student.and_then(|s| s.id).as_deref(), Some("S2"));

        let by_reg = classify(&idx, &cand(None, None, Some("1"), Some("Veli Can")));
        assert_eq!(by_reg.matched_by, Some(MatchKey::RegistrationNo));

        let by_name = classify(&idx, &cand(None, None, None, Some("  veli   can")));
        assert_eq!(by_name.matched_by, Some(MatchKey::Name));
        assert_eq!(by_name.label.badge(), "asil");
    }

    #[test]
    fn empty_candidate_is_unresolved() {
        let idx = index(json!([{ "id": "S1", "full_name": "Ali Can" }]));
        let c = Candidate::default();
        assert!(resolve(&idx, &c).is_none());
        let cls = classify(&idx, &c);
        assert_eq!(cls.label, MatchLabel::Unresolved);
        assert_eq!(cls.label.badge(), "misafir");
        assert_eq!(classify(&idx, &c), cls);
    }

    #[test]
    fn candidate_reads_layout_synonyms() {
        let row = json!({ "ogrenci_id": 12, "okul_no": "77", "ad_soyad": "Ece Su" });
        let c = Candidate::from_record(row.as_object().expect("object"), &RowLayout::default());
        assert_eq!(c.id.as_deref(), Some("12"));
        assert_eq!(c.registration_no.as_deref(), Some("77"));
        assert_eq!(c.name.as_deref(), Some("Ece Su"));
        assert_eq!(c.national_id, None);
    }
}
