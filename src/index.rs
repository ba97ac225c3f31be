use crate::normalize::normalize_for_match;
use crate::record::{column_tokens, field_str, Record};
use serde::Serialize;
use std::collections::HashMap;

const ID_FIELD: &str = "id";
const FULL_NAME_FIELDS: &[&str] = &["full_name", "ad_soyad"];
const FIRST_NAME_FIELDS: &[&str] = &["first_name", "ad"];
const LAST_NAME_FIELDS: &[&str] = &["last_name", "soyad"];

/// Key tokens starting with this prefix mark a national-id column (`tc_no`, `tcNo`, `TCKN`).
const NATIONAL_ID_TOKEN_PREFIX: &str = "tc";
/// Substrings of the separator-free key that mark a national-id column.
const NATIONAL_ID_FRAGMENTS: &[&str] = &["kimlik", "national"];
/// Substrings of the separator-free key that mark a registration (school) number column.
const REGISTRATION_FRAGMENTS: &[&str] = &[
    "studentno",
    "ogrencino",
    "öğrencino",
    "schoolno",
    "okulno",
    "studentnumber",
    "registration",
];

/// A student as known to the institution's registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalStudent {
    pub id: Option<String>,
    pub national_id: Option<String>,
    pub registration_no: Option<String>,
    pub full_name: Option<String>,
}

/// Field names carrying national-id and registration numbers for one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFields {
    pub national_id: Vec<String>,
    pub registration_no: Vec<String>,
}

/// How many entries were overwritten per map while building the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexCollisions {
    pub id: usize,
    pub national_id: usize,
    pub registration_no: usize,
    pub name: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StudentIndex {
    students: Vec<CanonicalStudent>,
    by_id: HashMap<String, usize>,
    by_national_id: HashMap<String, usize>,
    by_registration_no: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    fields: StudentFields,
    collisions: IndexCollisions,
}

/// Scan one record's keys for national-id and registration-number columns.
pub fn discover_fields(sample: &Record) -> StudentFields {
    let mut fields = StudentFields::default();
    for key in sample.keys() {
        let tokens = column_tokens(key);
        let compact = tokens.concat();
        if REGISTRATION_FRAGMENTS.iter().any(|f| compact.contains(f)) {
            fields.registration_no.push(key.clone());
            continue;
        }
        let token_hit = tokens.iter().any(|t| t.starts_with(NATIONAL_ID_TOKEN_PREFIX));
        if token_hit || NATIONAL_ID_FRAGMENTS.iter().any(|f| compact.contains(f)) {
            fields.national_id.push(key.clone());
        }
    }
    fields
}

fn first_of(record: &Record, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| field_str(record, k))
}

/// Explicit full-name field, else first and last name joined.
pub fn record_full_name(record: &Record) -> Option<String> {
    if let Some(name) = first_of(record, FULL_NAME_FIELDS) {
        return Some(name);
    }
    let first = first_of(record, FIRST_NAME_FIELDS);
    let last = first_of(record, LAST_NAME_FIELDS);
    match (first, last) {
        (None, None) => None,
        (f, l) => Some(
            format!("{} {}", f.unwrap_or_default(), l.unwrap_or_default())
                .trim()
                .to_string(),
        ),
    }
}

fn insert(map: &mut HashMap<String, usize>, key: String, idx: usize, collisions: &mut usize) {
    if let Some(prev) = map.insert(key, idx) {
        if prev != idx {
            *collisions += 1;
        }
    }
}

impl StudentIndex {
    pub fn build(records: &[Record]) -> Self {
        let fields = records.first().map(discover_fields).unwrap_or_default();
        let mut index = StudentIndex {
            students: Vec::with_capacity(records.len()),
            fields,
            ..StudentIndex::default()
        };

        for record in records {
            let idx = index.students.len();
            let id = field_str(record, ID_FIELD);
            let national_ids: Vec<String> = index
                .fields
                .national_id
                .iter()
                .filter_map(|k| field_str(record, k))
                .collect();
            let registration_nos: Vec<String> = index
                .fields
                .registration_no
                .iter()
                .filter_map(|k| field_str(record, k))
                .collect();
            let name = record_full_name(record);

            if let Some(id) = &id {
                insert(&mut index.by_id, id.clone(), idx, &mut index.collisions.id);
            }
            for v in &national_ids {
                insert(
                    &mut index.by_national_id,
                    v.clone(),
                    idx,
                    &mut index.collisions.national_id,
                );
            }
            for v in &registration_nos {
                insert(
                    &mut index.by_registration_no,
                    v.clone(),
                    idx,
                    &mut index.collisions.registration_no,
                );
            }
            let name_key = normalize_for_match(name.as_deref());
            if !name_key.is_empty() {
                insert(&mut index.by_name, name_key, idx, &mut index.collisions.name);
            }

            index.students.push(CanonicalStudent {
                id,
                national_id: national_ids.into_iter().next(),
                registration_no: registration_nos.into_iter().next(),
                full_name: name,
            });
        }

        tracing::debug!(
            students = index.students.len(),
            by_id = index.by_id.len(),
            by_national_id = index.by_national_id.len(),
            by_registration_no = index.by_registration_no.len(),
            by_name = index.by_name.len(),
            name_collisions = index.collisions.name,
            "student index built"
        );
        index
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn fields(&self) -> &StudentFields {
        &self.fields
    }

    pub fn collisions(&self) -> IndexCollisions {
        self.collisions
    }

    pub fn by_id(&self, id: &str) -> Option<&CanonicalStudent> {
        self.by_id.get(id.trim()).map(|&i| &self.students[i])
    }

    pub fn by_national_id(&self, v: &str) -> Option<&CanonicalStudent> {
        self.by_national_id.get(v.trim()).map(|&i| &self.students[i])
    }

    pub fn by_registration_no(&self, v: &str) -> Option<&CanonicalStudent> {
        self.by_registration_no
            .get(v.trim())
            .map(|&i| &self.students[i])
    }

    /// Lookup by name; the argument is normalized here.
    pub fn by_name(&self, name: &str) -> Option<&CanonicalStudent> {
        let key = normalize_for_match(Some(name));
        if key.is_empty() {
            return None;
        }
        self.by_name.get(&key).map(|&i| &self.students[i])
    }
}
