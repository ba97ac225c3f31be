use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A loosely-structured record as it arrives from the store: arbitrary keys,
/// arbitrary JSON values.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Text value of a field. Numbers are accepted (identifiers are often stored
/// as integers); empty or whitespace-only strings count as absent.
pub fn field_str(record: &Record, key: &str) -> Option<String> {
    let v = record.get(key)?;
    let s = match v {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Numeric value of a field. Numeric strings are accepted, including a decimal comma.
pub fn field_f64(record: &Record, key: &str) -> Option<f64> {
    match record.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return None;
            }
            t.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// First non-empty text value among `keys`.
pub fn first_str(record: &Record, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|k| field_str(record, k))
}

/// First numeric value among `keys`.
pub fn first_f64(record: &Record, keys: &[String]) -> Option<f64> {
    keys.iter().find_map(|k| field_f64(record, k))
}

/// Exam metadata supplied by the store alongside the result rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, rename = "type")]
    pub exam_type: Option<String>,
    #[serde(default)]
    pub grade_level: Option<i64>,
}

impl ExamMeta {
    /// Placeholder for an exam id that has rows but no metadata.
    pub fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            date: None,
            exam_type: None,
            grade_level: None,
        }
    }
}

/// Column synonyms for the fixed fields of a result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowLayout {
    pub exam_id: Vec<String>,
    pub student_id: Vec<String>,
    pub national_id: Vec<String>,
    pub registration_no: Vec<String>,
    pub student_name: Vec<String>,
    pub class_name: Vec<String>,
    pub total_net: Vec<String>,
    pub total_score: Vec<String>,
}

fn is_column_separator(c: char) -> bool {
    c == '_' || c == '-' || c == '.' || c.is_whitespace()
}

/// Lowercased words of a field name, split on separators and camelCase humps.
pub fn column_tokens(key: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in key.chars() {
        if is_column_separator(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn compact_column(column: &str) -> String {
    column
        .chars()
        .filter(|c| !is_column_separator(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn owned(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

impl Default for RowLayout {
    fn default() -> Self {
        Self {
            exam_id: owned(&["exam_id", "sinav_id"]),
            student_id: owned(&["student_id", "ogrenci_id"]),
            national_id: owned(&["tc_no", "tc_kimlik_no", "national_id", "tckn", "tcNo"]),
            registration_no: owned(&[
                "student_no",
                "ogrenci_no",
                "school_no",
                "okul_no",
                "studentNo",
                "ogrenciNo",
            ]),
            student_name: owned(&["student_name", "ogrenci_adi", "full_name", "ad_soyad", "name"]),
            class_name: owned(&["class_name", "sinif", "sube", "class"]),
            total_net: owned(&["total_net", "toplam_net"]),
            total_score: owned(&["total_score", "toplam_puan", "puan", "score"]),
        }
    }
}

impl RowLayout {
    /// True for the literal total-net columns, which are never subjects.
    /// Case and separators are ignored, so `Toplam Net` matches `toplam_net`.
    pub fn is_total_net(&self, column: &str) -> bool {
        let column = compact_column(column);
        column == "net" || self.total_net.iter().any(|k| compact_column(k) == column)
    }
}
