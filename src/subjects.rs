use crate::record::{column_tokens, RowLayout};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A result column recognised as a per-subject net score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDefinition {
    pub key: String,
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRule {
    pub code: String,
    pub label: String,
    /// Lowercase ASCII fragments; Turkish letters in column names are folded before matching.
    /// Fragments of up to three letters must match a whole word of the column name.
    pub fragments: Vec<String>,
}

/// Fixed subject tables: `rules` in matching order, `order` as the display sequence of codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCatalog {
    pub rules: Vec<SubjectRule>,
    pub order: Vec<String>,
}

const DEFAULT_RULES: &[(&str, &str, &[&str])] = &[
    ("TUR", "Türkçe", &["turkce"]),
    ("MAT", "Matematik", &["matematik", "mat"]),
    ("FEN", "Fen Bilimleri", &["fen"]),
    // Checked before SOS: "sosyal_inkilap_net" is the revolution history paper.
    (
        "INK",
        "T.C. İnkılap Tarihi ve Atatürkçülük",
        &["inkilap", "tarih", "ataturk"],
    ),
    ("SOS", "Sosyal Bilgiler", &["sosyal"]),
    ("ING", "İngilizce", &["ingilizce", "yabanci", "english"]),
    ("DIN", "Din Kültürü ve Ahlak Bilgisi", &["din"]),
];

const SHORT_FRAGMENT_LEN: usize = 3;

const DEFAULT_ORDER: &[&str] = &["TUR", "MAT", "FEN", "SOS", "INK", "ING", "DIN"];

impl Default for SubjectCatalog {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES
                .iter()
                .map(|(code, label, fragments)| SubjectRule {
                    code: code.to_string(),
                    label: label.to_string(),
                    fragments: fragments.iter().map(|f| f.to_string()).collect(),
                })
                .collect(),
            order: DEFAULT_ORDER.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl SubjectCatalog {
    fn rule_for(&self, folded: &str, words: &[String]) -> Option<&SubjectRule> {
        self.rules
            .iter()
            .find(|r| r.fragments.iter().any(|f| fragment_matches(f, folded, words)))
    }

    fn position(&self, code: &str) -> usize {
        self.order
            .iter()
            .position(|c| c == code)
            .unwrap_or(usize::MAX)
    }
}

/// Lowercase and fold Turkish letters to ASCII so fragments can stay ASCII.
fn fold_column(column: &str) -> String {
    column
        .to_lowercase()
        .chars()
        .filter(|c| *c != '\u{0307}')
        .map(|c| match c {
            'ç' => 'c',
            'ğ' => 'g',
            'ı' => 'i',
            'ö' => 'o',
            'ş' => 's',
            'ü' => 'u',
            other => other,
        })
        .collect()
}

/// Short fragments ("mat", "din") only match a whole word, optionally glued to `net`.
fn fragment_matches(fragment: &str, folded: &str, words: &[String]) -> bool {
    if fragment.is_empty() {
        return false;
    }
    if fragment.chars().count() > SHORT_FRAGMENT_LEN {
        return folded.contains(fragment);
    }
    words
        .iter()
        .any(|w| w == fragment || w.strip_suffix("net") == Some(fragment))
}

fn unknown_code(column: &str) -> String {
    let cut = column.len().saturating_sub(3);
    let stem = if column.is_char_boundary(cut) && column[cut..].eq_ignore_ascii_case("net") {
        &column[..cut]
    } else {
        column
    };
    let stem = stem.trim_end_matches(|c: char| c == '_' || c == '-' || c.is_whitespace());
    if stem.is_empty() {
        column.to_uppercase()
    } else {
        stem.to_uppercase()
    }
}

/// Detect subject net columns from one sample row's column names.
pub fn infer_subjects<S: AsRef<str>>(
    catalog: &SubjectCatalog,
    layout: &RowLayout,
    columns: &[S],
) -> Vec<SubjectDefinition> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut known: Vec<(usize, SubjectDefinition)> = Vec::new();
    let mut unknown: Vec<SubjectDefinition> = Vec::new();

    for column in columns {
        let column = column.as_ref();
        let folded = fold_column(column);
        if !folded.contains("net") || layout.is_total_net(column) {
            continue;
        }
        if !seen.insert(column) {
            continue;
        }
        let words: Vec<String> = column_tokens(column).iter().map(|t| fold_column(t)).collect();
        if let Some(rule) = catalog.rule_for(&folded, &words) {
            known.push((
                catalog.position(&rule.code),
                SubjectDefinition {
                    key: column.to_string(),
                    code: rule.code.clone(),
                    label: rule.label.clone(),
                },
            ));
        } else if folded.ends_with("net") {
            unknown.push(SubjectDefinition {
                key: column.to_string(),
                code: unknown_code(column),
                label: column.to_string(),
            });
        }
    }

    known.sort_by_key(|(pos, _)| *pos);
    unknown.sort_by(|a, b| a.label.cmp(&b.label));

    let subjects: Vec<SubjectDefinition> = known
        .into_iter()
        .map(|(_, s)| s)
        .chain(unknown)
        .collect();
    tracing::debug!(subjects = subjects.len(), "subject schema inferred");
    subjects
}
