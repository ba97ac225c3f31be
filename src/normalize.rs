/// Letters whose Turkish uppercase differs from (or is lost by) a naive uppercase.
/// `i` must become dotted `İ`, and dotless `ı` becomes plain `I`.
const LOCALE_UPPER: &[(char, char)] = &[
    ('i', 'İ'),
    ('ı', 'I'),
    ('ğ', 'Ğ'),
    ('ü', 'Ü'),
    ('ş', 'Ş'),
    ('ö', 'Ö'),
    ('ç', 'Ç'),
];

fn upper_char(c: char, out: &mut String) {
    if let Some((_, upper)) = LOCALE_UPPER.iter().find(|(lower, _)| *lower == c) {
        out.push(*upper);
        return;
    }
    if c.is_ascii() {
        out.push(c.to_ascii_uppercase());
    } else {
        out.extend(c.to_uppercase());
    }
}

/// Uppercase for display: locale letters first, then the remainder; trimmed.
pub fn normalize_for_display(s: Option<&str>) -> String {
    let s = s.unwrap_or("").trim();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        upper_char(c, &mut out);
    }
    out
}

/// Whitespace-free comparison key used for name matching.
///
/// `"  ahmet   yılmaz "` and `"AHMET YILMAZ"` both become `"AHMETYILMAZ"`.
pub fn normalize_for_match(s: Option<&str>) -> String {
    let display = normalize_for_display(s);
    let collapsed = display.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().filter(|c| !c.is_whitespace()).collect()
}
