//! Small CSV helpers for the roster import/export surface.
//!
//! One record per line; quoted fields may contain commas and doubled quotes.

/// Strip a UTF-8 byte-order mark, which spreadsheet exports commonly prepend.
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

/// Split one CSV line into fields, honoring double-quote escaping.
pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

/// Quote a field for output when it contains a delimiter, quote, or newline.
pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Join one row of fields into a CSV line.
pub fn csv_line(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| csv_quote(field))
        .collect::<Vec<_>>()
        .join(",")
}

/// Normalized (trimmed, lowercased) header name keyed to its column index.
pub fn header_indexes(header_fields: &[String]) -> std::collections::HashMap<String, usize> {
    header_fields
        .iter()
        .enumerate()
        .filter(|(_, name)| !name.trim().is_empty())
        .map(|(idx, name)| (name.trim().to_ascii_lowercase(), idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_split_on_commas() {
        assert_eq!(
            parse_csv_record("22-2246,student@cca.edu.ph,Acopio"),
            vec!["22-2246", "student@cca.edu.ph", "Acopio"]
        );
    }

    #[test]
    fn quoted_fields_keep_commas_and_escaped_quotes() {
        assert_eq!(
            parse_csv_record(r#""Dela Cruz, Jr.","say ""hi""",plain"#),
            vec!["Dela Cruz, Jr.", "say \"hi\"", "plain"]
        );
    }

    #[test]
    fn trailing_empty_field_is_preserved() {
        assert_eq!(parse_csv_record("a,b,"), vec!["a", "b", ""]);
    }

    #[test]
    fn quote_round_trips_through_parse() {
        let original = "Dela Cruz, \"Jun\"";
        let quoted = csv_quote(original);
        assert_eq!(parse_csv_record(&quoted), vec![original]);
    }

    #[test]
    fn bom_is_stripped() {
        assert_eq!(strip_bom("\u{feff}student_no"), "student_no");
        assert_eq!(strip_bom("student_no"), "student_no");
    }

    #[test]
    fn header_indexes_normalize_case_and_whitespace() {
        let header = vec![
            "Student_No".to_string(),
            " CCA_Email ".to_string(),
            "".to_string(),
            "last_name".to_string(),
        ];
        let map = header_indexes(&header);
        assert_eq!(map.get("student_no"), Some(&0));
        assert_eq!(map.get("cca_email"), Some(&1));
        assert_eq!(map.get("last_name"), Some(&3));
        assert_eq!(map.len(), 3);
    }
}
