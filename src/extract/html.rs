//! Low-level HTML string scanning helpers.
//!
//! Deliberately naive but tailored to the portal's ASP.NET markup: elements
//! are addressed by `id` attribute or by class marker, and text is recovered
//! by stripping tags. Matching is ASCII case-insensitive on tag and attribute
//! names. None of these helpers ever panic on malformed input; they return
//! `None` and let the caller degrade.

/// ASCII case-insensitive substring search starting at `from`.
pub fn find_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.len() > hay.len() {
        return None;
    }
    let upper = hay.len() - pat.len();
    (from..=upper).find(|&i| {
        hay[i..i + pat.len()]
            .iter()
            .zip(pat)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

/// Value of a quoted attribute inside an opening tag, e.g.
/// `attr_value("<option value=\"2-2026\" selected>", "value")`.
pub fn attr_value(open_tag: &str, name: &str) -> Option<String> {
    let marker = format!("{}=", name);
    let mut from = 0;
    loop {
        let pos = find_ci(open_tag, &marker, from)?;
        // Reject partial matches like "data-value=" when asked for "value=".
        let boundary = pos == 0
            || open_tag[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_whitespace());
        let after = pos + marker.len();
        if boundary {
            let rest = &open_tag[after..];
            let quote = rest.chars().next()?;
            if quote == '"' || quote == '\'' {
                let inner = &rest[1..];
                let end = inner.find(quote)?;
                return Some(inner[..end].to_string());
            }
        }
        from = after;
    }
}

/// Inner HTML of the element carrying `id="{id}"`, with same-tag nesting
/// handled by depth counting (tables inside tables).
pub fn element_by_id<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    let marker = format!("id=\"{}\"", id);
    let attr_pos = find_ci(html, &marker, 0)?;
    let lt = html[..attr_pos].rfind('<')?;
    let tag = tag_name(&html[lt + 1..])?;
    let open_end = html[lt..].find('>')? + lt + 1;
    balanced_inner(html, open_end, tag)
}

/// Tag name at the start of a tag body (just past `<`).
fn tag_name(after_lt: &str) -> Option<&str> {
    let end = after_lt.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
    if end == 0 {
        return None;
    }
    Some(&after_lt[..end])
}

/// Scan from `from` for the closing tag of `tag`, counting nested openings.
/// Returns the slice between `from` and the matching `</tag>`.
fn balanced_inner<'a>(html: &'a str, from: usize, tag: &str) -> Option<&'a str> {
    let open_pat = format!("<{}", tag);
    let close_pat = format!("</{}", tag);
    let mut depth = 1usize;
    let mut cursor = from;
    loop {
        let next_close = find_ci(html, &close_pat, cursor)?;
        match next_open_before(html, &open_pat, cursor, next_close, tag.len()) {
            Some(open) => {
                depth += 1;
                cursor = open + open_pat.len();
            }
            None => {
                depth -= 1;
                if depth == 0 {
                    return Some(&html[from..next_close]);
                }
                cursor = next_close + close_pat.len();
            }
        }
    }
}

/// Next genuine `<tag` opening strictly before `limit`. `<table` also
/// matches `<tablefoot`, so require a delimiter after the name.
fn next_open_before(
    html: &str,
    open_pat: &str,
    from: usize,
    limit: usize,
    name_len: usize,
) -> Option<usize> {
    let mut cursor = from;
    while let Some(pos) = find_ci(html, open_pat, cursor) {
        if pos >= limit {
            return None;
        }
        if is_tag_start(html, pos, name_len) {
            return Some(pos);
        }
        cursor = pos + open_pat.len();
    }
    None
}

fn is_tag_start(html: &str, lt: usize, name_len: usize) -> bool {
    html[lt + 1 + name_len..]
        .chars()
        .next()
        .is_some_and(|c| c.is_whitespace() || c == '>' || c == '/')
}

/// Non-nesting tag blocks (`tr`, `td`, `option`, `a`) in document order.
/// Yields (opening tag, inner html) pairs.
pub fn tag_blocks<'a>(html: &'a str, tag: &str) -> Vec<(&'a str, &'a str)> {
    let open_pat = format!("<{}", tag);
    let close_pat = format!("</{}", tag);
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(lt) = find_ci(html, &open_pat, cursor) {
        if !is_tag_start(html, lt, tag.len()) {
            cursor = lt + open_pat.len();
            continue;
        }
        let Some(open_end) = html[lt..].find('>').map(|i| lt + i + 1) else {
            break;
        };
        let Some(close) = find_ci(html, &close_pat, open_end) else {
            break;
        };
        out.push((&html[lt..open_end], &html[open_end..close]));
        cursor = close + close_pat.len();
    }
    out
}

/// Visible text of an HTML fragment: tags removed, common entities decoded,
/// whitespace collapsed.
pub fn text_of(fragment: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(fragment)))
}

/// Remove all `<...>` tags.
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Minimal entity decoding for the handful the portal emits.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse whitespace runs into single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_ci_ignores_case() {
        assert_eq!(find_ci("<TABLE id=\"x\">", "<table", 0), Some(0));
        assert_eq!(find_ci("abc", "d", 0), None);
        assert_eq!(find_ci("aaa", "a", 2), Some(2));
    }

    #[test]
    fn attr_value_handles_both_quotes_and_prefixes() {
        assert_eq!(
            attr_value("<option value=\"2-2026\" selected>", "value"),
            Some("2-2026".to_string())
        );
        assert_eq!(
            attr_value("<option value='1-2026'>", "value"),
            Some("1-2026".to_string())
        );
        // data-value must not satisfy a lookup for value... unless value
        // itself is also present.
        assert_eq!(
            attr_value("<div data-student-id=\"42\">", "data-student-id"),
            Some("42".to_string())
        );
        assert_eq!(attr_value("<div data-id=\"42\">", "id"), None);
    }

    #[test]
    fn element_by_id_counts_nested_tables() {
        let html = r#"<body><table id="outer"><tr><td><table><tr><td>x</td></tr></table></td></tr></table></body>"#;
        let inner = element_by_id(html, "outer").unwrap();
        assert!(inner.starts_with("<tr>"));
        assert!(inner.contains("<table>"));
        assert!(inner.ends_with("</tr>"));
    }

    #[test]
    fn element_by_id_missing_is_none() {
        assert_eq!(element_by_id("<div id=\"a\"></div>", "b"), None);
    }

    #[test]
    fn tag_blocks_yields_open_tags_and_inner() {
        let html = r#"<tr class="sg-asp-table-data-row"><td>1</td><td>2</td></tr><tr><td>3</td></tr>"#;
        let rows = tag_blocks(html, "tr");
        assert_eq!(rows.len(), 2);
        assert!(rows[0].0.contains("sg-asp-table-data-row"));
        let cells = tag_blocks(rows[0].1, "td");
        assert_eq!(cells.len(), 2);
        assert_eq!(text_of(cells[1].1), "2");
    }

    #[test]
    fn text_of_strips_and_decodes() {
        assert_eq!(
            text_of("<span>Last&nbsp;Updated:  <b>11/05/2025</b></span>"),
            "Last Updated: 11/05/2025"
        );
        assert_eq!(text_of("A &amp; B"), "A & B");
    }

    #[test]
    fn malformed_fragments_do_not_panic() {
        assert_eq!(element_by_id("<table id=\"x\"><tr>", "x"), None);
        assert!(tag_blocks("<td>unclosed", "td").is_empty());
    }
}
