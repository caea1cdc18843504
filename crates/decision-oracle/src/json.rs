/// Every balanced top-level `{...}` span in an LLM reply, in order of appearance.
///
/// Braces inside JSON strings do not count. An opening brace that never closes is skipped and
/// the scan resumes at the next one, so stray braces in prose cannot hide a later object.
pub fn json_object_candidates(raw: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(offset) = raw[cursor..].find('{') {
        let start = cursor + offset;
        match balanced_end(&raw[start..]) {
            Some(len) => {
                found.push(&raw[start..start + len]);
                cursor = start + len;
            }
            None => cursor = start + 1,
        }
    }
    found
}

/// Byte length of the object opening at the start of `text`, if it closes.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
