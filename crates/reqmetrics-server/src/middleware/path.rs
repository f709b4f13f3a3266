//! Endpoint label normalization.
//!
//! Numeric and UUID segments become `:id` so per-resource URLs share one cell.
//! A trailing slash is dropped; the root stays `/`.

pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }

    trimmed
        .split('/')
        .map(|seg| if is_id_segment(seg) { ":id" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_id_segment(seg: &str) -> bool {
    let numeric = !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit());
    numeric || is_uuid(seg)
}

/// 8-4-4-4-12 hex groups.
fn is_uuid(seg: &str) -> bool {
    let groups: Vec<&str> = seg.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}
