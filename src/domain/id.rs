//! Work-item ID generation and reference resolution
//!
//! IDs use the format `{6-char-hex}-{kind}-{slug}`,
//! e.g. `01a4f2-story-checkout-flow`.

/// Generate an id from kind and title
pub fn generate_id(kind: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    format!("{}-{}-{}", hex_prefix, kind, slugify(title))
}

/// Slugify a title for use in ids
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Resolve a partial reference against a set of known ids
///
/// Returns:
/// - `Ok(Some(id))` if exactly one id matches
/// - `Ok(None)` if nothing matches
/// - `Err(candidates)` if the reference is ambiguous
pub fn resolve_reference<'a, I>(ids: I, reference: &str) -> Result<Option<String>, Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let matches: Vec<String> = ids
        .into_iter()
        .filter(|id| id_matches(id, reference))
        .map(|id| id.to_string())
        .collect();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.into_iter().next()),
        _ => Err(matches),
    }
}

fn id_matches(id: &str, reference: &str) -> bool {
    if id == reference || id.starts_with(reference) {
        return true;
    }
    // Match against the kind+slug portion after the hex prefix
    match id.split_once('-') {
        Some((_, rest)) => rest.contains(reference),
        None => false,
    }
}
