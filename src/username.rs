use std::net::Ipv4Addr;

pub const MAX_CANDIDATES: u32 = 1000;

const MAX_NAME_BYTES: usize = 255;
const FORBIDDEN_CHARS: &[char] = &['#', '<', '>', '[', ']', '|', '{', '}', '/', '@', ':'];
const RESERVED_NAMES: &[&str] = &["Anonymous", "MediaWiki default", "Maintenance script"];

/// Underscores become spaces, runs of whitespace collapse, and the first
/// letter is upper-cased.
pub fn canonicalize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether `name` (already canonical) may be used for a new account.
pub fn is_creatable(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_BYTES {
        return false;
    }
    if name.chars().any(|c| c.is_control() || FORBIDDEN_CHARS.contains(&c)) {
        return false;
    }
    if name.parse::<Ipv4Addr>().is_ok() {
        return false;
    }
    !RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// `base`, `base 2`, `base 3`, ... up to [`MAX_CANDIDATES`] names, canonical.
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    (1..=MAX_CANDIDATES).map(move |counter| {
        if counter == 1 {
            canonicalize(base)
        } else {
            canonicalize(&format!("{base} {counter}"))
        }
    })
}
