//! Compact hostlist notation, e.g. `atlas[1-3,7],rain5`.

use crate::IndexMap;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostlistError {
    #[error("unbalanced brackets in hostlist term '{0}'")]
    UnbalancedBracket(String),

    #[error("invalid range '{0}' in hostlist")]
    InvalidRange(String),
}

/// Splits on commas that are not inside brackets.
fn split_terms(s: &str) -> Result<Vec<&str>, HostlistError> {
    let mut terms = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| HostlistError::UnbalancedBracket(s.to_string()))?
            }
            ',' if depth == 0 => {
                terms.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(HostlistError::UnbalancedBracket(s.to_string()));
    }
    terms.push(&s[start..]);
    Ok(terms.into_iter().map(str::trim).filter(|t| !t.is_empty()).collect())
}

fn expand_range(r: &str, out: &mut Vec<String>) -> Result<(), HostlistError> {
    let make_error = || HostlistError::InvalidRange(r.to_string());
    let (lo, hi) = match r.split_once('-') {
        Some((lo, hi)) => (lo.trim(), hi.trim()),
        None => (r.trim(), r.trim()),
    };
    if lo.is_empty() || !lo.bytes().all(|b| b.is_ascii_digit()) {
        return Err(make_error());
    }
    let width = lo.len();
    let lo: u64 = lo.parse().map_err(|_| make_error())?;
    let hi: u64 = hi.parse().map_err(|_| make_error())?;
    if hi < lo {
        return Err(make_error());
    }
    out.extend((lo..=hi).map(|n| format!("{:0w$}", n, w = width)));
    Ok(())
}

fn expand_term(term: &str, out: &mut Vec<String>) -> Result<(), HostlistError> {
    let open = match term.find('[') {
        Some(i) => i,
        None => {
            if term.contains(']') {
                return Err(HostlistError::UnbalancedBracket(term.to_string()));
            }
            out.push(term.to_string());
            return Ok(());
        }
    };
    let close = term[open..]
        .find(']')
        .map(|i| i + open)
        .ok_or_else(|| HostlistError::UnbalancedBracket(term.to_string()))?;

    let prefix = &term[..open];
    let mut numbers = vec![];
    for r in term[open + 1..close].split(',') {
        expand_range(r, &mut numbers)?;
    }

    // Further bracket groups in the remainder multiply out.
    let mut suffixes = vec![];
    let rest = &term[close + 1..];
    if rest.is_empty() {
        suffixes.push(String::new());
    } else {
        expand_term(rest, &mut suffixes)?;
    }

    for n in &numbers {
        for s in &suffixes {
            out.push(format!("{}{}{}", prefix, n, s));
        }
    }
    Ok(())
}

/// Expands compact notation into individual hostnames, in notation order.
pub fn expand(s: &str) -> Result<Vec<String>, HostlistError> {
    let mut hosts = vec![];
    for term in split_terms(s)? {
        expand_term(term, &mut hosts)?;
    }
    Ok(hosts)
}

fn format_group(prefix: &str, width: usize, mut nums: Vec<u64>) -> String {
    nums.sort_unstable();
    nums.dedup();
    if let [n] = nums[..] {
        return format!("{}{:0w$}", prefix, n, w = width);
    }

    let mut ranges = vec![];
    let mut i = 0;
    while i < nums.len() {
        let start = nums[i];
        let mut end = start;
        while i + 1 < nums.len() && nums[i + 1] == end + 1 {
            i += 1;
            end = nums[i];
        }
        if start == end {
            ranges.push(format!("{:0w$}", start, w = width));
        } else {
            ranges.push(format!("{:0w$}-{:0w$}", start, end, w = width));
        }
        i += 1;
    }
    format!("{}[{}]", prefix, ranges.join(","))
}

/// Collapses hostnames sharing a prefix and digit width into bracketed ranges.
/// Groups keep the order in which they are first seen.
pub fn compress<S: AsRef<str>>(hosts: &[S]) -> String {
    lazy_static::lazy_static! {
        static ref NUMBERED: Regex = Regex::new(r"^(.*?)(\d+)$").unwrap();
    }

    let mut groups: IndexMap<(String, Option<usize>), Vec<u64>> = IndexMap::new();
    for h in hosts {
        let h = h.as_ref().trim();
        if h.is_empty() {
            continue;
        }
        let numbered = NUMBERED.captures(h).and_then(|c| {
            let digits = c.get(2)?.as_str();
            let n = digits.parse::<u64>().ok()?;
            Some((c.get(1)?.as_str().to_string(), digits.len(), n))
        });
        match numbered {
            Some((prefix, width, n)) => groups.entry((prefix, Some(width))).or_default().push(n),
            None => {
                groups.entry((h.to_string(), None)).or_default();
            }
        }
    }

    groups
        .into_iter()
        .map(|((prefix, width), nums)| match width {
            Some(w) => format_group(&prefix, w, nums),
            None => prefix,
        })
        .collect::<Vec<_>>()
        .join(",")
}
