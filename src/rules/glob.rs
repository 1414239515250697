//! Shell-style patterns for the essential and purge lists.
//!
//! - `*` matches zero or more characters, `/` included
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from a class; `[!..]` or `[^..]`
//!   negates it. An unterminated `[` is a literal.

/// Match `text` against a glob `pattern`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    do_match(&pattern, &text)
}

/// Every token but `*` consumes exactly one character, so only the most
/// recent star ever needs retrying. Runs in O(pattern * text).
fn do_match(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Pattern index after the last star, and the text index it resumes at
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        let c = text[t];
        let step = match pattern.get(p) {
            Some('*') => {
                p += 1;
                star = Some((p, t));
                continue;
            }
            Some('?') => Some(1),
            Some('[') => match match_class(&pattern[p + 1..], c) {
                Some((true, consumed)) => Some(1 + consumed),
                Some((false, _)) => None,
                None => (c == '[').then_some(1),
            },
            Some(&lit) if lit == c => Some(1),
            _ => None,
        };

        match (step, star) {
            (Some(width), _) => {
                p += width;
                t += 1;
            }
            (None, Some((after_star, resume))) => {
                p = after_star;
                t = resume + 1;
                star = Some((after_star, resume + 1));
            }
            (None, None) => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Test `c` against the class body following a `[`. Returns whether it
/// matched and how many pattern chars the body used, closing `]` included.
/// `None` when the class is never closed.
fn match_class(body: &[char], c: char) -> Option<(bool, usize)> {
    let mut i = 0;
    let negated = matches!(body.first(), Some('!' | '^'));
    if negated {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    while i < body.len() {
        let lo = body[i];
        if lo == ']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;

        if body.get(i + 1) == Some(&'-') && body.get(i + 2).is_some_and(|&hi| hi != ']') {
            let hi = body[i + 2];
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= lo == c;
            i += 1;
        }
    }
    None
}

/// Whether `pattern` names a manifest item.
///
/// Patterns without a `/` are tried against the file name and the full
/// archive path; patterns with one against the declared href and the
/// archive path.
pub fn matches_item(pattern: &str, href: &str, path: &str) -> bool {
    if pattern.contains('/') {
        glob_match(pattern, href) || glob_match(pattern, path)
    } else {
        glob_match(pattern, file_name(path)) || glob_match(pattern, path)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// An ordered list of patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// First pattern naming the item, if any.
    pub fn find(&self, href: &str, path: &str) -> Option<&str> {
        self.patterns
            .iter()
            .map(String::as_str)
            .find(|p| matches_item(p, href, path))
    }

    pub fn matches(&self, href: &str, path: &str) -> bool {
        self.find(href, path).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
