//! Public path classification.
//!
//! A pattern without `*` matches by prefix. A pattern containing `*` is a glob:
//! `*` matches within a single path segment, `**` matches across segments.

/// Paths reachable without a credential unless configured otherwise.
pub const DEFAULT_PUBLIC_PATHS: [&str; 3] = ["/auth/login", "/auth/register", "/auth/refresh/**"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Prefix(String),
    Glob(String),
}

impl PathPattern {
    fn parse(pattern: &str) -> Self {
        if pattern.contains('*') {
            Self::Glob(pattern.to_string())
        } else {
            Self::Prefix(pattern.to_string())
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Glob(glob) => {
                // "/a/**" also covers "/a" itself
                if let Some(base) = glob.strip_suffix("/**") {
                    if path == base {
                        return true;
                    }
                }
                glob_match(glob.as_bytes(), path.as_bytes())
            }
        }
    }
}

fn glob_match(pattern: &[u8], path: &[u8]) -> bool {
    match pattern {
        [] => path.is_empty(),
        [b'*', b'*', rest @ ..] => (0..=path.len()).any(|i| glob_match(rest, &path[i..])),
        [b'*', rest @ ..] => {
            for i in 0..=path.len() {
                if glob_match(rest, &path[i..]) {
                    return true;
                }
                if path.get(i) == Some(&b'/') {
                    break;
                }
            }
            false
        }
        [c, rest @ ..] => path.first() == Some(c) && glob_match(rest, &path[1..]),
    }
}

/// The set of paths that skip authentication.
#[derive(Debug, Clone)]
pub struct PublicPaths {
    patterns: Vec<PathPattern>,
}

impl PublicPaths {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| PathPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLIC_PATHS)
    }
}
