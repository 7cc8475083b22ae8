//! Glob-style workload name filters.
//!
//! `*` matches any run of characters (including none), `?` exactly one.
//! A pattern must match the whole name.

/// Whether `pattern` matches all of `name`.
pub fn matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    // Last `*` seen: pattern index after it, and how much of `name` it has absorbed
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                p += 1;
                backtrack = Some((p, n));
            }
            Some(&c) if c == '?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((after_star, absorbed)) => {
                    p = after_star;
                    n = absorbed + 1;
                    backtrack = Some((after_star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Blacklist first, then whitelist; both empty accepts everything.
pub fn should_process(name: &str, whitelist: &[String], blacklist: &[String]) -> bool {
    if blacklist.iter().any(|pattern| matches(pattern, name)) {
        return false;
    }
    if !whitelist.is_empty() {
        return whitelist.iter().any(|pattern| matches(pattern, name));
    }
    true
}

/// Per-environment workload filter.
#[derive(Debug, Clone, Default)]
pub struct WorkloadFilter {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
}

impl WorkloadFilter {
    pub fn new(whitelist: Vec<String>, blacklist: Vec<String>) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }

    pub fn should_process(&self, name: &str) -> bool {
        should_process(name, &self.whitelist, &self.blacklist)
    }
}
