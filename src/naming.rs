use std::collections::HashSet;

/// `desired` if it is free, otherwise `desired_N` for the smallest positive `N` not taken.
pub fn unique_name(desired: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(desired) {
        return desired.to_string();
    }
    (1..)
        .map(|n| format!("{desired}_{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| desired.to_string())
}

/// Hands out unique names and remembers them, so a batch of requests for the same base
/// never collides with itself.
#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    taken: HashSet<String>,
}

impl NameAllocator {
    pub fn new<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: existing.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allocate(&mut self, desired: &str) -> String {
        let name = unique_name(desired, |n| self.taken.contains(n));
        self.taken.insert(name.clone());
        name
    }
}
