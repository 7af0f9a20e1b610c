use std::collections::HashMap;

/// `Miami (OH)` and `Miami-OH` both become `miami oh`; `Ohio St.` becomes `ohio state`.
pub fn normalize_team_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch == '&' {
            cleaned.push_str(" and ");
        } else if ch.is_alphanumeric() {
            cleaned.extend(ch.to_lowercase());
        } else if ch == '\'' || ch == '\u{2019}' {
            continue;
        } else {
            cleaned.push(' ');
        }
    }

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    if words.len() >= 2
        && let Some(last) = words.last_mut()
        && *last == "st"
    {
        *last = "state";
    }
    words.join(" ")
}

// exact, then case-insensitive, then normalized; first insert wins
#[derive(Debug, Clone)]
pub struct TeamIndex<T> {
    entries: Vec<(String, T)>,
    exact: HashMap<String, usize>,
    lower: HashMap<String, usize>,
    normalized: HashMap<String, usize>,
}

impl<T> Default for TeamIndex<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            exact: HashMap::new(),
            lower: HashMap::new(),
            normalized: HashMap::new(),
        }
    }
}

impl<T> TeamIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: T) {
        let idx = self.entries.len();
        self.entries.push((name.to_string(), value));
        self.exact.entry(name.to_string()).or_insert(idx);
        self.lower.entry(name.trim().to_lowercase()).or_insert(idx);
        let norm = normalize_team_name(name);
        if !norm.is_empty() {
            self.normalized.entry(norm).or_insert(idx);
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        let idx = self
            .exact
            .get(name)
            .or_else(|| self.lower.get(&name.trim().to_lowercase()))
            .or_else(|| self.normalized.get(&normalize_team_name(name)))?;
        self.entries.get(*idx).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> FromIterator<(String, T)> for TeamIndex<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut index = TeamIndex::new();
        for (name, value) in iter {
            index.insert(&name, value);
        }
        index
    }
}
