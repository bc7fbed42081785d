//! Search and sort over the cached contact set.
//!
//! Everything here is a pure function of its inputs. The displayed subset is
//! always rebuilt from the full set, never edited in place.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::contact::Contact;
use crate::search;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortMode {
    /// Ascending by id
    #[default]
    Default,
    /// By first name
    Fname,
    /// By last name
    Lname,
    /// By creation time, oldest first
    Oldest,
}

impl SortMode {
    #[cfg(test)]
    pub const ALL: [SortMode; 4] = [
        SortMode::Default,
        SortMode::Fname,
        SortMode::Lname,
        SortMode::Oldest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Default => "default",
            SortMode::Fname => "fname",
            SortMode::Lname => "lname",
            SortMode::Oldest => "oldest",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SortMode::Default => "DEFAULT",
            SortMode::Fname => "FIRST NAME",
            SortMode::Lname => "LAST NAME",
            SortMode::Oldest => "OLDEST",
        }
    }

    /// Next value of the selector, wrapping around.
    pub fn next(self) -> Self {
        match self {
            SortMode::Default => SortMode::Fname,
            SortMode::Fname => SortMode::Lname,
            SortMode::Lname => SortMode::Oldest,
            SortMode::Oldest => SortMode::Default,
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(SortMode::Default),
            "fname" => Ok(SortMode::Fname),
            "lname" => Ok(SortMode::Lname),
            "oldest" => Ok(SortMode::Oldest),
            other => Err(format!("unknown sort mode `{}`", other)),
        }
    }
}

/// The two listing controls: search text and sort mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub search: String,
    pub sort: SortMode,
}

impl Query {
    pub fn new(search: impl Into<String>, sort: SortMode) -> Self {
        Self {
            search: search.into(),
            sort,
        }
    }
}

/// Produce the displayed subset of `all` for `query`.
pub fn apply(all: &[Contact], query: &Query) -> Vec<Contact> {
    let mut view: Vec<Contact> = match search::normalize_query(&query.search) {
        Some(needle) => all
            .iter()
            .filter(|contact| search::matches(contact, &needle))
            .cloned()
            .collect(),
        None => all.to_vec(),
    };
    sort(&mut view, query.sort);
    view
}

/// Stable sort; contacts with equal keys keep their relative order.
pub fn sort(contacts: &mut [Contact], mode: SortMode) {
    match mode {
        SortMode::Default => contacts.sort_by_key(|c| c.id),
        SortMode::Fname => contacts.sort_by_cached_key(|c| CollationKey::new(&c.fname)),
        SortMode::Lname => contacts.sort_by_cached_key(|c| CollationKey::new(&c.lname)),
        SortMode::Oldest => contacts.sort_by_key(|c| (c.created_millis(), c.id)),
    }
}

/// Locale-style ordering key: base letters first (case and accents folded),
/// then accents, then case with lowercase first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollationKey {
    primary: String,
    secondary: String,
    tertiary: String,
}

impl CollationKey {
    pub fn new(text: &str) -> Self {
        let primary = deunicode::deunicode(text).to_lowercase();
        let secondary = text.to_lowercase();
        let tertiary = text.chars().map(swap_case).collect();
        Self {
            primary,
            secondary,
            tertiary,
        }
    }
}

fn swap_case(c: char) -> char {
    if c.is_uppercase() {
        c.to_lowercase().next().unwrap_or(c)
    } else if c.is_lowercase() {
        c.to_uppercase().next().unwrap_or(c)
    } else {
        c
    }
}
