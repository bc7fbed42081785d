use crate::contact::Contact;

/// Normalize a search query. Returns `None` when there is nothing to filter on.
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Text a query is matched against: first name, last name, email and phone.
pub fn haystack(contact: &Contact) -> String {
    [
        contact.fname.as_str(),
        contact.lname.as_str(),
        contact.email.as_str(),
        contact.phone.as_str(),
    ]
    .join(" ")
    .to_lowercase()
}

/// `normalized` must come from [`normalize_query`].
pub fn matches(contact: &Contact, normalized: &str) -> bool {
    haystack(contact).contains(normalized)
}
