//! Projection of the displayed contacts into a listing.
//!
//! [`Listing`] is medium-independent. The HTML, terminal and plain text
//! projections each escape user text for their own medium.

use std::fmt::Write as _;

use crate::contact::{Contact, ContactId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowActionKind {
    View,
    Edit,
    Delete,
}

impl RowActionKind {
    pub fn label(self) -> &'static str {
        match self {
            RowActionKind::View => "Show",
            RowActionKind::Edit => "Edit",
            RowActionKind::Delete => "Delete",
        }
    }

    fn html_class(self) -> &'static str {
        match self {
            RowActionKind::View => "js-show",
            RowActionKind::Edit => "js-edit",
            RowActionKind::Delete => "js-delete",
        }
    }
}

/// Per-row affordance, keyed by contact id rather than row position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowAction {
    pub kind: RowActionKind,
    pub target: ContactId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    /// 1-based display position.
    pub index: usize,
    pub id: ContactId,
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub phone: String,
    pub actions: [RowAction; 3],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Empty,
    Rows(Vec<ListingRow>),
}

impl Listing {
    pub fn rows(&self) -> &[ListingRow] {
        match self {
            Listing::Empty => &[],
            Listing::Rows(rows) => rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Listing::Empty)
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }
}

/// Build the listing for an ordered set of contacts. Text is left raw.
pub fn listing(contacts: &[Contact]) -> Listing {
    if contacts.is_empty() {
        return Listing::Empty;
    }

    let rows = contacts
        .iter()
        .enumerate()
        .map(|(position, contact)| ListingRow {
            index: position + 1,
            id: contact.id,
            fname: contact.fname.clone(),
            lname: contact.lname.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            actions: [
                RowAction { kind: RowActionKind::View, target: contact.id },
                RowAction { kind: RowActionKind::Edit, target: contact.id },
                RowAction { kind: RowActionKind::Delete, target: contact.id },
            ],
        })
        .collect();

    Listing::Rows(rows)
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Make text safe to paint in a terminal: escape sequences are removed and
/// control characters dropped.
pub fn sanitize_terminal(raw: &str) -> String {
    let stripped = strip_ansi_escapes::strip_str(raw);
    stripped.chars().filter(|c| !c.is_control()).collect()
}

pub const HTML_EMPTY_STATE: &str = r#"<div id="emptyState" class="text-center text-muted">No contacts found.</div>"#;

/// Table body markup for the listing, or the empty-state marker.
pub fn html_tbody(listing: &Listing) -> String {
    let rows = match listing {
        Listing::Empty => return HTML_EMPTY_STATE.to_string(),
        Listing::Rows(rows) => rows,
    };

    let mut out = String::new();
    for row in rows {
        out.push_str("<tr>\n");
        let _ = writeln!(out, "  <th scope=\"row\">{}</th>", row.index);
        for value in [&row.fname, &row.lname, &row.email, &row.phone] {
            let _ = writeln!(out, "  <td>{}</td>", escape_html(value));
        }
        out.push_str("  <td>\n");
        for action in &row.actions {
            let _ = writeln!(
                out,
                "    <button class=\"btn btn-sm {}\" data-id=\"{}\" title=\"{}\">{}</button>",
                action.kind.html_class(),
                action.target,
                action.kind.label(),
                action.kind.label()
            );
        }
        out.push_str("  </td>\n</tr>\n");
    }
    out
}

/// Read-only detail body for one contact.
pub fn html_detail(contact: &Contact) -> String {
    let mut out = String::new();
    for (label, value) in detail_fields(contact) {
        let _ = writeln!(
            out,
            "<div class=\"mb-2\"><strong>{}:</strong> {}</div>",
            label,
            escape_html(value)
        );
    }
    out
}

/// Labelled fields shown by the detail presentation.
pub fn detail_fields(contact: &Contact) -> [(&'static str, &str); 4] {
    [
        ("First Name", contact.fname.as_str()),
        ("Last Name", contact.lname.as_str()),
        ("Email", contact.email.as_str()),
        ("Phone", contact.phone.as_str()),
    ]
}

/// Tab separated lines: index, id, first, last, email, phone.
pub fn plain(listing: &Listing) -> String {
    let mut out = String::new();
    for row in listing.rows() {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            row.index,
            row.id,
            sanitize_terminal(&row.fname),
            sanitize_terminal(&row.lname),
            sanitize_terminal(&row.email),
            sanitize_terminal(&row.phone)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: i64, fname: &str) -> Contact {
        Contact {
            id: ContactId(id),
            fname: fname.into(),
            lname: "Doe".into(),
            email: "doe@example.com".into(),
            phone: "555".into(),
            created_at: None,
        }
    }

    #[test]
    fn test_empty_listing() {
        let listing = listing(&[]);
        assert!(listing.is_empty());
        assert_eq!(html_tbody(&listing), HTML_EMPTY_STATE);
        assert_eq!(plain(&listing), "");
    }

    #[test]
    fn test_rows_use_display_index_not_id() {
        let listing = listing(&[contact(42, "Amy"), contact(7, "Bob")]);
        let rows = listing.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].id, ContactId(42));
        assert_eq!(rows[1].index, 2);
        for action in &rows[1].actions {
            assert_eq!(action.target, ContactId(7));
        }
        let kinds: Vec<RowActionKind> = rows[0].actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![RowActionKind::View, RowActionKind::Edit, RowActionKind::Delete]
        );
    }

    #[test]
    fn test_script_renders_as_literal_text() {
        let listing = listing(&[contact(1, "<script>alert('x')</script>")]);
        let html = html_tbody(&listing);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#039;x&#039;)&lt;/script&gt;"));
        assert!(html.contains("data-id=\"1\""));

        let detail = html_detail(&contact(1, "<b>\"Amy\" & co</b>"));
        assert!(detail.contains("&lt;b&gt;&quot;Amy&quot; &amp; co&lt;/b&gt;"));
    }

    #[test]
    fn test_escape_html_escapes_ampersand_first() {
        // Escaping already-escaped text escapes it again instead of unescaping
        assert_eq!(escape_html("&lt;"), "&amp;lt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_sanitize_terminal_strips_sequences() {
        assert_eq!(sanitize_terminal("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(sanitize_terminal("a\x07b\rc"), "abc");
        assert_eq!(sanitize_terminal("Zoë"), "Zoë");
    }

    #[test]
    fn test_plain_is_tab_separated() {
        let out = plain(&listing(&[contact(3, "Amy")]));
        assert_eq!(out, "1\t3\tAmy\tDoe\tdoe@example.com\t555\n");
    }
}
