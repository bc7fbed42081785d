use crate::contact::{Contact, ContactId};
use crate::query::{self, Query, SortMode};

/// Local cache of the `contacts` resource plus the displayed subset.
///
/// `view` is derived from `all` and `query` on every change and is never
/// edited on its own.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    all: Vec<Contact>,
    view: Vec<Contact>,
    query: Query,
}

impl ViewState {
    pub fn new(query: Query) -> Self {
        Self {
            all: Vec::new(),
            view: Vec::new(),
            query,
        }
    }

    pub fn all(&self) -> &[Contact] {
        &self.all
    }

    pub fn view(&self) -> &[Contact] {
        &self.view
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Swap in a freshly fetched set, in server order.
    pub fn replace_all(&mut self, contacts: Vec<Contact>) {
        self.all = contacts;
        self.recompute();
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.query.search = search.into();
        self.recompute();
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.query.sort = sort;
        self.recompute();
    }

    /// Look up a contact in the full set.
    pub fn find(&self, id: ContactId) -> Option<&Contact> {
        self.all.iter().find(|contact| contact.id == id)
    }

    fn recompute(&mut self) {
        self.view = query::apply(&self.all, &self.query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: i64, fname: &str) -> Contact {
        Contact {
            id: ContactId(id),
            fname: fname.into(),
            lname: String::new(),
            email: String::new(),
            phone: String::new(),
            created_at: None,
        }
    }

    #[test]
    fn test_view_follows_controls() {
        let mut state = ViewState::default();
        state.replace_all(vec![contact(2, "Bob"), contact(1, "Amy"), contact(3, "Bea")]);
        assert_eq!(state.view().len(), 3);
        assert_eq!(state.view()[0].id, ContactId(1));

        state.set_search("b");
        let names: Vec<&str> = state.view().iter().map(|c| c.fname.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Bea"]);

        state.set_sort(SortMode::Fname);
        let names: Vec<&str> = state.view().iter().map(|c| c.fname.as_str()).collect();
        assert_eq!(names, vec!["Bea", "Bob"]);

        // Server order of the cache is untouched
        let ids: Vec<i64> = state.all().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_refetch_reapplies_query() {
        let mut state = ViewState::new(Query::new("amy", SortMode::Default));
        state.replace_all(vec![contact(1, "Amy"), contact(2, "Bob")]);
        assert_eq!(state.view().len(), 1);

        state.replace_all(vec![contact(2, "Bob"), contact(3, "Amy"), contact(4, "amy")]);
        let ids: Vec<i64> = state.view().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(state.find(ContactId(1)).is_none());
        assert_eq!(state.find(ContactId(2)).map(|c| c.fname.as_str()), Some("Bob"));
    }
}
