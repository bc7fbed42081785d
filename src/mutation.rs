//! Remote requests issued on behalf of the session, and their outcomes.

use tracing::{info, warn};

use crate::contact::{Contact, ContactId, ContactPatch, NewContact};
use crate::error::RemoteError;
use crate::remote::ContactRepository;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Load,
    Create(NewContact),
    Update(ContactPatch),
    Delete(ContactId),
}

impl Request {
    pub fn describe(&self) -> String {
        match self {
            Request::Load => "load contacts".to_string(),
            Request::Create(_) => "create contact".to_string(),
            Request::Update(patch) => format!("update contact {}", patch.id),
            Request::Delete(id) => format!("delete contact {}", id),
        }
    }
}

/// Outcome of a [`Request`], delivered back to the session.
#[derive(Debug)]
pub enum Completion {
    Loaded(Result<Vec<Contact>, RemoteError>),
    Created(Result<Contact, RemoteError>),
    Updated(ContactId, Result<Contact, RemoteError>),
    Deleted(ContactId, Result<(), RemoteError>),
}

impl Completion {
    pub fn is_ok(&self) -> bool {
        match self {
            Completion::Loaded(result) => result.is_ok(),
            Completion::Created(result) => result.is_ok(),
            Completion::Updated(_, result) => result.is_ok(),
            Completion::Deleted(_, result) => result.is_ok(),
        }
    }
}

/// Run one request against `repo`. Failures are returned, never retried.
pub fn execute<R>(repo: &R, request: Request) -> Completion
where
    R: ContactRepository + ?Sized,
{
    let label = request.describe();
    let completion = match request {
        Request::Load => Completion::Loaded(repo.list()),
        Request::Create(contact) => Completion::Created(repo.create(&contact)),
        Request::Update(patch) => Completion::Updated(patch.id, repo.update(&patch)),
        Request::Delete(id) => Completion::Deleted(id, repo.delete(id)),
    };

    if completion.is_ok() {
        info!(request = %label, "request completed");
    } else {
        warn!(request = %label, "request failed");
    }
    completion
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory repository used by unit tests.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeRepository {
        pub contacts: Mutex<Vec<Contact>>,
        pub requests: Mutex<Vec<Request>>,
        pub fail_with: Mutex<Option<u16>>,
    }

    impl FakeRepository {
        pub fn with(contacts: Vec<Contact>) -> Self {
            Self {
                contacts: Mutex::new(contacts),
                ..Default::default()
            }
        }

        pub fn fail_next(&self, status: u16) {
            *self.fail_with.lock().unwrap() = Some(status);
        }

        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        fn record(&self, request: Request) -> Result<(), RemoteError> {
            self.requests.lock().unwrap().push(request);
            match self.fail_with.lock().unwrap().take() {
                Some(status) => Err(RemoteError::Status { status }),
                None => Ok(()),
            }
        }
    }

    impl ContactRepository for FakeRepository {
        fn list(&self) -> Result<Vec<Contact>, RemoteError> {
            self.record(Request::Load)?;
            Ok(self.contacts.lock().unwrap().clone())
        }

        fn create(&self, contact: &NewContact) -> Result<Contact, RemoteError> {
            self.record(Request::Create(contact.clone()))?;
            let mut contacts = self.contacts.lock().unwrap();
            let id = contacts.iter().map(|c| c.id.0).max().unwrap_or(0) + 1;
            // Stored the way the server stores it: fname/lname stay empty
            let created = Contact {
                id: ContactId(id),
                fname: String::new(),
                lname: String::new(),
                email: contact.email.clone(),
                phone: contact.phone.clone(),
                created_at: Some(crate::contact::CreatedAt::Millis(contact.created_at)),
            };
            contacts.push(created.clone());
            Ok(created)
        }

        fn update(&self, patch: &ContactPatch) -> Result<Contact, RemoteError> {
            self.record(Request::Update(patch.clone()))?;
            let mut contacts = self.contacts.lock().unwrap();
            let contact = contacts
                .iter_mut()
                .find(|c| c.id == patch.id)
                .ok_or(RemoteError::Status { status: 404 })?;
            contact.fname = patch.fname.clone();
            contact.lname = patch.lname.clone();
            contact.email = patch.email.clone();
            contact.phone = patch.phone.clone();
            Ok(contact.clone())
        }

        fn delete(&self, id: ContactId) -> Result<(), RemoteError> {
            self.record(Request::Delete(id))?;
            let mut contacts = self.contacts.lock().unwrap();
            let before = contacts.len();
            contacts.retain(|c| c.id != id);
            if contacts.len() == before {
                return Err(RemoteError::Status { status: 404 });
            }
            Ok(())
        }
    }
}
