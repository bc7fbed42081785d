//! Remote `contacts` resource.
//!
//! This module provides:
//! - `ContactRepository` trait abstracting the CRUD collaborator
//! - `RestRepository`, the HTTP implementation using reqwest

pub mod rest;

use crate::contact::{Contact, ContactId, ContactPatch, NewContact};
use crate::error::RemoteError;

pub use rest::RestRepository;

/// CRUD over the `contacts` resource.
///
/// Implementations are called from the request worker thread, hence the
/// `Send + Sync` bound.
pub trait ContactRepository: Send + Sync {
    /// Fetch every contact, in server order
    fn list(&self) -> Result<Vec<Contact>, RemoteError>;

    /// Create a contact; the server assigns the id
    fn create(&self, contact: &NewContact) -> Result<Contact, RemoteError>;

    /// Update the editable fields of an existing contact
    fn update(&self, patch: &ContactPatch) -> Result<Contact, RemoteError>;

    /// Delete a contact
    fn delete(&self, id: ContactId) -> Result<(), RemoteError>;
}
