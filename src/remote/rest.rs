//! HTTP client for the `contacts` resource using reqwest.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::contact::{Contact, ContactId, ContactPatch, NewContact};
use crate::error::RemoteError;
use crate::remote::ContactRepository;

/// REST implementation of [`ContactRepository`]
pub struct RestRepository {
    client: Client,
    base_url: String,
}

impl RestRepository {
    /// Create a client for the resource at `base_url` (e.g.
    /// `http://localhost:3000/contacts`).
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, RemoteError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn item_url(&self, id: ContactId) -> String {
        format!("{}/{}", self.base_url, id)
    }
}

/// Reject non-2xx responses.
fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RemoteError::Status {
            status: status.as_u16(),
        })
    }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response.text()?;
    serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
}

impl ContactRepository for RestRepository {
    fn list(&self) -> Result<Vec<Contact>, RemoteError> {
        debug!(url = %self.base_url, "GET contacts");
        let response = check_status(self.client.get(&self.base_url).send()?)?;

        // Anything but an array is treated as an empty resource
        let value: Value = decode(response)?;
        match value {
            Value::Array(items) => {
                let mut contacts = Vec::with_capacity(items.len());
                for item in items {
                    let contact = serde_json::from_value(item)
                        .map_err(|e| RemoteError::Decode(e.to_string()))?;
                    contacts.push(contact);
                }
                Ok(contacts)
            }
            other => {
                warn!(kind = value_kind(&other), "contacts response is not an array");
                Ok(Vec::new())
            }
        }
    }

    fn create(&self, contact: &NewContact) -> Result<Contact, RemoteError> {
        debug!(url = %self.base_url, "POST contact");
        let response = check_status(self.client.post(&self.base_url).json(contact).send()?)?;
        decode(response)
    }

    fn update(&self, patch: &ContactPatch) -> Result<Contact, RemoteError> {
        let url = self.item_url(patch.id);
        debug!(%url, "PATCH contact");
        let response = check_status(self.client.patch(&url).json(patch).send()?)?;
        decode(response)
    }

    fn delete(&self, id: ContactId) -> Result<(), RemoteError> {
        let url = self.item_url(id);
        debug!(%url, "DELETE contact");
        check_status(self.client.delete(&url).send()?)?;
        Ok(())
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let repo = RestRepository::new(" http://localhost:3000/contacts/ ", None).unwrap();
        assert_eq!(repo.base_url(), "http://localhost:3000/contacts");
        assert_eq!(
            repo.item_url(ContactId(12)),
            "http://localhost:3000/contacts/12"
        );
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let repo =
            RestRepository::new("http://127.0.0.1:9/contacts", Some(Duration::from_secs(2)))
                .unwrap();
        match repo.list() {
            Err(RemoteError::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other.map(|v| v.len())),
        }
    }
}
