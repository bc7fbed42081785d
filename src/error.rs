use thiserror::Error;

/// Failure talking to the `contacts` resource.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded with HTTP {status}")]
    Status { status: u16 },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Client-side required-field check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("All fields are required! (missing: {})", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("contact id is missing")]
    MissingId,
}

/// Everything a user can be told went wrong.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("Failed to load contacts: {0}")]
    Load(#[source] RemoteError),
    #[error("Create failed: {0}")]
    Create(#[source] RemoteError),
    #[error("Update failed: {0}")]
    Update(#[source] RemoteError),
    #[error("Delete failed: {0}")]
    Delete(#[source] RemoteError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

pub const LOAD_FAILED: &str = "LOAD FAILED";

impl Failure {
    pub fn title(&self) -> &'static str {
        match self {
            Failure::Load(_) => LOAD_FAILED,
            Failure::Create(_) => "CREATE FAILED",
            Failure::Update(_) => "UPDATE FAILED",
            Failure::Delete(_) => "DELETE FAILED",
            Failure::Validation(_) => "INVALID CONTACT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages_carry_reason() {
        let failure = Failure::Update(RemoteError::Status { status: 500 });
        assert_eq!(
            failure.to_string(),
            "Update failed: server responded with HTTP 500"
        );
        assert_eq!(failure.title(), "UPDATE FAILED");

        let failure: Failure = ValidationError::MissingFields(vec!["email"]).into();
        assert_eq!(failure.to_string(), "All fields are required! (missing: email)");
    }
}
