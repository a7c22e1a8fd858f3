use thiserror::Error;

pub type Result<T> = std::result::Result<T, FollowUpError>;

/// Errors surfaced by the core. None of them are fatal; callers keep their
/// previous state and show the message to the user.
#[derive(Error, Debug)]
pub enum FollowUpError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    #[error("Conversation starter has no template")]
    MissingTemplate,

    #[error("Conversation starter has no prompt")]
    MissingPrompt,

    #[error("Could not generate conversation starter: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("Conversation starter generation was cancelled")]
    Cancelled,

    #[error("Error fetching contacts: {0}")]
    ContactQuery(#[source] anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FollowUpError {
    /// Short heading suitable for an alert title.
    pub fn title(&self) -> &'static str {
        match self {
            FollowUpError::Validation(_) => "Invalid Input",
            FollowUpError::TagNotFound(_) => "Tag Not Found",
            FollowUpError::ContactNotFound(_) => "Contact Not Found",
            FollowUpError::MissingTemplate | FollowUpError::MissingPrompt => {
                "Starter Not Configured"
            }
            FollowUpError::Generation(_) => "Error Generating Message",
            FollowUpError::Cancelled => "Cancelled",
            FollowUpError::ContactQuery(_) => "Error Fetching Contacts",
            FollowUpError::Storage(_)
            | FollowUpError::Serialization(_)
            | FollowUpError::Io(_) => "Error Saving Data",
        }
    }

    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            FollowUpError::ContactQuery(_) => {
                Some("Ensure that the app has access to your contacts.")
            }
            FollowUpError::MissingTemplate | FollowUpError::MissingPrompt => {
                Some("Edit the conversation starter and fill in its message.")
            }
            FollowUpError::Generation(_) => Some("Check your AI provider settings and try again."),
            _ => None,
        }
    }
}
