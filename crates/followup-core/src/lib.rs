pub mod ai;
pub mod config;
pub mod contact;
pub mod error;
pub mod grouping;
pub mod manager;
pub mod notifications;
pub mod provider;
pub mod starter;
pub mod storage;
pub mod store;
pub mod tags;

// Re-export main types for convenience
pub use ai::{ClaudeClient, OllamaClient, OpenAIClient, TextGenerator};
pub use config::Config;
pub use contact::{Contact, ContactSnapshot};
pub use error::{FollowUpError, Result};
pub use grouping::{bucket_of, build_sections, build_sections_with, ContactSection, DateGrouping, WeekStart};
pub use manager::{ContactsSource, FollowUpManager};
pub use notifications::{
    NotificationConfiguration, NotificationTrigger, Notifier, ReminderNotification, ReminderScheduler,
};
pub use provider::Provider;
pub use starter::{
    ConversationStarterTemplate, Platform, Starter, StarterAction, StarterKind, StarterTask,
};
pub use storage::{ContactRepository, SqliteStore};
pub use store::ContactStore;
pub use tags::{Tag, TagBoard, TagColour};
