//! Conversation starters: a message template (or an AI prompt) rendered for a
//! specific contact, then sent through a messaging platform.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use crate::ai::TextGenerator;
use crate::contact::Contact;
use crate::error::{FollowUpError, Result};

/// Token replaced with the contact's first name in standard templates.
pub const NAME_TOKEN: &str = "<NAME>";

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StarterKind {
    Standard,
    Intelligent,
}

impl StarterKind {
    pub fn all() -> Vec<StarterKind> {
        vec![StarterKind::Standard, StarterKind::Intelligent]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StarterKind::Standard => "Standard",
            StarterKind::Intelligent => "Intelligent",
        }
    }
}

/// The message source. The variant is the kind, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Starter {
    /// Literal text with `<NAME>` substituted.
    Standard {
        #[serde(default)]
        template: Option<String>,
    },
    /// A prompt sent to a text generator together with what we know about the contact.
    Intelligent {
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
}

impl Starter {
    pub fn standard(template: &str) -> Self {
        Starter::Standard {
            template: Some(template.to_string()),
        }
    }

    pub fn intelligent(prompt: &str, context: Option<&str>) -> Self {
        Starter::Intelligent {
            prompt: Some(prompt.to_string()),
            context: context.map(str::to_string),
        }
    }

    /// A blank starter of `kind`, carrying nothing over from any previous variant.
    pub fn fresh(kind: StarterKind) -> Self {
        match kind {
            StarterKind::Standard => Starter::standard(""),
            StarterKind::Intelligent => Starter::intelligent("", None),
        }
    }

    pub fn kind(&self) -> StarterKind {
        match self {
            Starter::Standard { .. } => StarterKind::Standard,
            Starter::Intelligent { .. } => StarterKind::Intelligent,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Starter::Standard { template } => template.as_deref().unwrap_or(""),
            Starter::Intelligent { prompt, .. } => prompt.as_deref().unwrap_or(""),
        }
    }

    /// Produce the outgoing message for `contact`. Only the intelligent variant
    /// touches `generator`.
    pub async fn render(&self, contact: &Contact, generator: &dyn TextGenerator) -> Result<String> {
        match self {
            Starter::Standard { template } => {
                let template = non_blank(template).ok_or(FollowUpError::MissingTemplate)?;
                Ok(render_template(template, contact))
            }
            Starter::Intelligent { prompt, context } => {
                let prompt = non_blank(prompt).ok_or(FollowUpError::MissingPrompt)?;
                let request = intelligent_request(contact, prompt, non_blank(context));

                log::info!(
                    "Generating conversation starter for {} via {}",
                    contact.id,
                    generator.name()
                );
                generator.generate(&request).await.map_err(|e| {
                    log::warn!("Conversation starter generation failed: {e:#}");
                    FollowUpError::Generation(e)
                })
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Literal `<NAME>` substitution. No other tokens are recognised.
pub fn render_template(template: &str, contact: &Contact) -> String {
    template.replace(NAME_TOKEN, contact.first_name())
}

/// The instruction handed to the text generator: who the contact is, what we
/// know about them, any extra context, then the user's prompt.
pub fn intelligent_request(contact: &Contact, prompt: &str, context: Option<&str>) -> String {
    let mut parts = vec![format!("I have a contact called {}.", contact.name)];

    if let Some(note) = contact.note.as_deref().filter(|n| !n.trim().is_empty()) {
        parts.push(format!("Here's a description of the contact: \"{note}\""));
    }
    if let Some(context) = context {
        parts.push(format!("For some added context, {context}."));
    }
    parts.push(prompt.to_string());

    parts.join("\n\n")
}

/// An in-flight render that can be abandoned.
///
/// Dropping the task (for example when the screen that asked for it goes away)
/// aborts the request; nothing is written anywhere, the caller just never gets
/// a message.
pub struct StarterTask {
    handle: JoinHandle<Result<String>>,
}

impl StarterTask {
    pub fn spawn(starter: Starter, contact: Contact, generator: Arc<dyn TextGenerator>) -> Self {
        let handle =
            tokio::spawn(async move { starter.render(&contact, generator.as_ref()).await });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn result(mut self) -> Result<String> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(FollowUpError::Cancelled),
            Err(e) => Err(FollowUpError::Generation(anyhow::anyhow!(
                "starter task failed: {e}"
            ))),
        }
    }
}

impl Drop for StarterTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Platform {
    WhatsApp,
}

impl Platform {
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::WhatsApp => "WhatsApp",
        }
    }
}

/// Where a rendered starter gets sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StarterAction {
    WhatsApp { number: String },
}

impl StarterAction {
    /// Deep link that opens the conversation with `text` prefilled.
    pub fn url(&self, text: &str) -> std::result::Result<Url, url::ParseError> {
        match self {
            StarterAction::WhatsApp { number } => {
                Url::parse_with_params(&format!("https://wa.me/{number}"), &[("text", text)])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationStarterTemplate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub platform: Platform,
    #[serde(flatten)]
    starter: Starter,
}

impl ConversationStarterTemplate {
    pub fn new(label: Option<&str>, starter: Starter, platform: Platform) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.map(str::to_string),
            platform,
            starter,
        }
    }

    pub fn standard(label: Option<&str>, template: &str, platform: Platform) -> Self {
        Self::new(label, Starter::standard(template), platform)
    }

    pub fn intelligent(
        label: Option<&str>,
        prompt: &str,
        context: Option<&str>,
        platform: Platform,
    ) -> Self {
        Self::new(label, Starter::intelligent(prompt, context), platform)
    }

    pub fn starter(&self) -> &Starter {
        &self.starter
    }

    pub fn set_starter(&mut self, starter: Starter) {
        self.starter = starter;
    }

    pub fn kind(&self) -> StarterKind {
        self.starter.kind()
    }

    /// Switch kind. Switching to a different kind starts from a blank starter.
    pub fn set_kind(&mut self, kind: StarterKind) {
        if self.starter.kind() != kind {
            self.starter = Starter::fresh(kind);
        }
    }

    pub fn title(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => self.starter.title(),
        }
    }

    /// How to deliver this starter to `contact`, if the contact is reachable on
    /// the template's platform.
    pub fn action(&self, contact: &Contact) -> Option<StarterAction> {
        match self.platform {
            Platform::WhatsApp => {
                let number = contact.phone_number.as_deref()?;
                let digits = NON_DIGITS.replace_all(number, "").into_owned();
                if digits.is_empty() {
                    return None;
                }
                Some(StarterAction::WhatsApp { number: digits })
            }
        }
    }

    pub async fn render(&self, contact: &Contact, generator: &dyn TextGenerator) -> Result<String> {
        self.starter.render(contact, generator).await
    }

    pub fn arrange_for_coffee() -> Self {
        Self::standard(
            Some("Arrange for coffee"),
            "Hey <NAME>! How are you? I was wondering if you'd be free for a coffee this week?",
            Platform::WhatsApp,
        )
    }

    pub fn how_are_you() -> Self {
        Self::standard(Some("How are you?"), "Hey <NAME>! How are you?", Platform::WhatsApp)
    }

    pub fn examples() -> Vec<Self> {
        vec![Self::arrange_for_coffee(), Self::how_are_you()]
    }
}
