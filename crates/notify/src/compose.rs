//! Builds one outbound payload per recipient from a match group.
//!
//! The user shown in the message is resolved from the first entry of each
//! group; every entry under one contact key comes from users sharing that
//! key, so the first one stands for the group.

use std::path::Path;

use tender_core::config::InfobipConfig;
use tender_core::{MatchEntry, MatchGroup, RenderStrategy, UserRow, UserTable};

use crate::templating::{MessageContext, TemplateRenderer, DEFAULT_MESSAGE_TEMPLATE};
use crate::traits::{MessageContent, NotificationPayload, NotifyError};

/// Turns a user and their matched tenders into message content.
pub trait MessageRenderer: Send + Sync {
    fn render(&self, user: &UserRow, entries: &[MatchEntry]) -> Result<MessageContent, NotifyError>;

    fn name(&self) -> &str;
}

/// Renders a single human-readable message with minijinja.
#[derive(Debug)]
pub struct FreeTextRenderer {
    template: String,
    renderer: TemplateRenderer,
}

impl FreeTextRenderer {
    /// Use a custom template. Syntax is checked up front.
    pub fn new(template: impl Into<String>) -> Result<Self, NotifyError> {
        let template = template.into();
        let renderer = TemplateRenderer::new();
        renderer
            .validate(&template)
            .map_err(|e| NotifyError::Config(format!("invalid message template: {e}")))?;
        Ok(Self { template, renderer })
    }

    /// Load the template from a file.
    pub fn from_file(path: &Path) -> Result<Self, NotifyError> {
        let template = std::fs::read_to_string(path).map_err(|e| {
            NotifyError::Config(format!("cannot read message template {}: {e}", path.display()))
        })?;
        Self::new(template)
    }
}

impl Default for FreeTextRenderer {
    fn default() -> Self {
        Self {
            template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
            renderer: TemplateRenderer::new(),
        }
    }
}

impl MessageRenderer for FreeTextRenderer {
    fn render(&self, user: &UserRow, entries: &[MatchEntry]) -> Result<MessageContent, NotifyError> {
        let ctx = MessageContext::new(user, entries);
        let body = self.renderer.render(&self.template, &ctx)?;
        Ok(MessageContent::Text { body })
    }

    fn name(&self) -> &str {
        "free-text"
    }
}

/// Emits `[name, category]` then `(name, location, description, emd, link)`
/// per tender, for a provider-side template.
#[derive(Debug, Clone)]
pub struct PlaceholderRenderer {
    template_name: String,
    language: String,
}

impl PlaceholderRenderer {
    pub fn new(template_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            template_name: template_name.into(),
            language: language.into(),
        }
    }

    pub fn placeholders(user: &UserRow, entries: &[MatchEntry]) -> Vec<String> {
        let mut values = Vec::with_capacity(2 + entries.len() * 5);
        values.push(user.name.clone());
        values.push(user.category.clone());
        for e in entries {
            values.extend([
                e.tender_name.clone(),
                e.tender_location.clone(),
                e.tender_desc.clone(),
                e.tender_emd.clone(),
                e.link.clone(),
            ]);
        }
        values
    }
}

impl MessageRenderer for PlaceholderRenderer {
    fn render(&self, user: &UserRow, entries: &[MatchEntry]) -> Result<MessageContent, NotifyError> {
        Ok(MessageContent::Template {
            name: self.template_name.clone(),
            language: self.language.clone(),
            placeholders: Self::placeholders(user, entries),
        })
    }

    fn name(&self) -> &str {
        "placeholders"
    }
}

/// Transport metadata stamped on every payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub sender: String,
    pub callback_data: String,
    pub notify_url: String,
}

/// Group → payloads, using the configured renderer.
pub struct Composer {
    renderer: Box<dyn MessageRenderer>,
    envelope: Envelope,
}

impl Composer {
    pub fn new(renderer: Box<dyn MessageRenderer>, envelope: Envelope) -> Self {
        Self { renderer, envelope }
    }

    /// Composer for the configured render strategy.
    pub fn from_config(config: &InfobipConfig) -> Result<Self, NotifyError> {
        let renderer: Box<dyn MessageRenderer> = match config.render_strategy {
            RenderStrategy::FreeText => match &config.message_template_path {
                Some(path) => Box::new(FreeTextRenderer::from_file(path)?),
                None => Box::new(FreeTextRenderer::default()),
            },
            RenderStrategy::Placeholders => Box::new(PlaceholderRenderer::new(
                config.template_name.clone(),
                config.template_language.clone(),
            )),
        };
        let envelope = Envelope {
            sender: config.sender.clone().unwrap_or_default(),
            callback_data: config.callback_data.clone(),
            notify_url: config.notify_url.clone(),
        };
        Ok(Self::new(renderer, envelope))
    }

    pub fn renderer_name(&self) -> &str {
        self.renderer.name()
    }

    /// One payload per recipient, in group order.
    pub fn compose(
        &self,
        group: &MatchGroup,
        users: &UserTable,
    ) -> Result<Vec<NotificationPayload>, NotifyError> {
        group
            .iter()
            .filter_map(|(recipient, entries)| entries.first().map(|first| (recipient, first, entries)))
            .map(|(recipient, first, entries)| {
                let user = users.get(first.user_id).ok_or_else(|| NotifyError::UnknownUser {
                    recipient: recipient.to_string(),
                    user_id: first.user_id,
                })?;
                Ok(NotificationPayload {
                    recipient: recipient.to_string(),
                    sender: self.envelope.sender.clone(),
                    message_id: uuid::Uuid::new_v4().to_string(),
                    content: self.renderer.render(user, entries)?,
                    callback_data: self.envelope.callback_data.clone(),
                    notify_url: self.envelope.notify_url.clone(),
                    tender_count: entries.len(),
                })
            })
            .collect()
    }
}
