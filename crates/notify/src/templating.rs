//! Minijinja template rendering for free-text tender messages.
//!
//! Templates are arbitrary strings (the default one, or an override loaded
//! from disk), so a fresh [`minijinja::Environment`] is created per render
//! call.

use tender_core::{MatchEntry, UserRow};

use crate::traits::NotifyError;

/// Default message, matching the wording users already receive.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "Hi {{ user.name }}\n\nWe have exciting Tender Opportunities for you in the {{ user.category }} Category. Click on the links to get tender details.{% for t in tenders %}\n\n*Tender Name*: {{ t.name }}\n*Location*: {{ t.location }}\n*Description*: {{ t.description }}\n*EMD Amount*: {{ t.emd }}\n*Link*: {{ t.link }}\n\n{% endfor %}";

/// Context data available to message templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageContext {
    pub user: UserContext,
    pub tenders: Vec<TenderContext>,
}

/// Recipient fields exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserContext {
    pub name: String,
    pub category: String,
    pub contact: String,
}

/// One matched tender exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TenderContext {
    pub name: String,
    pub location: String,
    pub description: String,
    pub emd: String,
    pub link: String,
}

impl MessageContext {
    pub fn new(user: &UserRow, entries: &[MatchEntry]) -> Self {
        Self {
            user: UserContext {
                name: user.name.clone(),
                category: user.category.clone(),
                contact: user.contact.clone(),
            },
            tenders: entries
                .iter()
                .map(|e| TenderContext {
                    name: e.tender_name.clone(),
                    location: e.tender_location.clone(),
                    description: e.tender_desc.clone(),
                    emd: e.tender_emd.clone(),
                    link: e.link.clone(),
                })
                .collect(),
        }
    }
}

/// Renders message templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Templates only see the message context; the `builtins` feature
    /// supplies filters such as `lower` and `upper`.
    fn build_env() -> minijinja::Environment<'static> {
        minijinja::Environment::new()
    }

    /// Render a template string with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails.
    pub fn render(&self, template_str: &str, ctx: &MessageContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}
