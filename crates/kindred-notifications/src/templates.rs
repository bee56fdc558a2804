use std::collections::HashMap;

use crate::error::NotificationError;
use crate::types::NotificationKind;

/// Simple template renderer using `{{variable}}` syntax.
pub struct TemplateRenderer {
    templates: HashMap<String, Template>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Rendered title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub title: String,
    pub body: String,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Renderer preloaded with the copy for every [`NotificationKind`].
    pub fn with_defaults() -> Self {
        let mut renderer = Self::new();
        renderer.register(Template {
            id: NotificationKind::Interest.as_str().to_string(),
            title: "New Interest!".to_string(),
            body: "{{actorName}} is interested in you!".to_string(),
        });
        renderer.register(Template {
            id: NotificationKind::FriendRequest.as_str().to_string(),
            title: "New Friend Request!".to_string(),
            body: "{{actorName}} sent you a friend request!".to_string(),
        });
        renderer
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, template_id: &str) -> Option<&Template> {
        self.templates.get(template_id)
    }

    pub fn render(
        &self,
        template_id: &str,
        data: &HashMap<&str, String>,
    ) -> Result<RenderedContent, NotificationError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| NotificationError::TemplateNotFound(template_id.to_string()))?;

        Ok(RenderedContent {
            title: render_string(&template.title, data),
            body: render_string(&template.body, data),
        })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn render_string(template: &str, data: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in data {
        let placeholder = format!("{{{{{key}}}}}");
        result = result.replace(&placeholder, value);
    }
    result
}
