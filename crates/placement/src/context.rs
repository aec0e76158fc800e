use std::sync::{Arc, OnceLock};

use scene::{Template, TemplateMetrics};

/// Shared, write-once slot for the loaded template.
///
/// Created empty before the registry exists; the loader publishes into it
/// exactly once. Clones observe the same slot.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    slot: Arc<OnceLock<Template>>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that is ready from the start.
    pub fn ready(template: Template) -> Self {
        let ctx = Self::new();
        // A fresh slot cannot already be filled.
        let _ = ctx.slot.set(template);
        ctx
    }

    /// Hand back the template if one was already published.
    pub fn publish(&self, template: Template) -> Result<(), Template> {
        self.slot.set(template)
    }

    pub fn template(&self) -> Option<&Template> {
        self.slot.get()
    }

    pub fn metrics(&self) -> Option<TemplateMetrics> {
        self.template().map(Template::metrics)
    }
}
