use std::collections::BTreeMap;

/// Customer-facing message templates, keyed by name. Placeholders are
/// `{{field}}` markers substituted by straight string replacement — no
/// escaping, no nesting; unmatched placeholders are left as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    templates: BTreeMap<String, String>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            "booking_received".into(),
            "Hi {{name}}, we received your booking request for {{service}} on {{date}} at {{time}}. \
             It is currently pending approval; we will update you shortly."
                .into(),
        );
        templates.insert(
            "booking_accepted".into(),
            "Hi {{name}}, good news! Your booking for {{date}} at {{time}} is confirmed. See you then!".into(),
        );
        templates.insert(
            "booking_rejected".into(),
            "Hi {{name}}, unfortunately we cannot fulfil your booking request for {{date}}. \
             Reason: {{reason}}. Please contact us to reschedule."
                .into(),
        );
        templates.insert(
            "booking_cancelled".into(),
            "Hi {{name}}, your booking for {{date}} has been cancelled as requested.".into(),
        );
        Self { templates }
    }
}

impl TemplateSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    /// Insert or replace a template body.
    pub fn set(&mut self, name: &str, text: &str) {
        self.templates.insert(name.to_string(), text.to_string());
    }

    /// Render a template with the given field values. Every occurrence of
    /// each `{{field}}` is replaced; `None` for an unknown template name.
    pub fn render(&self, name: &str, fields: &[(&str, &str)]) -> Option<String> {
        let mut text = self.templates.get(name)?.clone();
        for (field, value) in fields {
            text = text.replace(&format!("{{{{{field}}}}}"), value);
        }
        Some(text)
    }

    pub fn all(&self) -> &BTreeMap<String, String> {
        &self.templates
    }
}
