//! Per-instance alert annotations rendered from operator-supplied templates.

use minijinja::{context, Environment};
use rpaas_slo_controller_k8s_api::{ResourceExt, RpaasInstance};
use std::collections::BTreeMap;
use tracing::error;

const LINK: &str = "link";
const MESSAGE: &str = "message";

/// Templates for the `link` and `message` annotations of generated alerts.
///
/// Templates see the instance's `name`, `namespace`, `labels` and
/// `annotations`, e.g. `https://grafana/d/rpaas?var-instance={{ name }}`.
#[derive(Debug)]
pub struct AlertTemplates {
    env: Environment<'static>,
}

// === impl AlertTemplates ===

impl AlertTemplates {
    pub fn new(link: Option<String>, message: Option<String>) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in [(LINK, link), (MESSAGE, message)] {
            if let Some(source) = source {
                env.add_template_owned(name, source)?;
            }
        }
        Ok(Self { env })
    }

    /// Renders the annotations configured for `instance`.
    ///
    /// A template that fails to render is logged and its annotation omitted.
    pub fn render(&self, instance: &RpaasInstance) -> BTreeMap<String, String> {
        let ctx = context! {
            name => instance.name_any(),
            namespace => instance.namespace().unwrap_or_default(),
            labels => instance.labels(),
            annotations => instance.annotations(),
        };

        let mut annotations = BTreeMap::new();
        for (name, tmpl) in self.env.templates() {
            match tmpl.render(&ctx) {
                Ok(value) => {
                    annotations.insert(name.to_string(), value);
                }
                Err(error) => {
                    error!(
                        %error,
                        namespace = ?instance.namespace(),
                        name = %instance.name_any(),
                        "Failed to render alert {name} template",
                    );
                }
            }
        }
        annotations
    }
}

impl Default for AlertTemplates {
    fn default() -> Self {
        Self {
            env: Environment::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use rpaas_slo_controller_k8s_api::{labels, ObjectMeta};

    fn instance() -> RpaasInstance {
        RpaasInstance {
            metadata: ObjectMeta {
                namespace: Some("default".to_string()),
                name: Some("instance1".to_string()),
                labels: Some(btreemap! {
                    labels::TEAM_OWNER.to_string() => "my-team".to_string(),
                }),
                ..Default::default()
            },
            spec: Default::default(),
        }
    }

    #[test]
    fn no_templates() {
        let templates = AlertTemplates::default();
        assert!(templates.render(&instance()).is_empty());
    }

    #[test]
    fn renders_link_and_message() {
        let templates = AlertTemplates::new(
            Some("https://grafana.example.com/d/rpaas?var-ns={{ namespace }}&var-instance={{ name }}".to_string()),
            Some("{{ name }} is owned by {{ labels['rpaas.extensions.tsuru.io/team-owner'] }}".to_string()),
        )
        .expect("templates must parse");

        assert_eq!(
            templates.render(&instance()),
            btreemap! {
                "link".to_string() => "https://grafana.example.com/d/rpaas?var-ns=default&var-instance=instance1".to_string(),
                "message".to_string() => "instance1 is owned by my-team".to_string(),
            }
        );
    }

    #[test]
    fn rejects_invalid_template() {
        assert!(AlertTemplates::new(Some("{{ name ".to_string()), None).is_err());
    }

    #[test]
    fn omits_failed_renders() {
        let templates = AlertTemplates::new(
            Some("{{ name }}".to_string()),
            Some("{{ name | nosuchfilter }}".to_string()),
        )
        .expect("templates must parse");
        assert_eq!(
            templates.render(&instance()),
            btreemap! { "link".to_string() => "instance1".to_string() }
        );
    }
}
