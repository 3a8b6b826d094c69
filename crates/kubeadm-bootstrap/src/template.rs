//! kubeadm configuration rendering using Handlebars.
//!
//! Templates emit JSON, so HTML escaping is disabled and string values are
//! written through the `json` helper. Extra helpers cover what the document
//! needs beyond plain substitution:
//! - `json` - serialize a value as a JSON literal
//! - `concat` - join values into one string
//! - `split` - split a string on a separator
//! - `seq` - the numbers `1..=n`

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;

use handlebars::{handlebars_helper, no_escape, Handlebars};
use serde_json::Value;
use tracing::debug;

use crate::context::TEMPLATE_VARIABLES;
use crate::error::BootstrapError;

/// Built-in kubeadm `MasterConfiguration` template.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/kubeadm.json.hbs");

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

handlebars_helper!(json: |value: Json| value.to_string());

handlebars_helper!(concat: |*args| {
    args.iter().map(|v| value_to_plain_string(v)).collect::<String>()
});

handlebars_helper!(split: |s: str, sep: str| {
    s.split(sep).map(str::trim).collect::<Vec<&str>>()
});

handlebars_helper!(seq: |n: Json| {
    let count = n
        .as_u64()
        .or_else(|| n.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
        .unwrap_or(0);
    (1..=count).collect::<Vec<u64>>()
});

/// Template engine for kubeadm configuration documents.
pub struct TemplateRenderer<'a> {
    handlebars: Handlebars<'a>,
}

impl Default for TemplateRenderer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer<'_> {
    /// Create a renderer in strict mode with the JSON helpers registered.
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(no_escape);

        handlebars.register_helper("json", Box::new(json));
        handlebars.register_helper("concat", Box::new(concat));
        handlebars.register_helper("split", Box::new(split));
        handlebars.register_helper("seq", Box::new(seq));

        Self { handlebars }
    }

    /// Render `template` with the given variables.
    ///
    /// Every name in [`TEMPLATE_VARIABLES`] must be present, whether or not the
    /// template uses it.
    pub fn render(
        &self,
        template: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<String, BootstrapError> {
        if let Some(missing) = TEMPLATE_VARIABLES
            .iter()
            .find(|name| !variables.contains_key(**name))
        {
            return Err(BootstrapError::Template(format!(
                "missing required variable: {missing}"
            )));
        }

        Ok(self.handlebars.render_template(template, variables)?)
    }
}

/// Load the template text: a file when `path` is given, otherwise the built-in one.
pub fn load_template(path: Option<&Path>) -> Result<Cow<'static, str>, BootstrapError> {
    match path {
        Some(path) => {
            debug!("Loading template from {}", path.display());
            std::fs::read_to_string(path).map(Cow::Owned).map_err(|e| {
                BootstrapError::Template(format!(
                    "Failed to read template {}: {e}",
                    path.display()
                ))
            })
        }
        None => Ok(Cow::Borrowed(DEFAULT_TEMPLATE)),
    }
}

/// Render a template with a fresh renderer.
pub fn render(
    template: &str,
    variables: &BTreeMap<String, String>,
) -> Result<String, BootstrapError> {
    TemplateRenderer::new().render(template, variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_variables() -> BTreeMap<String, String> {
        [
            ("datacenter", "dc1"),
            ("clustername", "k1"),
            ("domainname", "example.com"),
            ("nodename", "node1.example.com"),
            ("cloudprovider", "aws"),
            ("ipaddress", "10.0.0.10"),
            ("addresslist", "10.0.0.1,10.0.0.2,10.0.0.3,10.96.0.1"),
            ("token", "abcdef.0123456789abcdef"),
            ("number_masters", "3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn render_default(vars: &BTreeMap<String, String>) -> Value {
        let out = render(DEFAULT_TEMPLATE, vars).unwrap();
        serde_json::from_str(&out).expect("rendered document should be valid JSON")
    }

    #[test]
    fn test_default_template_renders_master_configuration() {
        let doc = render_default(&sample_variables());

        assert_eq!(doc["apiVersion"], "kubeadm.k8s.io/v1alpha1");
        assert_eq!(doc["kind"], "MasterConfiguration");
        assert_eq!(doc["nodeName"], "node1.example.com");
        assert_eq!(doc["token"], "abcdef.0123456789abcdef");
        assert_eq!(doc["tokenTTL"], "0");
        assert_eq!(doc["cloudProvider"], "aws");
        assert_eq!(doc["apiServerExtraArgs"]["etcd-prefix"], "dc1-k1");
        assert_eq!(doc["apiServerExtraArgs"]["advertise-address"], "10.0.0.10");
        assert_eq!(doc["controllerManagerExtraArgs"]["cloud-provider"], "aws");
    }

    #[test]
    fn test_cert_sans_keep_address_order() {
        let doc = render_default(&sample_variables());
        let sans: Vec<&str> = doc["apiServerCertSANs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();

        assert_eq!(
            sans,
            vec![
                "dc1-k1master-1.example.com",
                "dc1-k1master-2.example.com",
                "dc1-k1master-3.example.com",
                "10.0.0.1",
                "10.0.0.2",
                "10.0.0.3",
                "10.96.0.1",
                "dc1-k1master.example.com",
                "k1.service.discover",
                "dc1-k1.service.discover",
                "dc1-k1.dc1.service.discover",
            ]
        );
    }

    #[test]
    fn test_etcd_endpoints() {
        let doc = render_default(&sample_variables());
        let endpoints = doc["etcd"]["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0], "https://dc1-k1etcd-1.example.com:2379");
        assert_eq!(endpoints[2], "https://dc1-k1etcd-3.example.com:2379");
        assert_eq!(doc["etcd"]["caFile"], "/etc/kubernetes/puppet/ca.pem");
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let vars = sample_variables();
        let first = render(DEFAULT_TEMPLATE, &vars).unwrap();
        let second = render(DEFAULT_TEMPLATE, &vars).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_values_are_json_escaped() {
        let mut vars = sample_variables();
        vars.insert("nodename".to_string(), "we\"ird<node>".to_string());
        let doc = render_default(&vars);
        assert_eq!(doc["nodeName"], "we\"ird<node>");
    }

    #[test]
    fn test_empty_cloud_provider() {
        let mut vars = sample_variables();
        vars.insert("cloudprovider".to_string(), String::new());
        let doc = render_default(&vars);
        assert_eq!(doc["cloudProvider"], "");
    }

    #[test]
    fn test_missing_variable_is_template_error() {
        let mut vars = sample_variables();
        vars.remove("token");
        let err = render(DEFAULT_TEMPLATE, &vars).unwrap_err();
        assert!(matches!(err, BootstrapError::Template(_)));
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_unknown_variable_in_template_is_template_error() {
        let err = render("{{json nope}}", &sample_variables()).unwrap_err();
        assert!(matches!(err, BootstrapError::Template(_)));
    }

    #[test]
    fn test_malformed_template_is_template_error() {
        let err = render("{{#each (seq 3)}}", &sample_variables()).unwrap_err();
        assert!(matches!(err, BootstrapError::Template(_)));
    }

    #[test]
    fn test_seq_and_split_helpers() {
        let out = render(
            "{{#each (seq number_masters)}}{{this}};{{/each}}|{{#each (split addresslist \",\")}}[{{this}}]{{/each}}",
            &sample_variables(),
        )
        .unwrap();
        assert_eq!(out, "1;2;3;|[10.0.0.1][10.0.0.2][10.0.0.3][10.96.0.1]");
    }

    #[test]
    fn test_load_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.hbs");
        std::fs::write(&path, "{{datacenter}}-{{clustername}}").unwrap();

        let text = load_template(Some(&path)).unwrap();
        assert_eq!(render(&text, &sample_variables()).unwrap(), "dc1-k1");
    }

    #[test]
    fn test_load_missing_template_file() {
        let err = load_template(Some(Path::new("/nonexistent/kubeadm.hbs"))).unwrap_err();
        assert!(matches!(err, BootstrapError::Template(_)));
    }

    #[test]
    fn test_builtin_template_is_default() {
        assert_eq!(load_template(None).unwrap(), DEFAULT_TEMPLATE);
    }
}
