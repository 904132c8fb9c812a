//! Terraform JSON Renderer
//!
//! Serializes rewritten records as Terraform JSON configuration
//! (`*.tf.json`). Symbolic references become `${type.name.field}`; every
//! other string is emitted literally, so raw text and list values get their
//! interpolation markers escaped here.

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::path::Path;

use crate::resource::{AttributeValue, ResourceRecord, SymbolicReference};
use crate::rewrite::escape_interpolation;

/// Interpolation expression for a symbolic reference
pub fn interpolation(reference: &SymbolicReference) -> String {
    format!(
        "${{{}.{}.{}}}",
        reference.kind.type_name(),
        reference.name,
        reference.field.as_str()
    )
}

fn render_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Text(s) => Value::String(escape_interpolation(s)),
        AttributeValue::Escaped(s) => Value::String(s.clone()),
        AttributeValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| Value::String(escape_interpolation(item)))
                .collect(),
        ),
        AttributeValue::Reference(reference) => Value::String(interpolation(reference)),
    }
}

fn render_record(record: &ResourceRecord) -> Value {
    let mut body = Map::new();

    for (name, value) in &record.attributes {
        if value.is_empty() && !record.allow_empty.contains(name) {
            continue;
        }
        body.insert((*name).to_string(), render_value(value));
    }

    for (name, value) in &record.extra_fields {
        body.insert(name.clone(), value.clone());
    }

    Value::Object(body)
}

/// Render records as `{"resource": {type: {name: {...}}}}`
pub fn render_terraform_json(records: &[ResourceRecord]) -> Value {
    let mut resources: Map<String, Value> = Map::new();

    for record in records {
        let by_name = resources
            .entry(record.kind.type_name())
            .or_insert_with(|| Value::Object(Map::new()));

        if let Value::Object(by_name) = by_name {
            by_name.insert(record.symbolic_name.clone(), render_record(record));
        }
    }

    json!({ "resource": resources })
}

/// Write pretty-printed JSON to `path`, or stdout when `None`
pub fn write_output(path: Option<&Path>, document: &Value) -> Result<()> {
    let mut rendered =
        serde_json::to_string_pretty(document).context("Failed to serialize configuration")?;
    rendered.push('\n');

    match path {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ReferenceField, ResourceKind};

    fn realm() -> ResourceRecord {
        ResourceRecord::new(ResourceKind::Realm, "master", "realm_master")
            .attribute("realm", "master")
            .attribute("display_name", "")
            .attribute("enabled", true)
    }

    #[test]
    fn test_interpolation_syntax() {
        let reference = realm().reference(ReferenceField::Id);
        assert_eq!(interpolation(&reference), "${keycloak_realm.realm_master.id}");
    }

    #[test]
    fn test_render_groups_by_type_and_name() {
        let realm = realm();
        let client = ResourceRecord::new(
            ResourceKind::OpenidClient,
            "c-1",
            "openid_client_master_app",
        )
            .attribute(
                "realm_id",
                AttributeValue::Reference(realm.reference(ReferenceField::Id)),
            )
            .attribute("client_id", "app")
            .attribute("name", AttributeValue::Escaped("Cost $${x}".to_string()))
            .attribute("valid_redirect_uris", Vec::<String>::new())
            .attribute("web_origins", Vec::<String>::new())
            .extra_field("import", json!(true));

        let doc = render_terraform_json(&[realm, client]);

        let realm_body = &doc["resource"]["keycloak_realm"]["realm_master"];
        assert_eq!(realm_body["realm"], "master");
        assert_eq!(realm_body["enabled"], "true");
        // Empty text is omitted
        assert!(realm_body.get("display_name").is_none());

        let client_body = &doc["resource"]["keycloak_openid_client"]["openid_client_master_app"];
        assert_eq!(client_body["realm_id"], "${keycloak_realm.realm_master.id}");
        assert_eq!(client_body["name"], "Cost $${x}");
        assert_eq!(client_body["import"], true);
        // Empty list only kept where allowed
        assert!(client_body.get("valid_redirect_uris").is_none());
        assert_eq!(client_body["web_origins"], json!([]));
    }

    #[test]
    fn test_raw_strings_are_emitted_literally() {
        let client = ResourceRecord::new(ResourceKind::OpenidClient, "c-2", "openid_client_x")
            .attribute("client_id", "app-${env}")
            .attribute(
                "valid_redirect_uris",
                vec!["https://app.example.com/${path}".to_string()],
            )
            .attribute("name", AttributeValue::Escaped("Pay $$5".to_string()));

        let doc = render_terraform_json(&[client]);

        let body = &doc["resource"]["keycloak_openid_client"]["openid_client_x"];
        assert_eq!(body["client_id"], "app-$${env}");
        assert_eq!(
            body["valid_redirect_uris"],
            json!(["https://app.example.com/$${path}"])
        );
        // Already escaped by the rewrite pass
        assert_eq!(body["name"], "Pay $$5");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_terraform_json(&[]), json!({ "resource": {} }));
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keycloak.tf.json");

        let doc = render_terraform_json(&[realm()]);
        write_output(Some(&path), &doc).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, doc);
    }

    #[test]
    fn test_write_output_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.tf.json");

        let err = write_output(Some(&path), &json!({})).unwrap_err();
        assert!(err.to_string().contains("Failed to write"));
    }
}
