//! Cross-Reference Rewriting
//!
//! Single pass over the complete record set that replaces raw foreign keys
//! with symbolic references to sibling records and escapes interpolation
//! markers in free text. Lookup tables live only for the duration of one
//! [`ReferenceRewriter::rewrite`] call.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::discovery::ServiceAccountIndex;
use crate::error::ImportError;
use crate::resource::{
    AttributeRole, AttributeValue, ReferenceField, ReferenceTarget, ResourceKind, ResourceRecord,
    SymbolicReference,
};

/// Interpolation marker of the target syntax; every occurrence is doubled
const INTERPOLATION_MARKER: char = '$';

/// Template directive opener, doubled as a sequence
const DIRECTIVE_SEQUENCE: (&str, &str) = ("%{", "%%{");

/// Escape interpolation markers so text is emitted literally
pub fn escape_interpolation(text: &str) -> String {
    let (directive, escaped_directive) = DIRECTIVE_SEQUENCE;
    text.replace(INTERPOLATION_MARKER, "$$")
        .replace(directive, escaped_directive)
}

/// A foreign key left as its raw value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub kind: ResourceKind,
    pub remote_id: String,
    pub symbolic_name: String,
    pub attribute: &'static str,
    pub value: String,
    pub target: ReferenceTarget,
}

/// Outcome of a rewrite pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    /// Foreign keys replaced by references
    pub rewritten: usize,
    /// Free-text values escaped
    pub escaped: usize,
    pub unresolved: Vec<UnresolvedReference>,
}

impl RewriteReport {
    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Raw remote ID -> reference, one table per reference target
struct LookupTables {
    tables: HashMap<ReferenceTarget, HashMap<String, SymbolicReference>>,
}

impl LookupTables {
    fn build(
        records: &[ResourceRecord],
        service_accounts: &ServiceAccountIndex,
    ) -> Result<Self, ImportError> {
        let mut by_id: HashMap<ResourceKind, HashMap<&str, &ResourceRecord>> = HashMap::new();
        for record in records {
            let ids = by_id.entry(record.kind).or_default();
            if ids.insert(record.remote_id.as_str(), record).is_some() {
                return Err(ImportError::DuplicateRemoteId {
                    kind: record.kind,
                    remote_id: record.remote_id.clone(),
                });
            }
        }

        let targets: HashSet<ReferenceTarget> = ResourceKind::ALL
            .iter()
            .flat_map(|kind| kind.schema())
            .filter_map(|spec| match spec.role {
                AttributeRole::ForeignKey(target) => Some(target),
                _ => None,
            })
            .collect();

        let mut tables = HashMap::new();
        for target in targets {
            let Some(ids) = by_id.get(&target.kind) else {
                tables.insert(target, HashMap::new());
                continue;
            };

            let table: HashMap<String, SymbolicReference> = match target.field {
                ReferenceField::Id => ids
                    .iter()
                    .map(|(id, record)| (id.to_string(), record.reference(target.field)))
                    .collect(),
                ReferenceField::ServiceAccountUserId => service_accounts
                    .iter()
                    .filter_map(|(user_id, owner)| {
                        ids.get(owner.client_remote_id.as_str())
                            .map(|record| (user_id.clone(), record.reference(target.field)))
                    })
                    .collect(),
            };
            tables.insert(target, table);
        }

        Ok(Self { tables })
    }

    fn lookup(&self, target: ReferenceTarget, raw: &str) -> Option<&SymbolicReference> {
        self.tables.get(&target).and_then(|table| table.get(raw))
    }
}

/// Rewrites raw foreign keys into symbolic references
pub struct ReferenceRewriter<'a> {
    service_accounts: &'a ServiceAccountIndex,
}

impl<'a> ReferenceRewriter<'a> {
    pub fn new(service_accounts: &'a ServiceAccountIndex) -> Self {
        Self { service_accounts }
    }

    /// Rewrite every record in place.
    ///
    /// Must see the complete record set: any kind can be a reference target.
    /// Foreign keys with no matching record keep their raw value and are
    /// listed in the report. Applying the pass again changes nothing.
    pub fn rewrite(&self, records: &mut [ResourceRecord]) -> Result<RewriteReport, ImportError> {
        let tables = LookupTables::build(records, self.service_accounts)?;
        let mut report = RewriteReport::default();

        for record in records.iter_mut() {
            for spec in record.kind.schema() {
                let Some(value) = record.attributes.get_mut(spec.name) else {
                    continue;
                };

                let replacement = match (spec.role, &*value) {
                    (AttributeRole::ForeignKey(target), AttributeValue::Text(raw)) => {
                        match tables.lookup(target, raw) {
                            Some(reference) => {
                                report.rewritten += 1;
                                Some(AttributeValue::Reference(reference.clone()))
                            }
                            None => {
                                warn!(
                                    kind = %record.kind,
                                    resource = %record.symbolic_name,
                                    attribute = spec.name,
                                    value = %raw,
                                    "Unresolved reference left as raw value"
                                );
                                report.unresolved.push(UnresolvedReference {
                                    kind: record.kind,
                                    remote_id: record.remote_id.clone(),
                                    symbolic_name: record.symbolic_name.clone(),
                                    attribute: spec.name,
                                    value: raw.clone(),
                                    target,
                                });
                                None
                            }
                        }
                    }
                    (AttributeRole::FreeText, AttributeValue::Text(text)) => {
                        let escaped = escape_interpolation(text);
                        if escaped != *text {
                            report.escaped += 1;
                        }
                        Some(AttributeValue::Escaped(escaped))
                    }
                    _ => None,
                };

                if let Some(replacement) = replacement {
                    *value = replacement;
                }
            }
        }

        info!(
            records = records.len(),
            rewritten = report.rewritten,
            escaped = report.escaped,
            unresolved = report.unresolved.len(),
            "Rewrote cross-resource references"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ServiceAccountOwner;

    fn realm(name: &str) -> ResourceRecord {
        ResourceRecord::new(ResourceKind::Realm, name, format!("realm_{}", name))
            .attribute("realm", name)
    }

    fn client(realm: &str, id: &str, client_id: &str) -> ResourceRecord {
        ResourceRecord::new(
            ResourceKind::OpenidClient,
            id,
            format!("openid_client_{}_{}", realm, client_id),
        )
        .attribute("realm_id", realm)
        .attribute("client_id", client_id)
    }

    fn role(realm: &str, user_id: &str, client: &str, name: &str) -> ResourceRecord {
        ResourceRecord::new(
            ResourceKind::OpenidClientServiceAccountRole,
            format!("{}/{}/{}/{}", realm, user_id, client, name),
            format!("openid_client_service_account_role_{}", name),
        )
        .attribute("realm_id", realm)
        .attribute("service_account_user_id", user_id)
        .attribute("client_id", client)
        .attribute("role", name)
    }

    fn reference(kind: ResourceKind, name: &str, field: ReferenceField) -> AttributeValue {
        AttributeValue::Reference(SymbolicReference {
            kind,
            name: name.to_string(),
            field,
        })
    }

    fn index(user_id: &str, client_remote_id: &str, client_id: &str) -> ServiceAccountIndex {
        let mut index = ServiceAccountIndex::new();
        index.insert(
            user_id,
            ServiceAccountOwner {
                client_remote_id: client_remote_id.to_string(),
                client_id: client_id.to_string(),
            },
        );
        index
    }

    #[test]
    fn test_escape_interpolation() {
        assert_eq!(escape_interpolation("Costs ${amount}"), "Costs $${amount}");
        assert_eq!(escape_interpolation("%{ if x }"), "%%{ if x }");
        assert_eq!(escape_interpolation("Pay $5 now"), "Pay $$5 now");
        assert_eq!(escape_interpolation("$$"), "$$$$");
        assert_eq!(escape_interpolation("100% {x}"), "100% {x}");
    }

    #[test]
    fn test_parent_id_becomes_reference() {
        let mut records = vec![realm("acme"), client("acme", "uuid-1", "app")];

        let report = ReferenceRewriter::new(&ServiceAccountIndex::new())
            .rewrite(&mut records)
            .unwrap();

        assert_eq!(
            records[1].get("realm_id"),
            Some(&reference(ResourceKind::Realm, "realm_acme", ReferenceField::Id))
        );
        assert_eq!(report.rewritten, 1);
        assert!(report.is_fully_resolved());
    }

    #[test]
    fn test_missing_parent_keeps_raw_value_and_reports() {
        let mut records = vec![client("gone", "uuid-1", "app")];

        let report = ReferenceRewriter::new(&ServiceAccountIndex::new())
            .rewrite(&mut records)
            .unwrap();

        assert_eq!(records[0].text("realm_id"), Some("gone"));
        assert_eq!(report.unresolved.len(), 1);
        let miss = &report.unresolved[0];
        assert_eq!(miss.attribute, "realm_id");
        assert_eq!(miss.value, "gone");
        assert_eq!(miss.remote_id, "uuid-1");
        assert_eq!(
            miss.target,
            ReferenceTarget {
                kind: ResourceKind::Realm,
                field: ReferenceField::Id
            }
        );
    }

    #[test]
    fn test_service_account_references_go_through_side_map() {
        let mut records = vec![
            realm("acme"),
            client("acme", "uuid-sa", "worker"),
            client("acme", "uuid-rm", "realm-management"),
            role("acme", "user-sa", "uuid-rm", "view-users"),
        ];
        let index = index("user-sa", "uuid-sa", "worker");

        let report = ReferenceRewriter::new(&index).rewrite(&mut records).unwrap();

        let role = &records[3];
        assert_eq!(
            role.get("service_account_user_id"),
            Some(&reference(
                ResourceKind::OpenidClient,
                "openid_client_acme_worker",
                ReferenceField::ServiceAccountUserId
            ))
        );
        assert_eq!(
            role.get("client_id"),
            Some(&reference(
                ResourceKind::OpenidClient,
                "openid_client_acme_realm-management",
                ReferenceField::Id
            ))
        );
        assert_eq!(role.text("role"), Some("view-users"));
        assert!(report.is_fully_resolved());
    }

    #[test]
    fn test_resolution_is_scoped_by_attribute_target() {
        // A client whose remote ID equals a realm name must not satisfy realm_id
        let mut records = vec![
            client("acme", "shadow", "app"),
            client("shadow", "uuid-2", "other"),
        ];

        let report = ReferenceRewriter::new(&ServiceAccountIndex::new())
            .rewrite(&mut records)
            .unwrap();

        assert_eq!(records[1].text("realm_id"), Some("shadow"));
        assert_eq!(report.unresolved.len(), 2);
    }

    #[test]
    fn test_free_text_is_escaped_once() {
        let mut records = vec![realm("acme").attribute("display_name", "Pay ${now}")];
        let index = ServiceAccountIndex::new();
        let rewriter = ReferenceRewriter::new(&index);

        let first = rewriter.rewrite(&mut records).unwrap();
        let after_first = records.clone();
        let second = rewriter.rewrite(&mut records).unwrap();

        assert_eq!(
            records[0].get("display_name"),
            Some(&AttributeValue::Escaped("Pay $${now}".to_string()))
        );
        assert_eq!(first.escaped, 1);
        assert_eq!(second.escaped, 0);
        assert_eq!(records, after_first);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut records = vec![
            realm("acme"),
            client("acme", "uuid-sa", "worker").attribute("name", "Worker"),
            role("acme", "user-sa", "uuid-sa", "manage"),
            client("missing", "uuid-x", "orphan"),
        ];
        let index = index("user-sa", "uuid-sa", "worker");
        let rewriter = ReferenceRewriter::new(&index);

        rewriter.rewrite(&mut records).unwrap();
        let once = records.clone();
        let report = rewriter.rewrite(&mut records).unwrap();

        assert_eq!(records, once);
        assert_eq!(report.rewritten, 0);
        // The raw orphan value is still reported on every pass
        assert_eq!(report.unresolved.len(), 1);
    }

    #[test]
    fn test_duplicate_remote_id_is_fatal() {
        let mut records = vec![client("acme", "uuid-1", "a"), client("acme", "uuid-1", "b")];

        let err = ReferenceRewriter::new(&ServiceAccountIndex::new())
            .rewrite(&mut records)
            .unwrap_err();
        assert!(matches!(err, ImportError::DuplicateRemoteId { .. }));
    }

    #[test]
    fn test_same_remote_id_in_different_kinds_is_allowed() {
        let mut records = vec![realm("acme"), client("acme", "acme", "app")];

        let report = ReferenceRewriter::new(&ServiceAccountIndex::new())
            .rewrite(&mut records)
            .unwrap();
        assert!(report.is_fully_resolved());
    }
}
