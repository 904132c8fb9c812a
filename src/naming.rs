//! Symbolic Name Registry
//!
//! Keeps resource names unique across one import run. Normalization can
//! collapse distinct remote names onto one identifier, so every batch of
//! candidates is checked before it is committed.

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::ImportError;
use crate::normalize::{join_name_parts, normalize_resource_name};
use crate::resource::{ResourceKind, ResourceRecord};

/// Owner of a claimed name
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameOwner {
    kind: ResourceKind,
    remote_id: String,
}

/// Names claimed so far in the run
#[derive(Debug, Default)]
pub struct NameRegistry {
    claimed: HashMap<String, NameOwner>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    /// Kind and remote ID of the record holding `name`
    pub fn owner(&self, name: &str) -> Option<(ResourceKind, &str)> {
        self.claimed
            .get(name)
            .map(|owner| (owner.kind, owner.remote_id.as_str()))
    }

    /// Assign final names to a batch of records and claim them.
    ///
    /// Each record arrives with its base name in `symbolic_name`. A base name
    /// shared by several records of the batch, or already claimed earlier in
    /// the run, gets the normalized remote ID appended. Remote IDs can
    /// normalize identically (realm `acme-corp` and `acme_corp`), so names
    /// still shared after that get an ordinal, assigned in raw remote ID
    /// order. The outcome does not depend on the order of the batch. Nothing
    /// is claimed when the batch fails.
    pub fn claim_batch(&mut self, records: &mut [ResourceRecord]) -> Result<(), ImportError> {
        let mut base_counts: HashMap<&str, usize> = HashMap::new();
        for record in records.iter() {
            *base_counts.entry(record.symbolic_name.as_str()).or_default() += 1;
        }

        let mut finals: Vec<String> = records
            .iter()
            .map(|record| {
                let base = record.symbolic_name.as_str();
                if base_counts[base] > 1 || self.claimed.contains_key(base) {
                    let suffix = normalize_resource_name(&record.remote_id);
                    join_name_parts([base, suffix.as_str()])
                } else {
                    base.to_string()
                }
            })
            .collect();

        let mut shared: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, name) in finals.iter().enumerate() {
            shared.entry(name.as_str()).or_default().push(index);
        }

        let mut ordinals: Vec<(usize, String)> = Vec::new();
        for (name, mut members) in shared {
            if members.len() < 2 && !self.claimed.contains_key(name) {
                continue;
            }
            members.sort_by(|&a, &b| {
                let (a, b) = (&records[a], &records[b]);
                (a.kind, &a.remote_id).cmp(&(b.kind, &b.remote_id))
            });
            for (ordinal, index) in members.into_iter().enumerate() {
                let ordinal = (ordinal + 1).to_string();
                ordinals.push((index, join_name_parts([name, ordinal.as_str()])));
            }
        }
        for (index, name) in ordinals {
            finals[index] = name;
        }

        let mut batch: BTreeMap<&str, usize> = BTreeMap::new();
        for (index, name) in finals.iter().enumerate() {
            let record = &records[index];
            let holder = match self.owner(name) {
                Some((kind, remote_id)) => Some(format!("{} {}", kind, remote_id)),
                None => batch.insert(name.as_str(), index).map(|other| {
                    format!("{} {}", records[other].kind, records[other].remote_id)
                }),
            };
            if let Some(existing) = holder {
                return Err(ImportError::NameCollision {
                    kind: record.kind,
                    name: name.clone(),
                    remote_id: record.remote_id.clone(),
                    existing,
                });
            }
        }

        for (record, name) in records.iter_mut().zip(finals) {
            if record.symbolic_name != name {
                debug!(
                    kind = %record.kind,
                    remote_id = %record.remote_id,
                    base = %record.symbolic_name,
                    name = %name,
                    "Disambiguated colliding resource name"
                );
            }
            self.claimed.insert(
                name.clone(),
                NameOwner {
                    kind: record.kind,
                    remote_id: record.remote_id.clone(),
                },
            );
            record.symbolic_name = name;
        }

        Ok(())
    }
}
