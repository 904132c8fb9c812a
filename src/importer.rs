//! Import Pipeline
//!
//! Runs the discoverers in a fixed order, commits their output into one
//! [`RecordSet`] and then applies the rewrite pass once over everything.
//!
//! 1. Realms
//! 2. Per realm, every realm-scoped discoverer in registration order
//! 3. Reference rewriting over the complete set
//!
//! The first error aborts the run; no partial output is returned.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::discovery::{
    Discovery, OpenidClientDiscoverer, RealmDiscoverer, RealmScope, RealmScopedDiscoverer,
    RequiredActionDiscoverer, ServiceAccountIndex,
};
use crate::error::ImportError;
use crate::naming::NameRegistry;
use crate::remote::RemoteClient;
use crate::resource::{ResourceKind, ResourceRecord};
use crate::rewrite::{ReferenceRewriter, RewriteReport};

/// Accumulates committed discoveries in discovery order
#[derive(Debug, Default)]
pub struct RecordSet {
    records: Vec<ResourceRecord>,
    names: NameRegistry,
    service_accounts: ServiceAccountIndex,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign unique names to a discovery batch and append it
    pub fn commit(&mut self, discovery: Discovery) -> Result<(), ImportError> {
        let mut records = discovery.records;
        self.names.claim_batch(&mut records)?;
        self.records.extend(records);
        self.service_accounts.extend(discovery.service_accounts);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Run the rewrite pass and hand out the finished records
    pub fn finish(mut self) -> Result<(Vec<ResourceRecord>, RewriteReport), ImportError> {
        let report = ReferenceRewriter::new(&self.service_accounts).rewrite(&mut self.records)?;
        Ok((self.records, report))
    }
}

/// Counts of one finished import
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub resources: BTreeMap<ResourceKind, usize>,
    pub references_rewritten: usize,
    pub unresolved_references: usize,
    pub generated_at: DateTime<Utc>,
}

impl ImportSummary {
    fn new(records: &[ResourceRecord], report: &RewriteReport) -> Self {
        let mut resources = BTreeMap::new();
        for record in records {
            *resources.entry(record.kind).or_insert(0) += 1;
        }

        Self {
            resources,
            references_rewritten: report.rewritten,
            unresolved_references: report.unresolved.len(),
            generated_at: Utc::now(),
        }
    }

    pub fn total(&self) -> usize {
        self.resources.values().sum()
    }
}

/// Rewritten records, ready for a serializer
#[derive(Debug, Clone)]
pub struct ImportOutput {
    pub records: Vec<ResourceRecord>,
    pub report: RewriteReport,
    pub summary: ImportSummary,
}

/// Keycloak import pipeline
pub struct Importer {
    realms: RealmDiscoverer,
    discoverers: Vec<Box<dyn RealmScopedDiscoverer>>,
    realm_filter: Option<BTreeSet<String>>,
    strict_references: bool,
}

impl Default for Importer {
    fn default() -> Self {
        Self::new()
    }
}

impl Importer {
    /// Importer with every supported discoverer
    pub fn new() -> Self {
        Self::empty()
            .with_discoverer(RequiredActionDiscoverer)
            .with_discoverer(OpenidClientDiscoverer)
    }

    /// Importer that only discovers realms
    pub fn empty() -> Self {
        Self {
            realms: RealmDiscoverer,
            discoverers: Vec::new(),
            realm_filter: None,
            strict_references: false,
        }
    }

    /// Register a realm-scoped discoverer; runs after those added before it
    pub fn with_discoverer(mut self, discoverer: impl RealmScopedDiscoverer + 'static) -> Self {
        self.discoverers.push(Box::new(discoverer));
        self
    }

    /// Only import the named realms
    pub fn with_realms<I, S>(mut self, realms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter: BTreeSet<String> = realms.into_iter().map(Into::into).collect();
        self.realm_filter = (!filter.is_empty()).then_some(filter);
        self
    }

    /// Fail the run when a reference cannot be resolved
    pub fn strict_references(mut self, strict: bool) -> Self {
        self.strict_references = strict;
        self
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        std::iter::once(ResourceKind::Realm)
            .chain(self.discoverers.iter().map(|d| d.kind()))
            .collect()
    }

    /// Discover everything, then rewrite references
    pub async fn run(&self, client: &dyn RemoteClient) -> Result<ImportOutput, ImportError> {
        let mut set = RecordSet::new();

        let mut realms = self.realms.discover(client).await?;
        if let Some(filter) = &self.realm_filter {
            realms.records.retain(|record| filter.contains(&record.remote_id));
            for missing in filter.iter().filter(|name| {
                !realms.records.iter().any(|record| &record.remote_id == *name)
            }) {
                warn!(realm = %missing, "Requested realm not found");
            }
        }

        let scopes: Vec<RealmScope> = realms.records.iter().map(RealmScope::from_record).collect();
        set.commit(realms)?;

        for scope in &scopes {
            for discoverer in &self.discoverers {
                let discovery = discoverer.discover(client, scope).await?;
                set.commit(discovery)?;
            }
        }

        info!(
            realms = scopes.len(),
            records = set.len(),
            "Discovery complete, rewriting references"
        );

        let (records, report) = set.finish()?;

        if self.strict_references && !report.is_fully_resolved() {
            return Err(ImportError::UnresolvedReferences {
                count: report.unresolved.len(),
            });
        }

        let summary = ImportSummary::new(&records, &report);
        Ok(ImportOutput {
            records,
            report,
            summary,
        })
    }
}
