//! Live registries of the surrounding system.
//!
//! Filters, plugins, routes and metadata types are owned by the
//! application; this module only keeps named entries per category so the
//! diagnostic snapshot can report counts. Each category is independently
//! synchronized; a cross-category read is not a consistent snapshot.

use dashmap::DashMap;
use std::collections::BTreeMap;

/// Registry categories reported in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegistryKind {
    RawHttpHandlers,
    PreRequestFilters,
    RequestBinders,
    GlobalRequestFilters,
    GlobalResponseFilters,
    CatchAllHandlers,
    Plugins,
    ViewEngines,
    RequestTypes,
    ResponseTypes,
    ServiceTypes,
    RestPaths,
    ContentTypes,
}

impl RegistryKind {
    pub const ALL: [RegistryKind; 13] = [
        RegistryKind::RawHttpHandlers,
        RegistryKind::PreRequestFilters,
        RegistryKind::RequestBinders,
        RegistryKind::GlobalRequestFilters,
        RegistryKind::GlobalResponseFilters,
        RegistryKind::CatchAllHandlers,
        RegistryKind::Plugins,
        RegistryKind::ViewEngines,
        RegistryKind::RequestTypes,
        RegistryKind::ResponseTypes,
        RegistryKind::ServiceTypes,
        RegistryKind::RestPaths,
        RegistryKind::ContentTypes,
    ];

    /// Counter name in the diagnostic document.
    pub fn stat_name(&self) -> &'static str {
        match self {
            RegistryKind::RawHttpHandlers => "RawHttpHandlers",
            RegistryKind::PreRequestFilters => "PreRequestFilters",
            RegistryKind::RequestBinders => "RequestBinders",
            RegistryKind::GlobalRequestFilters => "GlobalRequestFilters",
            RegistryKind::GlobalResponseFilters => "GlobalResponseFilters",
            RegistryKind::CatchAllHandlers => "CatchAllHandlers",
            RegistryKind::Plugins => "Plugins",
            RegistryKind::ViewEngines => "ViewEngines",
            RegistryKind::RequestTypes => "RequestTypes",
            RegistryKind::ResponseTypes => "ResponseTypes",
            RegistryKind::ServiceTypes => "ServiceTypes",
            RegistryKind::RestPaths => "RestPaths",
            RegistryKind::ContentTypes => "ContentTypes",
        }
    }
}

#[derive(Debug, Default)]
pub struct Registries {
    entries: DashMap<RegistryKind, Vec<String>>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: RegistryKind, name: impl Into<String>) {
        self.entries.entry(kind).or_default().push(name.into());
    }

    pub fn count(&self, kind: RegistryKind) -> usize {
        self.entries.get(&kind).map(|e| e.len()).unwrap_or(0)
    }

    pub fn names(&self, kind: RegistryKind) -> Vec<String> {
        self.entries.get(&kind).map(|e| e.value().clone()).unwrap_or_default()
    }

    /// Count of every category, keyed by stat name. Empty categories are
    /// reported as zero.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        RegistryKind::ALL
            .iter()
            .map(|kind| (kind.stat_name().to_string(), self.count(*kind)))
            .collect()
    }
}
