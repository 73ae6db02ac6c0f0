//! Diagnostic snapshot assembly.
//!
//! # Responsibilities
//! - Compose host identity, the current request's fields, registry counts,
//!   startup errors and the last-request record into one document
//! - Never mutate a registry; every count is a point read
//!
//! # Design Decisions
//! - Built fresh per call, never cached
//! - Pipeline-only facts (virtual path roots, left part) stay absent under
//!   the standalone listener; that host has no such information
//! - Registry counts are read one by one, so they may reflect slightly
//!   different instants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diagnostics::LastRequestRecord;
use crate::host::registries::RegistryKind;
use crate::host::{AppHost, ResponseStatus};
use crate::http::{NormalizedRequest, NormalizedResponse, PipelineOrigin};

/// Content type of the diagnostic document.
pub const CONTENT_TYPE: &str = "application/json";

/// Point-in-time report of live server state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiagnosticSnapshot {
    pub host: String,
    pub date: DateTime<Utc>,
    pub service_name: String,
    pub handler_factory_path: String,
    pub debug_mode: bool,
    #[serde(default)]
    pub user_host_address: Option<String>,
    pub http_method: String,
    pub path_info: String,
    pub resolved_path_info: String,
    pub absolute_uri: String,
    pub resolve_absolute_url: String,
    pub raw_url: String,
    pub url: String,
    pub get_path_url: String,
    pub application_base_url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub status: u16,
    pub content_length: u64,
    pub headers: BTreeMap<String, String>,
    pub query_string: BTreeMap<String, String>,
    pub form_data: BTreeMap<String, String>,
    pub accept_types: Vec<String>,
    pub operation_name: String,
    pub response_content_type: String,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_left_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_virtual_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_absolute_path_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_app_relative_path_root: Option<String>,

    #[serde(default)]
    pub handler_factory_args: Option<String>,
    #[serde(default)]
    pub debug_string: String,
    pub operation_names: Vec<String>,
    pub all_operation_names: Vec<String>,
    pub request_response_map: BTreeMap<String, String>,
    pub plugins_loaded: Vec<String>,
    pub start_up_errors: Vec<ResponseStatus>,
    #[serde(default)]
    pub last_request_info: Option<LastRequestRecord>,
    pub stats: BTreeMap<String, String>,
    pub enable_features: Vec<String>,
}

impl DiagnosticSnapshot {
    /// Serialize and write to the response with the diagnostic content type.
    pub fn write_to(&self, response: &NormalizedResponse) -> Result<(), serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        response.set_content_type(CONTENT_TYPE);
        response.write(json);
        Ok(())
    }
}

/// Reads live host state into a [`DiagnosticSnapshot`].
pub struct SnapshotAssembler<'a> {
    host: &'a AppHost,
}

impl<'a> SnapshotAssembler<'a> {
    pub fn new(host: &'a AppHost) -> Self {
        Self { host }
    }

    pub fn assemble(&self, request: &NormalizedRequest, response: &NormalizedResponse) -> DiagnosticSnapshot {
        let mut snapshot = self.request_info(request, response);
        self.apply_host_facts(&mut snapshot, request);
        snapshot
    }

    /// Refresh the parts that always come from the live call: factory args,
    /// the debug string and, under the pipeline, the virtual path facts.
    pub fn apply_host_facts(&self, snapshot: &mut DiagnosticSnapshot, request: &NormalizedRequest) {
        snapshot.handler_factory_args = self.host.handler_factory_args();
        if let Some(origin) = request.origin.pipeline() {
            apply_pipeline_origin(snapshot, origin);
        }
    }

    fn request_info(&self, request: &NormalizedRequest, response: &NormalizedResponse) -> DiagnosticSnapshot {
        let config = self.host.config();
        let environment = self.host.host_environment(request.host_kind());
        let registries = self.host.registries();
        let raw_path = request.raw_url.split('?').next().unwrap_or_default().to_string();
        let get_path_url = request
            .absolute_uri
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();

        let mut stats: BTreeMap<String, String> = registries
            .counts()
            .into_iter()
            .map(|(kind, count)| (kind, count.to_string()))
            .collect();
        stats.insert("EnableFeatures".into(), config.enable_features.join(", "));

        DiagnosticSnapshot {
            host: format!("{}_v{}_{}", environment, env!("CARGO_PKG_VERSION"), config.service_name),
            date: Utc::now(),
            service_name: config.service_name.clone(),
            handler_factory_path: config.handler_factory_path.clone(),
            debug_mode: config.debug_mode,
            user_host_address: request.user_host_address.clone(),
            http_method: request.verb.to_string(),
            path_info: raw_path,
            resolved_path_info: request.path_info.clone(),
            absolute_uri: request.absolute_uri.clone(),
            resolve_absolute_url: self.host.resolve_absolute_url("~/resolve", request),
            raw_url: request.raw_url.clone(),
            url: request.absolute_uri.clone(),
            get_path_url,
            application_base_url: self.host.resolve_absolute_url("~/", request),
            content_type: request.content_type.clone(),
            status: response.status().as_u16(),
            content_length: request.content_length,
            headers: request.headers.to_map(),
            query_string: request.query.to_map(),
            form_data: request.form.to_map(),
            accept_types: request.accept_types.clone(),
            operation_name: request.operation_name.clone(),
            response_content_type: request.response_content_type().to_string(),
            error_code: None,
            error_message: None,
            get_left_path: None,
            path: None,
            application_path: None,
            application_virtual_path: None,
            virtual_absolute_path_root: None,
            virtual_app_relative_path_root: None,
            handler_factory_args: None,
            debug_string: String::new(),
            operation_names: self.host.operation_names(),
            all_operation_names: self.host.all_operation_names(),
            request_response_map: self.host.request_response_map(),
            plugins_loaded: registries.names(RegistryKind::Plugins),
            start_up_errors: self.host.startup_errors(),
            last_request_info: self.host.last_request().get(),
            stats,
            enable_features: config.enable_features.clone(),
        }
    }
}

fn apply_pipeline_origin(snapshot: &mut DiagnosticSnapshot, origin: &PipelineOrigin) {
    snapshot.get_left_path = Some(origin.left_part.clone());
    snapshot.path = Some(origin.path.clone());
    snapshot.application_path = Some(origin.application_path.clone());
    snapshot.application_virtual_path = Some(origin.application_virtual_path.clone());
    snapshot.virtual_absolute_path_root = Some(to_absolute_root(&origin.application_virtual_path));
    snapshot.virtual_app_relative_path_root = Some(to_app_relative("/", &origin.application_virtual_path));
    snapshot.debug_string = format!(
        "{}|{}",
        std::any::type_name::<NormalizedRequest>(),
        std::any::type_name::<NormalizedResponse>()
    );
}

/// Absolute form of the application root, always ending in `/`.
fn to_absolute_root(virtual_path: &str) -> String {
    let trimmed = virtual_path.trim_end_matches('/');
    format!("{trimmed}/")
}

/// App-relative (`~/...`) form of `path` if it lies under the application.
fn to_app_relative(path: &str, virtual_path: &str) -> String {
    let root = to_absolute_root(virtual_path);
    let candidate = to_absolute_root(path);
    match candidate.strip_prefix(&root) {
        Some(rest) => format!("~/{rest}"),
        None => path.to_string(),
    }
}
