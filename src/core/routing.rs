//! Maps a saved provider onto the concrete endpoint and model id to call.

use crate::core::error::RoutingError;
use crate::core::providers::ProviderConfig;
use crate::core::registry::{get_family, ModelFamily, SourceKind, WireFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub wire_format: WireFormat,
    pub endpoint: String,
    /// The id sent on the wire, after any aggregator remapping.
    pub model_id: String,
    pub family_id: String,
    pub source: SourceKind,
}

pub fn resolve(provider: &ProviderConfig) -> Result<Route, RoutingError> {
    route_through(get_family(&provider.family), provider)
}

fn route_through(family: &ModelFamily, provider: &ProviderConfig) -> Result<Route, RoutingError> {
    let source = family
        .source(provider.source)
        .ok_or_else(|| RoutingError::SourceUnavailable {
            family: family.id.clone(),
            kind: provider.source,
        })?;

    Ok(Route {
        wire_format: source.wire_format,
        endpoint: source.endpoint.clone(),
        model_id: source.model_id_for(&provider.model).to_string(),
        family_id: family.id.clone(),
        source: source.kind,
    })
}
