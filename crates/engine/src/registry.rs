//! Node Registry: per-node aggregates derived from the version table.

use std::ops::Deref;

use promptvault_core::{NodeSummary, Page, PageRequest, version::normalize_node_name};
use promptvault_storage::{Storage, SummaryFilter};
use rusqlite::Connection;

use crate::Engine;
use crate::error::EngineError;

impl<C: Deref<Target = Connection>> Engine<C> {
    /// One page of node summaries, latest activity first.
    pub fn list_summaries(
        &self,
        request: PageRequest,
        name_contains: Option<&str>,
    ) -> Result<Page<NodeSummary>, EngineError> {
        let name_contains = name_contains.map(str::trim).filter(|f| !f.is_empty());

        let total = self.storage().count_nodes(name_contains)?;
        let items = self.storage().node_summaries(&SummaryFilter {
            name_contains,
            limit: Some(request.limit()),
            offset: request.offset(),
        })?;
        tracing::debug!(page = request.page(), size = request.size(), total, "summaries listed");
        Ok(Page::new(items, request, total))
    }

    pub fn get_summary(&self, node_name: &str) -> Result<NodeSummary, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        self.storage()
            .node_summary(&node_name)?
            .ok_or_else(|| EngineError::NotFound(format!("node '{node_name}'")))
    }
}
