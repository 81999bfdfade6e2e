use std::collections::HashSet;

use promptvault_core::{PageRequest, paging::MAX_PAGE_SIZE};
use promptvault_engine::PromptVault;

/// Walk every node and panic on any broken store invariant.
///
/// Every node must have exactly one production version, distinct ordinals,
/// a summary count matching its versions, and content that passes its own
/// consistency check.
pub fn assert_vault_invariants(vault: &PromptVault) {
    let anomalies = vault.production_anomalies().unwrap();
    assert!(anomalies.is_empty(), "production anomalies: {anomalies:?}");

    let mut page = 1;
    loop {
        let summaries = vault
            .list_summaries(PageRequest::new(page, MAX_PAGE_SIZE).unwrap(), None)
            .unwrap();

        for summary in &summaries.items {
            let versions = vault.get_versions(&summary.node_name).unwrap();
            assert_eq!(
                versions.len() as u64,
                summary.prompt_count,
                "count mismatch for {}",
                summary.node_name
            );

            let production = versions.iter().filter(|v| v.production).count();
            assert_eq!(production, 1, "{} has {production} production versions", summary.node_name);

            let ordinals: HashSet<u32> = versions.iter().map(|v| v.ordinal).collect();
            assert_eq!(ordinals.len(), versions.len(), "duplicate ordinals in {}", summary.node_name);

            let latest = versions.iter().map(|v| v.created_at).max();
            assert_eq!(latest, Some(summary.latest_created_at));

            for version in &versions {
                assert_eq!(version.node_name, summary.node_name);
                version.content.check().unwrap();
            }
        }

        if !summaries.has_next {
            break;
        }
        page += 1;
    }
}
