use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use super::corpus::CorpusRegistry;
use crate::media::index::FeatureIndex;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub moved: Vec<String>,
    pub skipped: Vec<String>,
}

/// Gather the `count` corpus images most similar to the query image into
/// `output`, captions riding along. The query image itself never counts
/// as one of its own neighbors.
pub fn cluster_similar(
    corpus: &Path,
    query: &Path,
    output: &Path,
    count: usize,
    index: &mut dyn FeatureIndex,
) -> Result<ClusterReport> {
    let indexed = index.build(corpus)?;
    if indexed == 0 {
        anyhow::bail!("no images to index in {}", corpus.display());
    }
    // One extra so a self-match inside the corpus does not eat a slot.
    let mut matches = index
        .query(query, count + 1)
        .context("Failed to rank similar images")?;
    // The query may arrive relative or non-canonical; the filter compares
    // resolved paths.
    let query_identity = query.canonicalize().unwrap_or_else(|_| query.to_path_buf());
    matches.retain(|path| {
        path.canonicalize()
            .map(|resolved| resolved != query_identity)
            .unwrap_or(true)
    });
    matches.truncate(count);

    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create folder {}", output.display()))?;
    let mut registry = CorpusRegistry::scan(corpus)?;

    let mut report = ClusterReport::default();
    for path in matches {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !path.is_file() {
            report.skipped.push(format!("{name}: no longer exists"));
            continue;
        }
        match registry.relocate(&path, output) {
            Ok(_) => report.moved.push(name),
            Err(err) => report.skipped.push(format!("{name}: {err:#}")),
        }
    }
    log::debug!(
        "clustered {} of {} ranked images into {}",
        report.moved.len(),
        indexed.min(count),
        output.display()
    );
    Ok(report)
}
