//! `rangectl config` — import and inspect stored documents.

use std::path::Path;

use anyhow::{Context, bail};
use rangeplane_store::DocumentStore;
use rangeplane_types::{Document, Kind, UpgraderRegistry, validate_document};
use serde::Deserialize;

use super::{controller, open_store, parse_target, print};
use crate::config::RangeConfig;

/// Read every document in a JSON file or a (multi-document) YAML file.
pub fn parse_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );

    if !is_yaml {
        let doc: Document =
            serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        return Ok(vec![doc]);
    }

    let mut docs = Vec::new();
    for de in serde_yaml::Deserializer::from_str(&content) {
        let doc = Document::deserialize(de).with_context(|| format!("parsing {}", path.display()))?;
        docs.push(doc);
    }
    Ok(docs)
}

/// Store the documents in `files`, upgrading older versions first. One
/// legacy document may produce several current ones.
pub fn create(config: &RangeConfig, files: &[impl AsRef<Path>]) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let upgraders = UpgraderRegistry::with_defaults();

    for file in files {
        for doc in parse_documents(file.as_ref())? {
            if doc.kind == Kind::Experiment {
                bail!(
                    "experiment {} cannot be imported; use `rangectl experiment create`",
                    doc.name()
                );
            }
            for mut current in upgraders.upgrade_document(&doc)? {
                validate_document(&current).with_context(|| format!("{}/{}", current.kind, current.name()))?;
                store.create(&mut current)?;
                println!("✓ Created {}/{} ({})", current.kind, current.name(), current.api_version);
            }
        }
    }
    Ok(())
}

pub fn list(config: &RangeConfig, kind: Option<&str>) -> anyhow::Result<()> {
    let kinds = match kind {
        Some(kind) => vec![kind.parse()?],
        None => Kind::ALL.to_vec(),
    };
    let store = open_store(config)?;

    println!("{:<12} {:<32} {:<24} UPDATED", "KIND", "NAME", "API VERSION");
    for doc in store.list(&kinds)? {
        let updated = doc
            .metadata
            .updated
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!("{:<12} {:<32} {:<24} {updated}", doc.kind, doc.name(), doc.api_version);
    }
    Ok(())
}

pub fn get(config: &RangeConfig, target: &str, output: &str) -> anyhow::Result<()> {
    let (kind, name) = parse_target(target)?;
    let doc = open_store(config)?.get(kind, name)?;
    print(&doc, output)
}

/// Experiments go through the controller so a running one is refused.
pub fn delete(config: &RangeConfig, target: &str) -> anyhow::Result<()> {
    let (kind, name) = parse_target(target)?;
    if kind == Kind::Experiment {
        controller(config)?.delete(name)?;
    } else {
        open_store(config)?.delete(kind, name)?;
    }
    println!("✓ Deleted {kind}/{name}");
    Ok(())
}
