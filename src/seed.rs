//! Writing flag definitions into a store.
//!
//! A seed file is JSON in one of three shapes:
//!
//! ```json
//! [{"key": "new-ui", "enabled": true, "variations": [false, true], "version": 1}]
//! {"flags": [{"key": "new-ui", ...}]}
//! {"new-ui": {"key": "new-ui", ...}}
//! ```

use flagstore_core::FlagDefinition;
use flagstore_store::FlagStore;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    List(Vec<FlagDefinition>),
    Wrapped { flags: Vec<FlagDefinition> },
    Keyed(BTreeMap<String, FlagDefinition>),
}

/// Outcome of a seed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub written: usize,
    /// Definitions the store already had at the same or a newer version.
    pub skipped: usize,
}

/// Parse seed file content.
pub fn parse_definitions(content: &str) -> Result<Vec<FlagDefinition>> {
    let file: SeedFile = serde_json::from_str(content)
        .map_err(|e| Error::Seed(format!("not a list or map of flag definitions: {}", e)))?;

    let definitions = match file {
        SeedFile::List(list) | SeedFile::Wrapped { flags: list } => list,
        SeedFile::Keyed(map) => {
            let mut list = Vec::with_capacity(map.len());
            for (key, definition) in map {
                if key != definition.key {
                    return Err(Error::Seed(format!(
                        "entry {} holds flag {}",
                        key, definition.key
                    )));
                }
                list.push(definition);
            }
            list
        }
    };

    let mut seen = HashSet::new();
    for definition in &definitions {
        if definition.key.trim().is_empty() {
            return Err(Error::Seed("flag key must not be empty".to_string()));
        }
        if !seen.insert(definition.key.as_str()) {
            return Err(Error::Seed(format!("duplicate flag {}", definition.key)));
        }
    }
    Ok(definitions)
}

pub fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<FlagDefinition>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let definitions = parse_definitions(&content)?;
    debug!(path = %path.display(), flags = definitions.len(), "Loaded seed file");
    Ok(definitions)
}

/// Write `definitions` to `store`.
///
/// With `replace`, the store's contents are replaced wholesale and it is
/// marked initialized. Otherwise each definition is written with the
/// store's version check.
///
/// ```
/// use flagstore::seed::{parse_definitions, seed};
/// use flagstore::flagstore_store::MemoryFlagStore;
///
/// # tokio_test::block_on(async {
/// let store = MemoryFlagStore::new();
/// let flags = parse_definitions(r#"[{"key": "new-ui", "variations": [false, true], "version": 1}]"#)?;
///
/// let report = seed(&store, flags, false).await?;
/// assert_eq!(report.written, 1);
/// # Ok::<(), flagstore::Error>(())
/// # }).unwrap();
/// ```
pub async fn seed(
    store: &dyn FlagStore,
    definitions: Vec<FlagDefinition>,
    replace: bool,
) -> Result<SeedReport> {
    let total = definitions.len();
    if replace {
        store.init(definitions).await?;
        info!(store = store.name(), flags = total, "Replaced all flags");
        return Ok(SeedReport {
            written: total,
            skipped: 0,
        });
    }

    let mut report = SeedReport::default();
    for definition in &definitions {
        if store.put(definition).await? {
            report.written += 1;
        } else {
            debug!(flag_key = %definition.key, version = definition.version, "Store already has this version");
            report.skipped += 1;
        }
    }
    info!(store = store.name(), written = report.written, skipped = report.skipped, "Seeded flags");
    Ok(report)
}
