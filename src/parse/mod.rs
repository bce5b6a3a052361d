// src/parse/mod.rs

use anyhow::{Context, Result};
use std::{fs, path::Path, time::SystemTime};
use tracing::{debug, info, instrument, warn};

use crate::{
    cache,
    config::{Config, SourceFile},
    error::ParseError,
};

pub mod assemble;
pub mod classify;
pub mod document;
pub mod normalize;
pub mod remap;
pub mod table;

pub use assemble::{assemble, PricingOutput, SEQUENCE};
pub use classify::{classify, Classification, Term, Tier};
pub use document::{load_document, PriceDocument};
pub use normalize::normalize;
pub use remap::{Dict, Remap};
pub use table::{PriceEntry, PricingTable, TermKey};

/// Builds the price table from the cached vendor files.
pub struct Parser {
    config: Config,
    sources: Vec<SourceFile>,
    remap: Remap,
}

impl Parser {
    pub fn new(config: Config) -> Result<Self> {
        let sources = config.source_files()?;
        let remap = Remap::new(&config.remap);
        Ok(Self {
            config,
            sources,
            remap,
        })
    }

    /// Normalize every configured file and assemble the result.
    ///
    /// Fails on the first unreadable or malformed document; nothing partial
    /// is returned.
    #[instrument(level = "info", skip(self))]
    pub fn rebuild(&self) -> Result<PricingOutput, ParseError> {
        let mut table = PricingTable::new();
        let mut parsed = 0;

        for source in &self.sources {
            let Some(class) = classify(&source.id, &self.config.tags.os) else {
                debug!(file = %source.id, "not a price file, skipping");
                continue;
            };
            let document = load_document(source)?;
            normalize(&source.id, &document, Some(&class), &self.remap, &mut table)?;
            parsed += 1;
        }

        let output = assemble(table, &self.config.tags);
        info!(
            parsed,
            os_tags = self.config.tags.os.keys().count(),
            regions = output.pricing.regions().count(),
            "price table assembled"
        );
        Ok(output)
    }

    /// The cached output when it was built under the current config and is
    /// newer than every input, otherwise a fresh rebuild that is then written
    /// to the cache.
    pub fn get(&self) -> Result<PricingOutput> {
        let cache_path = &self.config.output;
        let fingerprint = self.config.fingerprint()?;
        if self.cache_is_fresh(&fingerprint) {
            match read_output(cache_path) {
                Ok(out) => {
                    debug!(path = %cache_path.display(), "using cached price table");
                    return Ok(out);
                }
                Err(e) => warn!(path = %cache_path.display(), error = %e, "cached price table unreadable, rebuilding"),
            }
        }

        let output = self.rebuild()?;
        self.store(&output)?;
        Ok(output)
    }

    /// Write `output` to the cache along with the fingerprint of the config
    /// it was built under.
    pub fn store(&self, output: &PricingOutput) -> Result<()> {
        let cache_path = &self.config.output;
        write_output(cache_path, output)?;
        let stamp = cache::fingerprint_path(cache_path);
        cache::write_atomic(&stamp, self.config.fingerprint()?.as_bytes())
            .with_context(|| format!("writing {}", stamp.display()))
    }

    fn cache_is_fresh(&self, fingerprint: &str) -> bool {
        let Ok(cached) = cache::modified(&self.config.output) else {
            return false;
        };
        let stamp = cache::fingerprint_path(&self.config.output);
        match fs::read_to_string(&stamp) {
            Ok(stored) if stored.trim() == fingerprint => {}
            _ => {
                debug!(path = %stamp.display(), "config changed since the table was cached");
                return false;
            }
        }
        self.sources
            .iter()
            .map(|s| cache::modified(&s.local_path).unwrap_or(SystemTime::UNIX_EPOCH))
            .all(|input| input <= cached)
    }
}

pub fn read_output(path: &Path) -> Result<PricingOutput> {
    let text = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&text).with_context(|| format!("decoding {}", path.display()))
}

/// Pretty-print `output` to `path`, replacing any previous copy atomically.
pub fn write_output(path: &Path, output: &PricingOutput) -> Result<()> {
    let json = serde_json::to_vec_pretty(output).context("serializing price table")?;
    cache::write_atomic(path, &json).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), bytes = json.len(), "wrote price table");
    Ok(())
}
