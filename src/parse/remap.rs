// src/parse/remap.rs

use std::collections::{HashMap, HashSet};

use crate::config::{RemapConfig, SizeFix};

/// Which dictionary a vendor identifier is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dict {
    Region,
    Instance,
    Size,
}

impl Dict {
    pub fn name(self) -> &'static str {
        match self {
            Dict::Region => "region",
            Dict::Instance => "instance",
            Dict::Size => "size",
        }
    }
}

struct Lookup {
    map: HashMap<String, String>,
    canonical: HashSet<String>,
}

impl Lookup {
    /// `targets` are names the typo rules can produce; they are canonical
    /// even when no dictionary entry maps to them.
    fn new<'a>(map: &'a HashMap<String, String>, targets: impl Iterator<Item = &'a String>) -> Self {
        Self {
            canonical: map.values().chain(targets).cloned().collect(),
            map: map.clone(),
        }
    }
}

/// Translates vendor identifiers into canonical keys. Read-only once built.
pub struct Remap {
    regions: Lookup,
    instances: Lookup,
    sizes: Lookup,
    fixes: Vec<SizeFix>,
    strict: bool,
}

impl Remap {
    pub fn new(config: &RemapConfig) -> Self {
        Self {
            regions: Lookup::new(&config.regions, std::iter::empty()),
            instances: Lookup::new(
                &config.instances,
                config.instance_size.iter().map(|fix| &fix.with.instance),
            ),
            sizes: Lookup::new(
                &config.sizes,
                config.instance_size.iter().map(|fix| &fix.with.size),
            ),
            fixes: config.instance_size.clone(),
            strict: config.strict,
        }
    }

    fn dict(&self, dict: Dict) -> &Lookup {
        match dict {
            Dict::Region => &self.regions,
            Dict::Instance => &self.instances,
            Dict::Size => &self.sizes,
        }
    }

    /// Canonical form of `raw`, or `raw` itself when it has no mapping.
    pub fn lookup<'a>(&'a self, dict: Dict, raw: &'a str) -> &'a str {
        self.dict(dict)
            .map
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw)
    }

    /// Whether `raw` is a mapped key or already a canonical value.
    pub fn is_known(&self, dict: Dict, raw: &str) -> bool {
        let lookup = self.dict(dict);
        lookup.map.contains_key(raw) || lookup.canonical.contains(raw)
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Apply the first typo rule whose `replace` side equals the pair.
    pub fn fix_instance_size(&self, instance: &str, size: &str) -> (String, String) {
        self.fixes
            .iter()
            .find(|fix| fix.replace.instance == instance && fix.replace.size == size)
            .map(|fix| (fix.with.instance.clone(), fix.with.size.clone()))
            .unwrap_or_else(|| (instance.to_string(), size.to_string()))
    }
}
