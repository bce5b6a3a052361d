// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt, fs,
    path::{Path, PathBuf},
};
use url::Url;

/// Built-in defaults; a user file is merged on top of these.
static DEFAULT_CONFIG: &str = include_str!("../config/ec2.yaml");

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub fetch: FetchConfig,
    pub remap: RemapConfig,
    pub tags: TagConfig,
    /// Where the assembled price table is cached.
    pub output: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    pub base_url: String,
    pub cache_dir: PathBuf,
    pub files: Vec<String>,
    pub expire_hour: f64,
    pub max_threads: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RemapConfig {
    #[serde(default)]
    pub regions: HashMap<String, String>,
    #[serde(default)]
    pub instances: HashMap<String, String>,
    #[serde(default)]
    pub sizes: HashMap<String, String>,
    #[serde(default)]
    pub instance_size: Vec<SizeFix>,
    #[serde(default)]
    pub strict: bool,
}

/// One instance/size pair as it appears after dictionary lookup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstanceSize {
    pub instance: String,
    pub size: String,
}

/// Rewrite `replace` to `with` wherever the vendor mislabels a size.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SizeFix {
    pub replace: InstanceSize,
    pub with: InstanceSize,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TagConfig {
    pub os: OrderedTags,
    #[serde(default)]
    pub term: OrderedTags,
}

/// Tag → description pairs in the order they were written in the config.
///
/// OS detection tries tags in this order, so it must survive deserialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedTags(Vec<(String, String)>);

impl OrderedTags {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OrderedTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for OrderedTags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedTags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagsVisitor;

        impl<'de> Visitor<'de> for TagsVisitor {
            type Value = OrderedTags;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of tag to description")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    pairs.push((k, v));
                }
                Ok(OrderedTags(pairs))
            }
        }

        deserializer.deserialize_map(TagsVisitor)
    }
}

/// A vendor file: its identifier, where it is cached, where it is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub id: String,
    pub local_path: PathBuf,
    pub url: Url,
}

impl Config {
    /// Load the built-in defaults, optionally overlaid with a user YAML file.
    pub fn load(user: Option<&Path>) -> Result<Self> {
        let mut merged: Value =
            serde_yaml::from_str(DEFAULT_CONFIG).context("parsing built-in config")?;

        if let Some(path) = user {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let overlay: Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?;
            merge_yaml(&mut merged, overlay);
        }

        let config: Config = serde_yaml::from_value(merged).context("decoding config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch.files.is_empty() {
            bail!("fetch.files is empty");
        }
        if !self.fetch.expire_hour.is_finite() || self.fetch.expire_hour < 0.0 {
            bail!("fetch.expire_hour must be >= 0, got {}", self.fetch.expire_hour);
        }
        if self.tags.os.is_empty() {
            bail!("tags.os is empty, no file could be classified");
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.fetch.files.iter().find(|id| !seen.insert(id.as_str())) {
            bail!("fetch.files lists {} more than once", dup);
        }
        self.base_url()?;
        Ok(())
    }

    /// Hex SHA-256 over every setting that shapes the parsed table. Two
    /// configs with the same fingerprint build the same table from the same
    /// inputs.
    pub fn fingerprint(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Shape<'a> {
            files: &'a [String],
            cache_dir: &'a Path,
            regions: BTreeMap<&'a String, &'a String>,
            instances: BTreeMap<&'a String, &'a String>,
            sizes: BTreeMap<&'a String, &'a String>,
            instance_size: &'a [SizeFix],
            strict: bool,
            tags: &'a TagConfig,
        }

        let shape = Shape {
            files: &self.fetch.files,
            cache_dir: &self.fetch.cache_dir,
            regions: self.remap.regions.iter().collect(),
            instances: self.remap.instances.iter().collect(),
            sizes: self.remap.sizes.iter().collect(),
            instance_size: &self.remap.instance_size,
            strict: self.remap.strict,
            tags: &self.tags,
        };
        let bytes = serde_json::to_vec(&shape).context("serializing config fingerprint")?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    fn base_url(&self) -> Result<Url> {
        let mut raw = self.fetch.base_url.clone();
        // Url::join drops the last segment unless the base ends in '/'.
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("parsing fetch.base_url {}", raw))
    }

    /// Every configured file with its cache path and remote URL.
    pub fn source_files(&self) -> Result<Vec<SourceFile>> {
        let base = self.base_url()?;
        self.fetch
            .files
            .iter()
            .map(|id| {
                let name = format!("{}.json", id);
                let url = base
                    .join(&name)
                    .with_context(|| format!("building URL for {}", id))?;
                Ok(SourceFile {
                    id: id.clone(),
                    local_path: self.fetch.cache_dir.join(&name),
                    url,
                })
            })
            .collect()
    }
}

/// Recursively overlay `overlay` onto `base`. Mappings merge per key;
/// everything else (scalars, sequences) is replaced.
fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) => merge_yaml(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
