// src/parse/table.rs

use serde::{
    de::{self, Deserializer},
    ser::{SerializeSeq, Serializer},
    Deserialize, Serialize,
};
use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use super::classify::Tier;

/// Key of one price inside a size: `od`, or contract years plus tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKey {
    OnDemand,
    OneYear(Tier),
    ThreeYear(Tier),
}

impl TermKey {
    pub fn as_str(self) -> &'static str {
        match self {
            TermKey::OnDemand => "od",
            TermKey::OneYear(Tier::Heavy) => "y1h",
            TermKey::OneYear(Tier::Medium) => "y1m",
            TermKey::OneYear(Tier::Light) => "y1l",
            TermKey::ThreeYear(Tier::Heavy) => "y3h",
            TermKey::ThreeYear(Tier::Medium) => "y3m",
            TermKey::ThreeYear(Tier::Light) => "y3l",
        }
    }
}

impl fmt::Display for TermKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TermKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tier = |c: &str| match c {
            "h" => Ok(Tier::Heavy),
            "m" => Ok(Tier::Medium),
            "l" => Ok(Tier::Light),
            _ => Err(format!("unknown term key {:?}", s)),
        };
        match s {
            "od" => Ok(TermKey::OnDemand),
            _ if s.len() == 3 && s.starts_with("y1") => Ok(TermKey::OneYear(tier(&s[2..])?)),
            _ if s.len() == 3 && s.starts_with("y3") => Ok(TermKey::ThreeYear(tier(&s[2..])?)),
            _ => Err(format!("unknown term key {:?}", s)),
        }
    }
}

// Output is sorted the same way as the keys read, not by variant order.
impl Ord for TermKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for TermKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for TermKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TermKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One price. Serialized as `[hourly]` or `[hourly, upfront]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceEntry {
    OnDemand { hourly: f64 },
    Reserved { hourly: f64, upfront: f64 },
}

impl PriceEntry {
    /// A reserved price exists only when both halves were published.
    pub fn reserved(hourly: Option<f64>, upfront: Option<f64>) -> Option<Self> {
        Some(PriceEntry::Reserved {
            hourly: hourly?,
            upfront: upfront?,
        })
    }
}

/// Whole-number prices are written as integers (`200`, not `200.0`).
struct Price(f64);

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.fract() == 0.0 && self.0.abs() < 1e15 {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl Serialize for PriceEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            PriceEntry::OnDemand { hourly } => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(&Price(hourly))?;
                seq.end()
            }
            PriceEntry::Reserved { hourly, upfront } => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&Price(hourly))?;
                seq.serialize_element(&Price(upfront))?;
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for PriceEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Vec::<f64>::deserialize(deserializer)?.as_slice() {
            [hourly] => Ok(PriceEntry::OnDemand { hourly: *hourly }),
            [hourly, upfront] => Ok(PriceEntry::Reserved {
                hourly: *hourly,
                upfront: *upfront,
            }),
            other => Err(de::Error::invalid_length(other.len(), &"1 or 2 prices")),
        }
    }
}

pub type TermPrices = BTreeMap<TermKey, PriceEntry>;
pub type SizeTable = BTreeMap<String, TermPrices>;
pub type InstanceTable = BTreeMap<String, SizeTable>;
pub type OsTable = BTreeMap<String, InstanceTable>;

/// `region → os → instance → size → term → price`, every level sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingTable(BTreeMap<String, OsTable>);

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The instance table for `region`/`os`, created on first use.
    pub fn os_branch(&mut self, region: &str, os: &str) -> &mut InstanceTable {
        self.0
            .entry(region.to_string())
            .or_default()
            .entry(os.to_string())
            .or_default()
    }

    pub fn get(&self, region: &str, os: &str, instance: &str, size: &str) -> Option<&TermPrices> {
        self.0.get(region)?.get(os)?.get(instance)?.get(size)
    }

    pub fn regions(&self) -> impl Iterator<Item = (&String, &OsTable)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop every branch that holds no price, bottom-up.
    pub fn prune(&mut self) {
        self.0.retain(|_, oses| {
            oses.retain(|_, instances| {
                instances.retain(|_, sizes| {
                    sizes.retain(|_, terms| !terms.is_empty());
                    !sizes.is_empty()
                });
                !instances.is_empty()
            });
            !oses.is_empty()
        });
    }
}
