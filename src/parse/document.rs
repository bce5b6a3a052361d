// src/parse/document.rs
//
// Shape of the vendor price files:
//
//   {"vers": 0.01,
//    "config": {"currencies": ["USD"],
//               "regions": [{"region": "us-east",
//                            "instanceTypes": [{"type": "stdODI",
//                                               "sizes": [{"size": "sm",
//                                                          "valueColumns": [{"name": "linux",
//                                                                            "prices": {"USD": "0.060"}}]}]}]}]}}
//
// Fields not listed below are ignored.

use serde::Deserialize;
use serde_json::Value;
use std::{collections::BTreeMap, fs, io::ErrorKind};
use tracing::debug;

use crate::{config::SourceFile, error::ParseError};

/// Strings the vendor puts where a price is not offered.
const NO_PRICE: &[&str] = &["", "N/A", "n/a", "-"];

#[derive(Debug, Clone, Deserialize)]
pub struct PriceDocument {
    #[serde(default)]
    pub vers: Option<f64>,
    pub config: DocumentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentConfig {
    #[serde(default)]
    pub currencies: Option<Vec<String>>,
    pub regions: Vec<RegionBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionBlock {
    pub region: String,
    #[serde(rename = "instanceTypes")]
    pub instance_types: Vec<InstanceBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub sizes: Vec<SizeBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizeBlock {
    pub size: String,
    #[serde(rename = "valueColumns")]
    pub value_columns: Vec<ValueColumn>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueColumn {
    pub name: String,
    #[serde(default)]
    pub prices: BTreeMap<String, Value>,
}

impl ValueColumn {
    /// The USD price of this column; `None` when the vendor left it blank.
    pub fn usd(&self, id: &str) -> Result<Option<f64>, ParseError> {
        parse_price(id, self.prices.get("USD"))
    }
}

fn parse_price(id: &str, value: Option<&Value>) -> Result<Option<f64>, ParseError> {
    let bad = |raw: String| ParseError::BadNumber {
        id: id.to_string(),
        value: raw,
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| bad(n.to_string())),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if NO_PRICE.contains(&trimmed) {
                return Ok(None);
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(bad(s.clone())),
            }
        }
        Some(other) => Err(ParseError::malformed(
            id,
            format!("price is neither a number nor a string: {}", other),
        )),
    }
}

impl PriceDocument {
    pub fn from_slice(id: &str, bytes: &[u8]) -> Result<Self, ParseError> {
        let doc: PriceDocument =
            serde_json::from_slice(bytes).map_err(|e| ParseError::malformed(id, e.to_string()))?;

        if let Some(currencies) = &doc.config.currencies {
            if !currencies.iter().any(|c| c == "USD") {
                return Err(ParseError::malformed(
                    id,
                    format!("no USD prices (currencies: {:?})", currencies),
                ));
            }
        }
        Ok(doc)
    }
}

/// Read and decode the cached copy of `source`.
pub fn load_document(source: &SourceFile) -> Result<PriceDocument, ParseError> {
    let bytes = fs::read(&source.local_path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ParseError::SourceUnavailable {
            id: source.id.clone(),
            path: source.local_path.clone(),
        },
        _ => ParseError::Io {
            path: source.local_path.clone(),
            source: e,
        },
    })?;

    let doc = PriceDocument::from_slice(&source.id, &bytes)?;
    debug!(file = %source.id, vers = ?doc.vers, regions = doc.config.regions.len(), "loaded document");
    Ok(doc)
}
