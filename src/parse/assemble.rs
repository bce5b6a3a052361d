// src/parse/assemble.rs

use serde::{Deserialize, Serialize};

use super::table::PricingTable;
use crate::config::TagConfig;

/// Order of the keys in `pricing`, outermost first.
pub const SEQUENCE: [&str; 5] = ["region", "os", "instance", "size", "term"];

/// The finished artifact: key order, tag descriptions and the price table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingOutput {
    pub sequence: Vec<String>,
    pub tag: TagConfig,
    pub pricing: PricingTable,
}

/// Prune empty branches and wrap the table with its metadata.
pub fn assemble(mut table: PricingTable, tags: &TagConfig) -> PricingOutput {
    table.prune();
    PricingOutput {
        sequence: SEQUENCE.iter().map(|s| s.to_string()).collect(),
        tag: tags.clone(),
        pricing: table,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::table::{PriceEntry, TermKey};
    use serde_json::json;

    fn tags() -> TagConfig {
        TagConfig {
            os: [("linux", "Linux/UNIX")].into_iter().collect(),
            term: [("od", "On-Demand")].into_iter().collect(),
        }
    }

    #[test]
    fn wraps_pruned_table_with_metadata() {
        let mut table = PricingTable::new();
        table
            .os_branch("us-west-1", "linux")
            .entry("t1".into())
            .or_default()
            .entry("micro".into())
            .or_default()
            .insert(TermKey::OnDemand, PriceEntry::OnDemand { hourly: 0.025 });
        table
            .os_branch("sa-east-1", "linux")
            .entry("m1".into())
            .or_default();

        let out = assemble(table, &tags());

        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({
                "sequence": ["region", "os", "instance", "size", "term"],
                "tag": {"os": {"linux": "Linux/UNIX"}, "term": {"od": "On-Demand"}},
                "pricing": {"us-west-1": {"linux": {"t1": {"micro": {"od": [0.025]}}}}}
            })
        );
    }

    #[test]
    fn regions_are_emitted_in_key_order() {
        let mut table = PricingTable::new();
        for region in ["us-west-2", "ap-northeast-1", "eu-west-1"] {
            table
                .os_branch(region, "linux")
                .entry("m1".into())
                .or_default()
                .entry("small".into())
                .or_default()
                .insert(TermKey::OnDemand, PriceEntry::OnDemand { hourly: 0.1 });
        }

        let text = serde_json::to_string(&assemble(table, &tags())).unwrap();
        let ap = text.find("ap-northeast-1").unwrap();
        let eu = text.find("eu-west-1").unwrap();
        let us = text.find("us-west-2").unwrap();
        assert!(ap < eu && eu < us);
    }

    #[test]
    fn output_round_trips_through_json() {
        let mut table = PricingTable::new();
        table
            .os_branch("us-east-1", "linux")
            .entry("m1".into())
            .or_default()
            .entry("small".into())
            .or_default()
            .insert(
                TermKey::OneYear(crate::parse::classify::Tier::Heavy),
                PriceEntry::Reserved {
                    hourly: 0.05,
                    upfront: 200.0,
                },
            );
        let out = assemble(table, &tags());

        let text = serde_json::to_string(&out).unwrap();
        let back: PricingOutput = serde_json::from_str(&text).unwrap();
        assert_eq!(back, out);
    }
}
