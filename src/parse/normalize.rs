// src/parse/normalize.rs

use tracing::{debug, trace};

use super::{
    classify::{Classification, Term, Tier},
    document::{PriceDocument, SizeBlock},
    remap::{Dict, Remap},
    table::{PriceEntry, PricingTable, TermKey, TermPrices},
};
use crate::error::ParseError;

/// Fold one vendor document into `table`.
///
/// Unclassified documents are skipped. Keys are translated through `remap`
/// and the instance/size typo rules before anything is inserted, so a
/// correction can move prices into a different bucket than the one the
/// vendor named. Any bad price aborts the document.
pub fn normalize(
    id: &str,
    document: &PriceDocument,
    classification: Option<&Classification>,
    remap: &Remap,
    table: &mut PricingTable,
) -> Result<(), ParseError> {
    let Some(class) = classification else {
        debug!(file = %id, "unclassified, skipping");
        return Ok(());
    };
    let keys = Keys { id, remap };

    for regional in &document.config.regions {
        let region = keys.canonical(Dict::Region, &regional.region)?;
        let instances = table.os_branch(&region, &class.os);

        for it in &regional.instance_types {
            let instance = keys.canonical(Dict::Instance, &it.kind)?;

            for sz in &it.sizes {
                let size = keys.canonical(Dict::Size, &sz.size)?;
                let (instance, size) = remap.fix_instance_size(&instance, &size);
                trace!(file = %id, %region, %instance, %size, "size block");

                let prices = instances
                    .entry(instance)
                    .or_default()
                    .entry(size)
                    .or_default();

                match class.term {
                    Term::OnDemand => on_demand(id, sz, prices)?,
                    Term::Reserved(tier) => reserved(id, sz, tier, prices)?,
                }
            }
        }
    }
    Ok(())
}

struct Keys<'a> {
    id: &'a str,
    remap: &'a Remap,
}

impl Keys<'_> {
    fn canonical(&self, dict: Dict, raw: &str) -> Result<String, ParseError> {
        if !self.remap.is_known(dict, raw) {
            if self.remap.strict() {
                return Err(ParseError::Unmapped {
                    id: self.id.to_string(),
                    kind: dict.name(),
                    key: raw.to_string(),
                });
            }
            debug!(file = %self.id, kind = dict.name(), key = raw, "unmapped, passing through");
        }
        Ok(self.remap.lookup(dict, raw).to_string())
    }
}

fn on_demand(id: &str, sz: &SizeBlock, prices: &mut TermPrices) -> Result<(), ParseError> {
    let column = sz.value_columns.first().ok_or_else(|| {
        ParseError::malformed(id, format!("size {} has no value columns", sz.size))
    })?;
    if let Some(hourly) = column.usd(id)? {
        prices.insert(TermKey::OnDemand, PriceEntry::OnDemand { hourly });
    }
    Ok(())
}

fn reserved(
    id: &str,
    sz: &SizeBlock,
    tier: Tier,
    prices: &mut TermPrices,
) -> Result<(), ParseError> {
    let (mut upfront_1, mut upfront_3, mut hourly_1, mut hourly_3) = (None, None, None, None);

    for vc in &sz.value_columns {
        let slot = match vc.name.as_str() {
            "yrTerm1" => &mut upfront_1,
            "yrTerm3" => &mut upfront_3,
            "yrTerm1Hourly" => &mut hourly_1,
            "yrTerm3Hourly" => &mut hourly_3,
            _ => continue,
        };
        *slot = vc.usd(id)?;
    }

    if let Some(entry) = PriceEntry::reserved(hourly_1, upfront_1) {
        prices.insert(TermKey::OneYear(tier), entry);
    }
    if let Some(entry) = PriceEntry::reserved(hourly_3, upfront_3) {
        prices.insert(TermKey::ThreeYear(tier), entry);
    }
    Ok(())
}
