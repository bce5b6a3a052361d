// src/parse/classify.rs

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::OrderedTags;

static TERM_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-(od|ri-(?:heavy|medium|light))$").expect("term suffix pattern should parse")
});

/// Reserved-instance utilization tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Heavy,
    Medium,
    Light,
}

impl Tier {
    pub fn code(self) -> char {
        match self {
            Tier::Heavy => 'h',
            Tier::Medium => 'm',
            Tier::Light => 'l',
        }
    }
}

/// Pricing term of a whole document. The contract length of a reserved
/// price is not part of the file name; it comes from the value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Term {
    OnDemand,
    Reserved(Tier),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub os: String,
    pub term: Term,
}

/// Work out the OS and term of a vendor file from its identifier.
///
/// The OS is the first configured tag found as a `-`-terminated prefix,
/// either at the start of the identifier or right after a `-`. Returns
/// `None` for files that do not follow the naming convention.
pub fn classify(file_id: &str, os_tags: &OrderedTags) -> Option<Classification> {
    let os = guess_os(file_id, os_tags)?;
    let term = guess_term(file_id)?;
    Some(Classification {
        os: os.to_string(),
        term,
    })
}

fn guess_os<'a>(file_id: &str, os_tags: &'a OrderedTags) -> Option<&'a str> {
    os_tags.keys().find(|os| {
        let prefix = format!("{}-", os);
        file_id.starts_with(&prefix) || file_id.contains(&format!("-{}", prefix))
    })
}

fn guess_term(file_id: &str) -> Option<Term> {
    let caps = TERM_SUFFIX.captures(file_id)?;
    match &caps[1] {
        "od" => Some(Term::OnDemand),
        "ri-heavy" => Some(Term::Reserved(Tier::Heavy)),
        "ri-medium" => Some(Term::Reserved(Tier::Medium)),
        "ri-light" => Some(Term::Reserved(Tier::Light)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os_tags() -> OrderedTags {
        [
            ("linux", "Linux/UNIX"),
            ("rhel", "Red Hat"),
            ("mswin", "Windows"),
            ("mswinSQL", "Windows with SQL Server"),
        ]
        .into_iter()
        .collect()
    }

    fn class(os: &str, term: Term) -> Option<Classification> {
        Some(Classification {
            os: os.to_string(),
            term,
        })
    }

    #[test]
    fn generation_prefixed_names() {
        let tags = os_tags();
        assert_eq!(classify("m3-linux-od", &tags), class("linux", Term::OnDemand));
        assert_eq!(
            classify("m3-linux-ri-heavy", &tags),
            class("linux", Term::Reserved(Tier::Heavy))
        );
        assert_eq!(classify("m3-weird-suffix", &tags), None);
    }

    #[test]
    fn plain_names() {
        let tags = os_tags();
        assert_eq!(classify("linux-od", &tags), class("linux", Term::OnDemand));
        assert_eq!(
            classify("rhel-ri-medium", &tags),
            class("rhel", Term::Reserved(Tier::Medium))
        );
        assert_eq!(
            classify("mswinSQL-ri-light", &tags),
            class("mswinSQL", Term::Reserved(Tier::Light))
        );
        assert_eq!(classify("mswin-od", &tags), class("mswin", Term::OnDemand));
    }

    #[test]
    fn unknown_os_or_term_is_unclassifiable() {
        let tags = os_tags();
        assert_eq!(classify("sles-od", &tags), None);
        assert_eq!(classify("linux-ri-extreme", &tags), None);
        assert_eq!(classify("linux-od-old", &tags), None);
        assert_eq!(classify("linuxod", &tags), None);
        assert_eq!(classify("pricing-metadata", &tags), None);
    }

    #[test]
    fn first_configured_os_wins() {
        let tags: OrderedTags = [("rhel", "first"), ("linux", "second")]
            .into_iter()
            .collect();
        assert_eq!(
            classify("rhel-linux-od", &tags).map(|c| c.os),
            Some("rhel".to_string())
        );
        let tags: OrderedTags = [("linux", "first"), ("rhel", "second")]
            .into_iter()
            .collect();
        assert_eq!(
            classify("rhel-linux-od", &tags).map(|c| c.os),
            Some("linux".to_string())
        );
    }
}
