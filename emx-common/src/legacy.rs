//! Legacy question key aliases
//!
//! Older participant runners stored answers under ad-hoc keys (`welcome`,
//! `demographics-form`, `SmartVOC`, ...). The alias table maps every known
//! spelling to the canonical key of its module family. It is plain data,
//! versioned and loadable from TOML, so alias lists can change without a
//! code release.
//!
//! Each module family carries a policy:
//! - `rename`: aliases are migrated in place to the canonical key
//! - `purge`: aliases are eligible for deletion by the cleanup pass
//!
//! Resolution ignores the policy. Every alias resolves to its canonical key and
//! every alias is "legacy"; the policy only decides which maintenance pass acts on
//! it.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::{Error, Result};

/// What the maintenance passes do with a module family's aliases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasPolicy {
    Rename,
    Purge,
}

/// Alias list for one module family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleAliases {
    /// Module family name (informational)
    pub module: String,
    /// Key every alias resolves to
    pub canonical: String,
    pub policy: AliasPolicy,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Versioned alias configuration
///
/// TOML layout:
/// ```toml
/// version = 2
///
/// [[module]]
/// module = "demographics"
/// canonical = "demographics"
/// policy = "rename"
/// aliases = ["demographic", "demographics-form"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyAliasTable {
    pub version: u32,
    #[serde(rename = "module", default)]
    pub modules: Vec<ModuleAliases>,
}

impl LegacyAliasTable {
    /// Built-in alias table covering the historical runner spellings
    pub fn builtin() -> Self {
        fn family(module: &str, canonical: &str, policy: AliasPolicy, aliases: &[&str]) -> ModuleAliases {
            ModuleAliases {
                module: module.to_string(),
                canonical: canonical.to_string(),
                policy,
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
            }
        }

        Self {
            version: 1,
            modules: vec![
                family(
                    "welcome_screen",
                    "welcome_screen",
                    AliasPolicy::Rename,
                    &["welcome", "welcome_welcome", "welcome-screen", "welcomeScreen", "WelcomeScreen"],
                ),
                family(
                    "thank_you_screen",
                    "thank_you_screen",
                    AliasPolicy::Rename,
                    &["thankyou", "thankyou_thankyou", "thank_you", "thank-you-screen", "ThankYouScreen"],
                ),
                family(
                    "demographics",
                    "demographics",
                    AliasPolicy::Rename,
                    &[
                        "demographic",
                        "demographic_demographic",
                        "demographics-form",
                        "demographic-form",
                        "Demographics",
                    ],
                ),
                family(
                    "smartvoc",
                    "smartvoc",
                    AliasPolicy::Purge,
                    &["SmartVOC", "smartVoc", "smart_voc", "smartvoc_csat"],
                ),
                family(
                    "cognitive_task",
                    "cognitive_task",
                    AliasPolicy::Purge,
                    &["cognitive", "cognitiveTask", "CognitiveTask", "cognitive-task"],
                ),
            ],
        }
    }

    /// Parse an alias table from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid alias table: {}", e)))
    }

    /// Load an alias table from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[derive(Debug, Clone)]
struct AliasEntry {
    canonical: String,
    policy: AliasPolicy,
}

/// Case-sensitive alias lookup built from a validated [`LegacyAliasTable`]
#[derive(Debug, Clone)]
pub struct LegacyKeyResolver {
    version: u32,
    entries: HashMap<String, AliasEntry>,
}

impl LegacyKeyResolver {
    /// Build a resolver, validating the table
    ///
    /// # Errors
    /// `Config` when an alias or canonical key is empty, an alias maps to two
    /// different canonical keys, or a canonical key is itself listed as an
    /// alias (which would make resolution non-idempotent).
    pub fn new(table: &LegacyAliasTable) -> Result<Self> {
        validate_table(table)?;
        let resolver = Self::index(table);
        debug!(version = resolver.version, aliases = resolver.entries.len(), "Legacy alias table loaded");
        Ok(resolver)
    }

    /// Resolver over [`LegacyAliasTable::builtin`]
    pub fn builtin() -> Self {
        Self::index(&LegacyAliasTable::builtin())
    }

    fn index(table: &LegacyAliasTable) -> Self {
        let entries = table
            .modules
            .iter()
            .flat_map(|family| {
                family.aliases.iter().map(move |alias| {
                    (
                        alias.clone(),
                        AliasEntry {
                            canonical: family.canonical.clone(),
                            policy: family.policy,
                        },
                    )
                })
            })
            .collect();
        Self {
            version: table.version,
            entries,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Map a raw key to its canonical key; unknown keys pass through unchanged
    pub fn resolve<'a>(&'a self, raw_key: &'a str) -> &'a str {
        match self.entries.get(raw_key) {
            Some(entry) => entry.canonical.as_str(),
            None => raw_key,
        }
    }

    /// True iff `raw_key` is listed as an alias, whatever its policy
    pub fn is_legacy(&self, raw_key: &str) -> bool {
        self.entries.contains_key(raw_key)
    }

    /// Policy of the module family an alias belongs to
    pub fn policy_of(&self, raw_key: &str) -> Option<AliasPolicy> {
        self.entries.get(raw_key).map(|e| e.policy)
    }

    /// Aliases whose family is marked for deletion
    pub fn purge_keys(&self) -> HashSet<String> {
        self.keys_with_policy(AliasPolicy::Purge)
    }

    /// Aliases whose family is migrated in place
    pub fn rename_keys(&self) -> HashSet<String> {
        self.keys_with_policy(AliasPolicy::Rename)
    }

    fn keys_with_policy(&self, policy: AliasPolicy) -> HashSet<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.policy == policy)
            .map(|(alias, _)| alias.clone())
            .collect()
    }
}

/// Reject tables whose resolution would be ambiguous or non-idempotent
fn validate_table(table: &LegacyAliasTable) -> Result<()> {
    let mut seen: HashMap<&str, (&str, AliasPolicy)> = HashMap::new();

    for family in &table.modules {
        if family.canonical.is_empty() {
            return Err(Error::Config(format!(
                "module {:?} has an empty canonical key",
                family.module
            )));
        }
        for alias in &family.aliases {
            if alias.is_empty() {
                return Err(Error::Config(format!("module {:?} has an empty alias", family.module)));
            }
            let mapping = (family.canonical.as_str(), family.policy);
            match seen.get(alias.as_str()) {
                Some(existing) if *existing != mapping => {
                    return Err(Error::Config(format!(
                        "alias {:?} maps to both {:?} and {:?}",
                        alias, existing.0, family.canonical
                    )));
                }
                Some(_) => {}
                None => {
                    seen.insert(alias.as_str(), mapping);
                }
            }
        }
    }

    for family in &table.modules {
        if seen.contains_key(family.canonical.as_str()) {
            return Err(Error::Config(format!(
                "canonical key {:?} is also listed as an alias",
                family.canonical
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_passes_validation() {
        let validated = LegacyKeyResolver::new(&LegacyAliasTable::builtin()).unwrap();
        let builtin = LegacyKeyResolver::builtin();
        assert_eq!(validated.entries.len(), builtin.entries.len());
        assert_eq!(validated.version(), builtin.version());
        assert!(validate_table(&LegacyAliasTable::builtin()).is_ok());
    }

    #[test]
    fn test_resolve_known_aliases() {
        let resolver = LegacyKeyResolver::builtin();
        assert_eq!(resolver.resolve("demographics-form"), "demographics");
        assert_eq!(resolver.resolve("demographic"), "demographics");
        assert_eq!(resolver.resolve("welcome"), "welcome_screen");
        assert_eq!(resolver.resolve("thankyou"), "thank_you_screen");
        assert_eq!(resolver.resolve("SmartVOC"), "smartvoc");
        assert_eq!(resolver.resolve("cognitive-task"), "cognitive_task");
    }

    #[test]
    fn test_resolve_passes_through_canonical_and_unknown() {
        let resolver = LegacyKeyResolver::builtin();
        assert_eq!(resolver.resolve("demographics"), "demographics");
        assert_eq!(resolver.resolve("q1_smartvoc_nps"), "q1_smartvoc_nps");
        assert_eq!(resolver.resolve(""), "");
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let resolver = LegacyKeyResolver::builtin();
        assert_eq!(resolver.resolve("DEMOGRAPHIC"), "DEMOGRAPHIC");
        assert!(!resolver.is_legacy("DEMOGRAPHIC"));
    }

    #[test]
    fn test_is_legacy_ignores_policy() {
        let resolver = LegacyKeyResolver::builtin();
        assert!(resolver.is_legacy("demographics-form"));
        assert!(resolver.is_legacy("smartvoc_csat"));
        assert!(!resolver.is_legacy("demographics"));
        assert_eq!(resolver.policy_of("demographic"), Some(AliasPolicy::Rename));
        assert_eq!(resolver.policy_of("SmartVOC"), Some(AliasPolicy::Purge));
        assert_eq!(resolver.policy_of("demographics"), None);
    }

    #[test]
    fn test_policy_key_sets_are_disjoint() {
        let resolver = LegacyKeyResolver::builtin();
        let purge = resolver.purge_keys();
        let rename = resolver.rename_keys();
        assert!(purge.contains("cognitive"));
        assert!(rename.contains("welcome"));
        assert!(purge.is_disjoint(&rename));
    }

    #[test]
    fn test_rejects_conflicting_alias() {
        let mut table = LegacyAliasTable::builtin();
        table.modules[1].aliases.push("welcome".to_string());
        let err = LegacyKeyResolver::new(&table).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_canonical_listed_as_alias() {
        let mut table = LegacyAliasTable::builtin();
        table.modules[0].aliases.push("demographics".to_string());
        let err = LegacyKeyResolver::new(&table).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_tolerates_repeated_alias_in_same_family() {
        let mut table = LegacyAliasTable::builtin();
        table.modules[2].aliases.push("demographic".to_string());
        let resolver = LegacyKeyResolver::new(&table).unwrap();
        assert_eq!(resolver.resolve("demographic"), "demographics");
    }

    #[test]
    fn test_from_toml() {
        let table = LegacyAliasTable::from_toml_str(
            r#"
            version = 3

            [[module]]
            module = "demographics"
            canonical = "demographics"
            policy = "purge"
            aliases = ["demographic", "demographics-form"]
            "#,
        )
        .unwrap();

        assert_eq!(table.version, 3);
        let resolver = LegacyKeyResolver::new(&table).unwrap();
        assert_eq!(resolver.version(), 3);
        assert_eq!(resolver.resolve("demographics-form"), "demographics");
        assert_eq!(resolver.policy_of("demographic"), Some(AliasPolicy::Purge));
        assert!(!resolver.is_legacy("welcome"));
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        let result = LegacyAliasTable::from_toml_str(
            r#"
            version = 1
            [[module]]
            module = "x"
            canonical = "x"
            policy = "archive"
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
