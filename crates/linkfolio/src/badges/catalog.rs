use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{BadgeIcon, BadgeId, Metric, Rarity};
use super::evaluation::{Rule, RuleParseError};

/// Immutable catalog entry with its rule parsed and icon resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeDefinition {
    pub id: BadgeId,
    pub title: String,
    pub description: String,
    pub rarity: Rarity,
    pub icon: BadgeIcon,
    pub rule: Rule,
}

/// Raw catalog entry as stored in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub icon: String,
    pub rule: String,
}

impl CatalogEntry {
    fn new(id: &str, title: &str, description: &str, rarity: Rarity, icon: &str, rule: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            rarity,
            icon: icon.to_string(),
            rule: rule.to_string(),
        }
    }
}

/// Fatal problems detected while building the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("badge id must not be empty")]
    EmptyId,
    #[error("duplicate badge id '{0}'")]
    DuplicateId(String),
    #[error("badge '{id}' references unknown metric '{name}'")]
    UnknownMetric { id: String, name: String },
    #[error("badge '{id}' has a malformed rule: {reason}")]
    MalformedRule { id: String, reason: RuleParseError },
    #[error("unable to read badge catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse badge catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Process-wide badge registry, ordered by ascending rarity then id.
#[derive(Debug, Clone)]
pub struct BadgeCatalog {
    definitions: Vec<BadgeDefinition>,
    index: HashMap<BadgeId, usize>,
}

impl BadgeCatalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self, CatalogLoadError> {
        let mut seen = HashSet::new();
        let mut definitions = Vec::with_capacity(entries.len());

        for entry in entries {
            let id = entry.id.trim().to_string();
            if id.is_empty() {
                return Err(CatalogLoadError::EmptyId);
            }
            if !seen.insert(id.clone()) {
                return Err(CatalogLoadError::DuplicateId(id));
            }

            let rule = Rule::parse(&entry.rule).map_err(|reason| match reason {
                RuleParseError::UnknownMetric(name) => CatalogLoadError::UnknownMetric {
                    id: id.clone(),
                    name,
                },
                reason => CatalogLoadError::MalformedRule {
                    id: id.clone(),
                    reason,
                },
            })?;

            definitions.push(BadgeDefinition {
                title: if entry.title.is_empty() {
                    id.clone()
                } else {
                    entry.title
                },
                description: entry.description,
                rarity: entry.rarity,
                icon: BadgeIcon::resolve(&entry.icon),
                rule,
                id: BadgeId(id),
            });
        }

        definitions.sort_by(|left, right| {
            left.rarity
                .cmp(&right.rarity)
                .then_with(|| left.id.cmp(&right.id))
        });

        let index = definitions
            .iter()
            .enumerate()
            .map(|(position, definition)| (definition.id.clone(), position))
            .collect();

        info!(badges = definitions.len(), "badge catalog loaded");

        Ok(Self { definitions, index })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogLoadError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(raw)?;
        Self::from_entries(entries)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Built-in catalog used when no catalog file is configured.
    ///
    /// Thresholds are product placeholders.
    pub fn standard() -> Result<Self, CatalogLoadError> {
        Self::from_entries(standard_entries())
    }

    /// Definitions in evaluation order.
    pub fn list_definitions(&self) -> &[BadgeDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: &BadgeId) -> Option<&BadgeDefinition> {
        self.index
            .get(id)
            .and_then(|position| self.definitions.get(*position))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn referenced_metrics(&self) -> BTreeSet<Metric> {
        self.definitions
            .iter()
            .flat_map(|definition| definition.rule.metrics())
            .collect()
    }
}

pub fn standard_entries() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new(
            "first-link",
            "First Link",
            "Published the first link on your profile.",
            Rarity::Common,
            "link",
            "linkCount >= 1",
        ),
        CatalogEntry::new(
            "first-visitor",
            "First Visitor",
            "Someone viewed your profile.",
            Rarity::Common,
            "eye",
            "profileViews >= 1",
        ),
        CatalogEntry::new(
            "first-background",
            "Set the Scene",
            "Uploaded a custom profile background.",
            Rarity::Common,
            "image",
            "backgroundUploads >= 1",
        ),
        CatalogEntry::new(
            "link-collector",
            "Link Collector",
            "Keep five links on your profile.",
            Rarity::Uncommon,
            "link",
            "linkCount >= 5",
        ),
        CatalogEntry::new(
            "week-one",
            "Week One",
            "Account is at least a week old.",
            Rarity::Uncommon,
            "calendar",
            "accountAgeDays >= 7",
        ),
        CatalogEntry::new(
            "century-views",
            "Century",
            "Reached one hundred profile views.",
            Rarity::Rare,
            "star",
            "profileViews >= 100",
        ),
        CatalogEntry::new(
            "one-month",
            "Regular",
            "Account is at least thirty days old.",
            Rarity::Rare,
            "calendar",
            "accountAgeDays >= 30",
        ),
        CatalogEntry::new(
            "link-curator",
            "Curator",
            "Maintain fifteen links with a custom background.",
            Rarity::Rare,
            "heart",
            "linkCount >= 15 && backgroundUploads >= 1",
        ),
        CatalogEntry::new(
            "rising-star",
            "Rising Star",
            "A thousand views or fifty followers.",
            Rarity::Epic,
            "flame",
            "profileViews >= 1000 || followers >= 50",
        ),
        CatalogEntry::new(
            "anniversary",
            "Anniversary",
            "Account is a year old.",
            Rarity::Epic,
            "trophy",
            "accountAgeDays >= 365",
        ),
        CatalogEntry::new(
            "viral-profile",
            "Viral",
            "Ten thousand profile views.",
            Rarity::Legendary,
            "flame",
            "profileViews >= 10000",
        ),
        CatalogEntry::new(
            "legend",
            "Legend",
            "A year on the platform with five hundred followers.",
            Rarity::Legendary,
            "crown",
            "accountAgeDays >= 365 && followers >= 500",
        ),
    ]
}
