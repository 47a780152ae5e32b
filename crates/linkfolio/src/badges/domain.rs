use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for profile owners.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable catalog key for a badge, e.g. `first-link`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BadgeId(pub String);

impl BadgeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordinal rarity tier. Declaration order is the evaluation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub const fn label(self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        }
    }

    /// Relative display weight handed to presentation alongside the tier.
    pub const fn display_weight(self) -> u8 {
        match self {
            Rarity::Common => 1,
            Rarity::Uncommon => 2,
            Rarity::Rare => 3,
            Rarity::Epic => 5,
            Rarity::Legendary => 8,
        }
    }
}

/// Closed set of badge icons. Names that do not match resolve to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeIcon {
    Link,
    Eye,
    Star,
    Calendar,
    Crown,
    Heart,
    Image,
    Trophy,
    Flame,
    Unknown,
}

impl BadgeIcon {
    pub fn resolve(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "link" => Self::Link,
            "eye" => Self::Eye,
            "star" => Self::Star,
            "calendar" => Self::Calendar,
            "crown" => Self::Crown,
            "heart" => Self::Heart,
            "image" => Self::Image,
            "trophy" => Self::Trophy,
            "flame" => Self::Flame,
            _ => Self::Unknown,
        }
    }
}

/// Named activity signals a badge rule may reference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    LinkCount,
    ProfileViews,
    AccountAgeDays,
    Followers,
    BackgroundUploads,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::LinkCount,
        Metric::ProfileViews,
        Metric::AccountAgeDays,
        Metric::Followers,
        Metric::BackgroundUploads,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Metric::LinkCount => "linkCount",
            Metric::ProfileViews => "profileViews",
            Metric::AccountAgeDays => "accountAgeDays",
            Metric::Followers => "followers",
            Metric::BackgroundUploads => "backgroundUploads",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|metric| metric.name() == name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Activity that triggers an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    LinkCreated,
    LinkDeleted,
    ProfileViewed,
    Login,
    BackgroundUploaded,
    Followed,
}

impl ActivityKind {
    pub const fn label(self) -> &'static str {
        match self {
            ActivityKind::LinkCreated => "link_created",
            ActivityKind::LinkDeleted => "link_deleted",
            ActivityKind::ProfileViewed => "profile_viewed",
            ActivityKind::Login => "login",
            ActivityKind::BackgroundUploaded => "background_uploaded",
            ActivityKind::Followed => "followed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub user_id: UserId,
    pub kind: ActivityKind,
}

/// Durable, one-way fact that a user earned a badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardRecord {
    pub user_id: UserId,
    pub badge_id: BadgeId,
    pub awarded_at: DateTime<Utc>,
}

/// Payload handed to the presentation layer for each new grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardNotification {
    pub user_id: UserId,
    pub badge_id: BadgeId,
    pub rarity: Rarity,
    pub awarded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rarity_orders_common_first() {
        let mut tiers = vec![
            Rarity::Legendary,
            Rarity::Common,
            Rarity::Epic,
            Rarity::Uncommon,
            Rarity::Rare,
        ];
        tiers.sort();
        assert_eq!(
            tiers,
            vec![
                Rarity::Common,
                Rarity::Uncommon,
                Rarity::Rare,
                Rarity::Epic,
                Rarity::Legendary
            ]
        );
    }

    #[test]
    fn unrecognized_icons_fall_back() {
        assert_eq!(BadgeIcon::resolve("Crown"), BadgeIcon::Crown);
        assert_eq!(BadgeIcon::resolve("sparkle-unicorn"), BadgeIcon::Unknown);
    }

    #[test]
    fn metric_names_match_wire_format() {
        for metric in Metric::ALL {
            let encoded = serde_json::to_value(metric).expect("metric serializes");
            assert_eq!(encoded, serde_json::json!(metric.name()));
            assert_eq!(Metric::from_name(metric.name()), Some(metric));
        }
        assert_eq!(Metric::from_name("karma"), None);
    }
}
