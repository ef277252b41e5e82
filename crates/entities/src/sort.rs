//! Sort orders for the article tree.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Article;

/// User-selected ordering applied uniformly to the visible article set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Name, ascending.
    #[default]
    Name,
    /// Name, descending.
    NameDesc,
    /// Creation date, oldest first.
    Created,
    /// Creation date, newest first.
    CreatedDesc,
    /// Last modification, newest first.
    UpdatedDesc,
    /// Most liked first.
    LikesDesc,
    /// Most viewed first.
    ViewsDesc,
}

impl SortOrder {
    /// All orders, in the order a front end would list them.
    pub const ALL: [SortOrder; 7] = [
        SortOrder::Name,
        SortOrder::NameDesc,
        SortOrder::Created,
        SortOrder::CreatedDesc,
        SortOrder::UpdatedDesc,
        SortOrder::LikesDesc,
        SortOrder::ViewsDesc,
    ];

    /// Stable string key, also used for persisted preferences.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Name => "name",
            SortOrder::NameDesc => "name_desc",
            SortOrder::Created => "created",
            SortOrder::CreatedDesc => "created_desc",
            SortOrder::UpdatedDesc => "updated_desc",
            SortOrder::LikesDesc => "likes_desc",
            SortOrder::ViewsDesc => "views_desc",
        }
    }

    /// Compares two articles under this order.
    pub fn compare(&self, a: &Article, b: &Article) -> Ordering {
        match self {
            SortOrder::Name => compare_names(a, b),
            SortOrder::NameDesc => compare_names(b, a),
            SortOrder::Created => a.created_at.cmp(&b.created_at),
            SortOrder::CreatedDesc => b.created_at.cmp(&a.created_at),
            SortOrder::UpdatedDesc => b.updated_at.cmp(&a.updated_at),
            SortOrder::LikesDesc => b.likes_count.cmp(&a.likes_count),
            SortOrder::ViewsDesc => b.views_count.cmp(&a.views_count),
        }
    }

    /// Sorts articles in place. The sort is stable.
    pub fn sort(&self, articles: &mut [Article]) {
        articles.sort_by(|a, b| self.compare(a, b));
    }

    /// Sorts borrowed articles in place. The sort is stable.
    pub fn sort_refs(&self, articles: &mut [&Article]) {
        articles.sort_by(|a, b| self.compare(a, b));
    }
}

fn compare_names(a: &Article, b: &Article) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown sort order key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortOrder(pub String);

impl fmt::Display for UnknownSortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown sort order '{}'", self.0)
    }
}

impl std::error::Error for UnknownSortOrder {}

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == s)
            .ok_or_else(|| UnknownSortOrder(s.to_string()))
    }
}
