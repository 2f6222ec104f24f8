//! Content category model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of forum content. Ids are fixed by the seed migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Questions and answers
    Qa,
    /// Knowledge sharing
    Knowledge,
    /// Resource sharing
    Resource,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 3] = [CategoryKind::Qa, CategoryKind::Knowledge, CategoryKind::Resource];

    /// Row id of the seeded category
    pub fn id(self) -> i64 {
        match self {
            CategoryKind::Qa => 1,
            CategoryKind::Knowledge => 2,
            CategoryKind::Resource => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CategoryKind::Qa => "qa",
            CategoryKind::Knowledge => "knowledge",
            CategoryKind::Resource => "resource",
        })
    }
}

impl FromStr for CategoryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qa" => Ok(CategoryKind::Qa),
            "knowledge" => Ok(CategoryKind::Knowledge),
            "resource" => Ok(CategoryKind::Resource),
            _ => Err(anyhow::anyhow!("Invalid category kind: {}", s)),
        }
    }
}

/// A row of `content_categories`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCategory {
    pub id: i64,
    pub kind: CategoryKind,
    pub name: String,
}
