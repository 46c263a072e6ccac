//! Request and response shapes with more structure than raw JSON.

use serde::{Deserialize, Serialize};

/// Market tag from `market/taglookup`, flattened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketTag {
    /// Tag id.
    pub market_tag_id: u64,
    /// Display name.
    pub name: String,
    /// Parent tag for child tags, `None` for top-level tags.
    #[serde(default)]
    pub parent_tag_id: Option<u64>,
}

/// Top-level tag as sent by the server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct TagNode {
    pub market_tag_id: u64,
    pub name: String,
    #[serde(default)]
    pub children: Vec<TagLeaf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct TagLeaf {
    pub market_tag_id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct TagLookupResponse {
    pub tags: Vec<TagNode>,
}

/// Flatten the tag tree: each parent followed by its children, children
/// carrying the parent's id.
pub(super) fn flatten_tags(nodes: Vec<TagNode>) -> Vec<MarketTag> {
    let mut tags = Vec::new();
    for node in nodes {
        let parent = node.market_tag_id;
        tags.push(MarketTag {
            market_tag_id: parent,
            name: node.name,
            parent_tag_id: None,
        });
        tags.extend(node.children.into_iter().map(|child| MarketTag {
            market_tag_id: child.market_tag_id,
            name: child.name,
            parent_tag_id: Some(parent),
        }));
    }
    tags
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct LoginResponse {
    pub session: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct AccountResponse {
    pub client_account_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct MarketsResponse {
    pub markets: Vec<serde_json::Value>,
}

/// Filters for `market/searchwithtags`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSearch {
    /// Free-text query; omitted when empty.
    pub query: String,
    /// Restrict to a tag.
    pub tag_id: Option<u64>,
    /// Result limit.
    pub max_results: u32,
    /// Include spread-bet markets.
    pub spread: bool,
    /// Include CFD markets.
    pub cfd: bool,
    /// Include binary markets.
    pub binary: bool,
}

impl Default for TagSearch {
    fn default() -> Self {
        Self {
            query: String::new(),
            tag_id: None,
            max_results: 1000,
            spread: true,
            cfd: true,
            binary: false,
        }
    }
}

impl TagSearch {
    pub(super) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("maxResults", self.max_results.to_string()),
            ("cfdProductType", self.cfd.to_string()),
            ("binaryProductType", self.binary.to_string()),
            ("spreadProductType", self.spread.to_string()),
        ];
        if !self.query.is_empty() {
            params.push(("query", self.query.clone()));
        }
        if let Some(tag_id) = self.tag_id {
            params.push(("tagId", tag_id.to_string()));
        }
        params
    }
}

/// Bar width for `market/<id>/barhistory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarInterval {
    /// Tick bars.
    Tick,
    /// Minute bars.
    #[default]
    Minute,
    /// Hourly bars.
    Hour,
    /// Daily bars.
    Day,
    /// Weekly bars.
    Week,
}

impl BarInterval {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "TICK",
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Week => "WEEK",
        }
    }
}
