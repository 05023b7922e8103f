//! Market definitions and wire shapes
//!
//! Each marketplace is a tagged [`MarketKind`] selected by configuration. The
//! kind owns its payload shapes and the mapping from a loosely-typed item
//! detail to the item identity; [`Market`] pairs a kind with the endpoints of
//! one region.

use crate::config::{Config, MarketConfig};
use crate::{CrawlError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Loosely-typed item attributes as returned by a detail lookup
pub type Attributes = Map<String, Value>;

/// Supported marketplaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    #[default]
    Shopee,
}

/// One node of the category tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    #[serde(rename = "display_name", default)]
    pub display_name: String,

    #[serde(rename = "catid")]
    pub cat_id: i64,

    /// `0` marks a root/container node
    #[serde(rename = "parent_category", default)]
    pub parent_id: i64,
}

impl CategoryNode {
    /// Leaf categories are the only ones whose listings get walked
    pub fn is_leaf(&self) -> bool {
        self.parent_id != 0
    }
}

/// Minimal item identity returned by a listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(rename = "itemid")]
    pub item_id: i64,

    #[serde(rename = "shopid")]
    pub shop_id: i64,
}

#[derive(Debug, Deserialize)]
struct ShopeeCategoryGroup {
    #[serde(alias = "Main")]
    main: CategoryNode,
    #[serde(alias = "Sub", default)]
    sub: Vec<CategoryNode>,
}

#[derive(Debug, Deserialize)]
struct ShopeeListingPage {
    #[serde(alias = "Items", default)]
    items: Option<Vec<ItemRef>>,
}

#[derive(Debug, Serialize)]
struct ShopeeDetailRequest<'a> {
    item_shop_ids: &'a [ItemRef],
}

impl MarketKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shopee => "shopee",
        }
    }

    /// Attribute carrying the item identity in a detail payload
    pub fn item_id_field(&self) -> &'static str {
        match self {
            Self::Shopee => "itemid",
        }
    }

    /// Decodes a category tree document into a flat list, each main node
    /// followed by its sub nodes.
    pub fn decode_categories(&self, body: &[u8]) -> Result<Vec<CategoryNode>> {
        match self {
            Self::Shopee => {
                let groups: Vec<ShopeeCategoryGroup> =
                    serde_json::from_slice(body).map_err(|source| CrawlError::Decode {
                        context: "category tree".to_string(),
                        source,
                    })?;
                Ok(groups
                    .into_iter()
                    .flat_map(|group| std::iter::once(group.main).chain(group.sub))
                    .collect())
            }
        }
    }

    /// Decodes one listing page into item references
    pub fn decode_listing(&self, body: &[u8]) -> Result<Vec<ItemRef>> {
        match self {
            Self::Shopee => {
                let page: ShopeeListingPage =
                    serde_json::from_slice(body).map_err(|source| CrawlError::Decode {
                        context: "item listing".to_string(),
                        source,
                    })?;
                Ok(page.items.unwrap_or_default())
            }
        }
    }

    /// Serializes a batch of references into a detail lookup body
    pub fn encode_detail_request(&self, refs: &[ItemRef]) -> Result<Vec<u8>> {
        match self {
            Self::Shopee => serde_json::to_vec(&ShopeeDetailRequest {
                item_shop_ids: refs,
            })
            .map_err(|source| CrawlError::Decode {
                context: "detail request".to_string(),
                source,
            }),
        }
    }

    /// Decodes a detail lookup response into attribute maps
    pub fn decode_details(&self, body: &[u8]) -> Result<Vec<Attributes>> {
        match self {
            Self::Shopee => serde_json::from_slice(body).map_err(|source| CrawlError::Decode {
                context: "item details".to_string(),
                source,
            }),
        }
    }

    /// Extracts the integer item identity from a detail payload.
    ///
    /// JSON numbers written as floats are accepted when they carry no
    /// fractional part.
    pub fn item_id(&self, attributes: &Attributes) -> Option<i64> {
        match attributes.get(self.item_id_field())? {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }
    }
}

/// A marketplace region resolved from configuration
#[derive(Debug, Clone)]
pub struct Market {
    pub kind: MarketKind,
    pub region: String,
    pub host: String,
    pub category_url: String,
    pub item_list_url: String,
    pub item_info_url: String,
    pub sleep_interval: Duration,
    detail_headers: HeaderMap,
}

impl Market {
    /// Resolves the market configured under `region`
    ///
    /// # Returns
    ///
    /// * `Err(CrawlError::UnknownMarket)` - No market is configured for the key
    /// * `Err(CrawlError::InvalidRequest)` - A detail header is not a valid HTTP header
    pub fn resolve(config: &Config, region: &str) -> Result<Self> {
        let market = config
            .markets
            .get(region)
            .ok_or_else(|| CrawlError::UnknownMarket(region.to_string()))?;
        Self::from_config(region, market)
    }

    pub fn from_config(region: &str, config: &MarketConfig) -> Result<Self> {
        let mut detail_headers = HeaderMap::new();
        for (name, value) in &config.detail_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CrawlError::InvalidRequest(format!("header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CrawlError::InvalidRequest(format!("header {}: {}", name, e)))?;
            detail_headers.insert(name, value);
        }

        Ok(Self {
            kind: config.kind,
            region: region.to_string(),
            host: config.host.clone(),
            category_url: config.category_url.clone(),
            item_list_url: config.item_list_url.clone(),
            item_info_url: config.item_info_url.clone(),
            sleep_interval: Duration::from_millis(config.sleep_interval),
            detail_headers,
        })
    }

    /// Renders the listing URL template for one page
    pub fn listing_url(&self, cat_id: i64, offset: u32, limit: u32) -> String {
        self.item_list_url
            .replace("{catid}", &cat_id.to_string())
            .replace("{offset}", &offset.to_string())
            .replace("{limit}", &limit.to_string())
    }

    /// Headers sent with detail lookups
    pub fn detail_headers(&self) -> HeaderMap {
        self.detail_headers.clone()
    }

    /// Database file holding this market's categories and items
    pub fn database_file_name(&self) -> String {
        format!("{}_{}.db", self.kind.name(), self.region)
    }
}
