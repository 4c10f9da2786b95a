//! Route builders for platform resources.
//!
//! Every resource follows one shape: a collection path that supports
//! `find` (with the shared option grammar), and per-item `get`, `update` and
//! `delete`. Sub-resources such as ACLs hang off an item via
//! [`ResourceRoute::child`].

use std::collections::BTreeMap;

use bon::Builder;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SdkError};

/// Options for collection queries.
///
/// # Example
/// ```
/// use baas_client::routes::FindOptions;
///
/// let options = FindOptions::builder()
///     .search_query("rust")
///     .page(2)
///     .rpp(25)
///     .build()
///     .with_filter("statuses", "published");
/// assert_eq!(options.query_pairs()[0], ("searchQuery".to_string(), "rust".to_string()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct FindOptions {
    #[builder(into)]
    pub search_query: Option<String>,
    pub page: Option<u32>,
    pub rpp: Option<u32>,
    #[builder(into)]
    pub sort: Option<String>,
    #[builder(into)]
    pub embed: Option<String>,
    #[builder(into)]
    pub fields: Option<String>,
    /// Resource-specific filters, appended after the common options.
    #[builder(default)]
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl FindOptions {
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Query parameters in wire order, skipping empty values.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        push_pair(&mut pairs, "searchQuery", self.search_query.as_deref());
        push_pair(&mut pairs, "page", self.page.map(|p| p.to_string()).as_deref());
        push_pair(&mut pairs, "rpp", self.rpp.map(|r| r.to_string()).as_deref());
        push_pair(&mut pairs, "sort", self.sort.as_deref());
        push_pair(&mut pairs, "embed", self.embed.as_deref());
        push_pair(&mut pairs, "fields", self.fields.as_deref());
        for (key, value) in &self.filters {
            push_pair(&mut pairs, key, Some(value));
        }
        pairs
    }
}

/// Options for single-item reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct GetOptions {
    #[builder(into)]
    pub embed: Option<String>,
    #[builder(into)]
    pub fields: Option<String>,
}

impl GetOptions {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        push_pair(&mut pairs, "embed", self.embed.as_deref());
        push_pair(&mut pairs, "fields", self.fields.as_deref());
        pairs
    }
}

fn push_pair(pairs: &mut Vec<(String, String)>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        pairs.push((key.to_string(), value.to_string()));
    }
}

/// URL builder for one resource collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoute {
    base_url: Url,
    segments: Vec<String>,
}

impl ResourceRoute {
    /// `path` is relative to `base_url`, e.g. `"article"` or `"lookups/roles"`.
    pub fn new(base_url: Url, path: &str) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(SdkError::InvalidArgument(format!(
                "base URL {base_url} cannot carry resource paths"
            )));
        }
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            return Err(SdkError::InvalidArgument("resource path is empty".to_string()));
        }
        Ok(Self { base_url, segments })
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn find(&self, options: &FindOptions) -> Url {
        with_query(self.url(&[]), options.query_pairs())
    }

    pub fn get(&self, id: &str, options: &GetOptions) -> Url {
        with_query(self.url(&[id]), options.query_pairs())
    }

    pub fn create(&self) -> Url {
        self.url(&[])
    }

    pub fn update(&self, id: &str) -> Url {
        self.url(&[id])
    }

    pub fn delete(&self, id: &str) -> Url {
        self.url(&[id])
    }

    pub fn batch(&self) -> Url {
        self.url(&["batch"])
    }

    /// Route for a sub-resource of one item, e.g. `child(id, "acl")`.
    pub fn child(&self, id: &str, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(id.to_string());
        segments.extend(
            segment
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self {
            base_url: self.base_url.clone(),
            segments,
        }
    }

    fn url(&self, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(&self.segments).extend(extra);
        }
        url
    }
}

fn with_query(mut url: Url, pairs: Vec<(String, String)>) -> Url {
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    url
}
