//! Pagination types
//!
//! Page requests, page results and the locator rules shared by every stream.

use crate::config::TapConfig;
use crate::stream::ApiRoot;
use crate::types::JsonObject;

/// Resolved API roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoots {
    /// Standard REST API root
    pub standard: String,
    /// Reports-finance beta root
    pub reports_finance: String,
    /// OData web-services root
    pub odata: String,
}

impl ApiRoots {
    /// Resolve every root from the configuration
    pub fn from_config(config: &TapConfig) -> Self {
        Self {
            standard: config.api_root(ApiRoot::Standard),
            reports_finance: config.api_root(ApiRoot::ReportsFinance),
            odata: config.api_root(ApiRoot::OData),
        }
    }

    /// Use one root for everything (local servers and mocks)
    pub fn uniform(root: impl Into<String>) -> Self {
        let root = root.into().trim_end_matches('/').to_string();
        Self {
            standard: root.clone(),
            reports_finance: root.clone(),
            odata: root,
        }
    }

    /// Root for a descriptor
    pub fn get(&self, root: ApiRoot) -> &str {
        match root {
            ApiRoot::Standard => &self.standard,
            ApiRoot::ReportsFinance => &self.reports_finance,
            ApiRoot::OData => &self.odata,
        }
    }

    /// Join a rendered path onto a root
    pub fn join(&self, root: ApiRoot, path: &str) -> String {
        format!("{}/{}", self.get(root), path.trim_start_matches('/'))
    }
}

/// Where records and continuation tokens live in a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocators {
    /// JSONPath of the records, e.g. `$.value[*]`, or of the array holding them
    pub records_path: String,
    /// JSONPath of the continuation token, e.g. `$.next_page`
    pub token_path: String,
    /// Query parameter carrying the continuation token
    pub page_param: String,
}

impl Default for PageLocators {
    fn default() -> Self {
        Self {
            records_path: "$.value[*]".to_string(),
            token_path: "$.next_page".to_string(),
            page_param: "page".to_string(),
        }
    }
}

/// Continuation extracted from a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Opaque token sent back as the page parameter
    Token(String),
    /// Absolute URL carrying its own query
    Url(String),
}

impl NextPage {
    /// Interpret a raw continuation value
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            Some(Self::Url(raw.to_string()))
        } else {
            Some(Self::Token(raw.to_string()))
        }
    }
}

/// One page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Absolute URL
    pub url: String,
    /// Query parameters in send order
    pub query: Vec<(String, String)>,
}

impl PageRequest {
    /// Create a request without query parameters
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
        }
    }

    /// Append a query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Look up a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Request for the page after this one
    ///
    /// A token replaces the page parameter and keeps every other parameter.
    /// A URL is followed verbatim.
    #[must_use]
    pub fn next(&self, next: NextPage, page_param: &str) -> Self {
        match next {
            NextPage::Url(url) => Self::new(url),
            NextPage::Token(token) => {
                let mut query: Vec<_> = self
                    .query
                    .iter()
                    .filter(|(k, _)| k != page_param)
                    .cloned()
                    .collect();
                query.push((page_param.to_string(), token));
                Self {
                    url: self.url.clone(),
                    query,
                }
            }
        }
    }
}

/// One fetched page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    /// Records in payload order
    pub records: Vec<JsonObject>,
    /// Continuation, absent on the last page
    pub next: Option<NextPage>,
}

impl PageResult {
    /// Terminal empty page (404)
    pub fn empty() -> Self {
        Self::default()
    }
}
