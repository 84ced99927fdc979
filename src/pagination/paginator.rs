//! Paginator implementation

use super::types::{ApiRoots, NextPage, PageLocators, PageRequest, PageResult};
use crate::error::{Error, Result};
use crate::http::{Fetched, HttpClient};
use crate::stream::{ExtractionContext, StreamDescriptor};
use crate::template;
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use jsonpath_rust::JsonPath;
use std::sync::Arc;
use tracing::debug;

/// Issues page requests for one stream and context
#[derive(Debug, Clone)]
pub struct Paginator {
    client: Arc<HttpClient>,
    roots: Arc<ApiRoots>,
    locators: Arc<PageLocators>,
}

impl Paginator {
    /// Create a paginator with the default locators
    pub fn new(client: Arc<HttpClient>, roots: ApiRoots) -> Self {
        Self {
            client,
            roots: Arc::new(roots),
            locators: Arc::new(PageLocators::default()),
        }
    }

    /// Override where records and tokens are found
    #[must_use]
    pub fn with_locators(mut self, locators: PageLocators) -> Self {
        self.locators = Arc::new(locators);
        self
    }

    /// Shared HTTP client
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// API roots
    pub fn roots(&self) -> &ApiRoots {
        &self.roots
    }

    /// Lazily fetch every record of `descriptor` under `context`
    ///
    /// `floor` is the incremental lower bound (bookmark or start date). It
    /// only becomes a `$filter` clause when the descriptor has a
    /// replication key.
    pub fn fetch_all(
        &self,
        descriptor: &StreamDescriptor,
        context: &ExtractionContext,
        floor: Option<&str>,
    ) -> BoxStream<'static, Result<JsonObject>> {
        let first = match self.first_request(descriptor, context, floor) {
            Ok(request) => request,
            Err(e) => return stream::once(async { Err(e) }).boxed(),
        };

        let this = self.clone();
        stream::try_unfold(Some(first), move |pending| {
            let this = this.clone();
            async move { this.advance(pending).await }
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, Error>)))
        .try_flatten()
        .boxed()
    }

    /// One unfold step: fetch the pending page and compute the next request
    async fn advance(
        &self,
        pending: Option<PageRequest>,
    ) -> Result<Option<(Vec<JsonObject>, Option<PageRequest>)>> {
        let Some(request) = pending else {
            return Ok(None);
        };
        let page = self.fetch_page(&request).await?;
        let next = page
            .next
            .map(|next| request.next(next, &self.locators.page_param));
        Ok(Some((page.records, next)))
    }

    /// Build the request for the first page
    ///
    /// The context is substituted into the path and the static filter before
    /// the incremental clause is appended.
    pub fn first_request(
        &self,
        descriptor: &StreamDescriptor,
        context: &ExtractionContext,
        floor: Option<&str>,
    ) -> Result<PageRequest> {
        let path = template::render(&descriptor.path, context)?;
        let mut request = PageRequest::new(self.roots.join(descriptor.root, &path));

        let mut clauses = Vec::new();
        if let Some(filter) = &descriptor.filter {
            clauses.push(template::render(filter, context)?);
        }
        if let (Some(key), Some(floor)) = (&descriptor.replication_key, floor) {
            clauses.push(format!("{key} gt {}", format_filter_instant(floor)));
        }
        if !clauses.is_empty() {
            request = request.with_query("$filter", clauses.join(" and "));
        }
        if let Some(expand) = &descriptor.expand {
            request = request.with_query("$expand", expand.clone());
        }

        Ok(request)
    }

    /// Fetch and decode one page
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult> {
        debug!(url = %request.url, query = ?request.query, "Fetching page");
        match self.client.fetch(&request.url, &request.query).await? {
            Fetched::NotFound => Ok(PageResult::empty()),
            Fetched::Body(body) => extract_page(&request.url, &body, &self.locators),
        }
    }
}

/// Pull records and the continuation out of a payload
pub fn extract_page(url: &str, body: &JsonValue, locators: &PageLocators) -> Result<PageResult> {
    // A trailing `[*]` selects the elements; the array itself is resolved
    // first so a missing field and a non-array stay distinguishable.
    let container = locators
        .records_path
        .strip_suffix("[*]")
        .unwrap_or(&locators.records_path);

    let records = match find_all(body, container)?.into_iter().next() {
        Some(JsonValue::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                JsonValue::Object(obj) => Ok(obj),
                other => Err(Error::malformed(
                    url,
                    format!("record is not an object: {other}"),
                )),
            })
            .collect::<Result<Vec<_>>>()?,
        Some(other) => {
            return Err(Error::malformed(
                url,
                format!(
                    "'{}' is not an array (found {})",
                    locators.records_path,
                    json_kind(&other)
                ),
            ))
        }
        None => {
            return Err(Error::malformed(
                url,
                format!("payload has no '{}'", locators.records_path),
            ))
        }
    };

    let next = first_match(body, &locators.token_path)?
        .and_then(|token| match token {
            JsonValue::String(s) => NextPage::parse(&s),
            JsonValue::Number(n) => NextPage::parse(&n.to_string()),
            _ => None,
        });

    Ok(PageResult { records, next })
}

/// Render an incremental floor as an OData UTC literal
///
/// RFC 3339 values are normalized to `%Y-%m-%dT%H:%M:%SZ`; anything else is
/// passed through.
pub fn format_filter_instant(value: &str) -> String {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| {
            dt.with_timezone(&Utc)
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string()
        })
        .unwrap_or_else(|_| value.to_string())
}

/// Every value matched by a JSONPath expression, in document order
fn find_all(value: &JsonValue, path: &str) -> Result<Vec<JsonValue>> {
    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::config(format!("Invalid JSONPath '{path}': {e}")))?;

    Ok(match jp.find(value) {
        JsonValue::Array(matches) => matches,
        JsonValue::Null => vec![],
        other => vec![other],
    })
}

/// First non-null value matched by a JSONPath expression
fn first_match(value: &JsonValue, path: &str) -> Result<Option<JsonValue>> {
    Ok(find_all(value, path)?.into_iter().find(|v| !v.is_null()))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
