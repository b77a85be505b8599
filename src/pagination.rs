use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::endpoint::EndpointDescriptor;
use crate::request::HttpRequest;
use crate::response::ResponsePlan;
use crate::schema::{SchemaKind, SchemaNode};

pub const LIMIT_PARAM: &str = "limit";
pub const OFFSET_PARAM: &str = "offset";
pub const DEFAULT_PAGE_SIZE: u64 = 100;
const HAS_MORE_NAMES: [&str; 5] = ["has_more", "hasMore", "has_next", "hasNext", "more"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationPlan {
    pub limit_param: String,
    pub offset_param: String,
    pub page_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_more_property: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// `None` when the response carries no has-more marker.
    pub has_more: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationInput<'a> {
    pub endpoint: &'a EndpointDescriptor,
    pub hidden: bool,
    pub response: &'a ResponsePlan,
    pub body_schema: Option<&'a SchemaNode>,
    pub configured_limit: Option<&'a Value>,
    pub configured_has_more: Option<&'a str>,
}

pub fn plan(input: PaginationInput<'_>) -> Option<PaginationPlan> {
    if input.hidden {
        return None;
    }
    let limit = input.endpoint.query_param(LIMIT_PARAM)?;
    input.endpoint.query_param(OFFSET_PARAM)?;

    let has_more_property = input
        .configured_has_more
        .map(str::to_string)
        .or_else(|| input.body_schema.and_then(detect_has_more));

    if has_more_property.is_none() && !input.response.is_array_bearing() {
        debug!(
            endpoint = %input.endpoint.reference(),
            "limit/offset present but no has-more marker or array property"
        );
        return None;
    }

    let page_size = input
        .configured_limit
        .and_then(as_page_size)
        .or_else(|| {
            limit
                .schema
                .as_ref()
                .and_then(|s| s.default.as_ref())
                .and_then(as_page_size)
        })
        .unwrap_or(DEFAULT_PAGE_SIZE);

    Some(PaginationPlan {
        limit_param: LIMIT_PARAM.to_string(),
        offset_param: OFFSET_PARAM.to_string(),
        page_size,
        has_more_property,
    })
}

fn detect_has_more(schema: &SchemaNode) -> Option<String> {
    HAS_MORE_NAMES
        .iter()
        .find(|name| {
            schema
                .property(name)
                .is_some_and(|p| p.kind == SchemaKind::Boolean)
        })
        .map(|name| (*name).to_string())
}

fn as_page_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|size| *size > 0)
}

impl PaginationPlan {
    pub fn is_pagination_param(&self, name: &str) -> bool {
        name == self.limit_param || name == self.offset_param
    }

    pub fn page_request(&self, base: &HttpRequest, offset: u64) -> HttpRequest {
        let mut request = base.clone();
        request.set_query(&self.limit_param, self.page_size.to_string());
        request.set_query(&self.offset_param, offset.to_string());
        request
    }

    pub fn read_page(&self, response: &ResponsePlan, body: Value) -> Page {
        let has_more = self
            .has_more_property
            .as_ref()
            .and_then(|property| body.get(property))
            .and_then(Value::as_bool);
        let items = match response.apply(Some(body)) {
            Value::Array(items) => items,
            other => vec![other],
        };
        Page { items, has_more }
    }

    /// `fetch` receives `(offset, limit)`. The loop stops on an empty page, or
    /// once the server reports no more pages and the page came back short.
    pub fn paginate<F, E>(&self, mut fetch: F) -> Result<Vec<Value>, E>
    where
        F: FnMut(u64, u64) -> Result<Page, E>,
    {
        let limit = self.page_size;
        let mut offset = 0;
        let mut items = Vec::new();

        loop {
            let page = fetch(offset, limit)?;
            let received = page.items.len() as u64;
            items.extend(page.items);

            let exhausted = !page.has_more.unwrap_or(false);
            if received == 0 || (exhausted && received < limit) {
                break;
            }
            offset += limit;
        }

        Ok(items)
    }
}
