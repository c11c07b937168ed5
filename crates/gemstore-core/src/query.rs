//! Query builder: turns listing parameters into store queries.
//!
//! A [`Query`] is the store-level description of a read: a collection,
//! a conjunction of [`Filter`]s, an ordering, and an offset/limit window.
//! [`ListPolicy`] describes which query-string options an entity listing
//! recognizes; [`ListPolicy::build`] applies them in a fixed order:
//!
//! 1. string equality filters (e.g. `category`, `treatment`, `status`)
//! 2. boolean equality filters (`inStock`, `isActive`; `"true"` → true,
//!    anything else → false)
//! 3. the price range (`minPrice` → `price >= v`, `maxPrice` → `price <= v`)
//! 4. ordering: `sortBy=field:direction`, else the entity default
//! 5. pagination, when enabled for the entity
//!
//! Field names in `sortBy` are not checked against a schema; the store
//! rejects paths it cannot address with [`Error::Query`].
//!
//! Prefix search is built separately by [`Query::prefix_search`] and never
//! combined with the listing filters.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::document::{compare_values, lookup, same_kind, validate_field_path, Fields};
use crate::error::{Error, Result};

/// Upper bound appended to a prefix to form a lexicographic range.
pub const PREFIX_SUFFIX: char = '\u{f8ff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

impl FilterOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gte => ">=",
            FilterOp::Lte => "<=",
        }
    }
}

/// A single `field op value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FilterOp::Lte,
            value: value.into(),
        }
    }

    /// Document-store match semantics: a missing field never matches, and
    /// range operators only compare values of the same kind.
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = lookup(fields, &self.field) else {
            return false;
        };
        if !same_kind(actual, &self.value) {
            return false;
        }
        let ord = compare_values(actual, &self.value);
        match self.op {
            FilterOp::Eq => ord.is_eq(),
            FilterOp::Gte => ord.is_ge(),
            FilterOp::Lte => ord.is_le(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// `"desc"` is descending; anything else, including nothing, is ascending.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("desc") => Direction::Desc,
            _ => Direction::Asc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    /// Parses `field:direction`.
    pub fn parse(spec: &str) -> Self {
        let mut parts = spec.split(':');
        let field = parts.next().unwrap_or_default().to_string();
        Self {
            field,
            direction: Direction::parse(parts.next()),
        }
    }
}

/// A read against one collection.
///
/// Results are ordered by `order_by` and then by document ID ascending, so
/// pagination windows are stable. Ordering on a field excludes documents
/// that lack it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
            order_by: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Lexicographic "starts with" over `field`: `field >= q` and
    /// `field <= q + U+F8FF`. Case-sensitive.
    pub fn prefix_search(collection: &str, field: &str, q: &str) -> Self {
        let upper = format!("{}{}", q, PREFIX_SUFFIX);
        Self::collection(collection)
            .filter(Filter::gte(field, q))
            .filter(Filter::lte(field, upper))
    }

    /// Checks every field path the query references.
    pub fn validate(&self) -> Result<()> {
        for f in &self.filters {
            validate_field_path(&f.field)?;
        }
        for o in &self.order_by {
            validate_field_path(&o.field)?;
        }
        Ok(())
    }
}

/// Raw query-string parameters of a listing request.
#[derive(Debug, Clone, Default)]
pub struct ListParams(HashMap<String, String>);

impl ListParams {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    /// Returns a parameter, treating an empty value as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl From<HashMap<String, String>> for ListParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self(params)
    }
}

/// Pagination settings for one entity listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub enabled: bool,
    pub default_limit: usize,
}

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Page {
    /// Parses `page` (default 1) and `limit` (default `default_limit`).
    /// Missing, unparsable, and non-positive values fall back to the default.
    pub fn from_params(params: &ListParams, default_limit: usize) -> Self {
        let positive = |key: &str| {
            params
                .get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v > 0)
                .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
        };
        Self {
            page: positive("page").unwrap_or(1),
            limit: positive("limit").unwrap_or(default_limit.max(1)),
        }
    }

    /// Zero-based offset of the first item. Saturates for page numbers
    /// past the addressable range, which then yield an empty window.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn info(&self, total: usize) -> PageInfo {
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            pages: total.div_ceil(self.limit),
        }
    }

    /// Applies the window to an already ordered result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit)
            .collect()
    }
}

/// Pagination block of a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

/// Which listing options an entity recognizes.
#[derive(Debug, Clone, Copy)]
pub struct ListPolicy {
    /// Parameters applied as string equality filters, in this order.
    pub equality: &'static [&'static str],
    /// Parameters applied as boolean equality filters.
    pub boolean: &'static [&'static str],
    /// Whether `minPrice`/`maxPrice` apply to the `price` field.
    pub price_range: bool,
    /// Whether `sortBy` is honoured.
    pub sortable: bool,
    /// Ordering used when `sortBy` is absent.
    pub default_order: Option<(&'static str, Direction)>,
}

/// Output of [`ListPolicy::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    /// Filtered, ordered query with no window applied.
    pub query: Query,
    /// Requested page, when pagination is enabled.
    pub page: Option<Page>,
}

impl ListQuery {
    /// The query with the page window applied, if any.
    pub fn windowed(&self) -> Query {
        match self.page {
            Some(page) => self
                .query
                .clone()
                .offset(page.offset())
                .limit(page.limit),
            None => self.query.clone(),
        }
    }
}

impl ListPolicy {
    pub fn build(&self, collection: &str, params: &ListParams, paging: Paging) -> Result<ListQuery> {
        let mut query = Query::collection(collection);

        for field in self.equality {
            if let Some(v) = params.get(field) {
                query = query.filter(Filter::eq(field, v));
            }
        }
        for field in self.boolean {
            if let Some(v) = params.get(field) {
                query = query.filter(Filter::eq(field, v == "true"));
            }
        }
        if self.price_range {
            if let Some(min) = parse_price(params, "minPrice")? {
                query = query.filter(Filter::gte("price", min));
            }
            if let Some(max) = parse_price(params, "maxPrice")? {
                query = query.filter(Filter::lte("price", max));
            }
        }

        match params.get("sortBy").filter(|_| self.sortable) {
            Some(spec) => {
                let order = OrderBy::parse(spec);
                query = query.order_by(&order.field, order.direction);
            }
            None => {
                if let Some((field, direction)) = self.default_order {
                    query = query.order_by(field, direction);
                }
            }
        }

        let page = paging
            .enabled
            .then(|| Page::from_params(params, paging.default_limit));

        Ok(ListQuery { query, page })
    }
}

fn parse_price(params: &ListParams, key: &str) -> Result<Option<f64>> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| Error::invalid(format!("{} must be a number", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GEMS: ListPolicy = ListPolicy {
        equality: &["category", "treatment"],
        boolean: &["inStock"],
        price_range: true,
        sortable: true,
        default_order: Some(("createdAt", Direction::Desc)),
    };

    const OFF: Paging = Paging {
        enabled: false,
        default_limit: 10,
    };

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_default_order_newest_first() {
        let lq = GEMS.build("gems", &ListParams::default(), OFF).unwrap();
        assert!(lq.query.filters.is_empty());
        assert_eq!(
            lq.query.order_by,
            vec![OrderBy {
                field: "createdAt".into(),
                direction: Direction::Desc
            }]
        );
        assert!(lq.page.is_none());
    }

    #[test]
    fn test_filters_applied_in_fixed_order() {
        let params = ListParams::default()
            .with("maxPrice", "900")
            .with("inStock", "true")
            .with("category", "Sapphire")
            .with("minPrice", "100")
            .with("treatment", "Heated");
        let lq = GEMS.build("gems", &params, OFF).unwrap();
        assert_eq!(
            lq.query.filters,
            vec![
                Filter::eq("category", "Sapphire"),
                Filter::eq("treatment", "Heated"),
                Filter::eq("inStock", true),
                Filter::gte("price", 100.0),
                Filter::lte("price", 900.0),
            ]
        );
    }

    #[test]
    fn test_in_stock_non_true_is_false() {
        let params = ListParams::default().with("inStock", "yes");
        let lq = GEMS.build("gems", &params, OFF).unwrap();
        assert_eq!(lq.query.filters, vec![Filter::eq("inStock", false)]);
    }

    #[test]
    fn test_inverted_price_range_is_accepted() {
        let params = ListParams::default()
            .with("minPrice", "900")
            .with("maxPrice", "100");
        let lq = GEMS.build("gems", &params, OFF).unwrap();
        assert_eq!(lq.query.filters.len(), 2);
    }

    #[test]
    fn test_non_numeric_price_is_validation_error() {
        let params = ListParams::default().with("minPrice", "cheap");
        let err = GEMS.build("gems", &params, OFF).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_sort_by_parsing() {
        assert_eq!(
            OrderBy::parse("price:desc"),
            OrderBy {
                field: "price".into(),
                direction: Direction::Desc
            }
        );
        assert_eq!(OrderBy::parse("price").direction, Direction::Asc);
        assert_eq!(OrderBy::parse("price:sideways").direction, Direction::Asc);
    }

    #[test]
    fn test_sort_by_overrides_default() {
        let params = ListParams::default().with("sortBy", "price:asc");
        let lq = GEMS.build("gems", &params, OFF).unwrap();
        assert_eq!(lq.query.order_by.len(), 1);
        assert_eq!(lq.query.order_by[0].field, "price");
    }

    #[test]
    fn test_unknown_sort_field_passes_through_until_validation() {
        let params = ListParams::default().with("sortBy", "not a field:desc");
        let lq = GEMS.build("gems", &params, OFF).unwrap();
        assert!(matches!(lq.query.validate(), Err(Error::Query(_))));
    }

    #[test]
    fn test_pagination_defaults_and_offset() {
        let paging = Paging {
            enabled: true,
            default_limit: 10,
        };
        let lq = GEMS.build("gems", &ListParams::default(), paging).unwrap();
        assert_eq!(lq.page, Some(Page { page: 1, limit: 10 }));

        let params = ListParams::default().with("page", "3").with("limit", "5");
        let lq = GEMS.build("gems", &params, paging).unwrap();
        let windowed = lq.windowed();
        assert_eq!(windowed.offset, 10);
        assert_eq!(windowed.limit, Some(5));
    }

    #[test]
    fn test_bad_page_values_fall_back() {
        let params = ListParams::default().with("page", "0").with("limit", "-4");
        assert_eq!(Page::from_params(&params, 10), Page { page: 1, limit: 10 });
        let params = ListParams::default().with("page", "two");
        assert_eq!(Page::from_params(&params, 10).page, 1);
    }

    #[test]
    fn test_huge_page_saturates_offset() {
        let params = ListParams::default()
            .with("page", "9223372036854775807")
            .with("limit", "10");
        let page = Page::from_params(&params, 10);
        assert_eq!(page.offset(), usize::MAX);
        assert!(page.slice(vec![1, 2, 3]).is_empty());
        assert_eq!(page.info(3).pages, 1);
    }

    #[test]
    fn test_page_info_rounds_up() {
        let page = Page { page: 1, limit: 10 };
        assert_eq!(page.info(21).pages, 3);
        assert_eq!(page.info(0).pages, 0);
    }

    #[test]
    fn test_prefix_search_range() {
        let q = Query::prefix_search("gems", "name", "Blue");
        let hit = fields(json!({"name": "Blue Sapphire"}));
        let miss = fields(json!({"name": "blue topaz"}));
        let exact = fields(json!({"name": "Blue"}));
        let matches = |f: &Fields| q.filters.iter().all(|flt| flt.matches(f));
        assert!(matches(&hit));
        assert!(matches(&exact));
        assert!(!matches(&miss));
    }

    #[test]
    fn test_filter_missing_field_never_matches() {
        let f = Filter::eq("category", "Ruby");
        assert!(!f.matches(&fields(json!({"name": "x"}))));
    }

    #[test]
    fn test_range_filter_ignores_other_kinds() {
        let f = Filter::gte("price", 10.0);
        assert!(f.matches(&fields(json!({"price": 10}))));
        assert!(!f.matches(&fields(json!({"price": "500"}))));
    }
}
