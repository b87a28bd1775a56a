use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::Object;

/// Page size applied when a configuration does not set one.
pub const DEFAULT_LIMIT: u64 = 10;

/// Key names and page size for offset/limit pagination.
///
/// Backends disagree on what the window fields are called (`offset`/`limit`,
/// `skip`/`take`, ...), so the keys are configurable; the values end up as
/// ordinary fields inside [`Filters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOptions {
    pub limit: u64,
    pub offset_key: String,
    pub limit_key: String,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset_key: "offset".into(),
            limit_key: "limit".into(),
        }
    }
}

impl PaginationOptions {
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// Search criteria plus the pagination window, stored under the configured
/// key names.
///
/// This is the single source of truth for the window: [`PaginationView`]
/// is always recomputed from the offset and limit held here, never stored
/// separately.
#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    criteria: Object,
    offset_key: String,
    limit_key: String,
}

impl Filters {
    pub(crate) fn new(options: &PaginationOptions) -> Self {
        let mut filters = Self {
            criteria: Object::new(),
            offset_key: options.offset_key.clone(),
            limit_key: options.limit_key.clone(),
        };
        filters.set_offset(0);
        filters.set_limit(options.limit);
        filters
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.criteria.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.criteria.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.criteria.remove(key)
    }

    /// Shallow-merges `patch` into the criteria; existing keys are
    /// overwritten, nested objects are replaced whole.
    pub fn merge(&mut self, patch: &Object) {
        for (key, value) in patch {
            self.criteria.insert(key.clone(), value.clone());
        }
    }

    /// The window start. Missing or non-numeric values read as zero.
    pub fn offset(&self) -> u64 {
        self.criteria
            .get(&self.offset_key)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// The window size. Missing or non-numeric values read as
    /// [`DEFAULT_LIMIT`].
    pub fn limit(&self) -> u64 {
        self.criteria
            .get(&self.limit_key)
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_LIMIT)
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.criteria
            .insert(self.offset_key.clone(), Value::from(offset));
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.criteria
            .insert(self.limit_key.clone(), Value::from(limit));
    }

    /// All fields, criteria and window alike, as one flat object.
    pub fn as_object(&self) -> &Object {
        &self.criteria
    }
}

impl Serialize for Filters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.criteria.serialize(serializer)
    }
}

/// Read-only pagination summary derived from the current window and the
/// last reported total. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationView {
    pub offset: u64,
    pub limit: u64,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationView {
    /// Derives the view from a window and a total count.
    ///
    /// ```
    /// use fetchstate::PaginationView;
    ///
    /// let view = PaginationView::compute(20, 10, 23);
    /// assert_eq!(view.current_page, 3);
    /// assert_eq!(view.total_pages, 3);
    /// assert!(!view.has_next_page);
    /// assert!(view.has_previous_page);
    /// ```
    pub fn compute(offset: u64, limit: u64, total_items: u64) -> Self {
        // A zero limit can only arrive through merged criteria; treat it
        // as one item per page rather than divide by zero.
        let limit = limit.max(1);
        let current_page = offset / limit + 1;
        let total_pages = total_items.div_ceil(limit);
        Self {
            offset,
            limit,
            current_page,
            total_pages,
            total_items,
            has_next_page: current_page < total_pages,
            has_previous_page: current_page > 1,
        }
    }
}

/// One page (or contiguous block) of results together with the backend's
/// total matching count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet<T> {
    pub count: u64,
    pub results: Vec<T>,
}

impl<T> ResultSet<T> {
    pub fn new(count: u64, results: Vec<T>) -> Self {
        Self { count, results }
    }

    pub fn empty() -> Self {
        Self {
            count: 0,
            results: Vec::new(),
        }
    }
}
