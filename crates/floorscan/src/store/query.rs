//! Query filters and pagination.

use serde::{Deserialize, Serialize};

use crate::object::{Criticality, InfraObject, ObjectStatus, PlanId};

/// Default page size.
pub const DEFAULT_PER_PAGE: usize = 50;

/// Filters for listing objects. All set filters must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectQuery {
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    #[serde(default)]
    pub status: Option<ObjectStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "type")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub criticality: Option<Criticality>,
    #[serde(default)]
    pub requires_review: Option<bool>,
    /// Inclusive lower bound. Objects without confidence never match a range.
    #[serde(default)]
    pub min_confidence: Option<f64>,
    /// Inclusive upper bound.
    #[serde(default)]
    pub max_confidence: Option<f64>,
    /// Case-insensitive substring over name and description.
    #[serde(default)]
    pub search: Option<String>,
    /// Include soft-deleted and inactive records.
    #[serde(default)]
    pub include_deleted: bool,
    /// 1-based page number.
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl ObjectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_plan(plan_id: impl Into<PlanId>) -> Self {
        Self {
            plan_id: Some(plan_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ObjectStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_kind(
        mut self,
        category: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        self.category = Some(category.into());
        self.object_type = Some(object_type.into());
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = Some(criticality);
        self
    }

    pub fn with_requires_review(mut self, requires_review: bool) -> Self {
        self.requires_review = Some(requires_review);
        self
    }

    pub fn with_confidence_range(mut self, min: f64, max: f64) -> Self {
        self.min_confidence = Some(min);
        self.max_confidence = Some(max);
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn with_page(mut self, page: usize, per_page: usize) -> Self {
        self.page = Some(page);
        self.per_page = Some(per_page);
        self
    }

    /// Whether an object (already known to be in the right tenant) matches.
    pub fn matches(&self, object: &InfraObject) -> bool {
        if !self.include_deleted && !object.is_listed() {
            return false;
        }
        if self.plan_id.as_ref().is_some_and(|p| p != &object.plan_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != object.status) {
            return false;
        }
        if self.category.as_deref().is_some_and(|c| c != object.category) {
            return false;
        }
        if self
            .object_type
            .as_deref()
            .is_some_and(|t| t != object.object_type)
        {
            return false;
        }
        if self.criticality.is_some_and(|c| c != object.criticality) {
            return false;
        }
        if self
            .requires_review
            .is_some_and(|r| r != object.requires_review)
        {
            return false;
        }
        if self.min_confidence.is_some() || self.max_confidence.is_some() {
            let Some(confidence) = object.confidence else {
                return false;
            };
            if self.min_confidence.is_some_and(|min| confidence < min) {
                return false;
            }
            if self.max_confidence.is_some_and(|max| confidence > max) {
                return false;
            }
        }
        if let Some(ref search) = self.search {
            if !search.trim().is_empty() && !object.matches_text(search.trim()) {
                return false;
            }
        }
        true
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    /// Slice an already ordered result set.
    pub fn paginate(all: Vec<T>, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Self {
            items,
            total,
            page,
            per_page,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.per_page.max(1))
    }
}
