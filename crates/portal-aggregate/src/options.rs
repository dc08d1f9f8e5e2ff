//! Post-merge shaping of an aggregated collection.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use portal_types::{InstanceId, InstanceScoped};
use serde::{Deserialize, Serialize};

type Predicate<T> = dyn Fn(&T) -> bool + Send + Sync;
type Comparator<T> = dyn Fn(&T, &T) -> Ordering + Send + Sync;

/// Restricts instance-scoped items to one instance and/or a date window.
///
/// Both date bounds are inclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateFilter {
    #[serde(default)]
    pub instance: Option<InstanceId>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl AggregateFilter {
    pub fn instance(instance: impl Into<InstanceId>) -> Self {
        Self {
            instance: Some(instance.into()),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.instance.is_none() && self.from.is_none() && self.to.is_none()
    }

    pub fn matches<T: InstanceScoped>(&self, item: &T) -> bool {
        if let Some(instance) = &self.instance {
            if item.instance_id() != instance {
                return false;
            }
        }
        let date = item.date();
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Options for one `fetch_all` call.
pub struct FetchOptions<T> {
    filter: Option<Arc<Predicate<T>>>,
    comparator: Option<Arc<Comparator<T>>>,
    pub all_or_nothing: bool,
}

impl<T> FetchOptions<T> {
    /// Keep instance order, no filter, partial success allowed.
    pub fn new() -> Self {
        Self {
            filter: None,
            comparator: None,
            all_or_nothing: false,
        }
    }

    /// Keep only items matching `f`, applied after the merge.
    pub fn with_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(f));
        self
    }

    /// Stable-sort the merged items with `cmp` instead of instance order.
    pub fn sorted_by<F>(mut self, cmp: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(cmp));
        self
    }

    pub fn all_or_nothing(mut self, enabled: bool) -> Self {
        self.all_or_nothing = enabled;
        self
    }

    /// Filter, then sort, the merged collection in place.
    pub(crate) fn shape(&self, items: &mut Vec<T>) {
        if let Some(filter) = &self.filter {
            items.retain(|item| filter(item));
        }
        if let Some(cmp) = &self.comparator {
            items.sort_by(|a, b| cmp(a, b));
        }
    }
}

impl<T: InstanceScoped + 'static> FetchOptions<T> {
    /// Apply an [`AggregateFilter`]; an empty filter is a no-op.
    pub fn scoped(self, filter: AggregateFilter) -> Self {
        if filter.is_empty() {
            return self;
        }
        self.with_filter(move |item| filter.matches(item))
    }

    /// Most recent items first.
    pub fn newest_first(self) -> Self {
        self.sorted_by(|a, b| b.date().cmp(&a.date()))
    }
}

impl<T> Default for FetchOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FetchOptions<T> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            comparator: self.comparator.clone(),
            all_or_nothing: self.all_or_nothing,
        }
    }
}

impl<T> fmt::Debug for FetchOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("filter", &self.filter.is_some())
            .field("comparator", &self.comparator.is_some())
            .field("all_or_nothing", &self.all_or_nothing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        instance: InstanceId,
        date: NaiveDate,
    }

    impl InstanceScoped for Item {
        fn instance_id(&self) -> &InstanceId {
            &self.instance
        }

        fn date(&self) -> NaiveDate {
            self.date
        }
    }

    fn item(instance: &str, y: i32, m: u32, d: u32) -> Item {
        Item {
            instance: instance.into(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = AggregateFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&item("primary", 2024, 1, 31)));
    }

    #[test]
    fn instance_filter() {
        let filter = AggregateFilter::instance("primary");
        assert!(filter.matches(&item("primary", 2024, 1, 31)));
        assert!(!filter.matches(&item("post-primary", 2024, 1, 31)));
    }

    #[test]
    fn date_window_is_inclusive() {
        let filter = AggregateFilter::default().between(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        );
        assert!(filter.matches(&item("primary", 2024, 1, 1)));
        assert!(filter.matches(&item("primary", 2024, 3, 31)));
        assert!(!filter.matches(&item("primary", 2024, 4, 1)));
    }

    #[test]
    fn shape_filters_then_sorts() {
        let options = FetchOptions::new()
            .scoped(AggregateFilter::instance("primary"))
            .newest_first();
        let mut items = vec![
            item("primary", 2024, 1, 31),
            item("post-primary", 2024, 2, 29),
            item("primary", 2024, 3, 31),
        ];
        options.shape(&mut items);
        let dates: Vec<u32> = items.iter().map(|i| chrono::Datelike::month(&i.date)).collect();
        assert_eq!(dates, vec![3, 1]);
    }

    #[test]
    fn filter_deserializes_from_partial_json() {
        let filter: AggregateFilter =
            serde_json::from_str(r#"{"instance":"primary","from":"2024-01-01"}"#).unwrap();
        assert_eq!(filter.instance, Some(InstanceId::from("primary")));
        assert_eq!(filter.from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(filter.to.is_none());
    }
}
