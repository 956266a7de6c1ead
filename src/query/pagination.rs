use serde::Serialize;

/// A 1-indexed page of `limit` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub limit: u64,
}

impl PageWindow {
    /// Build a window from raw `page`/`limit` parameters. Anything that is
    /// not a positive integer falls back to the defaults. `limit` is only
    /// capped when a `max_limit` is configured.
    pub fn from_params(
        page: Option<&str>,
        limit: Option<&str>,
        default_limit: u64,
        max_limit: Option<u64>,
    ) -> Self {
        let page = parse_positive(page).unwrap_or(1);
        let limit = parse_positive(limit).unwrap_or(default_limit);
        let limit = max_limit.map_or(limit, |max| limit.min(max)).max(1);
        Self { page, limit }
    }

    /// Records to skip before the page starts.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Cut this window out of an already ordered result set.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip()).unwrap_or(usize::MAX);
        let take = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(take).collect()
    }

    /// Links to the neighbouring pages given `total` matching records.
    pub fn pagination(&self, total: u64) -> Pagination {
        let skip = self.skip();
        let next = (skip.saturating_add(self.limit) < total).then(|| PageRef {
            page: self.page + 1,
            limit: self.limit,
        });
        let prev = (skip > 0).then(|| PageRef {
            page: self.page - 1,
            limit: self.limit,
        });
        Pagination { next, prev }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(page: &str, limit: &str) -> PageWindow {
        PageWindow::from_params(Some(page), Some(limit), 10, None)
    }

    #[test]
    fn defaults_apply_when_absent() {
        let w = PageWindow::from_params(None, None, 10, None);
        assert_eq!(w, PageWindow { page: 1, limit: 10 });
        assert_eq!(w.skip(), 0);
    }

    #[test]
    fn skip_is_previous_pages_times_limit() {
        for (page, limit) in [(1, 1), (2, 5), (3, 10), (7, 25)] {
            let w = window(&page.to_string(), &limit.to_string());
            assert_eq!(w.skip(), (page - 1) * limit);
        }
    }

    #[test]
    fn non_numeric_and_non_positive_fall_back() {
        assert_eq!(window("abc", "ten"), PageWindow { page: 1, limit: 10 });
        assert_eq!(window("0", "0"), PageWindow { page: 1, limit: 10 });
        assert_eq!(window("-2", "-5"), PageWindow { page: 1, limit: 10 });
        assert_eq!(window("2.5", "5"), PageWindow { page: 1, limit: 5 });
    }

    #[test]
    fn large_limit_is_taken_as_given() {
        let w = window("2", "150");
        assert_eq!(w, PageWindow { page: 2, limit: 150 });
        assert_eq!(w.skip(), 150);

        let items: Vec<u32> = (0..250).collect();
        assert_eq!(w.slice(items), (150..250).collect::<Vec<_>>());
        assert_eq!(
            w.pagination(250),
            Pagination {
                next: None,
                prev: Some(PageRef { page: 1, limit: 150 }),
            }
        );
    }

    #[test]
    fn configured_ceiling_caps_limit() {
        let w = PageWindow::from_params(Some("1"), Some("5000"), 10, Some(100));
        assert_eq!(w.limit, 100);
    }

    #[test]
    fn slice_never_exceeds_limit() {
        let items: Vec<u32> = (0..23).collect();
        assert_eq!(window("1", "10").slice(items.clone()), (0..10).collect::<Vec<_>>());
        assert_eq!(window("3", "10").slice(items.clone()), vec![20, 21, 22]);
        assert!(window("4", "10").slice(items).is_empty());
    }

    #[test]
    fn next_iff_more_records_remain() {
        let first = window("1", "10");
        assert_eq!(
            first.pagination(25),
            Pagination {
                next: Some(PageRef { page: 2, limit: 10 }),
                prev: None,
            }
        );
        assert_eq!(first.pagination(10), Pagination::default());

        let last = window("3", "10");
        assert_eq!(
            last.pagination(25),
            Pagination {
                next: None,
                prev: Some(PageRef { page: 2, limit: 10 }),
            }
        );
    }

    #[test]
    fn empty_pagination_serializes_as_empty_object() {
        let json = serde_json::to_value(Pagination::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
