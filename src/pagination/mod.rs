use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// `ceil(total_count / page_size)`, never less than one page.
pub fn total_pages(total_count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    total_count.div_ceil(page_size).max(1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub page_size: usize,
}

impl Pagination {
    pub fn new(current_page: usize, total_pages: usize, total_count: usize, page_size: usize) -> Self {
        Self {
            current_page: current_page.max(1),
            total_pages: total_pages.max(1),
            total_count,
            page_size,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Target of a "go to page" click, or `None` when the click is a no-op.
    pub fn go_to(&self, page: usize) -> Option<usize> {
        if page < 1 || page > self.total_pages || page == self.current_page {
            return None;
        }
        Some(page)
    }

    pub fn previous(&self) -> Option<usize> {
        self.go_to(self.current_page.saturating_sub(1))
    }

    pub fn next(&self) -> Option<usize> {
        self.go_to(self.current_page + 1)
    }

    pub fn is_visible(&self) -> bool {
        self.total_count > 0
    }

    /// Nothing to navigate: the control renders without active buttons.
    pub fn is_inert(&self) -> bool {
        !self.is_visible() || self.total_pages <= 1
    }

    /// 1-based `(first, last)` item numbers shown on the current page.
    pub fn item_range(&self, items_on_page: usize) -> Option<(usize, usize)> {
        if items_on_page == 0 || self.total_count == 0 {
            return None;
        }
        let first = (self.current_page - 1) * self.page_size + 1;
        let last = (first + items_on_page - 1).min(self.total_count.max(items_on_page));
        Some((first, last))
    }

    /// Page numbers to render, `None` marking an elided gap.
    pub fn pages(&self) -> Vec<Option<usize>> {
        if !self.is_visible() {
            return vec![];
        }
        self.strip(2, 2)
    }

    /// Keeps `edge` pages at each end and `around` pages either side of the
    /// current one. Any run of dropped pages collapses into one `None`.
    pub fn strip(&self, edge: usize, around: usize) -> Vec<Option<usize>> {
        let last = self.total_pages;
        let kept = (1..=last).filter(|&page| {
            page <= edge || page + edge > last || page.abs_diff(self.current_page) <= around
        });
        let mut out = Vec::new();
        let mut prev = 0;
        for page in kept {
            if page > prev + 1 {
                out.push(None);
            }
            out.push(Some(page));
            prev = page;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up_with_floor_of_one() {
        assert_eq!(total_pages(47, 20), 3);
        assert_eq!(total_pages(40, 20), 2);
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(5, 0), 1);
    }

    #[test]
    fn edges_disable_previous_and_next() {
        let first = Pagination::new(1, 5, 100, 20);
        assert!(!first.has_previous());
        assert_eq!(first.previous(), None);
        assert_eq!(first.next(), Some(2));

        let last = Pagination::new(5, 5, 100, 20);
        assert!(!last.has_next());
        assert_eq!(last.next(), None);
        assert_eq!(last.previous(), Some(4));
    }

    #[test]
    fn go_to_rejects_out_of_range_and_current() {
        let p = Pagination::new(2, 5, 100, 20);
        assert_eq!(p.go_to(0), None);
        assert_eq!(p.go_to(6), None);
        assert_eq!(p.go_to(2), None);
        assert_eq!(p.go_to(5), Some(5));
    }

    #[test]
    fn zero_results_hide_the_control() {
        let p = Pagination::new(1, 1, 0, 20);
        assert!(!p.is_visible());
        assert!(p.is_inert());
        assert!(p.pages().is_empty());
        assert_eq!(p.item_range(0), None);
    }

    #[test]
    fn item_range_tracks_current_page() {
        let p = Pagination::new(3, 3, 47, 20);
        assert_eq!(p.item_range(7), Some((41, 47)));
        let p = Pagination::new(1, 1, 5, 20);
        assert_eq!(p.item_range(5), Some((1, 5)));
    }

    #[test]
    fn window_elides_far_pages() {
        let p = Pagination::new(10, 20, 400, 20);
        assert_eq!(
            p.pages(),
            vec![
                Some(1),
                Some(2),
                None,
                Some(8),
                Some(9),
                Some(10),
                Some(11),
                Some(12),
                None,
                Some(19),
                Some(20)
            ]
        );
        let small = Pagination::new(1, 3, 50, 20);
        assert_eq!(small.pages(), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn strip_widths_are_adjustable() {
        let p = Pagination::new(1, 9, 180, 20);
        assert_eq!(
            p.strip(1, 1),
            vec![Some(1), Some(2), None, Some(9)]
        );
        let p = Pagination::new(5, 9, 180, 20);
        assert_eq!(
            p.strip(1, 0),
            vec![Some(1), None, Some(5), None, Some(9)]
        );
        let p = Pagination::new(4, 6, 120, 20);
        assert_eq!(p.strip(2, 2), (1..=6).map(Some).collect::<Vec<_>>());
    }
}
