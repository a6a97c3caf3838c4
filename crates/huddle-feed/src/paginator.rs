/// Pagination state for one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Waiting for the first page.
    LoadingFirstPage,
    /// A page is loaded and older data may exist.
    CanLoadMore,
    /// A load-more request is in flight.
    LoadingMore,
    /// The backend signalled no older data remains.
    Exhausted,
}

/// Drives the feed's load-more state machine.
///
/// Load-more is triggered by a sentinel element at the oldest-loaded edge
/// of the list becoming visible, a passive signal that fires
/// repeatedly while the sentinel stays on screen. `request_more` therefore
/// has to coalesce: it consents to a fetch only from `CanLoadMore`, so a
/// request already in flight is never duplicated.
#[derive(Debug)]
pub struct Paginator {
    status: FeedStatus,
}

impl Paginator {
    pub fn new() -> Self {
        Self {
            status: FeedStatus::LoadingFirstPage,
        }
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn can_load_more(&self) -> bool {
        self.status == FeedStatus::CanLoadMore
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.status,
            FeedStatus::LoadingFirstPage | FeedStatus::LoadingMore
        )
    }

    /// The sentinel became visible. Returns true exactly when the caller
    /// should issue a fetch; every other state ignores the signal.
    pub fn request_more(&mut self) -> bool {
        if self.status == FeedStatus::CanLoadMore {
            self.status = FeedStatus::LoadingMore;
            true
        } else {
            false
        }
    }

    /// A page arrived (first page or a load-more completion). `has_more`
    /// is the backend's remaining-data flag.
    pub fn page_loaded(&mut self, has_more: bool) {
        match self.status {
            FeedStatus::LoadingFirstPage | FeedStatus::LoadingMore => {
                self.status = if has_more {
                    FeedStatus::CanLoadMore
                } else {
                    FeedStatus::Exhausted
                };
            }
            // A completion callback landing after exhaustion (unmounted
            // view, stale request) is a no-op.
            FeedStatus::CanLoadMore | FeedStatus::Exhausted => {}
        }
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_loading_first_page() {
        let mut paginator = Paginator::new();
        assert_eq!(paginator.status(), FeedStatus::LoadingFirstPage);

        // The sentinel can already be visible before the first page lands;
        // that must not start a load-more.
        assert!(!paginator.request_more());
        assert_eq!(paginator.status(), FeedStatus::LoadingFirstPage);
    }

    #[test]
    fn first_page_transitions_by_remaining_data() {
        let mut paginator = Paginator::new();
        paginator.page_loaded(true);
        assert_eq!(paginator.status(), FeedStatus::CanLoadMore);

        let mut paginator = Paginator::new();
        paginator.page_loaded(false);
        assert_eq!(paginator.status(), FeedStatus::Exhausted);
    }

    #[test]
    fn repeated_intersection_signals_coalesce_to_one_request() {
        let mut paginator = Paginator::new();
        paginator.page_loaded(true);

        assert!(paginator.request_more());
        assert_eq!(paginator.status(), FeedStatus::LoadingMore);

        // The sentinel keeps firing while the fetch is in flight.
        assert!(!paginator.request_more());
        assert!(!paginator.request_more());
        assert_eq!(paginator.status(), FeedStatus::LoadingMore);

        paginator.page_loaded(true);
        assert_eq!(paginator.status(), FeedStatus::CanLoadMore);
        assert!(paginator.request_more());
    }

    #[test]
    fn exhaustion_is_terminal_for_the_sentinel() {
        let mut paginator = Paginator::new();
        paginator.page_loaded(true);
        assert!(paginator.request_more());
        paginator.page_loaded(false);

        assert_eq!(paginator.status(), FeedStatus::Exhausted);
        assert!(!paginator.request_more());
        assert!(!paginator.is_loading());
    }
}
