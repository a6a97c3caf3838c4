use chrono::{FixedOffset, NaiveDate};

use crate::assembler::{DaySection, FeedAssembler, FeedEntry, FeedItem};
use crate::paginator::{FeedStatus, Paginator};

/// One scope's live feed: assembler plus pagination state, the unit a
/// channel, thread, or conversation view holds on to.
#[derive(Debug)]
pub struct FeedView<T> {
    assembler: FeedAssembler<T>,
    paginator: Paginator,
}

impl<T: FeedEntry> FeedView<T> {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            assembler: FeedAssembler::new(offset),
            paginator: Paginator::new(),
        }
    }

    pub fn status(&self) -> FeedStatus {
        self.paginator.status()
    }

    /// Sentinel visibility signal; true when a fetch should be issued.
    pub fn request_more(&mut self) -> bool {
        self.paginator.request_more()
    }

    /// Apply an arrived page (first page or load-more completion).
    pub fn page_loaded(&mut self, page: impl IntoIterator<Item = T>, has_more: bool) {
        self.assembler.push_page(page);
        self.paginator.page_loaded(has_more);
    }

    pub fn is_empty(&self) -> bool {
        self.assembler.is_empty()
    }
}

impl<T: FeedEntry + Clone> FeedView<T> {
    /// Rendered snapshot of the currently loaded pages.
    pub fn snapshot(&self, today: NaiveDate) -> Vec<DaySection<T>> {
        self.assembler
            .buckets()
            .iter()
            .map(|bucket| {
                let compact = bucket.compact_flags();
                DaySection {
                    day: bucket.day,
                    label: crate::assembler::date_label(bucket.day, today),
                    items: bucket
                        .messages
                        .iter()
                        .cloned()
                        .zip(compact)
                        .map(|(message, compact)| FeedItem { compact, message })
                        .collect(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    #[derive(Debug, Clone)]
    struct Entry {
        author: Uuid,
        at: DateTime<Utc>,
    }

    impl FeedEntry for Entry {
        fn author_member(&self) -> Uuid {
            self.author
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn entry(author: Uuid, when: &str) -> Entry {
        Entry {
            author,
            at: when.parse().unwrap(),
        }
    }

    #[test]
    fn view_threads_pages_through_both_halves() {
        let a = Uuid::new_v4();
        let mut view = FeedView::new(FixedOffset::east_opt(0).unwrap());

        assert!(!view.request_more());
        view.page_loaded(
            vec![
                entry(a, "2024-06-01T10:02:00Z"),
                entry(a, "2024-06-01T10:00:00Z"),
            ],
            true,
        );

        assert!(view.request_more());
        assert!(!view.request_more());
        view.page_loaded(vec![entry(a, "2024-05-31T10:00:00Z")], false);

        assert_eq!(view.status(), FeedStatus::Exhausted);
        let sections = view.snapshot(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].label, "Today");
        assert_eq!(sections[0].items.len(), 2);
        assert!(sections[0].items[1].compact);
        assert_eq!(sections[1].label, "Yesterday");
    }
}
