use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Two messages from the same author closer together than this render
/// compact (no repeated author header).
pub const COMPACT_THRESHOLD_SECS: i64 = 5 * 60;

/// Anything the assembler can bucket: it only needs to know who wrote a
/// message and when.
pub trait FeedEntry {
    fn author_member(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Messages of one calendar day, oldest-first.
#[derive(Debug)]
pub struct DayBucket<T> {
    pub day: NaiveDate,
    pub messages: Vec<T>,
}

impl<T: FeedEntry> DayBucket<T> {
    /// Compact flag per message: true when the previous message in this
    /// bucket has the same author and sits strictly under the threshold
    /// away. Buckets never span days, so the flag can't leak across a
    /// date divider.
    pub fn compact_flags(&self) -> Vec<bool> {
        self.messages
            .iter()
            .enumerate()
            .map(|(i, message)| {
                if i == 0 {
                    return false;
                }
                let prev = &self.messages[i - 1];
                prev.author_member() == message.author_member()
                    && (message.created_at() - prev.created_at()).num_seconds()
                        < COMPACT_THRESHOLD_SECS
            })
            .collect()
    }
}

/// Groups a newest-first message stream into day buckets.
///
/// Each arriving message is pushed to the *front* of its day's list;
/// because the input is newest-first, that yields oldest-first order
/// within a bucket. Buckets keep the order their day was first seen,
/// which for newest-first input means newest day first: the order an
/// infinite-scroll column renders bottom-up.
#[derive(Debug)]
pub struct FeedAssembler<T> {
    offset: FixedOffset,
    buckets: Vec<DayBucket<T>>,
}

impl<T: FeedEntry> FeedAssembler<T> {
    /// `offset` is the viewer's UTC offset; day keys are calendar dates in
    /// the viewer's local time.
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            buckets: Vec::new(),
        }
    }

    pub fn utc() -> Self {
        Self::new(FixedOffset::east_opt(0).unwrap())
    }

    /// Feed one page of messages, newest-first. Call again with each older
    /// page as it arrives.
    pub fn push_page(&mut self, page: impl IntoIterator<Item = T>) {
        for message in page {
            let day = message
                .created_at()
                .with_timezone(&self.offset)
                .date_naive();

            match self.buckets.iter_mut().find(|b| b.day == day) {
                Some(bucket) => bucket.messages.insert(0, message),
                None => self.buckets.push(DayBucket {
                    day,
                    messages: vec![message],
                }),
            }
        }
    }

    pub fn buckets(&self) -> &[DayBucket<T>] {
        &self.buckets
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Render pass: buckets become labeled sections with compact flags.
    /// `today` pins the "Today"/"Yesterday" labels.
    pub fn into_sections(self, today: NaiveDate) -> Vec<DaySection<T>> {
        self.buckets
            .into_iter()
            .map(|bucket| {
                let compact = bucket.compact_flags();
                DaySection {
                    day: bucket.day,
                    label: date_label(bucket.day, today),
                    items: bucket
                        .messages
                        .into_iter()
                        .zip(compact)
                        .map(|(message, compact)| FeedItem { compact, message })
                        .collect(),
                }
            })
            .collect()
    }
}

/// One labeled day group, ready to render.
#[derive(Debug, Serialize)]
pub struct DaySection<T> {
    pub day: NaiveDate,
    pub label: String,
    pub items: Vec<FeedItem<T>>,
}

#[derive(Debug, Serialize)]
pub struct FeedItem<T> {
    pub compact: bool,
    pub message: T,
}

/// Label for a bucket's day key. All messages in a bucket share one label.
pub fn date_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(day) {
        "Yesterday".to_string()
    } else {
        day.format("%A, %B %-d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        author: Uuid,
        at: DateTime<Utc>,
        body: &'static str,
    }

    impl FeedEntry for Entry {
        fn author_member(&self) -> Uuid {
            self.author
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn entry(author: Uuid, when: &str, body: &'static str) -> Entry {
        Entry {
            author,
            at: at(when),
            body,
        }
    }

    #[test]
    fn buckets_are_newest_day_first_and_oldest_first_within() {
        let a = Uuid::new_v4();
        // Page arrives newest-first, spanning two days.
        let page = vec![
            entry(a, "2024-06-01T12:00:00Z", "lunch"),
            entry(a, "2024-06-01T09:00:00Z", "morning"),
            entry(a, "2024-05-31T22:00:00Z", "late"),
            entry(a, "2024-05-31T08:00:00Z", "early"),
        ];

        let mut feed = FeedAssembler::utc();
        feed.push_page(page);

        let buckets = feed.buckets();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].day, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(buckets[1].day, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());

        let bodies: Vec<_> = buckets[0].messages.iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["morning", "lunch"]);
        let bodies: Vec<_> = buckets[1].messages.iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["early", "late"]);
    }

    #[test]
    fn older_pages_extend_existing_buckets_at_the_front() {
        let a = Uuid::new_v4();
        let mut feed = FeedAssembler::utc();
        feed.push_page(vec![
            entry(a, "2024-06-01T12:00:00Z", "newest"),
            entry(a, "2024-06-01T11:00:00Z", "mid"),
        ]);
        feed.push_page(vec![
            entry(a, "2024-06-01T10:00:00Z", "older"),
            entry(a, "2024-05-31T23:00:00Z", "yesterday"),
        ]);

        let buckets = feed.buckets();
        assert_eq!(buckets.len(), 2);
        let bodies: Vec<_> = buckets[0].messages.iter().map(|m| m.body).collect();
        assert_eq!(bodies, ["older", "mid", "newest"]);
        assert_eq!(buckets[1].messages[0].body, "yesterday");
    }

    /// Concatenating buckets in produced order gives a sequence descending
    /// at the bucket level and ascending within each bucket.
    #[test]
    fn global_ordering_property() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut timestamps = vec![
            "2024-06-03T10:00:00Z",
            "2024-06-03T09:00:00Z",
            "2024-06-02T18:00:00Z",
            "2024-06-02T06:00:00Z",
            "2024-06-01T23:59:59Z",
            "2024-06-01T00:00:01Z",
        ];
        let mut feed = FeedAssembler::utc();
        for chunk in timestamps.chunks(2) {
            feed.push_page(
                chunk
                    .iter()
                    .enumerate()
                    .map(|(i, ts)| entry(if i % 2 == 0 { a } else { b }, ts, "x"))
                    .collect::<Vec<_>>(),
            );
        }

        for window in feed.buckets().windows(2) {
            assert!(window[0].day > window[1].day);
        }
        for bucket in feed.buckets() {
            for pair in bucket.messages.windows(2) {
                assert!(pair[0].created_at() <= pair[1].created_at());
            }
        }
        timestamps.sort();
        assert_eq!(
            feed.buckets().iter().map(|b| b.messages.len()).sum::<usize>(),
            timestamps.len()
        );
    }

    #[test]
    fn compact_requires_same_author_and_under_five_minutes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        // Newest-first input, all on one day.
        let page = vec![
            entry(a, "2024-06-01T10:20:00Z", "far apart"),
            entry(b, "2024-06-01T10:08:00Z", "other author"),
            entry(a, "2024-06-01T10:04:59Z", "just under"),
            entry(a, "2024-06-01T10:00:00Z", "first"),
        ];

        let mut feed = FeedAssembler::utc();
        feed.push_page(page);

        let flags = feed.buckets()[0].compact_flags();
        // first: no predecessor; just under: 4m59s gap, same author;
        // other author: breaks continuity; far apart: 12m gap.
        assert_eq!(flags, [false, true, false, false]);
    }

    #[test]
    fn exactly_five_minutes_is_not_compact() {
        let a = Uuid::new_v4();
        let page = vec![
            entry(a, "2024-06-01T10:05:00Z", "later"),
            entry(a, "2024-06-01T10:00:00Z", "first"),
        ];

        let mut feed = FeedAssembler::utc();
        feed.push_page(page);

        assert_eq!(feed.buckets()[0].compact_flags(), [false, false]);
    }

    #[test]
    fn compact_never_crosses_a_date_divider() {
        let a = Uuid::new_v4();
        // Two messages 2 minutes apart, but on either side of local
        // midnight: different buckets, so neither is compact.
        let page = vec![
            entry(a, "2024-06-01T00:01:00Z", "after midnight"),
            entry(a, "2024-05-31T23:59:00Z", "before midnight"),
        ];

        let mut feed = FeedAssembler::utc();
        feed.push_page(page);

        assert_eq!(feed.buckets().len(), 2);
        for bucket in feed.buckets() {
            assert_eq!(bucket.compact_flags(), [false]);
        }
    }

    #[test]
    fn viewer_offset_decides_the_day_key() {
        let a = Uuid::new_v4();
        // 23:30 UTC on May 31 is already June 1 for a UTC+2 viewer.
        let mut feed = FeedAssembler::new(FixedOffset::east_opt(2 * 3600).unwrap());
        feed.push_page(vec![entry(a, "2024-05-31T23:30:00Z", "x")]);

        assert_eq!(
            feed.buckets()[0].day,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn date_labels_with_a_fixed_clock() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        assert_eq!(
            date_label(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), today),
            "Today"
        );
        assert_eq!(
            date_label(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(), today),
            "Yesterday"
        );
        assert_eq!(
            date_label(NaiveDate::from_ymd_opt(2024, 5, 25).unwrap(), today),
            "Saturday, May 25"
        );
    }

    #[test]
    fn sections_carry_labels_and_compact_flags() {
        let a = Uuid::new_v4();
        let mut feed = FeedAssembler::utc();
        feed.push_page(vec![
            entry(a, "2024-06-01T10:01:00Z", "second"),
            entry(a, "2024-06-01T10:00:00Z", "first"),
            entry(a, "2024-05-31T09:00:00Z", "yesterday"),
        ]);

        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let sections = feed.into_sections(today);

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].label, "Today");
        assert_eq!(sections[1].label, "Yesterday");
        assert_eq!(sections[0].items[0].message.body, "first");
        assert!(!sections[0].items[0].compact);
        assert!(sections[0].items[1].compact);
        assert_eq!(sections[1].items.len(), 1);
    }
}
