//! Filtering, ordering and paging of the merged inbox.

use chrono::NaiveDate;

use super::unify::{FolderSelection, UnifiedMessage};
use crate::app::DEFAULT_PAGE_SIZE;
use crate::utils::{end_of_day, start_of_day};

/// Predicates are AND-combined. A default filter keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxFilter {
    pub unread_only: bool,
    pub has_attachment: bool,
    /// Inclusive, from 00:00:00 UTC.
    pub date_from: Option<NaiveDate>,
    /// Inclusive, up to 23:59:59.999 UTC.
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl InboxFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, msg: &UnifiedMessage) -> bool {
        if self.unread_only && !msg.unread {
            return false;
        }
        if self.has_attachment && !msg.has_attachments {
            return false;
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            // Undated messages cannot satisfy a date bound.
            let Some(ts) = msg.timestamp else {
                return false;
            };
            if let Some(from) = self.date_from {
                if ts < start_of_day(from) {
                    return false;
                }
            }
            if let Some(to) = self.date_to {
                if ts >= end_of_day(to) {
                    return false;
                }
            }
        }
        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            if !msg.title.to_lowercase().contains(&needle)
                && !msg.preview.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl SortOrder {
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Newest => SortOrder::Oldest,
            SortOrder::Oldest => SortOrder::Newest,
        }
    }
}

/// One slice of a list. `page` is 0-based and `total_pages` is never 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
}

pub fn filter(messages: Vec<UnifiedMessage>, f: &InboxFilter) -> Vec<UnifiedMessage> {
    messages.into_iter().filter(|m| f.matches(m)).collect()
}

/// Orders by timestamp. Equal timestamps keep their incoming order.
pub fn sort(messages: &mut [UnifiedMessage], order: SortOrder) {
    match order {
        SortOrder::Newest => messages.sort_by(|a, b| b.sort_key().cmp(&a.sort_key())),
        SortOrder::Oldest => messages.sort_by_key(UnifiedMessage::sort_key),
    }
}

pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

/// Slices out `page`, clamping it to the last page.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let page = page.min(total_pages - 1);
    let start = page * page_size;
    let end = (start + page_size).min(items.len());
    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        page,
        total_pages,
        total: items.len(),
    }
}

/// List-view state. Every change to what is shown goes back to the first page.
#[derive(Debug, Clone)]
pub struct InboxView {
    folder: FolderSelection,
    filter: InboxFilter,
    order: SortOrder,
    page: usize,
    page_size: usize,
}

impl Default for InboxView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl InboxView {
    pub fn new(page_size: usize) -> Self {
        Self {
            folder: FolderSelection::All,
            filter: InboxFilter::default(),
            order: SortOrder::Newest,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn folder(&self) -> &FolderSelection {
        &self.folder
    }

    pub fn filter(&self) -> &InboxFilter {
        &self.filter
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_folder(&mut self, folder: FolderSelection) {
        self.folder = folder;
        self.page = 0;
    }

    pub fn set_filter(&mut self, filter: InboxFilter) {
        self.filter = filter;
        self.page = 0;
    }

    pub fn update_filter(&mut self, f: impl FnOnce(&mut InboxFilter)) {
        f(&mut self.filter);
        self.page = 0;
    }

    pub fn set_order(&mut self, order: SortOrder) {
        self.order = order;
        self.page = 0;
    }

    pub fn toggle_order(&mut self) {
        self.set_order(self.order.toggle());
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    /// Moves forward unless the view is already on the last of `total_pages`.
    pub fn next_page(&mut self, total_pages: usize) {
        if self.page + 1 < total_pages {
            self.page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    /// Pulls the stored index back to the page that was actually shown.
    pub fn clamp_to<T>(&mut self, shown: &Page<T>) {
        self.page = shown.page;
    }

    /// The filter in force; the unread folder always implies unread-only.
    pub fn effective_filter(&self) -> InboxFilter {
        let mut f = self.filter.clone();
        if self.folder == FolderSelection::Unread {
            f.unread_only = true;
        }
        f
    }

    /// Runs filter, sort and paging over an already merged list.
    pub fn apply(&self, merged: Vec<UnifiedMessage>) -> Page<UnifiedMessage> {
        let mut rows = filter(merged, &self.effective_filter());
        sort(&mut rows, self.order);
        paginate(&rows, self.page, self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::SmsMessage;
    use crate::inbox::unify::{merge, tests::sample_sources, Sources};

    fn merged() -> Vec<UnifiedMessage> {
        merge(&sample_sources(), &FolderSelection::All)
    }

    fn ids(page: &Page<UnifiedMessage>) -> Vec<&str> {
        page.items.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn newest_first_then_undated() {
        let view = InboxView::default();
        let page = view.apply(merged());
        assert_eq!(&ids(&page)[..3], ["chat-u2", "email-1", "task-1"]);
        // Undated rows tie at 0 and keep merge order.
        assert_eq!(&ids(&page)[3..], ["task-2", "sms-1", "sms-2"]);
    }

    #[test]
    fn oldest_first() {
        let mut view = InboxView::default();
        view.toggle_order();
        let page = view.apply(merged());
        assert_eq!(ids(&page), ["task-2", "sms-1", "sms-2", "task-1", "email-1", "chat-u2"]);
    }

    #[test]
    fn unread_folder_implies_unread_filter() {
        let mut view = InboxView::default();
        view.set_folder(FolderSelection::Unread);
        assert!(view.effective_filter().unread_only);
        let page = view.apply(merged());
        assert_eq!(page.total, 4);
        assert!(page.items.iter().all(|m| m.unread));
    }

    #[test]
    fn date_bounds_cover_whole_days() {
        let mut view = InboxView::default();
        view.update_filter(|f| {
            f.date_from = NaiveDate::from_ymd_opt(2024, 5, 2);
            f.date_to = NaiveDate::from_ymd_opt(2024, 5, 2);
        });
        assert_eq!(ids(&view.apply(merged())), ["email-1"]);

        view.update_filter(|f| f.date_to = None);
        assert_eq!(ids(&view.apply(merged())), ["chat-u2", "email-1"]);
    }

    #[test]
    fn attachment_and_search() {
        let f = InboxFilter {
            has_attachment: true,
            ..Default::default()
        };
        assert_eq!(filter(merged(), &f).len(), 1);

        let f = InboxFilter {
            search: Some("PING".into()),
            ..Default::default()
        };
        let hits = filter(merged(), &f);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "chat-u2");
        assert!(InboxFilter::default().is_empty());
    }

    #[test]
    fn changes_reset_page() {
        let mut view = InboxView::new(2);
        view.set_page(2);
        assert_eq!(view.page(), 2);
        view.update_filter(|f| f.unread_only = true);
        assert_eq!(view.page(), 0);
        view.next_page(3);
        view.set_order(SortOrder::Oldest);
        assert_eq!(view.page(), 0);
        view.next_page(3);
        view.set_folder(FolderSelection::Sms);
        assert_eq!(view.page(), 0);
    }

    #[test]
    fn paging_clamps_and_never_reports_zero_pages() {
        let empty: Vec<u8> = Vec::new();
        let p = paginate(&empty, 3, 25);
        assert_eq!((p.page, p.total_pages, p.total), (0, 1, 0));
        assert!(p.items.is_empty());

        let items: Vec<u8> = (0..7).collect();
        let p = paginate(&items, 1, 3);
        assert_eq!(p.items, vec![3, 4, 5]);
        let p = paginate(&items, 9, 3);
        assert_eq!((p.page, p.items.clone()), (2, vec![6]));
        assert_eq!(total_pages(6, 3), 2);
    }

    #[test]
    fn paging_stops_at_the_last_page() {
        let rows: Vec<UnifiedMessage> = merged().into_iter().take(3).collect();
        let mut view = InboxView::new(2);
        let mut shown = view.apply(rows.clone());
        for _ in 0..3 {
            view.next_page(shown.total_pages);
            shown = view.apply(rows.clone());
        }
        assert_eq!((view.page(), shown.page, shown.total_pages), (1, 1, 2));

        view.prev_page();
        assert_eq!(view.apply(rows.clone()).page, 0);
    }

    #[test]
    fn stored_page_follows_what_was_shown() {
        let mut view = InboxView::new(2);
        view.set_page(7);
        let shown = view.apply(merged());
        assert_eq!(shown.page, 2);
        view.clamp_to(&shown);
        assert_eq!(view.page(), 2);
        view.prev_page();
        assert_eq!(view.apply(merged()).page, 1);
    }

    #[test]
    fn last_instant_of_the_day_is_inside_the_bound() {
        let sources = Sources {
            sms: vec![
                SmsMessage {
                    id: "late".into(),
                    created_at: Some("2024-05-02T23:59:59.9995Z".into()),
                    ..Default::default()
                },
                SmsMessage {
                    id: "next".into(),
                    created_at: Some("2024-05-03T00:00:00Z".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let f = InboxFilter {
            date_to: NaiveDate::from_ymd_opt(2024, 5, 2),
            ..Default::default()
        };
        let kept = filter(merge(&sources, &FolderSelection::All), &f);
        assert_eq!(kept.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["sms-late"]);
    }
}
