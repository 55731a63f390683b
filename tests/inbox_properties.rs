use std::collections::HashSet;

use chrono::NaiveDate;
use nexus_crm::api::models::{EmailMessage, SmsDirection, SmsMessage, Task};
use nexus_crm::inbox::pipeline::{filter, paginate, sort};
use nexus_crm::inbox::{merge, FolderSelection, InboxFilter, SortOrder, Sources, UnifiedMessage};
use proptest::prelude::*;

fn timestamp_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        1 => Just(None),
        1 => Just(Some("not a date".to_string())),
        6 => (0u32..60, 0u32..24, 0u32..60).prop_map(|(day, h, m)| {
            let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Days::new(day as u64);
            Some(format!("{}T{h:02}:{m:02}:00Z", date.format("%Y-%m-%d")))
        }),
    ]
}

fn sources_strategy() -> impl Strategy<Value = Sources> {
    let emails = proptest::collection::vec((any::<bool>(), any::<bool>(), timestamp_strategy()), 0..20);
    let tasks = proptest::collection::vec((prop_oneof![Just("pending"), Just("completed")], timestamp_strategy()), 0..20);
    let sms = proptest::collection::vec((any::<bool>(), any::<bool>(), timestamp_strategy()), 0..20);
    (emails, tasks, sms).prop_map(|(emails, tasks, sms)| Sources {
        emails: emails
            .into_iter()
            .enumerate()
            .map(|(i, (is_read, has_attachments, at))| EmailMessage {
                id: format!("AAMk{i}"),
                subject: format!("mail {i}"),
                is_read,
                has_attachments,
                received_date_time: at,
                ..Default::default()
            })
            .collect(),
        tasks: tasks
            .into_iter()
            .enumerate()
            .map(|(i, (status, at))| Task {
                id: i.to_string(),
                title: format!("task {i}"),
                status: status.to_string(),
                created_at: at,
                ..Default::default()
            })
            .collect(),
        chats: Vec::new(),
        sms: sms
            .into_iter()
            .enumerate()
            .map(|(i, (inbound, read, at))| SmsMessage {
                id: i.to_string(),
                direction: if inbound { SmsDirection::Inbound } else { SmsDirection::Outbound },
                phone_number: format!("+4219000{i:05}"),
                delivery_status: Some(if read { "read" } else { "delivered" }.to_string()),
                created_at: at,
                ..Default::default()
            })
            .collect(),
    })
}

fn filter_strategy() -> impl Strategy<Value = InboxFilter> {
    (any::<bool>(), any::<bool>(), proptest::option::of(0u32..60), proptest::option::of(0u32..60)).prop_map(
        |(unread_only, has_attachment, from, to)| {
            let day = |d: u32| NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Days::new(d as u64);
            InboxFilter {
                unread_only,
                has_attachment,
                date_from: from.map(day),
                date_to: to.map(day),
                search: None,
            }
        },
    )
}

fn ids(items: &[UnifiedMessage]) -> Vec<String> {
    items.iter().map(|m| m.id.clone()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn merged_ids_are_unique(sources in sources_strategy()) {
        let merged = merge(&sources, &FolderSelection::All);
        let unique: HashSet<_> = merged.iter().map(|m| m.id.as_str()).collect();
        prop_assert_eq!(unique.len(), merged.len());
        prop_assert_eq!(merged.len(), sources.emails.len() + sources.tasks.len() + sources.sms.len());
    }

    #[test]
    fn filtering_only_removes(sources in sources_strategy(), f in filter_strategy()) {
        let merged = merge(&sources, &FolderSelection::All);
        let kept = filter(merged.clone(), &f);
        prop_assert!(kept.len() <= merged.len());
        let all: HashSet<_> = ids(&merged).into_iter().collect();
        prop_assert!(ids(&kept).iter().all(|id| all.contains(id)));

        // Adding a predicate never grows the result.
        let stricter = InboxFilter { unread_only: true, ..f.clone() };
        prop_assert!(filter(merged, &stricter).len() <= kept.len());
    }

    #[test]
    fn combined_filters_are_a_subset_of_each(sources in sources_strategy()) {
        let merged = merge(&sources, &FolderSelection::All);
        let unread = InboxFilter { unread_only: true, ..Default::default() };
        let attached = InboxFilter { has_attachment: true, ..Default::default() };
        let both = InboxFilter { unread_only: true, has_attachment: true, ..Default::default() };

        let a: HashSet<_> = ids(&filter(merged.clone(), &unread)).into_iter().collect();
        let b: HashSet<_> = ids(&filter(merged.clone(), &attached)).into_iter().collect();
        for id in ids(&filter(merged, &both)) {
            prop_assert!(a.contains(&id) && b.contains(&id));
        }
    }

    #[test]
    fn sorted_by_timestamp(sources in sources_strategy(), newest in any::<bool>()) {
        let mut rows = merge(&sources, &FolderSelection::All);
        let order = if newest { SortOrder::Newest } else { SortOrder::Oldest };
        sort(&mut rows, order);
        for pair in rows.windows(2) {
            let (a, b) = (pair[0].sort_key(), pair[1].sort_key());
            if newest {
                prop_assert!(a >= b);
            } else {
                prop_assert!(a <= b);
            }
        }
    }

    #[test]
    fn pages_cover_everything_once(sources in sources_strategy(), page_size in 1usize..12) {
        let rows = merge(&sources, &FolderSelection::All);
        let first = paginate(&rows, 0, page_size);
        prop_assert!(first.total_pages >= 1);
        let mut seen = Vec::new();
        for p in 0..first.total_pages {
            let page = paginate(&rows, p, page_size);
            prop_assert!(page.items.len() <= page_size);
            seen.extend(ids(&page.items));
        }
        prop_assert_eq!(seen, ids(&rows));
    }
}
