use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::model::{Choice, SortDirection, SortField, Topic, TopicCriteria, Trackable, ViewCriteria};

/// Filter and sort `items` by `criteria` without touching the input.
///
/// Predicates combine with AND; `Choice::All` switches one off. Items without a
/// date sort after every dated item whichever the direction, and ties keep
/// their input order.
pub fn derive_view<T: Trackable>(items: &[T], criteria: &ViewCriteria) -> Vec<T> {
    let needle = criteria
        .search
        .as_deref()
        .map(str::trim)
        .filter(|needle| !needle.is_empty())
        .map(str::to_lowercase);

    let mut view: Vec<T> = items
        .iter()
        .filter(|item| criteria.priority.admits(&item.priority()))
        .filter(|item| criteria.status.admits(&item.status()))
        .filter(|item| match &criteria.assignee {
            Choice::All => true,
            Choice::Only(expected) => item.assignee() == Some(expected.as_str()),
        })
        .filter(|item| match &needle {
            Some(needle) => {
                item.label().to_lowercase().contains(needle)
                    || item.description().to_lowercase().contains(needle)
            }
            None => true,
        })
        .cloned()
        .collect();

    if let Some(sort) = criteria.sort {
        view.sort_by(|a, b| {
            let ordering = match sort.field {
                SortField::Due => return compare_dates(a.due_at(), b.due_at(), sort.direction),
                SortField::Priority => a.priority().cmp(&b.priority()),
                SortField::Name => a.label().to_lowercase().cmp(&b.label().to_lowercase()),
            };
            apply_direction(ordering, sort.direction)
        });
    }

    view
}

pub fn derive_topics(topics: &[Topic], criteria: &TopicCriteria) -> Vec<Topic> {
    let needle = criteria
        .search
        .as_deref()
        .map(str::trim)
        .filter(|needle| !needle.is_empty())
        .map(str::to_lowercase);

    let mut view: Vec<Topic> = topics
        .iter()
        .filter(|topic| criteria.technical.admits(&topic.technical))
        .filter(|topic| match &needle {
            Some(needle) => {
                topic.title.to_lowercase().contains(needle)
                    || topic.description.to_lowercase().contains(needle)
            }
            None => true,
        })
        .cloned()
        .collect();

    let direction = if criteria.newest_first {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    view.sort_by(|a, b| compare_dates(a.created_at, b.created_at, direction));
    view
}

/// Dated items first, ordered by `direction`; undated items last.
pub fn compare_dates(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
    direction: SortDirection,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => apply_direction(a.cmp(&b), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn apply_direction(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, SortSpec, Task, TaskKind, TaskStatus};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn task(id: &str, priority: Priority, status: TaskStatus, due_day: Option<u32>) -> Task {
        Task {
            id: id.into(),
            kind: TaskKind::Todo,
            name: format!("Task {id}"),
            description: String::new(),
            status,
            priority,
            due_at: due_day.map(|day| Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap()),
            assigned_to: Some(if id.len() % 2 == 0 { "7" } else { "8" }.into()),
            assigned_by: None,
            project_id: None,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task("a", Priority::High, TaskStatus::Pending, Some(12)),
            task("b", Priority::Low, TaskStatus::Completed, None),
            task("c", Priority::High, TaskStatus::Completed, Some(3)),
            task("d", Priority::Medium, TaskStatus::Pending, Some(25)),
            task("e", Priority::High, TaskStatus::Pending, None),
            task("f", Priority::Low, TaskStatus::Pending, Some(1)),
        ]
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn predicates_are_conjunctive() {
        let criteria = ViewCriteria {
            priority: Choice::Only(Priority::High),
            status: Choice::Only(TaskStatus::Pending),
            ..ViewCriteria::default()
        };
        assert_eq!(ids(&derive_view(&sample(), &criteria)), vec!["a", "e"]);
    }

    #[test]
    fn all_sentinel_keeps_everything_in_order() {
        let items = sample();
        let view = derive_view(&items, &ViewCriteria::default());
        assert_eq!(view, items);
    }

    #[test]
    fn due_sort_puts_missing_dates_last() {
        let asc = ViewCriteria::default().sorted_by(SortField::Due, SortDirection::Asc);
        let desc = ViewCriteria::default().sorted_by(SortField::Due, SortDirection::Desc);

        assert_eq!(
            ids(&derive_view(&sample(), &asc)),
            vec!["f", "c", "a", "d", "b", "e"]
        );
        assert_eq!(
            ids(&derive_view(&sample(), &desc)),
            vec!["d", "a", "c", "f", "b", "e"]
        );
    }

    #[test]
    fn descending_reverses_ascending_for_distinct_dates() {
        let dated: Vec<Task> = sample()
            .into_iter()
            .filter(|task| task.due_at.is_some())
            .collect();
        let asc = derive_view(
            &dated,
            &ViewCriteria::default().sorted_by(SortField::Due, SortDirection::Asc),
        );
        let mut desc = derive_view(
            &dated,
            &ViewCriteria::default().sorted_by(SortField::Due, SortDirection::Desc),
        );
        desc.reverse();
        assert_eq!(asc, desc);
    }

    #[rstest]
    #[case(ViewCriteria::default())]
    #[case(ViewCriteria::with_status(TaskStatus::Pending).sorted_by(SortField::Due, SortDirection::Desc))]
    #[case(ViewCriteria { priority: Choice::Only(Priority::High), ..ViewCriteria::default() }.sorted_by(SortField::Name, SortDirection::Asc))]
    #[case(ViewCriteria { assignee: Choice::Only("8".into()), sort: Some(SortSpec::new(SortField::Priority, SortDirection::Desc)), ..ViewCriteria::default() })]
    fn derive_view_is_idempotent(#[case] criteria: ViewCriteria) {
        let once = derive_view(&sample(), &criteria);
        let twice = derive_view(&once, &criteria);
        assert_eq!(once, twice);
    }

    #[test]
    fn input_is_not_mutated() {
        let items = sample();
        let before = items.clone();
        let _ = derive_view(
            &items,
            &ViewCriteria::default().sorted_by(SortField::Priority, SortDirection::Desc),
        );
        assert_eq!(items, before);
    }

    #[test]
    fn search_matches_name_case_insensitively() {
        let criteria = ViewCriteria {
            search: Some("TASK C".into()),
            ..ViewCriteria::default()
        };
        assert_eq!(ids(&derive_view(&sample(), &criteria)), vec!["c"]);
    }

    #[test]
    fn topics_sort_newest_first_and_filter_technical() {
        let topic = |id: &str, technical: bool, day: Option<u32>| Topic {
            id: id.into(),
            title: format!("Topic {id}"),
            description: String::new(),
            technical,
            created_by: "1".into(),
            created_at: day.map(|d| Utc.with_ymd_and_hms(2025, 1, d, 9, 0, 0).unwrap()),
        };
        let topics = vec![
            topic("1", true, Some(2)),
            topic("2", false, Some(5)),
            topic("3", true, None),
            topic("4", true, Some(9)),
        ];
        let criteria = TopicCriteria {
            technical: Choice::Only(true),
            ..TopicCriteria::default()
        };
        let view = derive_topics(&topics, &criteria);
        let ids: Vec<&str> = view.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "1", "3"]);
    }
}
