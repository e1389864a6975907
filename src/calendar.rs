use crate::models::{CompletionStatus, EventKind, PlannedClass, PlanningDay, TrainingEvent};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_CLASS_TITLE: &str = "Cours de groupe";

pub fn default_planning() -> Vec<PlanningDay> {
    let class = |name: &str, time: &str| PlannedClass {
        name: name.to_string(),
        time: time.to_string(),
        kind: EventKind::GroupClass,
    };
    vec![
        PlanningDay {
            day: "Lundi".to_string(),
            classes: vec![
                class("Adultes Bleue et+", "19h00-20h00"),
                class("Combat avancé", "20h00-20h30"),
            ],
        },
        PlanningDay {
            day: "Jeudi".to_string(),
            classes: vec![
                class("Karaté Adultes", "19h00-20h00"),
                class("Armes 12+", "20h00-20h30"),
            ],
        },
        PlanningDay {
            day: "Dimanche".to_string(),
            classes: vec![class("Pré-Ados/Adultes 8+", "10h00-11h00")],
        },
    ]
}

pub fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "lundi",
        Weekday::Tue => "mardi",
        Weekday::Wed => "mercredi",
        Weekday::Thu => "jeudi",
        Weekday::Fri => "vendredi",
        Weekday::Sat => "samedi",
        Weekday::Sun => "dimanche",
    }
}

pub fn planning_for(planning: &[PlanningDay], date: NaiveDate) -> Option<&PlanningDay> {
    let label = weekday_label(date.weekday());
    planning
        .iter()
        .find(|day| day.day.trim().to_lowercase() == label)
}

/// Scheduled events the planning produces for one date.
pub fn planned_events(planning: &[PlanningDay], date: NaiveDate) -> Vec<TrainingEvent> {
    let date_key = date.format("%Y-%m-%d").to_string();
    planning_for(planning, date)
        .map(|day| {
            day.classes
                .iter()
                .map(|class| {
                    let title = if class.name.trim().is_empty() {
                        DEFAULT_CLASS_TITLE
                    } else {
                        class.name.trim()
                    };
                    TrainingEvent::new(date_key.clone(), title, class.time.trim(), class.kind.clone())
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Fills a month from the weekly planning, skipping entries already present.
/// Returns how many events were added.
pub fn generate_month(
    events: &mut Vec<TrainingEvent>,
    planning: &[PlanningDay],
    year: i32,
    month: u32,
) -> usize {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };

    let mut seen: HashSet<(String, String, String, EventKind)> = events
        .iter()
        .map(owned_key)
        .collect();

    let mut added = 0;
    for date in first.iter_days().take_while(|date| date.month() == month) {
        for event in planned_events(planning, date) {
            if seen.insert(owned_key(&event)) {
                events.push(event);
                added += 1;
            }
        }
    }
    debug!(year, month, added, "generated month from planning");
    added
}

fn owned_key(event: &TrainingEvent) -> (String, String, String, EventKind) {
    let (date, time, title, kind) = event.dedup_key();
    (date.to_string(), time.to_string(), title.to_string(), kind.clone())
}

/// Scheduled events dated before `today` become missed. Returns how many changed.
pub fn mark_overdue_missed(events: &mut [TrainingEvent], today: NaiveDate) -> usize {
    let today = today.format("%Y-%m-%d").to_string();
    let mut changed = 0;
    for event in events
        .iter_mut()
        .filter(|event| event.status == CompletionStatus::Scheduled)
        .filter(|event| !event.date.is_empty() && event.date < today)
    {
        event.status = CompletionStatus::Missed;
        changed += 1;
    }
    changed
}

pub fn set_status(
    events: &mut [TrainingEvent],
    id: Uuid,
    status: CompletionStatus,
) -> Option<&TrainingEvent> {
    let event = events.iter_mut().find(|event| event.id == id)?;
    event.status = status;
    Some(event)
}

/// Replaces the event with the same id or appends it.
pub fn upsert_event(events: &mut Vec<TrainingEvent>, event: TrainingEvent) {
    match events.iter_mut().find(|existing| existing.id == event.id) {
        Some(existing) => *existing = event,
        None => events.push(event),
    }
}
