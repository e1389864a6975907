use crate::models::{
    EventKind, Forecast, IntegrityWarning, MonthStats, Rank, RankChangeRecord, Score, ScoreSnapshot,
    TrainingEvent, non_blank,
};
use crate::rules::{Rule, RuleTable};
use chrono::{Duration, Local, NaiveDate};
use tracing::{debug, warn};

/// One private or semi-private lesson counts as this many group classes.
pub const PRIVATE_LESSON_WEIGHT: u32 = 4;

const FORECAST_WEEKS: i64 = 8;

/// Last confirmed record in entry order.
pub fn confirmed_record(log: &[RankChangeRecord]) -> Option<&RankChangeRecord> {
    log.iter().rev().find(|record| !record.is_pending)
}

pub fn current_rank(log: &[RankChangeRecord]) -> Rank {
    confirmed_record(log)
        .map(|record| record.rank.clone())
        .unwrap_or_else(Rank::initial)
}

/// Most recent pending invitation, if any.
pub fn pending_record(log: &[RankChangeRecord]) -> Option<&RankChangeRecord> {
    log.iter().rev().find(|record| record.is_pending)
}

/// Points earned by completed events dated on or after `since`.
///
/// ISO dates compare correctly as strings, so no date parsing happens here.
pub fn score_since(events: &[TrainingEvent], since: Option<&str>) -> Score {
    score_of(
        events
            .iter()
            .filter(|event| event.is_done())
            .filter(|event| since.is_none_or(|since| event.date.as_str() >= since)),
    )
}

fn score_of<'a>(events: impl Iterator<Item = &'a TrainingEvent>) -> Score {
    let (group, private) = events.fold((0u32, 0u32), |(group, private), event| {
        if event.kind.is_private() {
            (group, private.saturating_add(1))
        } else if event.kind == EventKind::GroupClass {
            (group.saturating_add(1), private)
        } else {
            (group, private)
        }
    });
    let private_points = private.saturating_mul(PRIVATE_LESSON_WEIGHT);
    Score {
        group_points: group,
        private_points,
        total_points: group.saturating_add(private_points),
    }
}

pub fn transition_from<'a>(rank: &Rank, rules: &'a RuleTable) -> Option<&'a Rule> {
    rules.from_rank(rank)
}

/// Threshold for leaving `rank`; `None` when the rank is terminal.
pub fn required_for_transition(rank: &Rank, rules: &RuleTable) -> Option<u32> {
    transition_from(rank, rules).map(|rule| rule.required_score)
}

pub fn next_rank_from_rules(rank: &Rank, rules: &RuleTable) -> Option<Rank> {
    transition_from(rank, rules).map(|rule| rule.transition.to.clone())
}

pub fn integrity_warnings(log: &[RankChangeRecord]) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();
    if !log.is_empty() && log.iter().all(|record| record.is_pending) {
        warnings.push(IntegrityWarning::NoConfirmedRank);
    }
    if log.iter().filter(|record| record.is_pending).count() > 1 {
        warnings.push(IntegrityWarning::MultiplePending);
    }
    if let Some(last_pending) = log.iter().rposition(|record| record.is_pending) {
        if last_pending + 1 != log.len() {
            warnings.push(IntegrityWarning::PendingNotLatest);
        }
    }
    warnings
}

pub fn snapshot(
    events: &[TrainingEvent],
    log: &[RankChangeRecord],
    rules: &RuleTable,
) -> ScoreSnapshot {
    let confirmed = confirmed_record(log);
    let current_rank = confirmed
        .map(|record| record.rank.clone())
        .unwrap_or_else(Rank::initial);
    let since_date = confirmed.and_then(|record| record.date.clone());
    let score = score_since(events, since_date.as_deref());

    let rule = transition_from(&current_rank, rules);
    let required_for_next = rule.map(|rule| rule.required_score);
    let remaining = required_for_next
        .map(|required| required.saturating_sub(score.total_points))
        .unwrap_or(0);

    let pending = pending_record(log).cloned();
    let next_rank = pending
        .as_ref()
        .map(|record| record.rank.clone())
        .or_else(|| rule.map(|rule| rule.transition.to.clone()));

    let warnings = integrity_warnings(log);
    if !warnings.is_empty() {
        warn!(?warnings, "rank log failed integrity checks");
    }

    ScoreSnapshot {
        current_rank,
        since_date,
        group_points: score.group_points,
        private_points: score.private_points,
        total_points: score.total_points,
        required_for_next,
        remaining,
        next_rank,
        pending,
        warnings,
    }
}

/// Adds or removes the pending invitation. Returns whether the log changed.
pub fn set_pending_invitation(
    log: &mut Vec<RankChangeRecord>,
    enabled: bool,
    rules: &RuleTable,
    current_rank: &Rank,
) -> bool {
    if enabled {
        if pending_record(log).is_some() {
            return false;
        }
        let rank = next_rank_from_rules(current_rank, rules).unwrap_or_else(Rank::unknown);
        debug!(%rank, "opening invitation");
        log.push(RankChangeRecord::invitation(rank));
        true
    } else {
        let before = log.len();
        log.retain(|record| !record.is_pending);
        before != log.len()
    }
}

/// Sets or clears the pending invitation's date. Returns false without a pending record.
pub fn set_pending_date(log: &mut [RankChangeRecord], date: Option<String>) -> bool {
    match log.iter_mut().rev().find(|record| record.is_pending) {
        Some(record) => {
            record.date = non_blank(date);
            true
        }
        None => false,
    }
}

/// Appends a confirmed rank change. An open invitation is left untouched.
pub fn confirm_rank_change(
    log: &mut Vec<RankChangeRecord>,
    rank: Rank,
    date: Option<String>,
    note: Option<String>,
) -> RankChangeRecord {
    let record = RankChangeRecord::confirmed(rank, date, note);
    log.push(record.clone());
    record
}

pub fn forecast(events: &[TrainingEvent], snapshot: &ScoreSnapshot) -> Forecast {
    forecast_at(Local::now().date_naive(), events, snapshot)
}

pub fn forecast_at(today: NaiveDate, events: &[TrainingEvent], snapshot: &ScoreSnapshot) -> Forecast {
    let progress_percent = match snapshot.required_for_next {
        Some(required) if required > 0 => {
            (f64::from(snapshot.total_points) / f64::from(required) * 100.0).min(100.0)
        }
        _ => 100.0,
    };

    let window_start = today - Duration::weeks(FORECAST_WEEKS);
    let recent = score_of(
        events
            .iter()
            .filter(|event| event.is_done())
            .filter(|event| {
                snapshot
                    .since_date
                    .as_deref()
                    .is_none_or(|since| event.date.as_str() >= since)
            })
            .filter(|event| {
                parse_date(&event.date).is_some_and(|date| date >= window_start && date <= today)
            }),
    );
    let rate = f64::from(recent.total_points) / FORECAST_WEEKS as f64;
    let weekly_rate = if rate > 0.0 { rate } else { 1.0 };

    let weeks_remaining = if snapshot.pending.is_none() && snapshot.remaining > 0 {
        (f64::from(snapshot.remaining) / weekly_rate).ceil() as u32
    } else {
        0
    };

    let (estimated_date, is_estimate) = match &snapshot.pending {
        Some(pending) => (pending.date.clone(), false),
        None => {
            let date = today + Duration::weeks(i64::from(weeks_remaining));
            (Some(date.format("%Y-%m-%d").to_string()), true)
        }
    };

    Forecast {
        progress_percent,
        weekly_rate,
        weeks_remaining,
        estimated_date,
        is_estimate,
    }
}

/// Completed activity for a `YYYY-MM` month.
pub fn month_stats(events: &[TrainingEvent], month: &str) -> MonthStats {
    let prefix = format!("{month}-");
    let done: Vec<&TrainingEvent> = events
        .iter()
        .filter(|event| event.is_done() && event.date.starts_with(&prefix))
        .collect();

    let score = score_of(done.iter().copied());
    let combat_count = done
        .iter()
        .filter(|event| {
            let title = event.title.to_lowercase();
            title.contains("combat") || title.contains("arme")
        })
        .count() as u32;
    let competition_count = done
        .iter()
        .filter(|event| event.kind == EventKind::Competition)
        .count() as u32;

    MonthStats {
        month: month.to_string(),
        group_count: score.group_points,
        private_count: score.private_points / PRIVATE_LESSON_WEIGHT,
        combat_count,
        competition_count,
        total_points: score.total_points,
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
