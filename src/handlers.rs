use crate::calendar;
use crate::engine;
use crate::errors::{AppError, StorageError};
use crate::models::{
    ChangedResponse, CompletionStatus, ConfirmRankRequest, GenerateMonthRequest, InvitationDateRequest,
    InvitationRequest, MonthQuery, MonthStats, NewEventRequest, PlanningDay, ProgressResponse,
    Rank, RankChangeRecord, StatusRequest, TrainingEvent,
};
use crate::rules::RuleTable;
use crate::state::AppState;
use crate::storage::{
    KeyValueStore, MemoryStore, load_events, load_planning, load_rank_log, load_rules,
    persist_document, save_events, save_planning, save_rank_log, save_rules,
};
use crate::ui::render_progress;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::Html,
};
use chrono::{Local, NaiveDate};
use tracing::info;
use uuid::Uuid;

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let profile = state.default_profile.clone();
    let store = state.store.lock().await;
    let progress = progress_for(&*store, &profile)?;
    Ok(Html(render_progress(&progress)))
}

pub async fn profile_page(
    State(state): State<AppState>,
    Path(profile): Path<String>,
) -> Result<Html<String>, AppError> {
    let profile = checked_profile(profile)?;
    let store = state.store.lock().await;
    let progress = progress_for(&*store, &profile)?;
    Ok(Html(render_progress(&progress)))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Path(profile): Path<String>,
) -> Result<Json<ProgressResponse>, AppError> {
    let profile = checked_profile(profile)?;
    let store = state.store.lock().await;
    Ok(Json(progress_for(&*store, &profile)?))
}

pub async fn list_events(
    State(state): State<AppState>,
    Path(profile): Path<String>,
) -> Result<Json<Vec<TrainingEvent>>, AppError> {
    let profile = checked_profile(profile)?;
    let store = state.store.lock().await;
    Ok(Json(load_events(&*store, &profile)?))
}

pub async fn create_event(
    State(state): State<AppState>,
    Path(profile): Path<String>,
    Json(payload): Json<NewEventRequest>,
) -> Result<Json<TrainingEvent>, AppError> {
    let profile = checked_profile(profile)?;
    let date = checked_date(&payload.date)?;
    let status = match payload.status.as_deref() {
        Some(raw) => checked_status(raw)?,
        None => CompletionStatus::Scheduled,
    };
    let event = TrainingEvent::new(date, payload.title.trim(), payload.time.trim(), payload.kind)
        .with_status(status);

    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    let mut events = load_events(&draft, &profile)?;
    calendar::upsert_event(&mut events, event.clone());
    save_events(&mut draft, &profile, &events)?;
    commit(&state, &mut store, draft).await?;

    info!(%profile, id = %event.id, kind = event.kind.as_str(), "event added");
    Ok(Json(event))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path((profile, id)): Path<(String, Uuid)>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<TrainingEvent>, AppError> {
    let profile = checked_profile(profile)?;
    let status = checked_status(&payload.status)?;
    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    let mut events = load_events(&draft, &profile)?;
    let updated = calendar::set_status(&mut events, id, status)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("no event {id}")))?;
    save_events(&mut draft, &profile, &events)?;
    commit(&state, &mut store, draft).await?;

    info!(%profile, %id, status = updated.status.as_str(), "event status changed");
    Ok(Json(updated))
}

pub async fn sweep_overdue(
    State(state): State<AppState>,
    Path(profile): Path<String>,
) -> Result<Json<ChangedResponse>, AppError> {
    let profile = checked_profile(profile)?;
    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    let mut events = load_events(&draft, &profile)?;
    let changed = calendar::mark_overdue_missed(&mut events, Local::now().date_naive());
    if changed > 0 {
        save_events(&mut draft, &profile, &events)?;
        commit(&state, &mut store, draft).await?;
        info!(%profile, changed, "overdue events marked missed");
    }
    Ok(Json(ChangedResponse { changed }))
}

pub async fn generate_month(
    State(state): State<AppState>,
    Path(profile): Path<String>,
    Json(payload): Json<GenerateMonthRequest>,
) -> Result<Json<ChangedResponse>, AppError> {
    let profile = checked_profile(profile)?;
    if NaiveDate::from_ymd_opt(payload.year, payload.month, 1).is_none() {
        return Err(AppError::bad_request("month must be between 1 and 12"));
    }

    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    let planning = load_planning(&draft)?;
    let mut events = load_events(&draft, &profile)?;
    let changed = calendar::generate_month(&mut events, &planning, payload.year, payload.month);
    if changed > 0 {
        save_events(&mut draft, &profile, &events)?;
        commit(&state, &mut store, draft).await?;
    }

    info!(%profile, year = payload.year, month = payload.month, changed, "month generated");
    Ok(Json(ChangedResponse { changed }))
}

pub async fn get_month_stats(
    State(state): State<AppState>,
    Path(profile): Path<String>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<MonthStats>, AppError> {
    let profile = checked_profile(profile)?;
    let month = match query.month {
        Some(month) => {
            let month = month.trim().to_string();
            if NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_err() {
                return Err(AppError::bad_request("month must be YYYY-MM"));
            }
            month
        }
        None => Local::now().date_naive().format("%Y-%m").to_string(),
    };

    let store = state.store.lock().await;
    let events = load_events(&*store, &profile)?;
    Ok(Json(engine::month_stats(&events, &month)))
}

pub async fn list_ranks(
    State(state): State<AppState>,
    Path(profile): Path<String>,
) -> Result<Json<Vec<RankChangeRecord>>, AppError> {
    let profile = checked_profile(profile)?;
    let store = state.store.lock().await;
    Ok(Json(load_rank_log(&*store, &profile)?))
}

pub async fn confirm_rank(
    State(state): State<AppState>,
    Path(profile): Path<String>,
    Json(payload): Json<ConfirmRankRequest>,
) -> Result<Json<RankChangeRecord>, AppError> {
    let profile = checked_profile(profile)?;
    let rank = Rank::new(payload.rank);
    if rank.as_str().is_empty() {
        return Err(AppError::bad_request("rank is required"));
    }
    let date = checked_date(&payload.date)?;

    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    let mut log = load_rank_log(&draft, &profile)?;
    let record = engine::confirm_rank_change(&mut log, rank, Some(date), payload.note);
    save_rank_log(&mut draft, &profile, &log)?;
    commit(&state, &mut store, draft).await?;

    info!(%profile, rank = %record.rank, "rank change confirmed");
    Ok(Json(record))
}

pub async fn set_invitation(
    State(state): State<AppState>,
    Path(profile): Path<String>,
    Json(payload): Json<InvitationRequest>,
) -> Result<Json<ProgressResponse>, AppError> {
    let profile = checked_profile(profile)?;
    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    let rules = load_rules(&draft)?;
    let mut log = load_rank_log(&draft, &profile)?;
    let current = engine::current_rank(&log);

    if engine::set_pending_invitation(&mut log, payload.enabled, &rules, &current) {
        save_rank_log(&mut draft, &profile, &log)?;
        commit(&state, &mut store, draft).await?;
        info!(%profile, enabled = payload.enabled, "invitation toggled");
    }

    Ok(Json(progress_for(&*store, &profile)?))
}

pub async fn set_invitation_date(
    State(state): State<AppState>,
    Path(profile): Path<String>,
    Json(payload): Json<InvitationDateRequest>,
) -> Result<Json<ProgressResponse>, AppError> {
    let profile = checked_profile(profile)?;
    let date = match payload.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(checked_date(raw)?),
        _ => None,
    };

    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    let mut log = load_rank_log(&draft, &profile)?;
    if !engine::set_pending_date(&mut log, date) {
        return Err(AppError::not_found("no pending invitation"));
    }
    save_rank_log(&mut draft, &profile, &log)?;
    commit(&state, &mut store, draft).await?;

    Ok(Json(progress_for(&*store, &profile)?))
}

pub async fn get_rules(State(state): State<AppState>) -> Result<Json<RuleTable>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(load_rules(&*store)?))
}

pub async fn put_rules(
    State(state): State<AppState>,
    Json(rules): Json<RuleTable>,
) -> Result<Json<RuleTable>, AppError> {
    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    save_rules(&mut draft, &rules)?;
    commit(&state, &mut store, draft).await?;

    info!(count = rules.len(), "rule table replaced");
    Ok(Json(rules))
}

pub async fn get_planning(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlanningDay>>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(load_planning(&*store)?))
}

pub async fn put_planning(
    State(state): State<AppState>,
    Json(planning): Json<Vec<PlanningDay>>,
) -> Result<Json<Vec<PlanningDay>>, AppError> {
    let mut store = state.store.lock().await;
    let mut draft = store.clone();
    save_planning(&mut draft, &planning)?;
    commit(&state, &mut store, draft).await?;
    Ok(Json(planning))
}

/// Reads everything the engine needs for one profile and computes its progress.
pub fn progress_for<S: KeyValueStore + ?Sized>(
    store: &S,
    profile: &str,
) -> Result<ProgressResponse, StorageError> {
    let events = load_events(store, profile)?;
    let log = load_rank_log(store, profile)?;
    let rules = load_rules(store)?;

    let snapshot = engine::snapshot(&events, &log, &rules);
    let forecast = engine::forecast(&events, &snapshot);
    Ok(ProgressResponse {
        profile: profile.to_string(),
        snapshot,
        forecast,
    })
}

/// Writes `draft` to disk and only then makes it the live document.
async fn commit(
    state: &AppState,
    live: &mut MemoryStore,
    draft: MemoryStore,
) -> Result<(), AppError> {
    persist_document(&state.data_path, &draft).await?;
    *live = draft;
    Ok(())
}

fn checked_profile(raw: String) -> Result<String, AppError> {
    let profile = raw.trim();
    let valid = !profile.is_empty()
        && profile
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(AppError::bad_request(
            "profile must use letters, digits, '-' or '_'",
        ));
    }
    Ok(profile.to_string())
}

fn checked_status(raw: &str) -> Result<CompletionStatus, AppError> {
    CompletionStatus::parse(raw)
        .ok_or_else(|| AppError::bad_request("status must be 'planifié', 'fait' or 'non fait'"))
}

fn checked_date(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| AppError::bad_request("date must be YYYY-MM-DD"))
}
