use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/profiles/:profile", get(handlers::profile_page))
        .route("/api/profiles/:profile/progress", get(handlers::get_progress))
        .route(
            "/api/profiles/:profile/events",
            get(handlers::list_events).post(handlers::create_event),
        )
        .route("/api/profiles/:profile/events/sweep", post(handlers::sweep_overdue))
        .route("/api/profiles/:profile/events/:id/status", post(handlers::update_status))
        .route("/api/profiles/:profile/calendar/generate", post(handlers::generate_month))
        .route("/api/profiles/:profile/stats/month", get(handlers::get_month_stats))
        .route(
            "/api/profiles/:profile/ranks",
            get(handlers::list_ranks).post(handlers::confirm_rank),
        )
        .route("/api/profiles/:profile/invitation", post(handlers::set_invitation))
        .route("/api/profiles/:profile/invitation/date", post(handlers::set_invitation_date))
        .route("/api/rules", get(handlers::get_rules).put(handlers::put_rules))
        .route("/api/planning", get(handlers::get_planning).put(handlers::put_planning))
        .with_state(state)
}
