use askama::Template;
use axum::{
    extract::{Multipart, State},
    response::Html,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use uuid::Uuid;

use super::views::{ActionResponse, IndexPage};
use super::{Action, FormInputs, Outcome};
use crate::errors::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_id";

/// Reuses the caller's session id, or issues a new one on the returned jar.
fn session_id(jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        return (jar, id);
    }
    let id = Uuid::new_v4();
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), id)
}

/// Reads one form submission. An empty file part counts as no upload.
async fn read_submission(mut multipart: Multipart) -> Result<(Action, FormInputs), AppError> {
    let mut action = None;
    let mut inputs = FormInputs::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "action" => {
                let raw = field.text().await?;
                action = Some(raw.parse::<Action>().map_err(AppError::Validation)?);
            }
            "job_description" => inputs.job_description = field.text().await?,
            "update_instruction" => inputs.update_instruction = field.text().await?,
            "question_count" => inputs.question_count = Some(field.text().await?),
            "topic" => inputs.topic = Some(field.text().await?).filter(|t| !t.is_empty()),
            "level" => inputs.level = Some(field.text().await?).filter(|l| !l.is_empty()),
            "resume" => {
                let data = field.bytes().await?;
                if !data.is_empty() {
                    debug!("Received resume upload ({} bytes)", data.len());
                    inputs.resume = Some(data);
                }
            }
            _ => {
                let _ = field.bytes().await?;
            }
        }
    }

    let action = action.ok_or_else(|| AppError::Validation("missing 'action' field".into()))?;
    Ok((action, inputs))
}

/// Runs the action while holding the caller's session, so overlapping submissions
/// from one browser apply in turn.
async fn run_submission(
    state: &AppState,
    id: Uuid,
    multipart: Multipart,
) -> Result<(super::SessionState, Outcome), AppError> {
    let (action, inputs) = read_submission(multipart).await?;
    let mut session = state.sessions.checkout(id).await;
    let outcome = state.controller.dispatch(&mut *session, action, inputs).await;
    Ok((session.clone(), outcome))
}

/// GET /
pub async fn handle_index(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>), AppError> {
    let (jar, id) = session_id(jar);
    let session = state.sessions.load(id).await;
    let page = IndexPage::new(&session, &Outcome::Idle).render()?;
    Ok((jar, Html(page)))
}

/// POST /
pub async fn handle_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<(CookieJar, Html<String>), AppError> {
    let (jar, id) = session_id(jar);
    let (session, outcome) = run_submission(&state, id, multipart).await?;
    let page = IndexPage::new(&session, &outcome).render()?;
    Ok((jar, Html(page)))
}

/// POST /api/v1/actions
pub async fn handle_action(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<(CookieJar, Json<ActionResponse>), AppError> {
    let (jar, id) = session_id(jar);
    let (_, outcome) = run_submission(&state, id, multipart).await?;
    Ok((jar, Json(ActionResponse::from(outcome))))
}
