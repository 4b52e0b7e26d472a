use axum::{
    Extension, Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::analysis::{analyze_entry, transcribe_audio};
use crate::config::Config;
use crate::entry::JournalEntry;
use crate::error::{JournalError, Result};
use crate::gemini::{GeminiClient, GenerativeModel};
use crate::login::{self, SessionId, SessionStore};
use crate::pages::{JournalView, Pages};
use crate::sheets::{GoogleWorksheet, Worksheet};

/// Shown to the writer after a successful submission. The analysis itself is
/// never shown.
pub const SUCCESS_MESSAGE: &str = "Tu terapeuta ha recibido tu registro de forma segura";

/// Uploaded audio clips can be a few minutes long.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

pub struct AppState {
    pub config: Config,
    pub model: Arc<dyn GenerativeModel>,
    pub worksheet: Arc<dyn Worksheet>,
    pub sessions: SessionStore,
    pub pages: Pages,
}

impl AppState {
    pub fn new(
        mut config: Config,
        model: Arc<dyn GenerativeModel>,
        worksheet: Arc<dyn Worksheet>,
    ) -> Result<Self> {
        login::seal_app_password(&mut config)?;
        Ok(AppState {
            sessions: SessionStore::new(config.session_duration()),
            pages: Pages::new()?,
            config,
            model,
            worksheet,
        })
    }
}

#[derive(Deserialize)]
struct EntryForm {
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    /// The whole draft after this clip, to replace the text area content
    pub transcription: String,
    /// False when the clip was already transcribed or produced no text
    pub transcribed: bool,
    pub error: Option<String>,
}

/// Build the router with all routes. Everything except the login page,
/// health check and static assets requires a session.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(serve_journal))
        .route("/entries", post(submit_entry))
        .route(
            "/api/transcribe",
            post(transcribe).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        )
        .route("/logout", post(login::handle_logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .route(
            "/login",
            get(login::serve_login_page).post(login::handle_login),
        )
        .route("/health", get(health))
        .merge(protected)
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .with_state(state)
}

/// Start the web form with Gemini and Google Sheets behind it.
pub async fn run(config: Config) -> Result<()> {
    config.validate_web()?;

    let model = Arc::new(GeminiClient::new(
        &config.gemini_base_url,
        &config.web_model,
        config.gemini_key()?,
    ));
    let worksheet = Arc::new(GoogleWorksheet::from_config(&config)?);
    let bind = config.bind.clone();
    let state = Arc::new(AppState::new(config, model, worksheet)?);

    let listener = TcpListener::bind(&bind).await?;
    log::info!("Listening on http://{}", bind);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

async fn health() -> &'static str {
    "ok"
}

fn render(state: &AppState, status: StatusCode, view: &JournalView) -> Response {
    match state.pages.journal(view) {
        Ok(page) => (status, page).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn serve_journal(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> Response {
    let mut view = JournalView::new(state.config.max_entry_chars);
    if let Some(draft) = state.sessions.draft(&session_id) {
        view.text = draft.transcription;
    }
    render(&state, StatusCode::OK, &view)
}

/// Analyze the entry and append it as a new row.
async fn record_entry(state: &AppState, entry: JournalEntry) -> Result<()> {
    let analysis = analyze_entry(state.model.as_ref(), &entry.raw_text).await?;
    let entry = entry.with_analysis(analysis);
    state.worksheet.append_row(&entry.to_row()).await
}

async fn submit_entry(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Form(form): Form<EntryForm>,
) -> Response {
    let mut view = JournalView::new(state.config.max_entry_chars);
    view.identifier = form.identifier.clone();
    view.text = form.text.clone();

    // Keep what was typed so a failed submission can be retried.
    state.sessions.update_draft(&session_id, |draft| {
        draft.transcription = form.text.clone();
    });

    let entry = match JournalEntry::new(&form.identifier, &form.text, state.config.max_entry_chars)
    {
        Ok(entry) => entry,
        Err(JournalError::Validation(message)) => {
            view.warning = Some(message);
            return render(&state, StatusCode::BAD_REQUEST, &view);
        }
        Err(e) => {
            view.error = Some(e.to_string());
            return render(&state, StatusCode::INTERNAL_SERVER_ERROR, &view);
        }
    };

    let identifier = entry.identifier.clone();
    match record_entry(&state, entry).await {
        Ok(()) => {
            log::info!("Entry recorded for {}", identifier);
            state.sessions.update_draft(&session_id, |draft| {
                draft.transcription.clear();
            });
            view.text.clear();
            view.success = Some(SUCCESS_MESSAGE.to_string());
            render(&state, StatusCode::OK, &view)
        }
        Err(e) => {
            log::error!("Failed to record entry for {}: {}", identifier, e);
            view.error = Some(format!(
                "Error al enviar el registro. Revisa tu conexión: {}",
                e
            ));
            render(&state, StatusCode::BAD_GATEWAY, &view)
        }
    }
}

fn transcribe_error(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(TranscribeResponse {
            transcription: String::new(),
            transcribed: false,
            error: Some(message),
        }),
    )
        .into_response()
}

/// Transcribe an uploaded clip into the session draft.
///
/// Multipart fields: `clip_id` (required), `audio` (required) and `text`, the
/// current text area content, which replaces the draft before the transcript
/// is appended. A clip whose id matches the last transcribed clip is not sent
/// to the model again.
async fn transcribe(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    mut multipart: Multipart,
) -> Response {
    let mut clip_id = None;
    let mut text = None;
    let mut audio = None;
    let mut mime_type = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                match name.as_str() {
                    "clip_id" => clip_id = field.text().await.ok(),
                    "text" => text = field.text().await.ok(),
                    "audio" => {
                        mime_type = field.content_type().map(str::to_string);
                        audio = field.bytes().await.ok();
                    }
                    _ => {}
                }
            }
            Ok(None) => break,
            Err(e) => {
                return transcribe_error(StatusCode::BAD_REQUEST, format!("Invalid upload: {}", e));
            }
        }
    }

    let clip_id = clip_id.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    let audio = audio.filter(|a| !a.is_empty());
    let (Some(clip_id), Some(audio)) = (clip_id, audio) else {
        return transcribe_error(
            StatusCode::BAD_REQUEST,
            "Falta el audio o su identificador.".to_string(),
        );
    };

    let seen = state.sessions.update_draft(&session_id, |draft| {
        if let Some(text) = text {
            draft.transcription = text;
        }
        draft.last_audio_id.as_deref() == Some(clip_id.as_str())
    });
    match seen {
        None => return transcribe_error(StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        Some(true) => {
            let transcription = state
                .sessions
                .draft(&session_id)
                .map(|d| d.transcription)
                .unwrap_or_default();
            return Json(TranscribeResponse {
                transcription,
                transcribed: false,
                error: None,
            })
            .into_response();
        }
        Some(false) => {}
    }

    log::info!("Transcribing clip {} ({} bytes)", clip_id, audio.len());
    let result = transcribe_audio(state.model.as_ref(), &audio, mime_type.as_deref()).await;

    let transcription = state
        .sessions
        .update_draft(&session_id, |draft| {
            if let Ok(transcript) = &result {
                draft.append_transcript(transcript);
            }
            draft.last_audio_id = Some(clip_id);
            draft.transcription.clone()
        })
        .unwrap_or_default();

    match result {
        Ok(transcript) => Json(TranscribeResponse {
            transcription,
            transcribed: !transcript.is_empty(),
            error: None,
        })
        .into_response(),
        Err(e) => {
            log::error!("Transcription failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(TranscribeResponse {
                    transcription,
                    transcribed: false,
                    error: Some(format!("Error en la transcripción: {}", e)),
                }),
            )
                .into_response()
        }
    }
}
