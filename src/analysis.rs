//! Prompts and the two model calls the journal makes: audio transcription and
//! entry analysis.

use crate::entry::Analysis;
use crate::error::Result;
use crate::gemini::{GenerativeModel, Part};

/// Hesitations and repetitions are part of the material, so the transcript must
/// keep them.
pub const TRANSCRIPTION_PROMPT: &str = "\
Transcribe el siguiente audio palabra por palabra.
Es CRUCIAL que mantengas todas las dudas, pausas ('eh', 'mmm'), titubeos y repeticiones de palabras exactamente como se pronuncian.
No corrijas la gramática ni omitas estos elementos, ya que son esenciales para un análisis psicoanalítico posterior.";

pub const ANALYSIS_PROMPT: &str = "\
Actúa como un asistente analítico especializado en procesamiento de lenguaje natural para psicólogos de orientación psicoanalítica.
Tu tarea es procesar el registro de un paciente y devolver un análisis descriptivo de mecanismos de defensa o repeticiones significativas.
Termina siempre con: 'TEMAS:' seguido de las palabras clave.";

/// Mime type tried first; browsers' MediaRecorder produces webm.
pub const PRIMARY_AUDIO_MIME: &str = "audio/webm";
pub const FALLBACK_AUDIO_MIME: &str = "audio/wav";

/// Full analysis prompt for one diary entry.
pub fn analysis_prompt(raw_text: &str) -> String {
    format!("{ANALYSIS_PROMPT}\n\nREGISTRO:\n{raw_text}")
}

/// Ask the model for an analysis of `raw_text` and split it on `TEMAS:`.
pub async fn analyze_entry(model: &dyn GenerativeModel, raw_text: &str) -> Result<Analysis> {
    let response = model.generate(&[Part::Text(analysis_prompt(raw_text))]).await?;
    Ok(Analysis::from_response(&response))
}

/// Transcribe an audio clip, keeping pauses and repetitions.
///
/// The clip is sent as `mime_hint` (or `audio/webm` when none is given). If
/// that fails the same bytes are retried as `audio/wav`; the error of the
/// last attempt is returned when both fail.
pub async fn transcribe_audio(
    model: &dyn GenerativeModel,
    audio: &[u8],
    mime_hint: Option<&str>,
) -> Result<String> {
    let primary = mime_hint
        .filter(|m| m.starts_with("audio/"))
        .map(|m| m.split(';').next().unwrap_or(m).trim())
        .unwrap_or(PRIMARY_AUDIO_MIME);

    let mut attempts = vec![primary];
    if primary != FALLBACK_AUDIO_MIME {
        attempts.push(FALLBACK_AUDIO_MIME);
    }

    let mut last_err = None;
    for mime_type in attempts {
        let parts = [
            Part::text(TRANSCRIPTION_PROMPT),
            Part::InlineData {
                mime_type: mime_type.to_string(),
                data: audio.to_vec(),
            },
        ];
        match model.generate(&parts).await {
            Ok(text) => return Ok(text.trim().to_string()),
            Err(e) => {
                log::warn!("Transcription as {} failed: {}", mime_type, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or(crate::error::JournalError::EmptyResponse(None)))
}
