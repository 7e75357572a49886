//! Tipos de dados trafegados com a API de masterização.
//!
//! As structs de resposta aceitam identificadores numéricos ou textuais e
//! campos opcionais ausentes; a conversão para o modelo de domínio aplica
//! os valores padrão (progressão 0, data de criação = agora).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::state_machine::{Audio, JobStatus, MasteringJob};

/// Corpo da requisição `POST /masterings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMasteringRequest {
    /// Identificador do áudio de entrada já enviado.
    pub input_audio_id: String,
    /// Modo de masterização solicitado (ex.: "default").
    pub mode: String,
}

/// Resposta de `POST /audios`.
#[derive(Debug, Clone, Deserialize)]
pub struct AudioResponse {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AudioResponse {
    /// Converte para [`Audio`], guardando o nome de arquivo informado pelo chamador.
    pub fn into_audio(self, file_name: &str) -> Audio {
        Audio {
            id: self.id,
            file_name: file_name.to_string(),
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Resposta de `POST /masterings` e `GET /masterings/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MasteringResponse {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub input_audio_id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub output_audio_id: Option<String>,
    pub status: JobStatus,
    /// `null` ou ausente equivale a 0.
    #[serde(default)]
    pub progression: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MasteringResponse {
    /// Converte para o snapshot de domínio; a progressão é limitada a `[0, 1]`.
    pub fn into_job(self) -> MasteringJob {
        MasteringJob::new(
            self.id,
            self.input_audio_id,
            self.output_audio_id,
            self.status,
            self.progression.unwrap_or(0.0),
            self.created_at.unwrap_or_else(Utc::now),
        )
    }
}

/// Corpo de erro devolvido pelo servidor, quando houver.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extrai a mensagem do servidor de um corpo de erro.
///
/// Procura os campos JSON `message` ou `error`; caso contrário usa o texto
/// bruto não vazio.
pub fn server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(trimmed)
        && let Some(msg) = parsed.message.or(parsed.error)
        && !msg.trim().is_empty()
    {
        return Some(msg);
    }
    Some(trimmed.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(i64),
}

impl From<IdRepr> for String {
    fn from(id: IdRepr) -> Self {
        match id {
            IdRepr::Text(s) => s,
            IdRepr::Number(n) => n.to_string(),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    IdRepr::deserialize(d).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<IdRepr>::deserialize(d).map(|id| id.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mastering_response_deserialize_from_api_format() {
        let json = r#"{
            "id": "j1",
            "input_audio_id": "a1",
            "output_audio_id": "o1",
            "status": "succeeded",
            "progression": 1.0,
            "created_at": "2026-01-05T10:00:00Z"
        }"#;
        let job = serde_json::from_str::<MasteringResponse>(json).unwrap().into_job();
        assert_eq!(job.id, "j1");
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.output_audio_id(), Some("o1"));
        assert_eq!(job.created_at.to_rfc3339(), "2026-01-05T10:00:00+00:00");
    }

    #[test]
    fn numeric_ids_and_missing_progression() {
        let json = r#"{"id": 42, "input_audio_id": 7, "status": "waiting", "progression": null}"#;
        let job = serde_json::from_str::<MasteringResponse>(json).unwrap().into_job();
        assert_eq!(job.id, "42");
        assert_eq!(job.input_audio_id, "7");
        assert_eq!(job.output_audio_id, None);
        assert_eq!(job.progression, 0.0);
    }

    #[test]
    fn out_of_range_progression_is_clamped() {
        let json = r#"{"id": "j", "input_audio_id": "a", "status": "processing", "progression": 140.0}"#;
        let job = serde_json::from_str::<MasteringResponse>(json).unwrap().into_job();
        assert_eq!(job.progression, 1.0);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let json = r#"{"id": "j", "input_audio_id": "a", "status": "exploded"}"#;
        assert!(serde_json::from_str::<MasteringResponse>(json).is_err());
    }

    #[test]
    fn audio_response_keeps_caller_file_name() {
        let resp: AudioResponse =
            serde_json::from_str(r#"{"id": 9, "created_at": "2026-01-05T10:00:00Z"}"#).unwrap();
        let audio = resp.into_audio("a.wav");
        assert_eq!(audio.id, "9");
        assert_eq!(audio.file_name, "a.wav");
    }

    #[test]
    fn server_message_extraction() {
        assert_eq!(server_message(r#"{"message": "quota exceeded"}"#).as_deref(), Some("quota exceeded"));
        assert_eq!(server_message(r#"{"error": "not found"}"#).as_deref(), Some("not found"));
        assert_eq!(server_message("Bad Gateway\n").as_deref(), Some("Bad Gateway"));
        assert_eq!(server_message("   "), None);
    }

    #[test]
    fn create_request_serializes_expected_fields() {
        let req = CreateMasteringRequest {
            input_audio_id: "a1".into(),
            mode: "default".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, serde_json::json!({"input_audio_id": "a1", "mode": "default"}));
    }
}
