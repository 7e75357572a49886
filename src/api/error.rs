//! Erros de baixo nível do cliente HTTP do serviço de masterização.
//!
//! [`ApiError`] descreve o que deu errado no transporte (status HTTP,
//! rede, payload malformado, arquivo local ilegível). O cliente converte
//! cada variante no erro de operação correspondente de
//! [`MasteringError`](crate::error::MasteringError) usando [`ApiError::diagnostic`].

use thiserror::Error;

/// Falhas que podem ocorrer ao falar com a API remota.
#[derive(Debug, Error)]
pub enum ApiError {
    /// O servidor respondeu com um status fora da faixa 2xx.
    /// `message` é a mensagem do servidor, quando presente, ou um texto genérico.
    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// O corpo da resposta não corresponde ao formato esperado.
    #[error("malformed payload: {0}")]
    Decode(String),

    /// O arquivo de origem do upload não pôde ser lido.
    #[error("cannot read source {source_ref}: {reason}")]
    Source { source_ref: String, reason: String },

    /// A URL base configurada não é utilizável.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Texto de diagnóstico opaco carregado pelos erros de operação.
    pub fn diagnostic(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Network(e) => format!("transport failure: {e}"),
            other => other.to_string(),
        }
    }
}
