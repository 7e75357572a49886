//! Interface de linha de comando do aimaster baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (submit, status,
//! watch, download) e flags globais (--interval, --max-poll-retries,
//! --api-url, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// aimaster: envia áudio para masterização remota e acompanha cada job.
#[derive(Debug, Parser)]
#[command(name = "aimaster", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Intervalo entre consultas de status, em segundos.
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Falhas consecutivas de consulta toleradas antes de desistir de um job.
    #[arg(long, global = true)]
    pub max_poll_retries: Option<u32>,

    /// URL base da API de masterização.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia um arquivo de áudio, cria o job de masterização e acompanha o progresso.
    Submit {
        /// Caminho do arquivo de áudio.
        file: PathBuf,

        /// Nome enviado ao servidor (padrão: nome do arquivo).
        #[arg(long)]
        name: Option<String>,
    },

    /// Consulta uma vez o status de um job.
    Status {
        /// Identificador do job de masterização.
        job_id: String,
    },

    /// Acompanha jobs existentes até todos terminarem.
    Watch {
        /// Identificadores dos jobs.
        #[arg(required = true)]
        job_ids: Vec<String>,
    },

    /// Mostra a URL de download de um áudio.
    Download {
        /// Identificador do áudio (normalmente o áudio de saída de um job).
        audio_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_submit_subcommand() {
        let cli = Cli::parse_from(["aimaster", "submit", "song.wav"]);
        match cli.command {
            Command::Submit { file, name } => {
                assert_eq!(file, PathBuf::from("song.wav"));
                assert!(name.is_none());
            }
            _ => panic!("expected Submit command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "aimaster",
            "--interval",
            "2",
            "--max-poll-retries",
            "3",
            "--api-url",
            "http://localhost:9000",
            "--verbose",
            "status",
            "j1",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.interval, Some(2));
        assert_eq!(cli.max_poll_retries, Some(3));
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9000"));
        assert!(matches!(cli.command, Command::Status { job_id } if job_id == "j1"));
    }

    #[test]
    fn cli_watch_requires_ids() {
        assert!(Cli::try_parse_from(["aimaster", "watch"]).is_err());
        let cli = Cli::parse_from(["aimaster", "watch", "j1", "j2"]);
        match cli.command {
            Command::Watch { job_ids } => assert_eq!(job_ids, vec!["j1", "j2"]),
            _ => panic!("expected Watch command"),
        }
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
