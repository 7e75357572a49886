//! Interface de terminal do aimaster: barras de progresso e saída colorida.
//!
//! Usa `indicatif` para uma barra por job e `console` para estilização com
//! cores. O [`JobBoard`] consome os [`JobEvent`]s do rastreador e indica
//! quando cada job terminou.

use std::collections::HashMap;

use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::state_machine::{JobStatus, MasteringJob};
use crate::tracker::JobEvent;

/// Painel com uma barra de progresso por job acompanhado.
pub struct JobBoard {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
    // Estilo verde para jobs concluídos.
    green: Style,
    // Estilo vermelho para falhas.
    red: Style,
    // Estilo amarelo para jobs em andamento.
    yellow: Style,
}

impl Default for JobBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl JobBoard {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza o painel com um evento. A barra do job é encerrada quando ele
    /// chega a um estado terminal ou o polling é interrompido por erro.
    pub fn handle(&mut self, event: &JobEvent) {
        match event {
            JobEvent::Tracked(job) | JobEvent::Updated(job) => {
                let bar = self.bar(&job.id).clone();
                bar.set_position(job.percent());
                bar.set_message(describe(job));
                match job.status {
                    JobStatus::Succeeded => {
                        bar.finish_with_message(format!("{} {}", self.green.apply_to("✓"), describe(job)));
                    }
                    JobStatus::Failed => {
                        bar.abandon_with_message(format!("{} {}", self.red.apply_to("✗"), describe(job)));
                    }
                    _ => {}
                }
            }
            JobEvent::PollFailed { job_id, error } => {
                let msg = format!("{} {job_id}: {error}", self.red.apply_to("✗"));
                self.bar(job_id).abandon_with_message(msg);
            }
        }
    }

    /// Imprime uma linha acima das barras sem corrompê-las.
    pub fn note(&self, line: &str) {
        let _ = self.multi.println(format!("  {} {line}", self.yellow.apply_to("↻")));
    }

    fn bar(&mut self, job_id: &str) -> &ProgressBar {
        self.bars.entry(job_id.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(100));
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{bar:30.cyan/blue} {pos:>3}% {msg}")
                    .expect("invalid template")
                    .progress_chars("=> "),
            );
            bar
        })
    }
}

/// Resumo de uma linha de um snapshot de job.
pub fn describe(job: &MasteringJob) -> String {
    match job.output_audio_id() {
        Some(output) => format!("{} {} → {output}", job.id, job.status),
        None => format!("{} {}", job.id, job.status),
    }
}

/// Imprime o snapshot formatado em JSON.
pub fn print_job(job: &MasteringJob) {
    println!("{}", serde_json::to_string_pretty(job).unwrap_or_default());
}
