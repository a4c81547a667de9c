//! Interface de terminal do userpool: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`PoolProgress`] acompanha visualmente uma
//! reserva, que pode levar minutos enquanto o pool está cheio.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;
use userpool::{LeaseRecord, PoolError, ReserveRequest, ReservedIdentity};

/// Spinner currently on screen, shared with the log writer.
///
/// Log lines go through [`ProgressBar::suspend`] while a spinner is active so
/// retry warnings do not land in the middle of the spinner line.
#[derive(Clone, Default)]
pub struct SpinnerSlot(Arc<Mutex<Option<ProgressBar>>>);

impl SpinnerSlot {
    fn set(&self, pb: Option<ProgressBar>) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = pb;
        }
    }

    fn current(&self) -> Option<ProgressBar> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }
}

impl<'a> MakeWriter<'a> for SpinnerSlot {
    type Writer = SuspendingWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendingWriter {
            spinner: self.current(),
            inner: io::stderr(),
        }
    }
}

/// Writes whole buffers with the spinner, if any, cleared from the terminal.
pub struct SuspendingWriter<W> {
    spinner: Option<ProgressBar>,
    inner: W,
}

impl<W: Write> Write for SuspendingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = &mut self.inner;
        match &self.spinner {
            Some(pb) => pb.suspend(|| inner.write_all(buf))?,
            None => inner.write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Indicador visual de progresso para uma reserva no terminal.
///
/// Mensagens vão para stderr; stdout fica livre para o JSON da conta.
pub struct PoolProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Onde o writer de logs encontra o spinner ativo.
    slot: SpinnerSlot,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para avisos.
    yellow: Style,
}

impl PoolProgress {
    /// Inicia o spinner descrevendo a reserva pedida.
    pub fn start(request: &ReserveRequest, slot: &SpinnerSlot) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(describe(request));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        slot.set(Some(pb.clone()));

        Self {
            pb,
            slot: slot.clone(),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner com a conta reservada.
    pub fn reserved(&self, identity: &ReservedIdentity) {
        self.finish();
        eprintln!(
            "  {} Reserved {} user {}",
            self.green.apply_to("✓"),
            identity.platform,
            identity.email
        );
    }

    /// Finaliza o spinner com o erro da reserva.
    pub fn failed(&self, err: &PoolError) {
        self.finish();
        eprintln!("  {} {err}", self.red.apply_to("✗"));
    }

    fn finish(&self) {
        self.slot.set(None);
        self.pb.finish_and_clear();
    }

    /// Imprime o registro da concessão em JSON com estilo colorido.
    ///
    /// Liberação não confirmada aparece em amarelo: a conta só volta ao pool
    /// quando ele expirar a reserva.
    pub fn print_lease(&self, record: &LeaseRecord) {
        let style = if record.release_acknowledged {
            &self.green
        } else {
            &self.yellow
        };
        eprintln!();
        eprintln!("{}", style.apply_to("─── Lease Record ───"));
        eprintln!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}

fn describe(request: &ReserveRequest) -> String {
    let platform = request
        .platform
        .map(|p| p.to_string())
        .unwrap_or_else(|| "any".to_string());
    match &request.features {
        Some(filter) if !filter.is_empty() => {
            format!("Reserving {platform} user with {}", filter.to_query_json())
        }
        _ => format!("Reserving {platform} user"),
    }
}
