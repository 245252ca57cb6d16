mod app;
mod msg;

use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;

use anyhow::Result;

use app::App;
use forca_bridge::Completion;
use forca_bridge::model::config::AppConfig;
use msg::Msg;

fn main() -> Result<()> {
    let config = AppConfig::load()?;

    // Initialize logging to file (never stdout)
    let log_dir = directories::ProjectDirs::from("", "", "forca")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("/tmp"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "forca.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(config.general.log_filter.as_str())
        .init();

    tracing::info!("forca starting");

    let result = run(config);
    if let Err(e) = &result {
        tracing::error!("forca error: {e:?}");
    }
    result
}

fn run(config: AppConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();
    let (completion_tx, completion_rx) = mpsc::channel::<Completion>();
    let mut app = App::new(config, completion_tx);

    // Input thread — reads stdin lines and forwards as Msg
    let tx_input = tx.clone();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx_input.send(Msg::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx_input.send(Msg::InputClosed);
    });

    // Completion thread — host completions are applied on a later loop turn
    let tx_completion = tx;
    thread::spawn(move || {
        for completion in completion_rx {
            if tx_completion.send(Msg::Completion(completion)).is_err() {
                break;
            }
        }
    });

    let mut stdout = io::stdout();
    print_notifications(&mut stdout, app.take_notifications())?;

    // ── Main event loop ──
    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        app.update(first)?;

        while let Ok(msg) = rx.try_recv() {
            app.update(msg)?;
        }

        print_notifications(&mut stdout, app.take_notifications())?;

        if app.should_quit {
            break;
        }
    }

    tracing::info!("forca stopped");
    Ok(())
}

fn print_notifications(out: &mut impl Write, notes: Vec<String>) -> io::Result<()> {
    for note in notes {
        writeln!(out, "{note}")?;
    }
    out.flush()
}
