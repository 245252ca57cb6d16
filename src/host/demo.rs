//! In-process host used by the `forca` console.
//!
//! Blocking capabilities run inline. Deferred capabilities hand their job to
//! a worker thread, which posts a [`Completion`] once the work is done; the
//! owner of the receiving end routes it through the bridge's
//! `ResolutionChannel` on its next loop turn.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::bridge::correlation::CorrelationId;
use crate::bridge::resolution::Completion;
use crate::host::table::HostTable;
use crate::model::config::{BridgeConfig, HostConfig};
use crate::model::value::Value;

pub const NORMALIZE_WORD: &str = "normalize_word";
pub const WORD_LENGTH: &str = "word_length";
pub const LOAD_WORDS: &str = "load_words";
pub const ECHO_LATER: &str = "echo_later";

#[derive(Debug)]
enum Job {
    LoadWords(CorrelationId),
    EchoLater(CorrelationId, Vec<Value>),
}

#[derive(Debug)]
pub struct DemoHost {
    table: Arc<HostTable>,
    last_saved: Arc<Mutex<Option<Value>>>,
}

impl DemoHost {
    /// Build the capability table and start the worker that completes deferred calls.
    pub fn install(
        bridge: &BridgeConfig,
        config: &HostConfig,
        completions: Sender<Completion>,
    ) -> Self {
        let table = Arc::new(HostTable::new());
        let last_saved = Arc::new(Mutex::new(None));
        let jobs = spawn_worker(
            config.word_list_path(),
            config.completion_delay(),
            completions,
        );

        let saved = Arc::clone(&last_saved);
        table.register(bridge.liveness_marker.clone(), move |args: &[Value]| {
            *saved.lock().unwrap_or_else(PoisonError::into_inner) = args.first().cloned();
            Ok(Value::Null)
        });

        table.register(NORMALIZE_WORD, |args: &[Value]| {
            let word = string_arg(args, 0)?;
            Ok(Value::Str(word.trim().to_lowercase()))
        });

        table.register(WORD_LENGTH, |args: &[Value]| {
            let word = string_arg(args, 0)?;
            Ok(Value::Int(word.chars().count() as i64))
        });

        let load_jobs = jobs.clone();
        table.register(LOAD_WORDS, move |args: &[Value]| {
            let id = correlation_arg(args)?;
            load_jobs
                .send(Job::LoadWords(id))
                .map(|()| Value::Null)
                .map_err(|_| "host worker stopped".to_string())
        });

        table.register(ECHO_LATER, move |args: &[Value]| {
            let id = correlation_arg(args)?;
            jobs.send(Job::EchoLater(id, args[1..].to_vec()))
                .map(|()| Value::Null)
                .map_err(|_| "host worker stopped".to_string())
        });

        Self { table, last_saved }
    }

    pub fn table(&self) -> Arc<HostTable> {
        Arc::clone(&self.table)
    }

    /// Last value handed to the liveness marker.
    pub fn last_saved(&self) -> Option<Value> {
        self.last_saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn spawn_worker(
    word_list: PathBuf,
    delay: Duration,
    completions: Sender<Completion>,
) -> Sender<Job> {
    let (tx, rx) = mpsc::channel::<Job>();

    thread::spawn(move || {
        for job in rx {
            let completion = match job {
                Job::LoadWords(id) => match read_words(&word_list) {
                    Ok(words) => Completion::success(id, words),
                    Err(err) => Completion::failure(id, err),
                },
                Job::EchoLater(id, args) => {
                    thread::sleep(delay);
                    Completion::success(id, args)
                }
            };

            if completions.send(completion).is_err() {
                break;
            }
        }
        tracing::debug!("demo host worker stopped");
    });

    tx
}

fn read_words(path: &Path) -> Result<Vec<Value>, String> {
    let raw = fs::read_to_string(path).map_err(|err| format!("{}: {err}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Value::from)
        .collect())
}

fn string_arg(args: &[Value], index: usize) -> Result<&str, String> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("argument {index} must be a string"))
}

fn correlation_arg(args: &[Value]) -> Result<CorrelationId, String> {
    let raw = args.first().ok_or("missing correlation id")?;
    CorrelationId::try_from(raw).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn host_config(word_list: PathBuf) -> HostConfig {
        HostConfig {
            word_list: word_list.display().to_string(),
            completion_delay_ms: 0,
        }
    }

    #[test]
    fn blocking_capabilities_run_inline() {
        let (tx, _rx) = mpsc::channel();
        let host = DemoHost::install(
            &BridgeConfig::default(),
            &host_config(PathBuf::from("/nonexistent")),
            tx,
        );
        let table = host.table();

        let normalize = table.get(NORMALIZE_WORD).unwrap();
        assert_eq!(normalize(&[Value::from("  CASA ")]), Ok(Value::from("casa")));

        let length = table.get(WORD_LENGTH).unwrap();
        assert_eq!(length(&[Value::from("maçã")]), Ok(Value::Int(4)));
        assert!(length(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn liveness_marker_records_its_argument() {
        let (tx, _rx) = mpsc::channel();
        let host = DemoHost::install(
            &BridgeConfig::default(),
            &host_config(PathBuf::from("/nonexistent")),
            tx,
        );
        let save = host.table().get("save_user").unwrap();
        save(&[Value::from("ana")]).unwrap();
        assert_eq!(host.last_saved(), Some(Value::from("ana")));
    }

    #[test]
    fn load_words_completes_from_the_worker() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "casa\n\n  bola \nxadrez").unwrap();

        let (tx, rx) = mpsc::channel();
        let host = DemoHost::install(
            &BridgeConfig::default(),
            &host_config(file.path().to_path_buf()),
            tx,
        );

        let id = CorrelationId::from_raw(7);
        let load = host.table().get(LOAD_WORDS).unwrap();
        load(&[id.to_value()]).unwrap();

        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            completion,
            Completion::success(
                id,
                vec![Value::from("casa"), Value::from("bola"), Value::from("xadrez")]
            )
        );
    }

    #[test]
    fn missing_word_list_completes_with_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let host = DemoHost::install(
            &BridgeConfig::default(),
            &host_config(dir.path().join("absent.txt")),
            tx,
        );

        let id = CorrelationId::from_raw(1);
        host.table().get(LOAD_WORDS).unwrap()(&[id.to_value()]).unwrap();

        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.id, id);
        assert!(!completion.success);
    }

    #[test]
    fn deferred_capabilities_require_a_correlation_id() {
        let (tx, _rx) = mpsc::channel();
        let host = DemoHost::install(
            &BridgeConfig::default(),
            &host_config(PathBuf::from("/nonexistent")),
            tx,
        );
        let echo = host.table().get(ECHO_LATER).unwrap();
        assert!(echo(&[]).is_err());
        assert!(echo(&[Value::from("not-an-id")]).is_err());
    }
}
