use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use crate::error::TelemetryError;
use crate::record::TelemetryRecord;

const HEADER: &str = "ts,evt,node,origin,msg_id,src_id,size";

/// A sink that accepts batches of [`TelemetryRecord`]s from node threads and
/// persists them somewhere, off the hot path of message delivery.
pub trait TelemetryManager: Send + Sync {
    /// Submit a batch of records. Never blocks on I/O: the manager owns a
    /// writer thread that does the actual persisting.
    fn record(&self, records: Vec<TelemetryRecord>) -> Result<(), TelemetryError>;

    /// Signal the writer thread to stop and wait for it to drain and exit.
    fn stop(&mut self);
}

enum Signal {
    Batch(Vec<TelemetryRecord>),
    Stop,
}

/// A [`TelemetryManager`] that appends every record to a CSV file.
pub struct CsvTelemetryManager {
    tx: Sender<Signal>,
    writer: Option<JoinHandle<()>>,
}

impl CsvTelemetryManager {
    /// Open (or create) `target` and start the writer thread. The file is
    /// opened in append mode; the header is written only if the file is new.
    pub fn new(target: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let target = target.as_ref().to_path_buf();
        let needs_header = !target.exists() || std::fs::metadata(&target).map(|m| m.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new().create(true).append(true).open(&target)?;
        if needs_header {
            writeln!(file, "{HEADER}")?;
        }

        let (tx, rx) = mpsc::channel::<Signal>();
        let writer = thread::spawn(move || run_writer(file, rx, target));

        Ok(CsvTelemetryManager { tx, writer: Some(writer) })
    }
}

fn run_writer(mut file: std::fs::File, rx: mpsc::Receiver<Signal>, target: PathBuf) {
    loop {
        match rx.recv() {
            Ok(Signal::Batch(records)) => {
                for record in &records {
                    if let Err(err) = writeln!(file, "{}", record.to_csv_row()) {
                        tracing::warn!(?err, path = %target.display(), "telemetry write failed");
                    }
                }
            }
            Ok(Signal::Stop) | Err(_) => break,
        }
    }
}

impl TelemetryManager for CsvTelemetryManager {
    fn record(&self, records: Vec<TelemetryRecord>) -> Result<(), TelemetryError> {
        if records.is_empty() {
            return Ok(());
        }
        self.tx.send(Signal::Batch(records)).map_err(|_| TelemetryError::Stopped)
    }

    fn stop(&mut self) {
        let _ = self.tx.send(Signal::Stop);
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CsvTelemetryManager {
    fn drop(&mut self) {
        if self.writer.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn writes_header_once_and_appends_rows() {
        let dir = std::env::temp_dir().join(format!("streamline-telemetry-test-{:?}", thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("telemetry.csv");
        let _ = std::fs::remove_file(&path);

        let mut manager = CsvTelemetryManager::new(&path).unwrap();
        manager
            .record(vec![TelemetryRecord {
                ts: 1.0,
                event: "rx".to_string(),
                node: "a".to_string(),
                origin: "b".to_string(),
                message_id: 1,
                data_source_id: None,
                size_bytes: 10,
            }])
            .unwrap();
        manager.stop();

        let mut content = String::new();
        std::fs::File::open(&path).unwrap().read_to_string(&mut content).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "1,rx,a,b,1,,10");
    }
}
