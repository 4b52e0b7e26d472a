#![allow(dead_code)]

use async_trait::async_trait;
use journal::gemini::{GenerativeModel, Part};
use journal::{JournalError, Result, Worksheet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers analysis prompts and transcription requests with canned text.
pub struct FakeModel {
    pub analysis: Mutex<Result<String>>,
    pub transcript: Mutex<Result<String>>,
    pub analysis_calls: AtomicUsize,
    pub transcription_calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

fn clone_result(r: &Result<String>) -> Result<String> {
    match r {
        Ok(s) => Ok(s.clone()),
        Err(e) => Err(JournalError::Api {
            status: 503,
            message: e.to_string(),
        }),
    }
}

impl FakeModel {
    pub fn new(analysis: &str, transcript: &str) -> Self {
        FakeModel {
            analysis: Mutex::new(Ok(analysis.to_string())),
            transcript: Mutex::new(Ok(transcript.to_string())),
            analysis_calls: AtomicUsize::new(0),
            transcription_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_analysis(self) -> Self {
        *self.analysis.lock().unwrap() = Err(JournalError::Api {
            status: 503,
            message: "model overloaded".into(),
        });
        self
    }

    pub fn failing_transcription(self) -> Self {
        *self.transcript.lock().unwrap() = Err(JournalError::Api {
            status: 400,
            message: "unsupported audio".into(),
        });
        self
    }

    pub fn analysis_calls(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }

    pub fn transcription_calls(&self) -> usize {
        self.transcription_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for FakeModel {
    async fn generate(&self, parts: &[Part]) -> Result<String> {
        let has_audio = parts
            .iter()
            .any(|p| matches!(p, Part::InlineData { .. }));
        if has_audio {
            self.transcription_calls.fetch_add(1, Ordering::SeqCst);
            return clone_result(&self.transcript.lock().unwrap());
        }

        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        for part in parts {
            if let Part::Text(text) = part {
                self.prompts.lock().unwrap().push(text.clone());
            }
        }
        clone_result(&self.analysis.lock().unwrap())
    }
}

/// A worksheet kept in memory, 1-based like the real one.
pub struct MemorySheet {
    pub rows: Mutex<Vec<Vec<String>>>,
    pub updates: Mutex<Vec<(usize, usize, String)>>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemorySheet {
    pub fn new(rows: &[&[&str]]) -> Self {
        MemorySheet {
            rows: Mutex::new(
                rows.iter()
                    .map(|r| r.iter().map(|c| c.to_string()).collect())
                    .collect(),
            ),
            updates: Mutex::new(Vec::new()),
            fail_reads: false,
            fail_writes: false,
        }
    }

    pub fn with_header() -> Self {
        Self::new(&[&["Fecha", "Nombre", "Registro", "", "Temas", "Resumen"]])
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(usize, usize, String)> {
        self.updates.lock().unwrap().clone()
    }

    fn unavailable() -> JournalError {
        JournalError::Api {
            status: 503,
            message: "sheets unavailable".into(),
        }
    }
}

#[async_trait]
impl Worksheet for MemorySheet {
    async fn append_row(&self, cells: &[String]) -> Result<()> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        self.rows.lock().unwrap().push(cells.to_vec());
        Ok(())
    }

    async fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        Ok(self.rows())
    }

    async fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.len() < row {
            rows.resize(row, Vec::new());
        }
        let cells = &mut rows[row - 1];
        if cells.len() < col {
            cells.resize(col, String::new());
        }
        cells[col - 1] = value.to_string();
        self.updates
            .lock()
            .unwrap()
            .push((row, col, value.to_string()));
        Ok(())
    }
}
