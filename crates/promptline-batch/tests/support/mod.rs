//! Shared fixtures: a scripted chat backend and dataset writers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use promptline_batch::{ApiError, ChatBackend, ChatRequest};
use promptline_core::HttpError;
use serde_json::{Value, json};

/// What the fake answers for one call
pub enum Reply {
    Answer(String),
    /// 2xx body without content
    Malformed,
    /// Transport failure
    Down,
}

type Script = dyn Fn(&str, usize) -> Reply + Send + Sync;

/// Chat backend driven by a closure of `(prompt, nth call for that prompt)`.
pub struct FakeBackend {
    script: Box<Script>,
    calls: AtomicUsize,
    per_prompt: Mutex<HashMap<String, usize>>,
    keys: Mutex<Vec<String>>,
    /// `(worker id of the calling thread, credential)` per call
    worker_keys: Mutex<Vec<(Option<usize>, String)>>,
}

impl FakeBackend {
    pub fn new(script: impl Fn(&str, usize) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            per_prompt: Mutex::new(HashMap::new()),
            keys: Mutex::new(Vec::new()),
            worker_keys: Mutex::new(Vec::new()),
        }
    }

    /// Answers every prompt with `"re: <prompt>"`
    pub fn echo() -> Self {
        Self::new(|prompt, _| Reply::Answer(format!("re: {prompt}")))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, prompt: &str) -> usize {
        self.per_prompt
            .lock()
            .unwrap()
            .get(prompt)
            .copied()
            .unwrap_or(0)
    }

    pub fn prompts_seen(&self) -> Vec<String> {
        self.per_prompt.lock().unwrap().keys().cloned().collect()
    }

    pub fn keys_used(&self) -> Vec<String> {
        let mut keys = self.keys.lock().unwrap().clone();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn worker_keys(&self) -> Vec<(Option<usize>, String)> {
        self.worker_keys.lock().unwrap().clone()
    }
}

impl ChatBackend for FakeBackend {
    fn complete(&self, api_key: &str, request: &ChatRequest) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(api_key.to_string());
        self.worker_keys
            .lock()
            .unwrap()
            .push((promptline_core::current_worker(), api_key.to_string()));
        let prompt = request.prompt().to_string();
        let nth = {
            let mut counts = self.per_prompt.lock().unwrap();
            let n = counts.entry(prompt.clone()).or_insert(0);
            *n += 1;
            *n
        };
        match (self.script)(&prompt, nth) {
            Reply::Answer(text) => Ok(json!({"choices": [{"message": {"content": text}}]})),
            Reply::Malformed => Ok(json!({"error": {"message": "upstream error"}})),
            Reply::Down => Err(HttpError::Transport("connection refused".into()).into()),
        }
    }
}

/// Dataset item JSON
pub fn item(id: &str, label: &str, value: &str, prompt: &str) -> Value {
    json!({"ID": id, "changed_label": label, "label_value": value, "prompt": prompt})
}

pub fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Fresh shutdown flag that lives for the whole test binary
pub fn fresh_flag() -> &'static AtomicBool {
    Box::leak(Box::new(AtomicBool::new(false)))
}
