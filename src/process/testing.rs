//! Stub interpreter for tests: scripted behavior plus spawn/dispose counters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{CapturedOutput, ProcessHandle, ProcessSpawner};

/// Extract and decode the script carried by a `stdin_payload` line.
pub(crate) fn decode_payload(payload: &str) -> String {
    let start = payload.find("('").expect("payload carries a quoted literal") + 2;
    let end = start + payload[start..].find('\'').expect("literal is closed");
    let bytes = STANDARD.decode(&payload[start..end]).expect("valid base64");
    String::from_utf8(bytes).expect("script is UTF-8")
}

/// What a stub process does when read.
#[derive(Debug, Clone)]
pub(crate) enum StubBehavior {
    /// Exit with the given output.
    Reply(CapturedOutput),
    /// Refuse to spawn.
    FailSpawn(String),
    /// Spawn, then fail while reading output.
    FailRead(String),
    /// Spawn, then panic while reading output.
    Panic,
    /// Spawn, then never finish.
    Hang,
}

impl StubBehavior {
    pub(crate) fn stdout(text: &str) -> Self {
        StubBehavior::Reply(CapturedOutput {
            stdout: text.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }

    pub(crate) fn stderr(text: &str, exit_code: i32) -> Self {
        StubBehavior::Reply(CapturedOutput {
            stdout: String::new(),
            stderr: text.to_string(),
            exit_code: Some(exit_code),
        })
    }
}

#[derive(Default)]
struct StubState {
    /// Behavior for the nth spawn; the last entry repeats.
    behaviors: Vec<StubBehavior>,
    spawns: AtomicUsize,
    disposals: AtomicUsize,
    flags: Mutex<Vec<Vec<String>>>,
    inputs: Mutex<Vec<String>>,
}

#[derive(Clone)]
pub(crate) struct StubSpawner {
    state: Arc<StubState>,
}

impl StubSpawner {
    pub(crate) fn new(behavior: StubBehavior) -> Self {
        Self::sequence(vec![behavior])
    }

    pub(crate) fn sequence(behaviors: Vec<StubBehavior>) -> Self {
        assert!(!behaviors.is_empty(), "stub needs at least one behavior");
        Self {
            state: Arc::new(StubState {
                behaviors,
                ..Default::default()
            }),
        }
    }

    pub(crate) fn replying(stdout: &str) -> Self {
        Self::new(StubBehavior::stdout(stdout))
    }

    /// Number of handles handed out.
    pub(crate) fn spawn_count(&self) -> usize {
        self.state.spawns.load(Ordering::SeqCst)
    }

    /// Number of `dispose()` calls across all handles.
    pub(crate) fn dispose_count(&self) -> usize {
        self.state.disposals.load(Ordering::SeqCst)
    }

    pub(crate) fn inputs(&self) -> Vec<String> {
        self.state.inputs.lock().unwrap().clone()
    }

    pub(crate) fn last_input(&self) -> Option<String> {
        self.inputs().pop()
    }

    /// The last script as the interpreter would run it, decoded from the
    /// stdin payload.
    pub(crate) fn last_script(&self) -> Option<String> {
        self.last_input().map(|input| decode_payload(&input))
    }

    pub(crate) fn last_flags(&self) -> Option<Vec<String>> {
        self.state.flags.lock().unwrap().last().cloned()
    }
}

impl ProcessSpawner for StubSpawner {
    type Handle = StubHandle;

    fn spawn(&self, _executable: &str, flags: &[&str]) -> std::io::Result<StubHandle> {
        let attempt = self.state.flags.lock().unwrap().len();
        self.state
            .flags
            .lock()
            .unwrap()
            .push(flags.iter().map(|f| f.to_string()).collect());

        let index = attempt.min(self.state.behaviors.len() - 1);
        let behavior = self.state.behaviors[index].clone();
        if let StubBehavior::FailSpawn(msg) = behavior {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, msg));
        }

        self.state.spawns.fetch_add(1, Ordering::SeqCst);
        Ok(StubHandle {
            state: self.state.clone(),
            behavior,
        })
    }
}

pub(crate) struct StubHandle {
    state: Arc<StubState>,
    behavior: StubBehavior,
}

impl ProcessHandle for StubHandle {
    async fn write_input(&mut self, input: &str) -> std::io::Result<()> {
        self.state.inputs.lock().unwrap().push(input.to_string());
        Ok(())
    }

    async fn read_all(&mut self) -> std::io::Result<CapturedOutput> {
        match &self.behavior {
            StubBehavior::Reply(output) => Ok(output.clone()),
            StubBehavior::FailRead(msg) => Err(std::io::Error::other(msg.clone())),
            StubBehavior::Panic => panic!("stub interpreter crashed"),
            StubBehavior::Hang => std::future::pending().await,
            StubBehavior::FailSpawn(_) => unreachable!("spawn already failed"),
        }
    }

    fn dispose(&mut self) {
        self.state.disposals.fetch_add(1, Ordering::SeqCst);
    }
}
