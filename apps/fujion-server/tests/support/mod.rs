#![allow(dead_code)]

use std::{
    fs,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    time::Duration,
};

use fujion_server::{
    config::ServerConfig, ClientRequest, Session, SessionListener, Socket, SocketAttributes,
    SocketError,
};
use fujion_wire::ClientInvocation;
use parking_lot::Mutex;
use serde_json::Value;

pub const HOME_PAGE: &str = r#"<fsp><page name="home"><button label="Go" on:click="go"/></page></fsp>"#;

/// Socket that keeps every frame it is asked to send.
pub struct RecordingSocket {
    id: String,
    attributes: SocketAttributes,
    frames: Mutex<Vec<String>>,
    open: AtomicBool,
    gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
}

impl RecordingSocket {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            attributes: SocketAttributes::default(),
            frames: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            gate: Mutex::new(None),
        })
    }

    /// Holds the next send until released. The first receiver fires once
    /// that send has started; the sender releases it.
    pub fn hold_next_send(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    pub fn take_json(&self) -> Vec<Value> {
        self.frames
            .lock()
            .drain(..)
            .map(|frame| serde_json::from_str(&frame).expect("frame is json"))
            .collect()
    }
}

impl Socket for RecordingSocket {
    fn id(&self) -> &str {
        &self.id
    }

    fn send_text(&self, payload: String) -> Result<(), SocketError> {
        if !self.is_open() {
            return Err(SocketError::Closed(self.id.clone()));
        }
        let gate = self.gate.lock().take();
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.recv_timeout(Duration::from_secs(5));
        }
        self.frames.lock().push(payload);
        Ok(())
    }

    fn attributes(&self) -> &SocketAttributes {
        &self.attributes
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

/// Session listener that records what it observed.
#[derive(Default)]
pub struct RecordingListener {
    pub requests: Mutex<Vec<(String, String, Value)>>,
    pub invocations: Mutex<Vec<String>>,
    pub destroyed: Mutex<usize>,
    pub fail: bool,
}

impl RecordingListener {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl SessionListener for RecordingListener {
    fn on_request(&self, _session: &Session, request: &ClientRequest) -> anyhow::Result<()> {
        self.requests.lock().push((
            request.pid().to_string(),
            request.request_type().to_string(),
            Value::Object(request.data().clone()),
        ));
        Ok(())
    }

    fn on_invocation(&self, _session: &Session, invocation: &ClientInvocation) -> anyhow::Result<()> {
        self.invocations.lock().push(invocation.function().to_string());
        Ok(())
    }

    fn on_destroy(&self, _session: &Session) -> anyhow::Result<()> {
        *self.destroyed.lock() += 1;
        if self.fail {
            anyhow::bail!("listener failure");
        }
        Ok(())
    }
}

/// Web root holding `home.fsp`.
pub fn web_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(root.path().join("home.fsp"), HOME_PAGE).expect("write home");
    root
}

pub fn config(root: &tempfile::TempDir) -> ServerConfig {
    ServerConfig::new(root.path())
}
