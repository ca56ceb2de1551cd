use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::networking::socket::{Socket, SocketListener};
use crate::{Error, Result};

/// A socket that records outgoing frames and lets tests play the node.
///
/// `connect` reports success to the listener straight away.
#[derive(Default)]
pub struct MockSocket {
    listener: Mutex<Option<Weak<dyn SocketListener>>>,
    sent: Mutex<Vec<String>>,
    connect_count: Mutex<usize>,
    fail_sends: Mutex<bool>,
}

impl MockSocket {
    pub fn new() -> MockSocket {
        MockSocket::default()
    }

    fn listener(&self) -> Option<Arc<dyn SocketListener>> {
        self.listener.lock().as_ref().and_then(Weak::upgrade)
    }

    /// Frames sent since the last call.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn connect_count(&self) -> usize {
        *self.connect_count.lock()
    }

    pub fn set_fail_sends(&self, fail_sends: bool) {
        *self.fail_sends.lock() = fail_sends;
    }

    pub fn deliver(&self, text: &str) {
        if let Some(listener) = self.listener() {
            listener.on_message(text);
        }
    }

    pub fn fire_connected(&self) {
        if let Some(listener) = self.listener() {
            listener.on_connected();
        }
    }

    pub fn fire_disconnected(&self) {
        if let Some(listener) = self.listener() {
            listener.on_disconnected();
        }
    }

    pub fn fire_failure(&self, error: Error) {
        if let Some(listener) = self.listener() {
            listener.on_failure(error);
        }
    }
}

impl Socket for MockSocket {
    fn connect(&self, _url: &str) -> Result<()> {
        *self.connect_count.lock() += 1;
        self.fire_connected();
        Ok(())
    }

    fn disconnect(&self) {
        self.fire_disconnected();
    }

    fn send(&self, text: &str) -> Result<()> {
        if *self.fail_sends.lock() {
            return Err(Error::Connection(String::from("mock write failure")));
        }
        self.sent.lock().push(String::from(text));
        Ok(())
    }

    fn set_listener(&self, listener: Weak<dyn SocketListener>) {
        *self.listener.lock() = Some(listener);
    }
}

/// Answers every call written to a `MockSocket` from a background thread,
/// until dropped.
pub struct MockNode {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MockNode {
    /// `answer(method, params)` produces the `result` of each call.
    pub fn spawn<F>(socket: Arc<MockSocket>, answer: F) -> MockNode
    where
        F: Fn(&str, &Value) -> Value + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let still_running = running.clone();
        let thread = std::thread::spawn(move || {
            while still_running.load(Ordering::SeqCst) {
                for frame in socket.take_sent() {
                    let call: Value = match serde_json::from_str(&frame) {
                        Ok(call) => call,
                        Err(_) => continue,
                    };
                    let method = call["params"][1].as_str().unwrap_or_default();
                    let response = json!({
                        "id": call["id"],
                        "jsonrpc": "2.0",
                        "result": answer(method, &call["params"][2]),
                    });
                    socket.deliver(&response.to_string());
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        });
        MockNode {
            running,
            thread: Some(thread),
        }
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
