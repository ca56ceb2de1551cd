use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{event, Level};

use crate::networking::api_message::{Call, InboundMessage};
use crate::networking::socket::{Socket, SocketListener};
use crate::networking::subscription::SubscriptionManager;
use crate::{Error, Result};

/// Receives the outcome of one call, exactly once.
pub type Completion = Box<dyn FnOnce(Result<Value>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct PendingCall {
    call: Call,
    frame: String,
    // taken exactly once
    completion: Mutex<Completion>,
}

///
/// Multiplexes calls over one socket.
///
/// Every call gets the next id, starting at 1, and waits in the pending table
/// until the response carrying its id arrives. Frames without a known id are
/// handed to the subscription managers.
///
/// When the socket drops, calls that are not idempotent fail with
/// `Error::ConnectionLost`; idempotent calls stay pending and are written
/// again, in id order, as soon as the socket reconnects.
///
pub struct RpcClient {
    socket: Arc<dyn Socket>,
    url: String,
    next_call_id: AtomicU64,
    pending: DashMap<u64, PendingCall>,
    // serializes writes so a replay finishes before new frames go out
    send_lock: Mutex<()>,
    state: RwLock<ConnectionState>,
    subscription_managers: RwLock<Vec<Arc<dyn SubscriptionManager>>>,
}

impl RpcClient {
    pub fn new(socket: Arc<dyn Socket>, url: &str) -> Arc<RpcClient> {
        let client = Arc::new(RpcClient {
            socket,
            url: String::from(url),
            next_call_id: AtomicU64::new(1),
            pending: DashMap::new(),
            send_lock: Mutex::new(()),
            state: RwLock::new(ConnectionState::Disconnected),
            subscription_managers: RwLock::new(vec![]),
        });
        let listener: Weak<dyn SocketListener> = Arc::downgrade(&client) as Weak<RpcClient>;
        client.socket.set_listener(listener);
        client
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }

    pub fn get_state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn add_subscription_manager(&self, manager: Arc<dyn SubscriptionManager>) {
        self.subscription_managers.write().push(manager);
    }

    /// Start connecting. Does nothing while already connecting or connected.
    pub fn connect(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if *state != ConnectionState::Disconnected {
                return Ok(());
            }
            *state = ConnectionState::Connecting;
        }
        event!(Level::INFO, "connecting to {}", self.url);
        if let Err(error) = self.socket.connect(&self.url) {
            *self.state.write() = ConnectionState::Disconnected;
            return Err(error);
        }
        Ok(())
    }

    pub fn disconnect(&self) {
        self.socket.disconnect();
    }

    ///
    /// Send a call and register `completion` for its outcome. Returns the
    /// call id.
    ///
    /// While the socket is not connected the call only waits in the pending
    /// table; it is written once the connection comes up.
    ///
    pub fn emit<F>(&self, call: Call, completion: F) -> u64
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let completion: Completion = Box::new(completion);
        let send_result = {
            let _guard = self.send_lock.lock();
            let id = self.next_call_id.fetch_add(1, Ordering::SeqCst);
            let frame = call.to_frame(id);
            event!(Level::DEBUG, "call {} {}", id, call.get_method());
            self.pending.insert(
                id,
                PendingCall {
                    call,
                    frame: frame.clone(),
                    completion: Mutex::new(completion),
                },
            );
            if self.get_state() == ConnectionState::Connected {
                (id, self.socket.send(&frame))
            } else {
                (id, Ok(()))
            }
        };

        let (id, written) = send_result;
        if let Err(error) = written {
            event!(Level::ERROR, "could not write call {}: {}", id, error);
            self.resolve(id, Err(error));
        }
        id
    }

    /// Resolves with the call's result, or the error that ended it.
    pub async fn call(&self, call: Call) -> Result<Value> {
        let (sender, receiver) = oneshot::channel();
        self.emit(call, move |outcome| {
            let _ = sender.send(outcome);
        });
        receiver.await.map_err(|_| Error::ConnectionLost)?
    }

    ///
    /// Blocks the current thread until the call completes, giving up with
    /// `Error::Timeout` after `timeout`. Must not be used from inside an
    /// async task.
    ///
    pub fn call_blocking(&self, call: Call, timeout: Option<Duration>) -> Result<Value> {
        let (sender, receiver) = mpsc::channel();
        let id = self.emit(call, move |outcome| {
            let _ = sender.send(outcome);
        });
        match timeout {
            Some(timeout) => match receiver.recv_timeout(timeout) {
                Ok(outcome) => outcome,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    self.pending.remove(&id);
                    event!(Level::INFO, "call {} timed out", id);
                    Err(Error::Timeout)
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::ConnectionLost),
            },
            None => receiver.recv().map_err(|_| Error::ConnectionLost)?,
        }
    }

    /// Stop waiting for a call. The node still runs it.
    pub fn cancel(&self, id: u64) -> bool {
        self.resolve(id, Err(Error::Cancelled))
    }

    fn resolve(&self, id: u64, outcome: Result<Value>) -> bool {
        match self.pending.remove(&id) {
            Some((_, pending)) => {
                (pending.completion.into_inner())(outcome);
                true
            }
            None => false,
        }
    }

    fn replay_pending(&self) {
        let mut ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        if !ids.is_empty() {
            event!(Level::INFO, "replaying {} pending call(s)", ids.len());
        }
        for id in ids {
            let frame = match self.pending.get(&id) {
                Some(pending) => pending.frame.clone(),
                None => continue,
            };
            if let Err(error) = self.socket.send(&frame) {
                event!(Level::ERROR, "could not replay call {}: {}", id, error);
            }
        }
    }

    // the socket is gone: fail whatever may not be resent
    fn fail_pending(&self, error: Error) {
        let lost: Vec<u64> = self
            .pending
            .iter()
            .filter(|entry| !entry.value().call.is_idempotent())
            .map(|entry| *entry.key())
            .collect();
        for id in lost {
            self.resolve(id, Err(error.clone()));
        }
    }

    fn dispatch_notification(&self, payload: &Value) {
        let managers: Vec<Arc<dyn SubscriptionManager>> =
            self.subscription_managers.read().iter().cloned().collect();
        for manager in managers {
            manager.process_event(payload);
        }
    }
}

impl SocketListener for RpcClient {
    fn on_connected(&self) {
        let _guard = self.send_lock.lock();
        *self.state.write() = ConnectionState::Connected;
        event!(Level::INFO, "connected to {}", self.url);
        self.replay_pending();
    }

    fn on_disconnected(&self) {
        *self.state.write() = ConnectionState::Disconnected;
        event!(Level::INFO, "disconnected from {}", self.url);
        self.fail_pending(Error::ConnectionLost);
    }

    fn on_message(&self, text: &str) {
        match InboundMessage::parse(text) {
            Ok(InboundMessage::Response { id, outcome }) => {
                if !self.resolve(id, outcome) {
                    event!(Level::DEBUG, "no pending call with id {}", id);
                    if let Ok(payload) = serde_json::from_str::<Value>(text) {
                        self.dispatch_notification(&payload);
                    }
                }
            }
            Ok(InboundMessage::Notification(payload)) => self.dispatch_notification(&payload),
            Err(error) => {
                event!(Level::ERROR, "ignoring unreadable frame: {}", error);
            }
        }
    }

    fn on_failure(&self, error: Error) {
        *self.state.write() = ConnectionState::Disconnected;
        event!(Level::ERROR, "connection to {} failed: {}", self.url, error);
        self.fail_pending(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::api_message::LOGIN_API;
    use crate::networking::subscription::BlockSubscriptionManager;
    use crate::test_utilities::mocks::MockSocket;
    use serde_json::json;
    use std::collections::HashSet;

    fn connected_client() -> (Arc<MockSocket>, Arc<RpcClient>) {
        let socket = Arc::new(MockSocket::new());
        let client = RpcClient::new(socket.clone(), "ws://node.test");
        client.connect().unwrap();
        (socket, client)
    }

    fn recorder() -> (Arc<Mutex<Vec<Result<Value>>>>, impl FnOnce(Result<Value>) + Send + 'static) {
        let outcomes = Arc::new(Mutex::new(vec![]));
        let sink = outcomes.clone();
        (outcomes, move |outcome: Result<Value>| sink.lock().push(outcome))
    }

    fn frame_id(frame: &str) -> u64 {
        serde_json::from_str::<Value>(frame).unwrap()["id"].as_u64().unwrap()
    }

    #[test]
    fn socket_reports_to_client_test() {
        let socket = Arc::new(MockSocket::new());
        let client = RpcClient::new(socket.clone(), "ws://node.test");
        assert_eq!(client.get_state(), ConnectionState::Disconnected);
        socket.fire_connected();
        assert_eq!(client.get_state(), ConnectionState::Connected);

        let (outcomes, callback) = recorder();
        client.emit(Call::new(LOGIN_API, "login", json!(["", ""])), callback);
        socket.deliver(r#"{"id": 1, "jsonrpc": "2.0", "result": true}"#);
        assert_eq!(*outcomes.lock(), vec![Ok(json!(true))]);

        // the socket only holds a weak reference
        assert_eq!(Arc::strong_count(&client), 1);
        let listener = Arc::downgrade(&client);
        drop(client);
        assert!(listener.upgrade().is_none());
        socket.deliver(r#"{"id": 2, "jsonrpc": "2.0", "result": true}"#);
    }

    #[test]
    fn ids_start_at_one_test() {
        let (socket, client) = connected_client();
        assert_eq!(client.get_state(), ConnectionState::Connected);
        let first = client.emit(Call::new(LOGIN_API, "login", json!(["", ""])), |_| {});
        let second = client.emit(Call::new(LOGIN_API, "database", json!([])), |_| {});
        assert_eq!((first, second), (1, 2));
        let sent = socket.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            serde_json::from_str::<Value>(&sent[0]).unwrap(),
            json!({"id": 1, "method": "call", "params": [1, "login", ["", ""]]})
        );
    }

    #[test]
    fn concurrent_ids_test() {
        let (_socket, client) = connected_client();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let client = client.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| client.emit(Call::new(2, "get_objects", json!([])), |_| {}))
                        .collect::<Vec<u64>>()
                })
            })
            .collect();
        let mut ids = vec![];
        for thread in threads {
            let emitted = thread.join().unwrap();
            // strictly increasing within each caller
            assert!(emitted.windows(2).all(|pair| pair[0] < pair[1]));
            ids.extend(emitted);
        }
        let unique: HashSet<u64> = ids.iter().cloned().collect();
        assert_eq!(unique.len(), 400);
        assert_eq!(*unique.iter().min().unwrap(), 1);
        assert_eq!(*unique.iter().max().unwrap(), 400);
        assert_eq!(client.pending_count(), 400);
    }

    #[test]
    fn response_resolves_matching_call_test() {
        let (socket, client) = connected_client();
        let (first_outcomes, first) = recorder();
        let (second_outcomes, second) = recorder();
        client.emit(Call::new(2, "a", json!([])), first);
        client.emit(Call::new(2, "b", json!([])), second);

        // out of order
        socket.deliver(r#"{"id":2,"result":"two"}"#);
        socket.deliver(r#"{"id":1,"error":{"code":1,"message":"boom"}}"#);

        assert_eq!(*second_outcomes.lock(), vec![Ok(json!("two"))]);
        assert_eq!(
            *first_outcomes.lock(),
            vec![Err(Error::Protocol {
                code: 1,
                message: String::from("boom")
            })]
        );
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn unknown_id_is_not_misdelivered_test() {
        let (socket, client) = connected_client();
        let (outcomes, completion) = recorder();
        client.emit(Call::new(2, "a", json!([])), completion);

        socket.deliver(r#"{"id":99,"result":"stray"}"#);
        socket.deliver("garbage");
        assert!(outcomes.lock().is_empty());
        assert_eq!(client.pending_count(), 1);

        // a second response for an already resolved id is also stray
        socket.deliver(r#"{"id":1,"result":"ok"}"#);
        socket.deliver(r#"{"id":1,"result":"again"}"#);
        assert_eq!(*outcomes.lock(), vec![Ok(json!("ok"))]);
    }

    #[test]
    fn disconnect_policy_test() {
        let (socket, client) = connected_client();
        let (plain_outcomes, plain) = recorder();
        let (subscribe_outcomes, subscribe) = recorder();
        client.emit(Call::new(2, "get_objects", json!([])), plain);
        client.emit(
            Call::new(2, "set_subscribe_callback", json!([5, false])).idempotent(),
            subscribe,
        );
        socket.take_sent();

        socket.fire_disconnected();
        assert_eq!(client.get_state(), ConnectionState::Disconnected);
        assert_eq!(*plain_outcomes.lock(), vec![Err(Error::ConnectionLost)]);
        assert!(subscribe_outcomes.lock().is_empty());

        // new traffic waits for the connection
        client.emit(Call::new(2, "get_chain_id", json!([])), |_| {});
        assert!(socket.take_sent().is_empty());

        client.connect().unwrap();
        let replayed: Vec<u64> = socket.take_sent().iter().map(|f| frame_id(f)).collect();
        assert_eq!(replayed, vec![2, 3]);

        socket.deliver(r#"{"id":2,"result":null}"#);
        assert_eq!(*subscribe_outcomes.lock(), vec![Ok(Value::Null)]);
    }

    #[test]
    fn connect_is_idempotent_test() {
        let (socket, client) = connected_client();
        client.connect().unwrap();
        client.connect().unwrap();
        assert_eq!(socket.connect_count(), 1);
    }

    #[test]
    fn failed_write_resolves_caller_test() {
        let (socket, client) = connected_client();
        socket.set_fail_sends(true);
        let (outcomes, completion) = recorder();
        client.emit(Call::new(2, "a", json!([])), completion);
        assert!(matches!(outcomes.lock()[0], Err(Error::Connection(_))));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn transport_failure_test() {
        let (socket, client) = connected_client();
        let (outcomes, completion) = recorder();
        client.emit(Call::new(2, "a", json!([])), completion);
        client.emit(Call::new(2, "set_block_applied_callback", json!([3])).idempotent(), |_| {});

        socket.fire_failure(Error::Connection(String::from("reset by peer")));
        assert_eq!(client.get_state(), ConnectionState::Disconnected);
        assert_eq!(
            *outcomes.lock(),
            vec![Err(Error::Connection(String::from("reset by peer")))]
        );
        assert_eq!(client.pending_count(), 1);

        // a failed connection may be retried
        client.connect().unwrap();
        assert_eq!(socket.connect_count(), 2);
        assert_eq!(client.get_state(), ConnectionState::Connected);
    }

    #[test]
    fn cancel_test() {
        let (socket, client) = connected_client();
        let (outcomes, completion) = recorder();
        let id = client.emit(Call::new(2, "a", json!([])), completion);
        assert!(client.cancel(id));
        assert!(!client.cancel(id));
        assert_eq!(*outcomes.lock(), vec![Err(Error::Cancelled)]);
        socket.deliver(&format!(r#"{{"id":{},"result":1}}"#, id));
        assert_eq!(outcomes.lock().len(), 1);
    }

    #[test]
    fn call_blocking_timeout_test() {
        let (_socket, client) = connected_client();
        let outcome = client.call_blocking(
            Call::new(2, "a", json!([])),
            Some(Duration::from_millis(20)),
        );
        assert_eq!(outcome, Err(Error::Timeout));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn call_blocking_response_test() {
        let (socket, client) = connected_client();
        let responder = {
            let socket = socket.clone();
            std::thread::spawn(move || {
                while socket.sent_count() == 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
                socket.deliver(r#"{"id":1,"result":"chain"}"#);
            })
        };
        let outcome = client.call_blocking(
            Call::new(2, "get_chain_id", json!([])),
            Some(Duration::from_secs(5)),
        );
        responder.join().unwrap();
        assert_eq!(outcome, Ok(json!("chain")));
    }

    #[tokio::test]
    async fn async_call_test() {
        let (socket, client) = connected_client();
        let responder = {
            let socket = socket.clone();
            tokio::spawn(async move {
                while socket.sent_count() == 0 {
                    tokio::task::yield_now().await;
                }
                socket.deliver(r#"{"id":1,"result":[1,2]}"#);
            })
        };
        let outcome = client.call(Call::new(2, "get_objects", json!([]))).await;
        responder.await.unwrap();
        assert_eq!(outcome, Ok(json!([1, 2])));
    }

    #[test]
    fn notification_reaches_managers_test() {
        let (socket, client) = connected_client();
        let blocks = Arc::new(BlockSubscriptionManager::new(7));
        let seen = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        blocks.subscribe(Arc::new(move |block_id: &String| sink.lock().push(block_id.clone())));
        client.add_subscription_manager(blocks);

        socket.deliver(r#"{"method":"notice","params":[7,["00000010aabbccdd"]]}"#);
        assert_eq!(*seen.lock(), vec![String::from("00000010aabbccdd")]);
    }
}
