use std::sync::{Arc, Weak};

use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{event, Level};

use crate::networking::socket::{Socket, SocketListener};
use crate::{Error, Result};

type Outbound = std::result::Result<Message, tungstenite::Error>;

#[derive(Default)]
struct Shared {
    listener: Mutex<Option<Weak<dyn SocketListener>>>,
    sender: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl Shared {
    fn listener(&self) -> Option<Arc<dyn SocketListener>> {
        self.listener.lock().as_ref().and_then(Weak::upgrade)
    }
}

/// A `Socket` over a websocket, driven by tasks on a tokio runtime.
///
/// Each connection runs a reader task that hands text frames to the
/// listener, and a writer task fed by an unbounded channel so `send` never
/// blocks.
pub struct WebSocketSocket {
    runtime: Handle,
    shared: Arc<Shared>,
}

impl WebSocketSocket {
    pub fn new(runtime: Handle) -> WebSocketSocket {
        WebSocketSocket {
            runtime,
            shared: Arc::new(Shared::default()),
        }
    }

    async fn run(url: url::Url, shared: Arc<Shared>) {
        let ws_stream = match connect_async(url.clone()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(error) => {
                event!(Level::ERROR, "Error connecting to {} {}", url, error);
                if let Some(listener) = shared.listener() {
                    listener.on_failure(Error::Connection(error.to_string()));
                }
                return;
            }
        };

        let (write_sink, mut read_stream) = ws_stream.split();
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = UnboundedReceiverStream::new(receiver);
        tokio::spawn(receiver.forward(write_sink).map(|result| {
            if let Err(error) = result {
                event!(Level::ERROR, "error sending websocket msg: {}", error);
            }
        }));
        *shared.sender.lock() = Some(sender);

        event!(Level::INFO, "connected to {}", url);
        if let Some(listener) = shared.listener() {
            listener.on_connected();
        }

        while let Some(result) = read_stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if let Some(listener) = shared.listener() {
                        listener.on_message(&text);
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    event!(Level::ERROR, "Error reading from {} {}", url, error);
                    shared.sender.lock().take();
                    if let Some(listener) = shared.listener() {
                        listener.on_failure(Error::Connection(error.to_string()));
                    }
                    return;
                }
            }
        }

        shared.sender.lock().take();
        event!(Level::INFO, "disconnected from {}", url);
        if let Some(listener) = shared.listener() {
            listener.on_disconnected();
        }
    }
}

impl Socket for WebSocketSocket {
    fn connect(&self, url: &str) -> Result<()> {
        let url = url::Url::parse(url)
            .map_err(|e| Error::Connection(format!("invalid url {:?}: {}", url, e)))?;
        self.runtime.spawn(WebSocketSocket::run(url, self.shared.clone()));
        Ok(())
    }

    fn disconnect(&self) {
        if let Some(sender) = self.shared.sender.lock().take() {
            let _ = sender.send(Ok(Message::Close(None)));
        }
    }

    fn send(&self, text: &str) -> Result<()> {
        match self.shared.sender.lock().as_ref() {
            Some(sender) => sender
                .send(Ok(Message::Text(String::from(text))))
                .map_err(|_| Error::Connection(String::from("websocket writer has stopped"))),
            None => Err(Error::Connection(String::from("websocket is not connected"))),
        }
    }

    fn set_listener(&self, listener: Weak<dyn SocketListener>) {
        *self.shared.listener.lock() = Some(listener);
    }
}
