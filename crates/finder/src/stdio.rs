//! Line-delimited JSON bridge to the pub/sub bus over stdin/stdout.
//!
//! Each line on stdin is either an inbound event/procedure call (see
//! [`Inbound`]) or the result of a call this process made, tagged
//! `"type": "result"`. Publishes, procedure replies and outgoing calls are
//! written to stdout, one JSON object per line. EOF on stdin is a disconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use finder_core::bus::topics;
use finder_core::{BadgeId, Bus, BusError, GameRegistration, Inbound, RegistrationReply};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Buffer size for inbound messages waiting to be handled
const CHANNEL_BUFFER_SIZE: usize = 256;

/// How long to wait for the other side to answer one of our calls
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CallResult {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

type Pending = Mutex<HashMap<u64, oneshot::Sender<CallResult>>>;

pub struct StdioBus {
    out: mpsc::UnboundedSender<String>,
    pending: Arc<Pending>,
    next_call_id: AtomicU64,
}

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<CallResult>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StdioBus {
    /// Start the stdin reader and stdout writer tasks
    pub fn connect() -> (Arc<Self>, mpsc::Receiver<Inbound>) {
        Self::over(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    /// Bridge over any line source and sink.
    ///
    /// The reader only ever waits on input: inbound messages are staged in
    /// an unbounded queue and forwarded to the bounded channel by a separate
    /// task, so call results are delivered even while the handler is busy.
    /// If the writer fails, the reader stops and the inbound channel closes.
    fn over<R, W>(reader: R, writer: W) -> (Arc<Self>, mpsc::Receiver<Inbound>)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (staged_tx, staged_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (closed_tx, closed_rx) = oneshot::channel();
        let pending: Arc<Pending> = Arc::new(Mutex::new(HashMap::new()));

        let router = Router {
            pending: Arc::clone(&pending),
            out: out_tx.clone(),
            inbound: staged_tx,
        };

        tokio::spawn(write_lines(writer, out_rx, closed_tx));
        tokio::spawn(read_lines(reader, router, closed_rx));
        tokio::spawn(forward(staged_rx, inbound_tx));

        let bus = Arc::new(Self {
            out: out_tx,
            pending,
            next_call_id: AtomicU64::new(1),
        });
        (bus, inbound_rx)
    }

    fn send(&self, message: Value) -> Result<(), BusError> {
        self.out
            .send(message.to_string())
            .map_err(|_| BusError::Disconnected)
    }

    async fn call<T: DeserializeOwned>(&self, procedure: &str, kwargs: Value) -> Result<T, BusError> {
        let id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        if let Err(e) = self.send(json!({ "type": "call", "id": id, "procedure": procedure, "kwargs": kwargs })) {
            lock(&self.pending).remove(&id);
            return Err(e);
        }

        let reply = match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(BusError::Disconnected),
            Err(_) => {
                lock(&self.pending).remove(&id);
                return Err(BusError::CallFailed {
                    procedure: procedure.to_string(),
                    message: "timed out".to_string(),
                });
            }
        };

        if let Some(message) = reply.error {
            return Err(BusError::CallFailed {
                procedure: procedure.to_string(),
                message,
            });
        }
        serde_json::from_value(reply.result).map_err(|e| BusError::MalformedReply {
            procedure: procedure.to_string(),
            message: e.to_string(),
        })
    }
}

impl Bus for StdioBus {
    fn publish(&self, topic: &str, args: Value) -> Result<(), BusError> {
        self.send(json!({ "type": "publish", "topic": topic, "args": args }))
    }

    fn reply(&self, call_id: u64, result: Value) -> Result<(), BusError> {
        self.send(json!({ "type": "reply", "id": call_id, "result": result }))
    }

    async fn register_game(&self, registration: &GameRegistration) -> Result<RegistrationReply, BusError> {
        let kwargs = json!({
            "game_id": registration.game_id,
            "sequence": registration.sequence,
            "location": registration.location,
        });
        self.call(topics::GAME_REGISTER, kwargs).await
    }

    async fn fetch_roster(&self) -> Result<Vec<BadgeId>, BusError> {
        self.call(topics::BADGE_ROSTER, json!({})).await
    }
}

/// Sorts incoming lines into call results and inbound messages
struct Router {
    pending: Arc<Pending>,
    out: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedSender<Inbound>,
}

impl Router {
    /// Handle one line. Returns false once nobody is listening for inbound messages.
    fn route(&self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed line");
                return true;
            }
        };

        if value.get("type").and_then(Value::as_str) == Some("result") {
            match serde_json::from_value::<CallResult>(value) {
                Ok(result) => match lock(&self.pending).remove(&result.id) {
                    Some(waiter) => {
                        let _ = waiter.send(result);
                    }
                    None => debug!(id = result.id, "Result for unknown call"),
                },
                Err(e) => warn!(error = %e, "Ignoring malformed call result"),
            }
            return true;
        }

        // Keep the call id around in case the procedure is not one we serve
        let call_id = match value.get("type").and_then(Value::as_str) {
            Some("call") => value.get("id").and_then(Value::as_u64),
            _ => None,
        };

        match serde_json::from_value::<Inbound>(value) {
            Ok(message) => self.inbound.send(message).is_ok(),
            Err(e) => {
                warn!(error = %e, "Ignoring unrecognized message");
                if let Some(id) = call_id {
                    let reply = json!({ "type": "reply", "id": id, "error": e.to_string() });
                    let _ = self.out.send(reply.to_string());
                }
                true
            }
        }
    }
}

async fn write_lines<W>(mut writer: W, mut lines: mpsc::UnboundedReceiver<String>, _closed: oneshot::Sender<()>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            error!(error = %e, "Failed to write output");
            break;
        }
    }
}

async fn read_lines<R>(reader: R, router: Router, mut closed: oneshot::Receiver<()>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Failed to read input");
                    break;
                }
            },
            _ = &mut closed => {
                warn!("Output closed, no longer reading input");
                break;
            }
        };
        if !router.route(&line) {
            break;
        }
    }

    debug!("Input closed");
    // Dropping the waiters fails any in-flight calls with Disconnected
    lock(&router.pending).clear();
}

async fn forward(mut staged: mpsc::UnboundedReceiver<Inbound>, inbound: mpsc::Sender<Inbound>) {
    while let Some(message) = staged.recv().await {
        if inbound.send(message).await.is_err() {
            break;
        }
    }
}
