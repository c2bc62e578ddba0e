//! KataGo analysis engine wrapper (JSON lines over stdin/stdout, async I/O)
//!
//! One background task reads stdout and routes each line to the query that
//! issued it. A second task drains stderr into the log. A query gets two
//! channels back: in-search updates, and the single terminal line.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::protocol::{AnalysisRequest, EngineResponse, TerminateRequest};
use crate::query::QueryId;

type Writer = Box<dyn AsyncWrite + Send + Unpin>;
type Routes = Arc<Mutex<HashMap<String, Route>>>;

struct Route {
    updates: mpsc::UnboundedSender<EngineResponse>,
    result: oneshot::Sender<EngineResponse>,
}

/// Reads one JSON response per line, tolerating partial reads.
pub struct ResponseReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> ResponseReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Wait for the next complete line.
    ///
    /// `Ok(None)` means the stream ended. A malformed line is consumed and
    /// reported as `Protocol`; the next call continues with the line after it.
    pub async fn next_response(&mut self) -> Result<Option<EngineResponse>, SessionError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| SessionError::Io(format!("Failed to read from engine: {e}")))?;
            let Some(line) = line else {
                return Ok(None);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|e| SessionError::Protocol(format!("{e}: {trimmed}")));
        }
    }
}

/// Something a query's observer receives.
#[derive(Debug)]
pub enum QueryEvent {
    Update(EngineResponse),
    Final(EngineResponse),
}

/// Handle on a submitted query.
pub struct PendingQuery {
    pub id: QueryId,
    updates: mpsc::UnboundedReceiver<EngineResponse>,
    result: oneshot::Receiver<EngineResponse>,
}

impl PendingQuery {
    /// Next update, or the terminal response once every earlier update has
    /// been handed out. Do not call again after `Final`.
    pub async fn next_event(&mut self) -> Result<QueryEvent, SessionError> {
        tokio::select! {
            biased;
            Some(update) = self.updates.recv() => Ok(QueryEvent::Update(update)),
            result = &mut self.result => result
                .map(QueryEvent::Final)
                .map_err(|_| SessionError::Io(format!("query {} closed without a terminal response", self.id))),
        }
    }
}

pub struct KataGoEngine {
    writer: Mutex<Writer>,
    routes: Routes,
    alive: Arc<AtomicBool>,
    next_query: AtomicU64,
    next_terminate: AtomicU64,
    child: Option<Child>,
    tasks: Vec<JoinHandle<()>>,
}

impl KataGoEngine {
    /// Spawn `katago analysis -config .. -model .. [args..]`.
    pub fn start(
        path: &str,
        config_path: &str,
        model_path: &str,
        extra_args: &[String],
    ) -> Result<Self, SessionError> {
        let mut child = Command::new(path)
            .arg("analysis")
            .arg("-config")
            .arg(config_path)
            .arg("-model")
            .arg(model_path)
            .args(extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SessionError::Launch(format!("Failed to spawn {path}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::Launch("engine stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Launch("engine stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionError::Launch("engine stderr not captured".into()))?;

        let mut engine = Self::from_io(stdin, stdout);
        engine.tasks.push(tokio::spawn(drain_diagnostics(stderr)));
        engine.child = Some(child);
        info!(path, model = model_path, "KataGo started");
        Ok(engine)
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        Self::start(
            &config.katago_path,
            &config.katago_config,
            &config.katago_model,
            &config.katago_args,
        )
    }

    /// Attach to an already-open pair of streams.
    pub fn from_io<W, R>(writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let reader_task = tokio::spawn(read_loop(
            ResponseReader::new(reader),
            routes.clone(),
            alive.clone(),
        ));

        Self {
            writer: Mutex::new(Box::new(writer)),
            routes,
            alive,
            next_query: AtomicU64::new(0),
            next_terminate: AtomicU64::new(0),
            child: None,
            tasks: vec![reader_task],
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Allocate a fresh query id; never reused by this engine.
    pub fn next_query_id(&self) -> QueryId {
        QueryId::new(self.next_query.fetch_add(1, Ordering::SeqCst))
    }

    /// Write one request line.
    pub async fn send<T: Serialize>(&self, request: &T) -> Result<(), SessionError> {
        if !self.is_alive() {
            return Err(SessionError::Io("engine output is closed".into()));
        }
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        debug!(line = line.trim_end(), "KataGo <");

        let mut writer = self.writer.lock().await;
        let written = match writer.write_all(line.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| {
            self.alive.store(false, Ordering::SeqCst);
            SessionError::Io(format!("Failed to write to engine: {e}"))
        })
    }

    /// Register `request` and send it.
    pub async fn analyze(
        &self,
        id: QueryId,
        request: &AnalysisRequest,
    ) -> Result<PendingQuery, SessionError> {
        let (updates_tx, updates) = mpsc::unbounded_channel();
        let (result_tx, result) = oneshot::channel();
        self.routes.lock().await.insert(
            request.id.clone(),
            Route {
                updates: updates_tx,
                result: result_tx,
            },
        );

        if let Err(e) = self.send(request).await {
            self.routes.lock().await.remove(&request.id);
            return Err(e);
        }
        Ok(PendingQuery {
            id,
            updates,
            result,
        })
    }

    /// Best-effort request that the engine stop work on `id`.
    ///
    /// The query's channels are released immediately; anything the engine
    /// still prints for it is dropped by the reader.
    pub async fn terminate(&self, id: QueryId) -> Result<(), SessionError> {
        self.routes.lock().await.remove(&id.to_string());
        let n = self.next_terminate.fetch_add(1, Ordering::SeqCst);
        self.send(&TerminateRequest::new(format!("TERM {n}"), id.to_string()))
            .await?;
        info!(query_id = %id, "Sent terminate");
        Ok(())
    }

    /// Close the engine's stdin. The process is left to exit on its own.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| SessionError::Io(format!("Failed to close engine input: {e}")))
    }
}

impl Drop for KataGoEngine {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        if let Some(child) = self.child.as_mut() {
            // Best-effort synchronous kill in drop
            let _ = child.start_kill();
        }
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: ResponseReader<R>,
    routes: Routes,
    alive: Arc<AtomicBool>,
) {
    loop {
        match reader.next_response().await {
            Ok(Some(response)) => dispatch(&routes, response).await,
            Ok(None) => {
                warn!("Engine output closed");
                break;
            }
            Err(SessionError::Protocol(e)) => {
                warn!(error = %e, "Skipping malformed engine line");
            }
            Err(e) => {
                error!(error = %e, "Engine read failed");
                break;
            }
        }
    }
    alive.store(false, Ordering::SeqCst);
    // Dropping the routes wakes every waiter with a closed channel.
    routes.lock().await.clear();
}

async fn dispatch(routes: &Routes, response: EngineResponse) {
    if let Some(warning) = &response.warning {
        warn!(query_id = %response.id, warning = %warning, "Engine warning");
        if response.is_warning_only() {
            return;
        }
    }
    if let Some(err) = &response.error {
        warn!(query_id = %response.id, error = %err, "Engine reported an error");
    }

    let mut routes = routes.lock().await;
    if response.is_final() {
        match routes.remove(&response.id) {
            Some(route) => {
                let _ = route.result.send(response);
            }
            None => debug!(query_id = %response.id, "Dropping response for unknown query"),
        }
    } else {
        match routes.get(&response.id) {
            Some(route) => {
                let _ = route.updates.send(response);
            }
            None => debug!(query_id = %response.id, "Dropping update for unknown query"),
        }
    }
}

async fn drain_diagnostics<R: AsyncRead + Unpin>(stderr: R) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: "katago", "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(target: "katago", error = %e, "Failed to read engine diagnostics");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use go_core::GameState;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    struct FakeEngine {
        requests: Lines<BufReader<DuplexStream>>,
        responses: DuplexStream,
    }

    impl FakeEngine {
        async fn request(&mut self) -> serde_json::Value {
            let line = self.requests.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn reply(&mut self, text: &str) {
            self.responses.write_all(text.as_bytes()).await.unwrap();
        }
    }

    fn connect() -> (KataGoEngine, FakeEngine) {
        let (engine_in, fake_requests) = duplex(64 * 1024);
        let (fake_responses, engine_out) = duplex(64 * 1024);
        let engine = KataGoEngine::from_io(engine_in, engine_out);
        let fake = FakeEngine {
            requests: BufReader::new(fake_requests).lines(),
            responses: fake_responses,
        };
        (engine, fake)
    }

    fn request(engine: &KataGoEngine) -> (QueryId, AnalysisRequest) {
        let id = engine.next_query_id();
        let game = GameState::new(9).unwrap();
        (id, AnalysisRequest::for_position(id, &game, 6.5, None, 1.0))
    }

    #[tokio::test]
    async fn test_reader_tolerates_split_and_bad_lines() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = ResponseReader::new(rx);

        tx.write_all(b"{\"id\":\"1\",\"isDuring").await.unwrap();
        tx.write_all(b"Search\":true}\nnot json\n\n{\"id\":\"1\"}\n").await.unwrap();
        drop(tx);

        let first = reader.next_response().await.unwrap().unwrap();
        assert!(first.is_during_search);
        assert!(matches!(
            reader.next_response().await,
            Err(SessionError::Protocol(_))
        ));
        let last = reader.next_response().await.unwrap().unwrap();
        assert!(last.is_final());
        assert!(reader.next_response().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_updates_then_final_in_order() {
        let (engine, mut fake) = connect();
        let (id, req) = request(&engine);
        let mut pending = engine.analyze(id, &req).await.unwrap();

        let sent = fake.request().await;
        assert_eq!(sent["id"], "0");

        fake.reply(concat!(
            "{\"id\":\"0\",\"isDuringSearch\":true,\"rootInfo\":{\"winrate\":0.51}}\n",
            "garbage\n",
            "{\"id\":\"0\",\"isDuringSearch\":true,\"rootInfo\":{\"winrate\":0.53}}\n",
            "{\"id\":\"0\",\"isDuringSearch\":false,\"rootInfo\":{\"winrate\":0.55}}\n",
        ))
        .await;

        let mut seen = Vec::new();
        loop {
            match pending.next_event().await.unwrap() {
                QueryEvent::Update(r) => seen.push(r.root_win_pct().unwrap().round()),
                QueryEvent::Final(r) => {
                    seen.push(r.root_win_pct().unwrap().round());
                    break;
                }
            }
        }
        assert_eq!(seen, vec![51.0, 53.0, 55.0]);
    }

    #[tokio::test]
    async fn test_warning_does_not_end_query() {
        let (engine, mut fake) = connect();
        let (id, req) = request(&engine);
        let mut pending = engine.analyze(id, &req).await.unwrap();
        fake.request().await;

        fake.reply(concat!(
            "{\"id\":\"0\",\"field\":\"foo\",\"warning\":\"unknown field\"}\n",
            "{\"id\":\"0\",\"isDuringSearch\":false,\"rootInfo\":{\"winrate\":0.6},",
            "\"moveInfos\":[{\"move\":\"C3\",\"winrate\":0.58,\"visits\":10,\"order\":0}]}\n",
        ))
        .await;

        match pending.next_event().await.unwrap() {
            QueryEvent::Final(r) => {
                assert!(r.warning.is_none());
                assert_eq!(r.move_infos.len(), 1);
            }
            QueryEvent::Update(r) => panic!("unexpected update {r:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminate_releases_query() {
        let (engine, mut fake) = connect();
        let (id, req) = request(&engine);
        let mut pending = engine.analyze(id, &req).await.unwrap();
        fake.request().await;

        engine.terminate(id).await.unwrap();
        let term = fake.request().await;
        assert_eq!(term["action"], "terminate");
        assert_eq!(term["terminateId"], "0");
        assert_eq!(term["id"], "TERM 0");

        // Late output for the terminated query goes nowhere.
        fake.reply("{\"id\":\"0\",\"isDuringSearch\":false}\n").await;
        assert!(matches!(pending.next_event().await, Err(SessionError::Io(_))));
    }

    #[tokio::test]
    async fn test_eof_marks_engine_dead() {
        let (engine, fake) = connect();
        let (id, req) = request(&engine);
        let mut pending = engine.analyze(id, &req).await.unwrap();

        drop(fake);
        assert!(matches!(pending.next_event().await, Err(SessionError::Io(_))));
        assert!(!engine.is_alive());

        let (id, req) = request(&engine);
        assert!(matches!(engine.analyze(id, &req).await, Err(SessionError::Io(_))));
    }

    #[tokio::test]
    async fn test_query_ids_are_unique() {
        let (engine, _fake) = connect();
        let a = engine.next_query_id();
        let b = engine.next_query_id();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_launch_error_for_missing_binary() {
        let result = KataGoEngine::start("/nonexistent/katago", "a.cfg", "m.bin.gz", &[]);
        assert!(matches!(result, Err(SessionError::Launch(_))));
    }
}
