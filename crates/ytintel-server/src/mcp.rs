//! Minimal MCP tool server: JSON-RPC 2.0, one message per line, over any
//! async reader/writer pair (stdio in production).
//!
//! Requests are read sequentially. `tools/call` runs as its own task so a
//! slow analysis never blocks `ping` or cancellation, and every response
//! goes through a single writer task so lines never interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use ytintel_core::{
    AppConfig, ErrorKind, FetchDepth, SearchOrder, SearchQuery, ToolError, VideoRequest,
};
use ytintel_pipeline::{AnalysisOrchestrator, QuotaSnapshot, SearchService};

pub const SERVER_NAME: &str = "youtube-intelligence";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

const DEFAULT_SEARCH_RESULTS: u32 = 10;
const DEFAULT_REGION: &str = "US";
const DEFAULT_TIMEFRAME_DAYS: u32 = 30;
const DEFAULT_SAMPLE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct AnalyzeArgs {
    video_id: String,
    #[serde(default)]
    depth: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    max_results: Option<u32>,
    #[serde(default)]
    order: Option<String>,
    #[serde(default)]
    region_code: Option<String>,
    #[serde(default)]
    published_after_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MarketArgs {
    topic: String,
    #[serde(default)]
    timeframe_days: Option<u32>,
    #[serde(default)]
    sample_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelParams {
    request_id: Value,
}

#[derive(Debug, Clone, PartialEq)]
enum ToolCall {
    AnalyzeVideo {
        video_id: String,
        depth: Option<String>,
    },
    SearchVideos {
        query: String,
        max_results: u32,
        order: Option<String>,
        region_code: String,
        published_after_days: Option<u32>,
    },
    AnalyzeMarket {
        topic: String,
        timeframe_days: u32,
        sample_size: u32,
    },
    SystemStatus,
}

/// What the read loop should do with one incoming message.
#[derive(Debug, PartialEq)]
enum Route {
    Respond(Value),
    Call { id: Value, call: ToolCall },
    Cancel(Value),
    Ignore,
}

/// Configuration presence flags reported by `system_status`. Never holds
/// secret values.
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub environment: String,
    pub youtube_api_configured: bool,
    pub llm_configured: bool,
    pub database_configured: bool,
    pub llm_model: String,
    pub enrich_depths: Vec<FetchDepth>,
    pub max_comments: usize,
}

impl StatusInfo {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            environment: config.env.to_string(),
            youtube_api_configured: !config.youtube_api_key.is_empty(),
            llm_configured: config.enrichment_enabled(),
            database_configured: config.database_url.is_some(),
            llm_model: config.llm_model.clone(),
            enrich_depths: config.enrich_depths.clone(),
            max_comments: config.max_comments,
        }
    }
}

#[derive(Debug, Serialize)]
struct SystemStatus<'a> {
    server_name: &'static str,
    version: &'static str,
    status: &'static str,
    timestamp: String,
    pipeline_version: u32,
    configuration: &'a StatusInfo,
    store_reachable: bool,
    quota: Vec<QuotaSnapshot>,
}

pub struct ToolServer {
    orchestrator: Arc<AnalysisOrchestrator>,
    search: SearchService,
    status: StatusInfo,
    in_flight: Mutex<HashMap<String, CancellationToken>>,
}

impl ToolServer {
    pub fn new(
        orchestrator: Arc<AnalysisOrchestrator>,
        search: SearchService,
        status: StatusInfo,
    ) -> Self {
        Self {
            orchestrator,
            search,
            status,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Serve until `reader` reaches EOF or `shutdown` fires.
    ///
    /// On EOF in-flight calls are allowed to finish. On shutdown they are
    /// cancelled first.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from `reader` fails.
    pub async fn run<R, W>(
        self: Arc<Self>,
        reader: R,
        writer: W,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        let writer_task = tokio::spawn(write_messages(writer, rx));
        let mut calls = JoinSet::new();
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    self.cancel_all();
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                tracing::info!("stdin closed");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            match self.route(&line) {
                Route::Respond(message) => send(&tx, message),
                Route::Call { id, call } => {
                    let cancel = self.register(&id);
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    calls.spawn(async move {
                        let result = server.call_tool(call, &cancel).await;
                        server.unregister(&id);
                        send(&tx, success(id, result));
                    });
                }
                Route::Cancel(request_id) => self.cancel(&request_id),
                Route::Ignore => {}
            }
        }

        while let Some(joined) = calls.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "tool call task panicked");
            }
        }
        drop(tx);
        if let Err(e) = writer_task.await {
            tracing::error!(error = %e, "writer task panicked");
        }
        Ok(())
    }

    fn route(&self, line: &str) -> Route {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable message");
                return Route::Respond(failure(
                    Value::Null,
                    PARSE_ERROR,
                    &format!("parse error: {e}"),
                ));
            }
        };
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Route::Respond(failure(
                    Value::Null,
                    INVALID_REQUEST,
                    &format!("invalid request: {e}"),
                ));
            }
        };

        tracing::debug!(method = %request.method, "request received");
        let Some(id) = request.id else {
            if request.method != "notifications/cancelled" {
                return Route::Ignore;
            }
            return match serde_json::from_value::<CancelParams>(request.params) {
                Ok(params) => Route::Cancel(params.request_id),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed cancellation notice");
                    Route::Ignore
                }
            };
        };

        match request.method.as_str() {
            "initialize" => Route::Respond(success(id, initialize_result(&request.params))),
            "ping" => Route::Respond(success(id, json!({}))),
            "tools/list" => Route::Respond(success(id, json!({ "tools": tool_definitions() }))),
            "tools/call" => match parse_call(request.params) {
                Ok(call) => Route::Call { id, call },
                Err(message) => Route::Respond(failure(id, INVALID_PARAMS, &message)),
            },
            other => Route::Respond(failure(
                id,
                METHOD_NOT_FOUND,
                &format!("method not found: {other}"),
            )),
        }
    }

    async fn call_tool(&self, call: ToolCall, cancel: &CancellationToken) -> Value {
        match call {
            ToolCall::AnalyzeVideo { video_id, depth } => {
                match self.analyze_video(&video_id, depth.as_deref(), cancel).await {
                    Ok(text) => tool_result(text, false),
                    Err(err) => {
                        tracing::info!(video_id = %video_id, kind = %err.kind, "analyze_video failed");
                        tool_result(error_text(&err), true)
                    }
                }
            }
            ToolCall::SearchVideos {
                query,
                max_results,
                order,
                region_code,
                published_after_days,
            } => {
                let searched = self
                    .search_videos(
                        &query,
                        max_results,
                        order.as_deref(),
                        &region_code,
                        published_after_days,
                        cancel,
                    )
                    .await;
                match searched {
                    Ok(text) => tool_result(text, false),
                    Err(err) => {
                        tracing::info!(query = %query, kind = %err.kind, "search_videos failed");
                        tool_result(error_text(&err), true)
                    }
                }
            }
            ToolCall::AnalyzeMarket {
                topic,
                timeframe_days,
                sample_size,
            } => {
                let analysed = self
                    .search
                    .analyze_market(&topic, timeframe_days, sample_size, cancel)
                    .await
                    .map_err(ToolError::from)
                    .and_then(|analysis| to_json(&analysis));
                match analysed {
                    Ok(text) => tool_result(text, false),
                    Err(err) => {
                        tracing::info!(topic = %topic, kind = %err.kind, "analyze_market failed");
                        tool_result(error_text(&err), true)
                    }
                }
            }
            ToolCall::SystemStatus => tool_result(self.system_status().await, false),
        }
    }

    async fn search_videos(
        &self,
        query: &str,
        max_results: u32,
        order: Option<&str>,
        region_code: &str,
        published_after_days: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let order = match order {
            Some(raw) => raw.parse::<SearchOrder>().map_err(ToolError::invalid_request)?,
            None => SearchOrder::default(),
        };
        let mut search = SearchQuery::new(query, max_results)?
            .with_order(order)
            .with_region(region_code)?;
        if let Some(days) = published_after_days {
            search = search.published_after(Utc::now() - TimeDelta::days(i64::from(days)));
        }
        let report = self
            .search
            .search(&search, cancel)
            .await
            .map_err(ToolError::from)?;
        to_json(&report)
    }

    async fn analyze_video(
        &self,
        video_id: &str,
        depth: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        let depth = match depth {
            Some(raw) => raw.parse::<FetchDepth>().map_err(ToolError::invalid_request)?,
            None => FetchDepth::Full,
        };
        let request = VideoRequest::parse(video_id, depth)?;
        let report = self
            .orchestrator
            .produce_with_cancel(&request, cancel)
            .await
            .map_err(ToolError::from)?;
        to_json(report.as_ref())
    }

    async fn system_status(&self) -> String {
        let store_reachable = match self.orchestrator.cache().ping_store().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "report store unreachable");
                false
            }
        };
        let status = SystemStatus {
            server_name: SERVER_NAME,
            version: SERVER_VERSION,
            status: "ok",
            timestamp: Utc::now().to_rfc3339(),
            pipeline_version: self.orchestrator.config().pipeline_version,
            configuration: &self.status,
            store_reachable,
            quota: self.orchestrator.governor().snapshot(),
        };
        serde_json::to_string_pretty(&status).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }

    fn register(&self, id: &Value) -> CancellationToken {
        let token = CancellationToken::new();
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), token.clone());
        token
    }

    fn unregister(&self, id: &Value) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id.to_string());
    }

    fn cancel(&self, request_id: &Value) {
        let token = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request_id.to_string())
            .cloned();
        match token {
            Some(token) => {
                tracing::info!(request_id = %request_id, "cancelling tool call");
                token.cancel();
            }
            None => tracing::debug!(request_id = %request_id, "cancel for unknown request"),
        }
    }

    fn cancel_all(&self) {
        let calls = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        for token in calls.values() {
            token.cancel();
        }
    }
}

async fn write_messages<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = message.to_string();
        line.push('\n');
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            tracing::error!(error = %e, "failed to write response, stopping writer");
            return;
        }
    }
}

fn send(tx: &mpsc::UnboundedSender<Value>, message: Value) {
    if tx.send(message).is_err() {
        tracing::warn!("writer closed, dropping response");
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ToolError::new(ErrorKind::Internal, format!("result encoding failed: {e}")))
}

fn parse_call(params: Value) -> Result<ToolCall, String> {
    let params: CallParams =
        serde_json::from_value(params).map_err(|e| format!("invalid tools/call params: {e}"))?;
    match params.name.as_str() {
        "analyze_video" => {
            let args: AnalyzeArgs = serde_json::from_value(params.arguments)
                .map_err(|e| format!("invalid analyze_video arguments: {e}"))?;
            Ok(ToolCall::AnalyzeVideo {
                video_id: args.video_id,
                depth: args.depth,
            })
        }
        "search_videos" => {
            let args: SearchArgs = serde_json::from_value(params.arguments)
                .map_err(|e| format!("invalid search_videos arguments: {e}"))?;
            Ok(ToolCall::SearchVideos {
                query: args.query,
                max_results: args.max_results.unwrap_or(DEFAULT_SEARCH_RESULTS),
                order: args.order,
                region_code: args.region_code.unwrap_or_else(|| DEFAULT_REGION.to_owned()),
                published_after_days: args.published_after_days,
            })
        }
        "analyze_market" => {
            let args: MarketArgs = serde_json::from_value(params.arguments)
                .map_err(|e| format!("invalid analyze_market arguments: {e}"))?;
            Ok(ToolCall::AnalyzeMarket {
                topic: args.topic,
                timeframe_days: args.timeframe_days.unwrap_or(DEFAULT_TIMEFRAME_DAYS),
                sample_size: args.sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE),
            })
        }
        "system_status" => Ok(ToolCall::SystemStatus),
        other => Err(format!("unknown tool: {other}")),
    }
}

fn initialize_result(params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
    })
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "analyze_video",
            "description": "Analyze a YouTube video: engagement, comment sentiment, top keywords, \
                            and an optional LLM summary. Results are cached per video and depth.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "video_id": {
                        "type": "string",
                        "description": "YouTube video id or watch URL"
                    },
                    "depth": {
                        "type": "string",
                        "enum": ["metadata_only", "metadata_and_comments", "full"],
                        "default": "full",
                        "description": "How much data to fetch"
                    }
                },
                "required": ["video_id"]
            }
        },
        {
            "name": "search_videos",
            "description": "Search YouTube videos on a topic and rank the hits with engagement \
                            rate and category. Not cached; each call costs search quota.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search terms" },
                    "max_results": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 50,
                        "default": DEFAULT_SEARCH_RESULTS
                    },
                    "order": {
                        "type": "string",
                        "enum": ["relevance", "date", "rating", "viewCount"],
                        "default": "relevance"
                    },
                    "region_code": {
                        "type": "string",
                        "default": DEFAULT_REGION,
                        "description": "Two-letter region code"
                    },
                    "published_after_days": {
                        "type": "integer",
                        "description": "Only videos published within the last N days"
                    }
                },
                "required": ["query"]
            }
        },
        {
            "name": "analyze_market",
            "description": "Sample the most viewed recent videos on a topic and summarise \
                            competition, engagement, sentiment, and leading channels.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": { "type": "string", "description": "Topic or niche" },
                    "timeframe_days": {
                        "type": "integer",
                        "minimum": 1,
                        "default": DEFAULT_TIMEFRAME_DAYS
                    },
                    "sample_size": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 50,
                        "default": DEFAULT_SAMPLE_SIZE
                    }
                },
                "required": ["topic"]
            }
        },
        {
            "name": "system_status",
            "description": "Report server configuration, store health, pipeline version, \
                            and remaining quota.",
            "inputSchema": { "type": "object", "properties": {} }
        }
    ])
}

fn tool_result(text: String, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

fn error_text(err: &ToolError) -> String {
    json!({ "kind": err.kind, "message": err.message }).to_string()
}

fn success(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn failure(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}
