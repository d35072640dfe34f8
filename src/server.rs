//! HTTP surface
//!
//! ## Endpoints
//!
//! POST /run-system - Run a structured tool or legacy command, streamed as SSE
//! OPTIONS /run-system - CORS preflight
//! GET /tools - Tool catalogue
//! GET /stream?tool=<id>&target=<t> - Run a catalogue tool, streamed as SSE
//! GET /health - Health check

use crate::catalog::ToolCatalog;
use crate::config::ServerConfig;
use crate::errors::{Result, StreamError};
use crate::execution::{
    CompletionTracker, EventEncoder, ExecutionSpec, ResponseSink, SpecBuilder,
};
use crate::profile::ProfileResolver;
use crate::request::RunRequest;
use actix_web::http::{header, Method};
use actix_web::{web, App, HttpResponse, HttpResponseBuilder, HttpServer, Responder};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============ API Types ============

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub tool: String,
    pub target: String,
}

// ============ Application State ============

/// Everything a request needs, built once at startup
pub struct AppState {
    config: ServerConfig,
    specs: SpecBuilder,
    profiles: ProfileResolver,
    catalog: ToolCatalog,
    tracker: CompletionTracker,
    encoder: EventEncoder,
}

impl AppState {
    /// Validate `config`, load the catalogue and probe profile roots from the cwd
    pub fn new(config: ServerConfig) -> Result<Self> {
        let catalog = ToolCatalog::load(&config.tools_path)?;
        let profiles = ProfileResolver::new(config.profile_dir.clone());
        debug!("Profile search roots: {:?}", profiles.search_roots());
        Self::with_parts(config, profiles, catalog)
    }

    pub fn with_parts(
        config: ServerConfig,
        profiles: ProfileResolver,
        catalog: ToolCatalog,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            specs: SpecBuilder::from_config(&config),
            tracker: CompletionTracker::new(config.report_exit_status)
                .max_line_bytes(config.max_line_bytes),
            encoder: EventEncoder::new(config.stderr_prefix.clone()),
            profiles,
            catalog,
            config,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Resolve a validated request into an execution spec
    pub fn plan(&self, request: &RunRequest) -> Result<ExecutionSpec> {
        match request {
            RunRequest::Tool(tool) => {
                let name = tool
                    .profile
                    .as_deref()
                    .unwrap_or(&self.config.default_profile);
                let profile = self.profile_path(name);
                info!(
                    "Tool exec: {} {:?} {} (profile={})",
                    tool.binary,
                    tool.args,
                    tool.target.as_deref().unwrap_or(""),
                    profile.display()
                );
                self.specs.tool(tool, &profile)
            }
            RunRequest::Legacy(legacy) => self.plan_command(&legacy.cmd),
        }
    }

    /// Spec for a raw shell command under the legacy profile
    pub fn plan_command(&self, cmd: &str) -> Result<ExecutionSpec> {
        let profile = self.profile_path(&self.config.legacy_profile);
        info!("Legacy exec: {} (profile={})", cmd, profile.display());
        self.specs.legacy(cmd, &profile)
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        if self.config.sandbox.is_none() {
            return PathBuf::from(name);
        }
        self.profiles.resolve(name)
    }

    /// Start the run in the background and return its streaming response.
    ///
    /// Headers are committed here; everything after this point, including
    /// launch failures, is reported inside the stream.
    pub fn open_stream(&self, spec: ExecutionSpec) -> HttpResponse {
        let (sink, receiver) = ResponseSink::channel(self.config.sink_capacity, self.encoder.clone());
        let tracker = self.tracker.clone();

        actix_web::rt::spawn(async move {
            let program = spec.program().to_string();
            let summary = tracker.run(spec, sink).await;
            if summary.abandoned {
                info!("Run of {} abandoned after {}ms", program, summary.wall_time_ms);
            } else {
                debug!("Run of {} finished: {:?}", program, summary);
            }
        });

        event_stream_response().streaming(receiver.into_stream())
    }
}

fn event_stream_response() -> HttpResponseBuilder {
    let mut builder = HttpResponse::Ok();
    builder
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .insert_header(("X-Accel-Buffering", "no"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"));
    builder
}

fn error_response(err: &StreamError) -> HttpResponse {
    let message = match err {
        StreamError::Json(_) => "Invalid JSON".to_string(),
        other => other.to_string(),
    };

    let mut builder = if err.is_client_error() {
        warn!("Rejected request: {}", err);
        HttpResponse::BadRequest()
    } else {
        log::error!("Request failed: {}", err);
        HttpResponse::InternalServerError()
    };

    builder
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(ApiResponse::error(message))
}

// ============ Server ============

/// The streaming server, owning its state and route table
pub struct StreamServer {
    state: web::Data<AppState>,
}

impl StreamServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        Ok(Self::from_state(AppState::new(config)?))
    }

    pub fn from_state(state: AppState) -> Self {
        Self {
            state: web::Data::new(state),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Register state and routes on an actix `App`
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.state.clone())
            .route("/health", web::get().to(health_check))
            .route("/run-system", web::post().to(run_system))
            .route("/run-system", web::method(Method::OPTIONS).to(preflight))
            .route("/tools", web::get().to(list_tools))
            .route("/stream", web::get().to(stream_tool));
    }

    pub async fn run(self) -> std::io::Result<()> {
        let bind = self.state.config().bind.clone();
        let state = self.state;

        info!("Sandbox stream server listening on {}", bind);
        match &state.config().sandbox {
            Some(sandbox) => info!("Sandboxing with {}", sandbox.program),
            None => warn!("Sandbox disabled, programs run directly on the host"),
        }

        HttpServer::new(move || {
            let server = StreamServer {
                state: state.clone(),
            };
            App::new().configure(|cfg| server.configure(cfg))
        })
        .bind(bind.as_str())?
        .run()
        .await
    }
}

// ============ Handlers ============

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "sandbox-stream",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// CORS preflight for browser callers
async fn preflight() -> impl Responder {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .finish()
}

/// Run a structured tool or a legacy command
async fn run_system(body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    debug!("Received body: {}", String::from_utf8_lossy(&body));

    let request = match RunRequest::from_json(&body) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    match state.plan(&request) {
        Ok(spec) => {
            debug!("Streaming {} request: {}", request.kind(), spec);
            state.open_stream(spec)
        }
        Err(e) => error_response(&e),
    }
}

/// Tool catalogue
async fn list_tools(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(state.catalog())
}

/// Run a catalogue tool against a target
async fn stream_tool(query: web::Query<StreamQuery>, state: web::Data<AppState>) -> HttpResponse {
    let Some(entry) = state.catalog().find(&query.tool) else {
        return error_response(&StreamError::Validation("Unknown tool".to_string()));
    };

    let spec = entry
        .render_command(&query.target)
        .and_then(|cmd| state.plan_command(&cmd));

    match spec {
        Ok(spec) => state.open_stream(spec),
        Err(e) => error_response(&e),
    }
}
