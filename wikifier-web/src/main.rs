//! Servidor web Axum com WebSocket para acompanhar a wikificação em tempo real

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use wikifier_core::{
    wikify_column, CensusCodeTable, CountryWikifier, ElasticsearchIndex, MemoryIndex, RegionWikifier,
    SearchIndex, Table, WikifierConfig, WikifierError, WikifierEvent, WikifierOutputRow, WikifierResult,
};

/// Estado compartilhado da aplicação
struct AppState {
    config: WikifierConfig,
    census: Arc<CensusCodeTable>,
    countries: CountryWikifier,
    /// Índice carregado de `WIKIFIER_INDEX_DOCS`; sem ele usa o Elasticsearch.
    memory_index: Option<Arc<MemoryIndex>>,
}

impl AppState {
    fn load() -> WikifierResult<Self> {
        let config = match std::env::var("WIKIFIER_CONFIG") {
            Ok(path) => {
                info!("Carregando configuração de {}", path);
                WikifierConfig::from_yaml_file(path)?
            }
            Err(_) => WikifierConfig::default(),
        };
        config.validate()?;

        let census = Arc::new(config.load_census_table()?);
        let memory_index = match std::env::var("WIKIFIER_INDEX_DOCS") {
            Ok(path) => Some(Arc::new(MemoryIndex::from_json_path(path)?)),
            Err(_) => None,
        };

        Ok(Self {
            config,
            census,
            countries: CountryWikifier::new(),
            memory_index,
        })
    }

    /// Monta o wikifier de uma requisição. Deve rodar fora do runtime async,
    /// pois o cliente Elasticsearch é bloqueante.
    fn wikifier(&self) -> WikifierResult<RegionWikifier<Arc<dyn SearchIndex>>> {
        let index: Arc<dyn SearchIndex> = match &self.memory_index {
            Some(index) => index.clone() as Arc<dyn SearchIndex>,
            None => Arc::new(ElasticsearchIndex::from_config(&self.config)?),
        };
        Ok(RegionWikifier::new(index, self.config.clone()).with_census_codes(self.census.clone()))
    }
}

/// Requisição de wikificação de uma coluna
#[derive(Deserialize)]
struct WikifyRequest {
    table: Table,
    column: String,
    /// Tag de contexto (`admin1`, `admin2`, `admin3`)
    context: String,
}

#[derive(Serialize)]
struct WikifyResponse {
    output_column: String,
    rows: Vec<WikifierOutputRow>,
    table: Table,
    census_short_circuit: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let state = match AppState::load() {
        Ok(state) => Arc::new(state),
        Err(err) => {
            error!("Falha ao iniciar o wikifier: {}", err);
            return;
        }
    };
    if state.memory_index.is_none() {
        info!("Usando Elasticsearch em {}/{}", state.config.es_server, state.config.es_index);
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/config", get(config_handler))
        .route("/wikify", post(wikify_handler))
        .route("/wikify-column", post(wikify_column_handler))
        .route("/ws", get(ws_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state);

    let addr = std::env::var("WIKIFIER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Não foi possível abrir {}: {}", addr, err);
            return;
        }
    };
    info!("🚀 Servidor Wikifier iniciado em http://{}", addr);
    if let Err(err) = axum::serve(listener, app).await {
        error!("Servidor encerrado com erro: {}", err);
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Configuração efetiva do servidor
async fn config_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.clone())
}

/// Converte um erro do wikifier na resposta HTTP correspondente
fn error_response(err: &WikifierError) -> Response {
    let status = match err {
        WikifierError::Configuration(_) => StatusCode::BAD_REQUEST,
        WikifierError::Retrieval(_) | WikifierError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

fn join_error_response(err: tokio::task::JoinError) -> Response {
    error!("Tarefa de wikificação abortada: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "tarefa de wikificação abortada"})),
    )
        .into_response()
}

/// Wikificação de regiões via HTTP POST (sem streaming)
async fn wikify_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WikifyRequest>,
) -> impl IntoResponse {
    let result = tokio::task::spawn_blocking(move || {
        let wikifier = state.wikifier()?;
        wikifier.produce(&req.table, &req.column, &req.context)
    })
    .await;

    match result {
        Ok(Ok(output)) => Json(WikifyResponse {
            output_column: output.output_column,
            rows: output.rows,
            table: output.table,
            census_short_circuit: output.census_short_circuit,
        })
        .into_response(),
        Ok(Err(err)) => {
            warn!("Wikificação falhou: {}", err);
            error_response(&err)
        }
        Err(err) => join_error_response(err),
    }
}

/// Coluna mista: países pelo gazetteer, o resto pelo wikifier de regiões
async fn wikify_column_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WikifyRequest>,
) -> impl IntoResponse {
    let result = tokio::task::spawn_blocking(move || {
        let wikifier = state.wikifier()?;
        wikify_column(&wikifier, &state.countries, &req.table, &req.column, &req.context)
    })
    .await;

    match result {
        Ok(Ok(rows)) => Json(rows).into_response(),
        Ok(Err(err)) => {
            warn!("Wikificação falhou: {}", err);
            error_response(&err)
        }
        Err(err) => join_error_response(err),
    }
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Lógica do WebSocket: recebe uma requisição, executa o wikifier e envia os eventos
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let req = match serde_json::from_str::<WikifyRequest>(&text) {
                    Ok(req) => req,
                    Err(err) => {
                        let event = WikifierEvent::Error {
                            message: format!("requisição inválida: {}", err),
                        };
                        if send_event(&mut socket, &event).await.is_err() {
                            return;
                        }
                        continue;
                    }
                };

                info!(
                    "Wikificando via WebSocket: coluna '{}' [{}], {} linhas",
                    req.column,
                    req.context,
                    req.table.len()
                );

                // O wikifier é síncrono: roda em spawn_blocking e os eventos
                // ficam na fila std::mpsc até o fim
                let (tx, rx) = std::sync::mpsc::channel::<WikifierEvent>();
                let state_for_thread = Arc::clone(&state);
                let handle = tokio::task::spawn_blocking(move || {
                    match state_for_thread.wikifier() {
                        Ok(wikifier) => {
                            let _ = wikifier.produce_streaming(&req.table, &req.column, &req.context, tx);
                        }
                        Err(err) => {
                            let _ = tx.send(WikifierEvent::Error {
                                message: err.to_string(),
                            });
                        }
                    }
                });
                handle.await.ok();

                let events: Vec<WikifierEvent> = rx.try_iter().collect();
                for event in &events {
                    if send_event(&mut socket, event).await.is_err() {
                        return; // cliente desconectou
                    }
                    // Pequena pausa para a interface animar passo a passo
                    tokio::time::sleep(tokio::time::Duration::from_millis(35)).await;
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &WikifierEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json)).await,
        Err(err) => {
            warn!("Evento não serializável: {}", err);
            Ok(())
        }
    }
}
