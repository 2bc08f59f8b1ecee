//! HTTP API server for the lnroute node.
//!
//! Exposes the routing core as JSON endpoints under `/api/v1`: layer
//! management, constraint feedback, reservations, route queries and base
//! graph replacement.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use lnroute_core::{Msat, NodeId, ShortChannelId, ShortChannelIdDir};
use lnroute_routing::{
    apply_outcome, AttemptOutcome, BaseGraph, Bias, ChannelUpdate, Constraint, CreatedChannel,
    FeedbackReport, GetRoutesRequest, GraphSnapshot, InformKind, Layer, ReservationInfo,
    ReserveHop, RouteSet, RoutingError,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::state::NodeState;

// --- Request / response types ---

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub channels: usize,
    pub layers: usize,
    pub reservations: usize,
}

#[derive(Deserialize)]
pub struct CreateLayerRequest {
    pub name: String,
    #[serde(default)]
    pub persistent: bool,
}

#[derive(Deserialize)]
pub struct ListLayersQuery {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct DisableNodeRequest {
    pub node: NodeId,
}

#[derive(Deserialize)]
pub struct DisableChannelRequest {
    pub short_channel_id_dir: ShortChannelIdDir,
}

#[derive(Deserialize)]
pub struct CreateChannelRequest {
    pub source: NodeId,
    pub destination: NodeId,
    pub short_channel_id: ShortChannelId,
    pub capacity_msat: Msat,
}

#[derive(Deserialize)]
pub struct UpdateChannelRequest {
    pub short_channel_id_dir: ShortChannelIdDir,
    #[serde(flatten)]
    pub update: ChannelUpdate,
}

#[derive(Deserialize)]
pub struct BiasChannelRequest {
    pub short_channel_id_dir: ShortChannelIdDir,
    pub bias: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub relative: bool,
}

#[derive(Deserialize)]
pub struct InformChannelRequest {
    pub short_channel_id_dir: ShortChannelIdDir,
    pub amount_msat: Msat,
    pub inform: InformKind,
    /// Observation time; now if absent.
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Deserialize)]
pub struct AgeRequest {
    pub cutoff: u64,
}

#[derive(Serialize, Deserialize)]
pub struct AgeResponse {
    pub removed: usize,
}

#[derive(Deserialize)]
pub struct ReserveRequest {
    pub path: Vec<ReserveHop>,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ReserveResponse {
    pub owner: String,
}

#[derive(Deserialize)]
pub struct UnreserveRequest {
    pub path: Vec<ReserveHop>,
}

#[derive(Serialize, Deserialize)]
pub struct UnreserveResponse {
    pub released: usize,
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub layer: String,
    pub path: Vec<ReserveHop>,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

#[derive(Serialize, Deserialize)]
pub struct GraphResponse {
    pub channels: usize,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Map a routing error onto an HTTP status.
fn status_for(err: &RoutingError) -> StatusCode {
    match err {
        RoutingError::LayerNotFound(_)
        | RoutingError::EdgeNotFound(_)
        | RoutingError::NoRouteFound { .. } => StatusCode::NOT_FOUND,
        RoutingError::LayerExists(_)
        | RoutingError::DuplicateEdge(_)
        | RoutingError::InsufficientCapacity { .. }
        | RoutingError::ReservationConflict { .. } => StatusCode::CONFLICT,
        RoutingError::InvalidRequest(_) | RoutingError::Core(_) => StatusCode::BAD_REQUEST,
    }
}

fn api_error(err: RoutingError) -> ApiError {
    (
        status_for(&err),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// --- Handlers ---

async fn handle_status(State(state): State<Arc<NodeState>>) -> Json<StatusResponse> {
    let stats = state.service.stats();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        channels: stats.channels,
        layers: stats.layers,
        reservations: stats.reservations,
    })
}

async fn handle_replace_graph(
    State(state): State<Arc<NodeState>>,
    Json(snapshot): Json<GraphSnapshot>,
) -> ApiResult<GraphResponse> {
    let graph = BaseGraph::from_snapshot(snapshot).map_err(api_error)?;
    let channels = state.service.replace_base_graph(graph);
    Ok(Json(GraphResponse { channels }))
}

async fn handle_get_routes(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<GetRoutesRequest>,
) -> ApiResult<RouteSet> {
    let service = Arc::clone(&state.service);
    let result = tokio::task::spawn_blocking(move || service.get_routes(&req))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("route search aborted: {e}"),
                }),
            )
        })?;
    match result {
        Ok(routes) => Ok(Json(routes)),
        Err(RoutingError::NoRouteFound { .. }) => Ok(Json(RouteSet::empty())),
        Err(e) => Err(api_error(e)),
    }
}

async fn handle_list_layers(
    State(state): State<Arc<NodeState>>,
    Query(query): Query<ListLayersQuery>,
) -> ApiResult<Vec<Layer>> {
    state
        .service
        .list_layers(query.name.as_deref())
        .map(Json)
        .map_err(api_error)
}

async fn handle_create_layer(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<CreateLayerRequest>,
) -> ApiResult<Layer> {
    let layer = state
        .service
        .create_layer(&req.name, req.persistent)
        .map_err(api_error)?;
    state.persist_layer(&layer.name);
    Ok(Json(layer))
}

async fn handle_remove_layer(
    State(state): State<Arc<NodeState>>,
    Path(name): Path<String>,
) -> ApiResult<Layer> {
    let layer = state.service.remove_layer(&name).map_err(api_error)?;
    if layer.persistent {
        state.forget_layer(&name);
    }
    Ok(Json(layer))
}

async fn handle_disable_node(
    State(state): State<Arc<NodeState>>,
    Path(name): Path<String>,
    Json(req): Json<DisableNodeRequest>,
) -> ApiResult<Layer> {
    state
        .service
        .disable_node(&name, req.node)
        .map_err(api_error)?;
    layer_after_mutation(&state, &name)
}

async fn handle_disable_channel(
    State(state): State<Arc<NodeState>>,
    Path(name): Path<String>,
    Json(req): Json<DisableChannelRequest>,
) -> ApiResult<Layer> {
    state
        .service
        .disable_channel(&name, req.short_channel_id_dir)
        .map_err(api_error)?;
    layer_after_mutation(&state, &name)
}

/// Persist `name` and return its current record.
fn layer_after_mutation(state: &NodeState, name: &str) -> ApiResult<Layer> {
    state.persist_layer(name);
    let mut layers = state.service.list_layers(Some(name)).map_err(api_error)?;
    layers
        .pop()
        .map(Json)
        .ok_or_else(|| api_error(RoutingError::LayerNotFound(name.to_string())))
}

async fn handle_create_channel(
    State(state): State<Arc<NodeState>>,
    Path(name): Path<String>,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult<CreatedChannel> {
    let created = state
        .service
        .create_channel(
            &name,
            req.source,
            req.destination,
            req.short_channel_id,
            req.capacity_msat,
        )
        .map_err(api_error)?;
    state.persist_layer(&name);
    Ok(Json(created))
}

async fn handle_update_channel(
    State(state): State<Arc<NodeState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateChannelRequest>,
) -> ApiResult<ChannelUpdate> {
    let merged = state
        .service
        .update_channel(&name, req.short_channel_id_dir, &req.update)
        .map_err(api_error)?;
    state.persist_layer(&name);
    Ok(Json(merged))
}

async fn handle_bias_channel(
    State(state): State<Arc<NodeState>>,
    Path(name): Path<String>,
    Json(req): Json<BiasChannelRequest>,
) -> ApiResult<Vec<Bias>> {
    let biases = state
        .service
        .bias_channel(
            &name,
            req.short_channel_id_dir,
            req.bias,
            req.description,
            req.relative,
        )
        .map_err(api_error)?;
    state.persist_layer(&name);
    Ok(Json(biases))
}

async fn handle_inform_channel(
    State(state): State<Arc<NodeState>>,
    Path(name): Path<String>,
    Json(req): Json<InformChannelRequest>,
) -> ApiResult<Vec<Constraint>> {
    let constraints = match req.timestamp {
        Some(ts) => state.service.inform_channel_at(
            &name,
            req.short_channel_id_dir,
            req.amount_msat,
            req.inform,
            ts,
        ),
        None => state.service.inform_channel(
            &name,
            req.short_channel_id_dir,
            req.amount_msat,
            req.inform,
        ),
    }
    .map_err(api_error)?;
    state.persist_layer(&name);
    Ok(Json(constraints))
}

async fn handle_age(
    State(state): State<Arc<NodeState>>,
    Path(name): Path<String>,
    Json(req): Json<AgeRequest>,
) -> ApiResult<AgeResponse> {
    let removed = state.service.age(&name, req.cutoff).map_err(api_error)?;
    state.persist_layer(&name);
    Ok(Json(AgeResponse { removed }))
}

async fn handle_reserve(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<ReserveRequest>,
) -> ApiResult<ReserveResponse> {
    let owner = state
        .service
        .reserve(&req.path, req.owner)
        .map_err(api_error)?;
    Ok(Json(ReserveResponse { owner }))
}

async fn handle_unreserve(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<UnreserveRequest>,
) -> ApiResult<UnreserveResponse> {
    state.service.unreserve(&req.path).map_err(api_error)?;
    Ok(Json(UnreserveResponse {
        released: req.path.len(),
    }))
}

async fn handle_list_reservations(
    State(state): State<Arc<NodeState>>,
) -> Json<Vec<ReservationInfo>> {
    Json(state.service.list_reservations())
}

async fn handle_feedback(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<FeedbackReport> {
    let report =
        apply_outcome(&state.service, &req.layer, &req.path, &req.outcome).map_err(api_error)?;
    state.persist_layer(&req.layer);
    Ok(Json(report))
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/graph", put(handle_replace_graph))
        .route("/api/v1/getroutes", post(handle_get_routes))
        .route(
            "/api/v1/layers",
            get(handle_list_layers).post(handle_create_layer),
        )
        .route("/api/v1/layers/{name}", delete(handle_remove_layer))
        .route("/api/v1/layers/{name}/disable-node", post(handle_disable_node))
        .route("/api/v1/layers/{name}/disable-channel", post(handle_disable_channel))
        .route("/api/v1/layers/{name}/channels", post(handle_create_channel))
        .route("/api/v1/layers/{name}/channel-updates", post(handle_update_channel))
        .route("/api/v1/layers/{name}/biases", post(handle_bias_channel))
        .route("/api/v1/layers/{name}/inform", post(handle_inform_channel))
        .route("/api/v1/layers/{name}/age", post(handle_age))
        .route(
            "/api/v1/reservations",
            get(handle_list_reservations).post(handle_reserve),
        )
        .route("/api/v1/reservations/release", post(handle_unreserve))
        .route("/api/v1/feedback", post(handle_feedback))
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<NodeState>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
