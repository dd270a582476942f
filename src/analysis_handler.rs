use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;

use crate::analysis::{aggregate, build_prompt, Language};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{AnalysisQuery, AnalysisSummary, Client, ModelList, PurchaseDetail};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Loads a client and its purchase history, or fails with 404.
async fn client_history(
    state: &AppState,
    client_id: i64,
) -> Result<(Client, Vec<PurchaseDetail>), AppError> {
    let client = state
        .store
        .get_client(client_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;
    let history = state.store.purchase_history(client_id).await?;
    Ok((client, history))
}

/// GET /analysis/models
///
/// Best effort: falls back to the default model when the catalog is unreachable.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(ModelList {
        models: state.ollama.list_models().await,
    })
}

/// GET /analysis/:client_id
///
/// Aggregated purchase figures for charts. `lang` is accepted for parity with
/// the stream endpoint and does not change the numbers.
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<i64>,
    Query(_params): Query<AnalysisQuery>,
) -> Result<Json<AnalysisSummary>, AppError> {
    let (client, history) = client_history(&state, client_id).await?;
    let summary = aggregate(&history).into_summary(client.name);

    tracing::info!(
        "Analysis for client {}: {} purchase(s), total {:.2}",
        client_id,
        summary.purchase_count,
        summary.total_spent
    );
    Ok(Json(summary))
}

/// GET /analysis/:client_id/stream
///
/// Streams the model's commentary as plain text. Errors after the response has
/// started are written into the body; see [`crate::ollama_client::relay`].
pub async fn stream_analysis(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<i64>,
    Query(params): Query<AnalysisQuery>,
) -> Result<Response, AppError> {
    let lang = Language::from_code(params.lang.as_deref().unwrap_or("en"));
    let (client, history) = client_history(&state, client_id).await?;

    let figures = aggregate(&history);
    if figures.is_empty() {
        tracing::info!("Client {} has no purchases, skipping inference", client_id);
        return Ok(([(CONTENT_TYPE, TEXT_PLAIN)], lang.no_history_message()).into_response());
    }

    let model = params
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.ollama.default_model().to_string());
    let prompt = build_prompt(&client.name, &figures, lang);
    tracing::debug!("Prompt for client {} ({} chars)", client_id, prompt.len());

    let chunks = state
        .ollama
        .stream_generate(&model, &prompt)
        .map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk)));

    Ok(([(CONTENT_TYPE, TEXT_PLAIN)], Body::from_stream(chunks)).into_response())
}
