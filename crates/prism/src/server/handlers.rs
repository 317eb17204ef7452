//! Request handlers.

use super::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use prism_core::store::{EvaluationRepository, ScoreSummary};
use prism_core::{
    EvaluationError, FanOutResults, FeedbackRecord, ItemContext, Judgement, PrismError, TaskInfo,
    VERSION,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Body of `POST /enrich-item`.
///
/// Either the four listing fields or a `metadata` object must be present.
/// Both may be sent together: explicit listing fields take precedence over
/// the same keys inside `metadata`.
#[derive(Debug, Deserialize)]
pub struct EnrichItemRequest {
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub item_title: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub item_product_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub tasks: Vec<String>,
}

impl EnrichItemRequest {
    fn into_parts(self) -> ApiResult<(ItemContext, Vec<String>)> {
        let Some(metadata) = self.metadata else {
            let missing: Vec<&str> = [
                ("item_title", self.item_title.is_none()),
                ("short_description", self.short_description.is_none()),
                ("long_description", self.long_description.is_none()),
                ("item_product_type", self.item_product_type.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();
            if !missing.is_empty() {
                return Err(ApiError::InvalidBody {
                    status: StatusCode::UNPROCESSABLE_ENTITY,
                    message: format!(
                        "missing field(s) {} and no metadata object",
                        missing.join(", ")
                    ),
                });
            }
            let item = ItemContext {
                item_id: self.item_id,
                item_title: self.item_title.unwrap_or_default(),
                short_description: self.short_description.unwrap_or_default(),
                long_description: self.long_description.unwrap_or_default(),
                item_product_type: self.item_product_type.unwrap_or_default(),
                metadata: BTreeMap::new(),
            };
            return Ok((item, self.tasks));
        };

        let mut item = ItemContext::from_metadata(metadata);
        if let Some(item_id) = self.item_id {
            item.item_id = Some(item_id);
        }
        for (field, value) in [
            (&mut item.item_title, self.item_title),
            (&mut item.short_description, self.short_description),
            (&mut item.long_description, self.long_description),
            (&mut item.item_product_type, self.item_product_type),
        ] {
            if let Some(value) = value {
                *field = value;
            }
        }
        Ok((item, self.tasks))
    }
}

/// Body of `POST /evaluate`.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub task: String,
    pub output: String,
    #[serde(default)]
    pub item: ItemContext,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub providers: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
        providers: state.prism.provider_keys(),
    })
}

pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskInfo>> {
    Json(state.prism.tasks())
}

pub async fn enrich_item(
    State(state): State<AppState>,
    body: Result<Json<EnrichItemRequest>, JsonRejection>,
) -> ApiResult<Json<FanOutResults>> {
    let Json(request) = body?;
    let (item, tasks) = request.into_parts()?;
    let response = state.prism.enrich_item(&item, Some(&tasks)).await?;
    Ok(Json(response.results))
}

pub async fn evaluate(
    State(state): State<AppState>,
    body: Result<Json<EvaluateRequest>, JsonRejection>,
) -> ApiResult<Json<Judgement>> {
    let Json(request) = body?;
    let judge = state
        .prism
        .judge()
        .ok_or(EvaluationError::NoJudge)?;
    let judgement = judge
        .judge(&request.task, &request.item, &request.output)
        .await?;
    Ok(Json(judgement))
}

pub async fn feedback(
    State(state): State<AppState>,
    body: Result<Json<FeedbackRecord>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(record) = body?;
    if !(0.0..=10.0).contains(&record.score) {
        return Err(ApiError::BadRequest(format!(
            "score must be between 0 and 10, got {}",
            record.score
        )));
    }
    let configured = state.prism.provider_specs();
    let row = record
        .save(state.db.pool(), &configured)
        .await
        .map_err(|e| match e {
            PrismError::UnknownTask(task) => ApiError::NotFound(format!("task '{task}'")),
            other => other.into(),
        })?;
    tracing::info!("Recorded feedback {} for {}", row.id, record.item_key);
    Ok((StatusCode::CREATED, Json(json!({ "id": row.id }))))
}

pub async fn scores(State(state): State<AppState>) -> ApiResult<Json<Vec<ScoreSummary>>> {
    Ok(Json(EvaluationRepository::score_summary(state.db.pool()).await?))
}
