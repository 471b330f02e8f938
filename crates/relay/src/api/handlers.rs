use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use chrono::NaiveDate;
use common::models::Candle;
use serde::Serialize;
use serde::de::DeserializeOwned;
use strategy::{PatternDetector, SignalGenerator};
use tracing::{debug, error, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{Reply, Response};

use crate::api::payloads::{
    DetectRequest, DetectResponse, DispatchRequest, ErrorResponse, GenerateRequest, GenerateResponse,
    HealthResponse, SignalsQuery, validate_all,
};
use crate::services::dispatch_service::{MAX_RECENT, SignalDispatcher};
use crate::services::orchestrator::Orchestrator;
use crate::stages::StageError;

pub fn json_reply<T: Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_reply(status: StatusCode, error: &str, detail: impl Display) -> Response {
    json_reply(
        status,
        &ErrorResponse {
            error: error.to_string(),
            detail: detail.to_string(),
        },
    )
}

fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected body: {}", String::from_utf8_lossy(body));
        error_reply(StatusCode::BAD_REQUEST, "invalid_json", e)
    })
}

fn stage_error_reply(e: StageError) -> Response {
    match e {
        StageError::Validation(e) => error_reply(StatusCode::BAD_REQUEST, "validation_error", e),
        StageError::Storage(e) => {
            error!("Log store failure: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e)
        }
        StageError::Upstream { .. } => error_reply(StatusCode::BAD_GATEWAY, "upstream_error", e),
    }
}

pub fn health(service: &'static str) -> Response {
    json_reply(
        StatusCode::OK,
        &HealthResponse {
            status: "healthy",
            service,
        },
    )
}

pub async fn candle(body: Bytes, orchestrator: Arc<Orchestrator>) -> Result<Response, Infallible> {
    let candle: Candle = match parse(&body) {
        Ok(candle) => candle,
        Err(reply) => return Ok(reply),
    };
    // Own task: a caller hanging up must not cancel stage calls already issued.
    let pipeline = tokio::spawn(async move { orchestrator.handle(candle).await });
    Ok(match pipeline.await {
        Ok(Ok(outcome)) => json_reply(StatusCode::OK, &outcome),
        Ok(Err(e)) => {
            warn!("Rejected candle: {}", e);
            error_reply(StatusCode::BAD_REQUEST, "validation_error", e)
        }
        Err(e) => {
            error!("Pipeline task failed: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, "pipeline_error", e)
        }
    })
}

pub async fn detect(body: Bytes, detector: Arc<dyn PatternDetector>) -> Result<Response, Infallible> {
    Ok(match parse_detect(&body) {
        Ok((candle, history)) => {
            let pattern = detector.detect(&candle, &history).await;
            json_reply(StatusCode::OK, &DetectResponse { pattern })
        }
        Err(reply) => reply,
    })
}

pub async fn explain(body: Bytes, detector: Arc<dyn PatternDetector>) -> Result<Response, Infallible> {
    Ok(match parse_detect(&body) {
        Ok((candle, history)) => {
            let pattern = detector.explain(&candle, &history).await;
            json_reply(StatusCode::OK, &DetectResponse { pattern })
        }
        Err(reply) => reply,
    })
}

fn parse_detect(body: &Bytes) -> Result<(Candle, Vec<Candle>), Response> {
    let (candle, history) = parse::<DetectRequest>(body)?.into_parts();
    validate_all(&candle, &history).map_err(|e| error_reply(StatusCode::BAD_REQUEST, "validation_error", e))?;
    Ok((candle, history))
}

pub async fn generate(body: Bytes, generator: Arc<dyn SignalGenerator>) -> Result<Response, Infallible> {
    let GenerateRequest { pattern, candle } = match parse(&body) {
        Ok(request) => request,
        Err(reply) => return Ok(reply),
    };
    if let Err(e) = candle.validate().and_then(|_| pattern.validate()) {
        return Ok(error_reply(StatusCode::BAD_REQUEST, "validation_error", e));
    }
    let signal = generator.generate(&pattern, &candle);
    Ok(json_reply(StatusCode::OK, &GenerateResponse { signal }))
}

pub async fn dispatch(body: Bytes, dispatcher: Arc<SignalDispatcher>) -> Result<Response, Infallible> {
    let signal = match parse::<DispatchRequest>(&body) {
        Ok(request) => request.into_signal(),
        Err(reply) => return Ok(reply),
    };
    Ok(match dispatcher.dispatch(signal).await {
        Ok(receipt) => json_reply(StatusCode::OK, &receipt),
        Err(e) => stage_error_reply(e),
    })
}

pub async fn recent(query: SignalsQuery, dispatcher: Arc<SignalDispatcher>) -> Result<Response, Infallible> {
    let limit = query.limit.unwrap_or(MAX_RECENT);
    Ok(match dispatcher.recent(limit).await {
        Ok(signals) => json_reply(StatusCode::OK, &signals),
        Err(e) => stage_error_reply(e),
    })
}

pub async fn for_date(raw: String, dispatcher: Arc<SignalDispatcher>) -> Result<Response, Infallible> {
    let date = match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => date,
        Err(e) => return Ok(error_reply(StatusCode::BAD_REQUEST, "invalid_date", format!("`{}`: {}", raw, e))),
    };
    Ok(match dispatcher.for_date(date).await {
        Ok(signals) => json_reply(StatusCode::OK, &signals),
        Err(e) => stage_error_reply(e),
    })
}
