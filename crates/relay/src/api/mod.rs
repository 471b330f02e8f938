use std::convert::Infallible;
use std::sync::Arc;

use strategy::{PatternDetector, SignalGenerator};
use warp::filters::BoxedFilter;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection};

use crate::services::dispatch_service::SignalDispatcher;
use crate::services::orchestrator::Orchestrator;

pub mod handlers;
pub mod payloads;

const MAX_BODY_BYTES: u64 = 256 * 1024;

type Route = BoxedFilter<(Response,)>;

/// Stages served by this process; a missing one means its routes are absent.
#[derive(Clone)]
pub struct AppState {
    pub service: &'static str,
    pub orchestrator: Option<Arc<Orchestrator>>,
    pub detector: Option<Arc<dyn PatternDetector>>,
    pub generator: Option<Arc<dyn SignalGenerator>>,
    pub dispatcher: Option<Arc<SignalDispatcher>>,
}

pub fn routes(state: &AppState) -> Route {
    let mut routes = health(state.service);

    if let Some(orchestrator) = &state.orchestrator {
        routes = join(routes, candle(orchestrator.clone()));
    }
    if let Some(detector) = &state.detector {
        routes = join(routes, detect(detector.clone()));
    }
    if let Some(generator) = &state.generator {
        routes = join(routes, generate(generator.clone()));
    }
    if let Some(dispatcher) = &state.dispatcher {
        routes = join(routes, dispatch(dispatcher.clone()));
    }
    routes
}

fn join(a: Route, b: Route) -> Route {
    a.or(b).unify().boxed()
}

fn with<T: Clone + Send + Sync>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

fn body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::bytes())
}

fn health(service: &'static str) -> Route {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(move || handlers::health(service))
        .boxed()
}

fn candle(orchestrator: Arc<Orchestrator>) -> Route {
    warp::path!("mcp" / "candle")
        .and(warp::post())
        .and(body())
        .and(with(orchestrator))
        .and_then(handlers::candle)
        .boxed()
}

fn detect(detector: Arc<dyn PatternDetector>) -> Route {
    let detect = warp::path!("detect")
        .and(warp::post())
        .and(body())
        .and(with(detector.clone()))
        .and_then(handlers::detect);
    let explain = warp::path!("explain")
        .and(warp::post())
        .and(body())
        .and(with(detector))
        .and_then(handlers::explain);
    detect.or(explain).unify().boxed()
}

fn generate(generator: Arc<dyn SignalGenerator>) -> Route {
    warp::path!("generate")
        .and(warp::post())
        .and(body())
        .and(with(generator))
        .and_then(handlers::generate)
        .boxed()
}

fn dispatch(dispatcher: Arc<SignalDispatcher>) -> Route {
    let dispatch = warp::path!("dispatch")
        .and(warp::post())
        .and(body())
        .and(with(dispatcher.clone()))
        .and_then(handlers::dispatch);
    let recent = warp::path!("signals")
        .and(warp::get())
        .and(warp::query::<payloads::SignalsQuery>())
        .and(with(dispatcher.clone()))
        .and_then(handlers::recent);
    let for_date = warp::path!("signals" / String)
        .and(warp::get())
        .and(with(dispatcher))
        .and_then(handlers::for_date);
    dispatch.or(recent).unify().or(for_date).unify().boxed()
}
