//! API endpoints for the DDoS guard.
//!
//! This module exposes the operator entry points over HTTP: reading the
//! alert store, block list and action journal, and triggering block or
//! unblock actions.

use actix_web::{web, HttpResponse, Responder};
use log::warn;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{AlertStore, ResponseEngine, ResponseMode};
use crate::models::Config;

pub struct ApiState {
    /// Single writer for the block list and action journal
    pub engine: Arc<Mutex<ResponseEngine>>,
    pub alerts: AlertStore,
    pub config: Arc<Config>,
}

/// API configuration function for Actix-web
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/health").route(web::get().to(health_check)))
            .service(web::resource("/alerts").route(web::get().to(list_alerts)))
            .service(web::resource("/blocked").route(web::get().to(list_blocked)))
            .service(web::resource("/actions").route(web::get().to(list_actions)))
            .service(web::resource("/block").route(web::post().to(block_ip)))
            .service(web::resource("/unblock").route(web::post().to(unblock_ip))),
    );
}

/// Health check endpoint response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Block/unblock request
#[derive(Debug, Serialize, Deserialize)]
pub struct IpActionRequest {
    pub ip: String,
    /// Overrides the process default mode when present
    pub simulate: Option<bool>,
}

/// Block/unblock response
#[derive(Serialize)]
struct IpActionResponse {
    ok: bool,
    ip: String,
    action: String,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(mut builder: actix_web::HttpResponseBuilder, message: impl Into<String>) -> HttpResponse {
    builder.json(ErrorResponse { error: message.into() })
}

fn lock_engine(state: &ApiState) -> Result<MutexGuard<'_, ResponseEngine>, HttpResponse> {
    state
        .engine
        .lock()
        .map_err(|_| error_response(HttpResponse::InternalServerError(), "response engine unavailable"))
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_alerts(state: web::Data<ApiState>) -> HttpResponse {
    match state.alerts.load() {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e) => error_response(HttpResponse::InternalServerError(), e.to_string()),
    }
}

async fn list_blocked(state: web::Data<ApiState>) -> HttpResponse {
    let engine = match lock_engine(&state) {
        Ok(engine) => engine,
        Err(response) => return response,
    };
    match engine.block_list().entries() {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => error_response(HttpResponse::InternalServerError(), e.to_string()),
    }
}

async fn list_actions(state: web::Data<ApiState>) -> HttpResponse {
    let engine = match lock_engine(&state) {
        Ok(engine) => engine,
        Err(response) => return response,
    };
    match engine.journal().entries() {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => error_response(HttpResponse::InternalServerError(), e.to_string()),
    }
}

#[derive(Clone, Copy)]
enum Operation {
    Block,
    Unblock,
}

async fn perform(state: &ApiState, req: IpActionRequest, operation: Operation) -> HttpResponse {
    let address: IpAddr = match req.ip.trim().parse() {
        Ok(address) => address,
        Err(_) => {
            warn!("Rejected operator request for invalid address {:?}", req.ip);
            return error_response(HttpResponse::BadRequest(), format!("invalid IP address: {}", req.ip));
        }
    };

    let engine = state.engine.clone();
    let actor = state.config.response.operator.clone();
    let simulate = req.simulate;

    // Firewall commands block, so the engine is driven from the blocking pool
    let outcome = web::block(move || {
        let mut engine = engine.lock().map_err(|_| "response engine unavailable".to_string())?;
        let mode = simulate
            .map(ResponseMode::from_simulate)
            .unwrap_or_else(|| engine.default_mode());
        let outcome = match operation {
            Operation::Block => engine.block(address, mode, &actor),
            Operation::Unblock => engine.unblock(address, mode, &actor),
        };
        outcome.map_err(|e| e.to_string())
    })
    .await;

    match outcome {
        Ok(Ok(outcome)) => HttpResponse::Ok().json(IpActionResponse {
            ok: outcome.ok(),
            ip: address.to_string(),
            action: outcome.action.to_string(),
            message: outcome.message,
        }),
        Ok(Err(message)) => error_response(HttpResponse::InternalServerError(), message),
        Err(e) => error_response(HttpResponse::InternalServerError(), e.to_string()),
    }
}

/// Block endpoint
pub async fn block_ip(state: web::Data<ApiState>, req: web::Json<IpActionRequest>) -> HttpResponse {
    perform(&state, req.into_inner(), Operation::Block).await
}

/// Unblock endpoint
pub async fn unblock_ip(state: web::Data<ApiState>, req: web::Json<IpActionRequest>) -> HttpResponse {
    perform(&state, req.into_inner(), Operation::Unblock).await
}
