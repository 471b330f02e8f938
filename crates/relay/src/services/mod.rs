pub mod dispatch_service;
pub mod orchestrator;
pub mod webhook_service;
