pub mod engine_agent;
pub mod warmup_service;
