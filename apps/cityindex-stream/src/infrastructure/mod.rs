//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the ambient
//! concerns: configuration, metrics and tracing.

/// Configuration loaded from the environment.
pub mod config;

/// In-process push transport.
pub mod memory;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Leaky-bucket limiter for REST calls.
pub mod rate_limit;

/// Trading API REST client.
pub mod rest;

/// OpenTelemetry tracing integration.
pub mod telemetry;
