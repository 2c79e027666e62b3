/// Admin operations: settings, phase transitions, score reset.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Registration, player lookup and contributions.
pub mod player_service;
/// Public service for read-only game information.
pub mod public_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Keeps the storage backend attached and toggles degraded mode.
pub mod storage_supervisor;
/// Player WebSocket connection and message handling.
pub mod websocket_service;
