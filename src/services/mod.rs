//! Business logic behind the HTTP handlers

pub mod auth_service;
pub mod payment_orchestrator;
pub mod session;
pub mod transaction_query;
pub mod validation;
pub mod webhook_processor;

pub use auth_service::AuthService;
pub use payment_orchestrator::{OrchestratorError, PaymentOrchestrator};
pub use session::{SessionClaims, SessionIssuer};
pub use transaction_query::TransactionQueryService;
pub use webhook_processor::{WebhookProcessor, WebhookProcessorError};
