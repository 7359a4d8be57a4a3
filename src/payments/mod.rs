pub mod aggregator;
pub mod error;
pub mod provider;
pub mod types;
pub mod utils;

pub use aggregator::AggregatorClient;
pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentGateway;
pub use types::{CollectRequest, CollectRequestResponse, PaymentStatus, StudentInfo};
