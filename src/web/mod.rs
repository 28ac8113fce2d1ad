pub mod schema;
pub mod server;

pub use schema::{ErrorResponse, HealthResponse, PredictRequest, PredictResponse, RoutesResponse};
pub use server::{PredictorServer, ROUTES};
