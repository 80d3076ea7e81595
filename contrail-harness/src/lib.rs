pub mod driver;
pub mod report;
pub mod scenario;
pub mod session;
pub mod workflows;

pub use driver::{Driver, DriverConfig, RunSummary};
pub use session::Session;
pub use workflows::ScenarioCtx;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("no flights provisioned in the store")]
    NoFlights,

    #[error(transparent)]
    Store(#[from] contrail_core::StoreError),
}
