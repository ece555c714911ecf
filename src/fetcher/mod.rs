pub mod fetch_policy;
pub mod orchestrator;
pub mod synthetic;
pub mod transport;

pub use fetch_policy::{FetchPolicy, FetchPolicyConfig};
pub use orchestrator::{
    OrchestratorConfig, ProgressHandle, ScrapeOrchestrator, ScrapeOutput, ScrapeRequest,
};
pub use synthetic::{SampleGenerator, TemplateSampleGenerator};
pub use transport::{FetchRequest, FetchResponse, HttpTransport, Transport};
