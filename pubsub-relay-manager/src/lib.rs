pub mod handlers;
pub mod orchestrator;
pub mod page;
pub mod server;
pub mod state;

pub use orchestrator::{Orchestrator, Outcome, Phase};
pub use server::{router, run_server, HttpServer, RequestServer};
pub use state::{AppState, MessagesResponse, PublishForm};
