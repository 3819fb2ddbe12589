#[cfg(feature = "dialogflow")]
pub mod dialogflow_service;
#[cfg(feature = "dialogflow")]
pub mod endpointer;
pub mod mailbox;
pub mod null_service;
pub mod registry;
pub mod scripted_service;
pub mod service_trait;
pub mod session;
pub mod status;
pub mod worker;

#[cfg(feature = "dialogflow")]
pub use dialogflow_service::DialogflowService;
#[cfg(feature = "dialogflow")]
pub use endpointer::{EndpointConfig, Endpointer};
pub use mailbox::{Mailbox, MailboxClosed};
pub use null_service::NullService;
pub use registry::ServiceRegistry;
pub use scripted_service::{utterance_script, ScriptedEvent, ScriptedService, ScriptedUtterance};
pub use service_trait::{IntentService, RequestStream, ResponseStream};
pub use session::{RecognitionSession, UtteranceTracker};
pub use status::WorkerStatus;
pub use worker::{IntentWorker, WorkerOptions};
