pub mod attachment;
pub mod document;
pub mod error;
pub mod message;
pub mod model_type;
pub mod project;
pub mod projects_store;
pub mod request_coordinator;
pub mod schema_extractor;

pub use attachment::{Attachment, AttachmentError, encode_file, encode_files};
pub use document::ProjectDocument;
pub use error::{StoreError, StoreResult};
pub use message::{Message, MessageKind, Sender};
pub use model_type::ModelType;
pub use project::Project;
pub use projects_store::{ProjectsStore, WorkspaceSnapshot};
pub use request_coordinator::{RequestCoordinator, RequestState, RequestTicket};
pub use schema_extractor::extract_schema;
