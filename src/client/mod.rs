//! Client side of the app: the authenticated session and typed calls to the API.

pub mod api;
pub mod notifications;
pub mod session;
pub mod storage;

pub use api::{ApiClient, ApiClientError};
pub use notifications::NotificationsClient;
pub use session::{AuthResponse, Session, SessionManager};
pub use storage::{FileStore, MemoryStore, SessionStore};
