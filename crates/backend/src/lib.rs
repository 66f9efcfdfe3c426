pub mod manager;
pub mod session;
pub mod types;

pub use manager::{DEFAULT_TOP_K, SessionManager, generate_session_id};
pub use session::{Session, SessionError};
