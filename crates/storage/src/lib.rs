pub mod error;
pub mod local;
pub mod notify;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use local::LocalStore;
pub use notify::{ChangeListener, ChangeNotifier, Subscription};
pub use sqlite::SqliteStore;
pub use traits::*;
