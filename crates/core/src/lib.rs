pub mod catalog;
pub mod clock;
pub mod error;
pub mod export;
pub mod ids;
pub mod legacy;
pub mod record;

pub use clock::{Clock, SteppingClock, SystemClock};
pub use error::CoreError;
pub use export::ExportDocument;
pub use ids::*;
pub use record::*;
