pub mod fixture;
pub mod flaky;

pub use fixture::{TestNotebook, stepping_clock};
pub use flaky::{FaultSwitch, FlakyStore, StoreOp};
