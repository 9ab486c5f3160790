pub mod order;
pub mod progress;
pub mod stamp;

pub use order::{OrderStatus, StampOrder};
pub use progress::ProductionProgress;
pub use stamp::{Stamp, StampStatus};
