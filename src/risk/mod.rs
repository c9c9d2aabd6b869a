// Pre-trade risk: limits, throttles and the admission gate
pub mod limits;
pub mod manager;
pub mod throttle;
pub mod types;

pub use limits::Limits;
pub use manager::{last_rejection, take_rejection, Exposure, RiskManager};
pub use throttle::Throttle;
pub use types::{Order, Side};
