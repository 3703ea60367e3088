pub mod intake;
pub mod numbering;
pub mod queries;

pub use intake::{CreateOrderRequest, IntakeRules, OrderIntakeService};
pub use numbering::{OrderNumberGenerator, SequenceStrategy};
pub use queries::{ListOrdersParams, OrderQueryService, OrderStats, UpdateStatusRequest};
