// ============================================================================
// Order Domain - Business Logic for the Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderItem, OrderStatus, policies)
// - Commands (CreateOrder, ChangeStatus)
// - Errors (OrderError enum)
// - Aggregate (NewOrder / Order with creation and transition rules)
// - Command Handler (OrderCommandHandler, the lifecycle engine)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
