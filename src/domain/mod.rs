// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Domain rules live here, separate from transport (http) and persistence
// (store). The order aggregate is the only one this service owns.
//
// ============================================================================

pub mod order;
