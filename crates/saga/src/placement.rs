//! Order placement saga constants.

/// Saga type identifier stored in every `SagaStarted` event.
pub const SAGA_TYPE: &str = "OrderPlacement";

/// Step name: reserve stock for every cart line.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";

/// Step name: persist the order record.
pub const STEP_CREATE_ORDER: &str = "create_order";

/// Step name: clear the user's cart.
pub const STEP_CLEAR_CART: &str = "clear_cart";

/// `cancelled_by` written on orders voided by compensation.
pub const COMPENSATION_ACTOR: &str = "placement_saga";
