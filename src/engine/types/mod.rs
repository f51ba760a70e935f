pub mod coercion;
pub mod scalar;
pub mod store_type;
pub mod value;

pub use coercion::{to_engine, to_store, to_store_key};
pub use scalar::ScalarValue;
pub use store_type::StoreType;
pub use value::{Value, compare_key_prefix};
