pub mod entities;
pub mod ports;
pub mod repositories;
pub mod value_objects;

pub use atelier_errors::{AtelierError, AtelierResult};
pub use entities::*;
pub use repositories::*;
pub use value_objects::*;
