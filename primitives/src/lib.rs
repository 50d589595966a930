pub mod assets;
pub mod ecosystem;
pub mod services;


pub use assets::*;
pub use ecosystem::{Balance, Timestamp};
pub use services::*;
