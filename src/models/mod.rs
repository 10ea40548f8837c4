pub mod assignment;
pub mod availability;
pub mod backlog;
pub mod category;
pub mod prediction;
pub mod week;

pub use assignment::*;
pub use availability::*;
pub use backlog::*;
pub use category::*;
pub use prediction::*;
pub use week::*;
