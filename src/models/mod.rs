pub mod challenge;
pub mod page;
pub mod vulnerability;
pub mod task;

pub use challenge::*;
pub use page::*;
pub use vulnerability::*;
pub use task::*;
