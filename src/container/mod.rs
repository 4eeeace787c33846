pub mod exec;
pub mod manager;
pub mod testing;

pub use exec::CommandRunner;
pub use manager::{ContainerManager, ContainerStatus};
