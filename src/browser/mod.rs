pub mod actions;
pub mod playwright;

pub use actions::{BrowserCookie, ConsoleEntry, ElementInfo, FoundElements, PageSnapshot, SelectorKind};
pub use playwright::BrowserSession;
