mod logger;
mod recovery;

pub use logger::Logger;
pub use recovery::Recovery;
pub(crate) use recovery::panic_message;
