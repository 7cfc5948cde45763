pub mod flash;

pub use flash::{FlashAccess, FlashError};
