pub mod constants;
pub mod machine;

pub use self::machine::{Machine, Step};
