//! Type definitions

pub mod admission;
pub mod department;
pub mod messages;
pub mod student;

pub use admission::*;
pub use department::*;
pub use messages::*;
pub use student::*;
