mod batch;
mod emails;
mod health_check;

pub use batch::*;
pub use emails::*;
pub use health_check::*;
