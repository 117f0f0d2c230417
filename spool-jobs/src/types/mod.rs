pub mod ids;
pub mod messages;
pub mod status;

pub use ids::*;
pub use messages::*;
pub use status::*;
