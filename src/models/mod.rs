pub mod player;
pub mod system;
pub mod todo;

pub use player::PlayerEvent;
pub use system::{LoadAverage, SystemStatus};
pub use todo::Todo;
