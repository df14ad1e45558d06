pub mod greeting;
pub mod health;
pub mod player_handlers;
pub mod player_ws;
pub mod system_handlers;
pub mod todo_handlers;
