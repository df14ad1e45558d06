pub mod luci;

pub use luci::{Endpoint, LuciClient, LuciError};
