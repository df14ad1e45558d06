pub mod mpv;
pub mod openwrt;
pub mod player_events;
pub mod todo;

pub use mpv::MpvService;
pub use openwrt::OpenWrtService;
pub use player_events::PlayerEvents;
pub use todo::TodoService;
