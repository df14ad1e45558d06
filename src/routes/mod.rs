use actix_web::web;

use crate::handlers::{greeting, player_handlers, player_ws, system_handlers, todo_handlers};

// Configure the dashboard API routes (/api/*)
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/greeting", web::get().to(greeting::greeting));

    // Router routes (/api/system/*)
    cfg.service(
        web::scope("/system")
            .route("/status", web::get().to(system_handlers::get_system_status))
            .route("/reboot", web::post().to(system_handlers::reboot_router))
            .route(
                "/process/manage",
                web::post().to(system_handlers::manage_initd_process),
            )
            .route(
                "/process/{name}/running",
                web::get().to(system_handlers::is_process_running),
            ),
    );

    // Todo routes (/api/todos/*). Fixed segments precede the {id} matcher.
    cfg.service(
        web::scope("/todos")
            .route("/completed", web::get().to(todo_handlers::get_completed_todos))
            .route("/pending", web::get().to(todo_handlers::get_pending_todos))
            .route("", web::get().to(todo_handlers::get_all_todos))
            .route("", web::post().to(todo_handlers::create_todo))
            .route("", web::delete().to(todo_handlers::clear_all_todos))
            .route("/{id}", web::get().to(todo_handlers::get_todo_by_id))
            .route("/{id}", web::put().to(todo_handlers::update_todo))
            .route("/{id}", web::delete().to(todo_handlers::delete_todo))
            .route(
                "/{id}/complete",
                web::post().to(todo_handlers::mark_todo_completed),
            )
            .route(
                "/{id}/incomplete",
                web::post().to(todo_handlers::mark_todo_incomplete),
            ),
    );

    // Player routes (/api/player/*)
    cfg.service(
        web::scope("/player")
            .route("/load", web::post().to(player_handlers::load))
            .route("/play", web::post().to(player_handlers::play))
            .route("/pause", web::post().to(player_handlers::pause))
            .route("/toggle", web::post().to(player_handlers::toggle_pause))
            .route("/stop", web::post().to(player_handlers::stop))
            .route("/next", web::post().to(player_handlers::next))
            .route("/seek", web::post().to(player_handlers::seek))
            .route("/prev", web::post().to(player_handlers::prev))
            .route("/volume", web::post().to(player_handlers::volume))
            .route("/mute", web::post().to(player_handlers::mute))
            .route("/duration", web::get().to(player_handlers::get_duration))
            .route("/properties", web::post().to(player_handlers::get_all_properties))
            .route("/property/{name}", web::get().to(player_handlers::get_property))
            .route("/running", web::get().to(player_handlers::is_running)),
    );
}

// Configure subscription routes (/ws/*)
pub fn configure_ws_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/player", web::get().to(player_ws::player_events_ws));
}
