use actix_web::web;

pub mod admin;
pub mod backend_health;
pub mod leaderboard;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(backend_health::backend_health)
        .service(leaderboard::get_leaderboard);

    admin::init_admin_routes(cfg);
}
