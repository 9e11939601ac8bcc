use actix_web::web::ServiceConfig;

mod health;
mod ondemand;

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.service(health::health_route).service(ondemand::exec_route);
}
