// web-server/src/api/mod.rs
pub mod auth;

pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(auth::sign_in_start)
        .service(auth::events)
        .service(auth::finalize)
        .service(auth::fallback_finalize)
        .service(auth::logout)
        .service(actix_web::web::scope("/api").service(auth::me));
}
