/// HTTP handlers for strand endpoints
///
/// Every mutation takes an optional path hint naming the rendered page that
/// went stale; it is forwarded to the revalidator untouched.
pub mod strands;

use actix_web::web;

pub use strands::{
    add_reply, create_strand, delete_strand, get_community_strands, get_feed, get_strand,
    get_user_strands,
};

/// Register the `/api/v1` routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/strands")
                    .service(
                        web::resource("")
                            .route(web::get().to(get_feed))
                            .route(web::post().to(create_strand)),
                    )
                    .service(
                        web::resource("/{strand_id}")
                            .route(web::get().to(get_strand))
                            .route(web::delete().to(delete_strand)),
                    )
                    .service(
                        web::resource("/{strand_id}/replies").route(web::post().to(add_reply)),
                    ),
            )
            .route("/users/{user_id}/strands", web::get().to(get_user_strands))
            .route(
                "/communities/{community_id}/strands",
                web::get().to(get_community_strands),
            ),
    );
}
