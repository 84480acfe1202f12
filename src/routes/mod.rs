// Route definitions

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
};

use crate::AppState;
use crate::advisories::{
    CropAdvisory, DiseaseAdvisory, FertilizerAdvisory, IrrigationAdvisory, RotationAdvisory, YieldAdvisory,
};
use crate::session::SessionFeature;

mod advisory;
mod api;
mod auth;
mod pages;

pub use api::MAX_IMAGE_BYTES;

// Room for the multipart framing around a maximum-size image
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

/// JSON endpoints driving one advisory's form controller.
fn advisory_routes<A: SessionFeature>() -> Router<AppState> {
    let base = format!("/sessions/:sid/{}", A::SLUG);
    Router::new()
        .route(&base, get(advisory::view::<A>))
        .route(&format!("{base}/form"), patch(advisory::update::<A>))
        .route(&format!("{base}/submit"), post(advisory::submit::<A>))
        .route(&format!("{base}/reset"), post(advisory::reset::<A>))
        .route(&format!("{base}/report"), get(advisory::report::<A>))
}

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/sessions", post(api::create_session))
        .route("/sessions/:sid", axum::routing::delete(api::close_session))
        .merge(advisory_routes::<CropAdvisory>())
        .merge(advisory_routes::<FertilizerAdvisory>())
        .merge(advisory_routes::<YieldAdvisory>())
        .merge(advisory_routes::<DiseaseAdvisory>())
        .merge(advisory_routes::<RotationAdvisory>())
        .merge(advisory_routes::<IrrigationAdvisory>())
        .route(
            "/sessions/:sid/disease/image",
            post(api::upload_leaf_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/sessions/:sid/weather", put(api::select_weather_location).get(api::session_weather))
        .route("/sessions/:sid/weather/refresh", post(api::refresh_weather))
        .route("/weather", get(api::current_weather))
        .route("/schemes", get(api::list_schemes))
        .route("/schemes/:id", get(api::get_scheme))
        // Routes requiring authentication
        .route("/profile", get(api::get_profile).patch(api::update_profile))
        .route(
            "/profile/image",
            post(api::upload_profile_image)
                .delete(api::remove_profile_image)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        );

    Router::new()
        .route("/", get(pages::landing_page))
        .route("/splash/complete", post(pages::complete_splash))
        .route("/login", get(pages::login_page).post(auth::handle_login))
        .route("/sessions/:sid/:feature", get(pages::advisory_page))
        .route("/schemes", get(pages::schemes_page))
        .route("/schemes/:id", get(pages::scheme_detail_page))
        .nest("/api", api_router)
        .with_state(app_state)
}
