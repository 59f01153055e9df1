use std::sync::Arc;

use crate::api::views::ImageResolver;
use crate::standings::Standings;

#[derive(Clone)]
pub struct AppState {
    pub standings: Standings,
    pub images: Option<Arc<ImageResolver>>,
    pub cors_origins: Arc<[String]>,
    pub dev_routes: bool,
}

impl AppState {
    pub fn new(
        standings: Standings,
        images: Option<ImageResolver>,
        cors_origins: Vec<String>,
        dev_routes: bool,
    ) -> Self {
        Self {
            standings,
            images: images.map(Arc::new),
            cors_origins: cors_origins.into(),
            dev_routes,
        }
    }
}
