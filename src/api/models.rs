use serde::{Deserialize, Serialize};

use crate::store::SavedLink;

#[derive(Deserialize)]
pub struct AddLinkRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Serialize)]
pub struct LinkResponse {
    pub link: SavedLink,
}

#[derive(Serialize)]
pub struct LinksResponse {
    pub links: Vec<SavedLink>,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub id: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
