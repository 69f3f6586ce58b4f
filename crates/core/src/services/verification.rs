//! Verification score heuristic for crop posts.
//!
//! The score is a presence check: each signal adds a fixed number of points
//! when the corresponding field is filled in. Blank strings count as absent.

use agrex_db::entities::crop_post;
use serde::Serialize;

/// Points for a primary image.
pub const PRIMARY_IMAGE_POINTS: i32 = 20;
/// Points for more than one image.
pub const MULTIPLE_IMAGES_POINTS: i32 = 10;
/// Points for latitude and longitude.
pub const GEOLOCATION_POINTS: i32 = 25;
/// Points for village, district and state.
pub const DETAILED_ADDRESS_POINTS: i32 = 15;
/// Points for a contact phone on the post.
pub const CONTACT_PHONE_POINTS: i32 = 15;
/// Points for a phone number on the farmer's profile.
pub const FARMER_PHONE_POINTS: i32 = 10;
/// Points for a description longer than [`DESCRIPTION_MIN_CHARS`].
pub const DESCRIPTION_POINTS: i32 = 5;
/// A description must be strictly longer than this many characters to score.
pub const DESCRIPTION_MIN_CHARS: usize = 50;

/// The fields the score looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostSignals<'a> {
    pub image_urls: &'a [String],
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub village: Option<&'a str>,
    pub district: Option<&'a str>,
    pub state: Option<&'a str>,
    pub contact_phone: Option<&'a str>,
    pub farmer_phone: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Points awarded per signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub primary_image: i32,
    pub multiple_images: i32,
    pub geolocation: i32,
    pub detailed_address: i32,
    pub contact_phone: i32,
    pub farmer_phone: i32,
    pub description: i32,
}

impl ScoreBreakdown {
    /// Sum of all signals.
    #[must_use]
    pub const fn total(&self) -> i32 {
        self.primary_image
            + self.multiple_images
            + self.geolocation
            + self.detailed_address
            + self.contact_phone
            + self.farmer_phone
            + self.description
    }
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

const fn points(hit: bool, weight: i32) -> i32 {
    if hit { weight } else { 0 }
}

/// Score a set of post signals.
#[must_use]
pub fn compute(signals: &PostSignals<'_>) -> ScoreBreakdown {
    let images = signals
        .image_urls
        .iter()
        .filter(|url| !url.trim().is_empty())
        .count();

    let has_address =
        present(signals.village) && present(signals.district) && present(signals.state);

    let long_description = signals
        .description
        .is_some_and(|d| present(Some(d)) && d.chars().count() > DESCRIPTION_MIN_CHARS);

    ScoreBreakdown {
        primary_image: points(images >= 1, PRIMARY_IMAGE_POINTS),
        multiple_images: points(images > 1, MULTIPLE_IMAGES_POINTS),
        geolocation: points(
            signals.latitude.is_some() && signals.longitude.is_some(),
            GEOLOCATION_POINTS,
        ),
        detailed_address: points(has_address, DETAILED_ADDRESS_POINTS),
        contact_phone: points(present(signals.contact_phone), CONTACT_PHONE_POINTS),
        farmer_phone: points(present(signals.farmer_phone), FARMER_PHONE_POINTS),
        description: points(long_description, DESCRIPTION_POINTS),
    }
}

/// Score a stored post.
#[must_use]
pub fn score_post(post: &crop_post::Model, farmer_phone: Option<&str>) -> ScoreBreakdown {
    let images = post.images();
    compute(&PostSignals {
        image_urls: &images,
        latitude: post.latitude,
        longitude: post.longitude,
        village: post.village.as_deref(),
        district: post.district.as_deref(),
        state: post.state.as_deref(),
        contact_phone: post.contact_phone.as_deref(),
        farmer_phone,
        description: post.description.as_deref(),
    })
}
