//! Page metadata and ayah lookup.
//!
//! Lookups are best-effort: every caller substitutes [`PageInfo::placeholder`]
//! or [`fallback_ayah`] on failure instead of aborting a delivery.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ContentConfig;
use crate::error::{Result, WirdError};

/// Total ayah count used for random lookups.
const AYAH_COUNT: u32 = 6236;

/// Fallback verses used when the content API is unavailable.
const FALLBACK_AYAHS: &[&str] = &[
    "إِنَّ مَعَ الْعُسْرِ يُسْرًا",
    "أَلَا بِذِكْرِ اللَّهِ تَطْمَئِنُّ الْقُلُوبُ",
    "وَقُل رَّبِّ زِدْنِي عِلْمًا",
    "فَاذْكُرُونِي أَذْكُرْكُمْ وَاشْكُرُوا لِي وَلَا تَكْفُرُونِ",
];

/// Metadata for one mushaf page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// Name of the surah the page opens with.
    pub surah_name: String,
    /// Juz number the page belongs to, when known.
    pub juz: Option<u8>,
}

impl PageInfo {
    /// Fixed placeholder used when the provider fails.
    pub fn placeholder() -> Self {
        Self {
            surah_name: "غير معروف".to_owned(),
            juz: None,
        }
    }
}

/// Read-side content capability.
#[async_trait]
pub trait ContentInfoProvider: Send + Sync {
    /// Metadata for a mushaf page.
    async fn page_info(&self, page: u16) -> Result<PageInfo>;

    /// One ayah chosen at random.
    async fn random_ayah(&self) -> Result<String>;
}

/// Mushaf page image URL (Madani layout scans).
pub fn page_image_url(page: u16) -> String {
    format!(
        "https://raw.githubusercontent.com/Mohamed-Nagdy/Quran-App-Data/main/quran_images/{page}.png"
    )
}

/// A verse from the built-in fallback list.
pub fn fallback_ayah() -> String {
    let mut rng = rand::thread_rng();
    FALLBACK_AYAHS
        .choose(&mut rng)
        .copied()
        .unwrap_or(FALLBACK_AYAHS[0])
        .to_owned()
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    data: PageData,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(default)]
    ayahs: Vec<Ayah>,
}

#[derive(Debug, Deserialize)]
struct Ayah {
    #[serde(default)]
    text: String,
    #[serde(default)]
    juz: Option<u8>,
    #[serde(default)]
    surah: Option<Surah>,
}

#[derive(Debug, Deserialize)]
struct Surah {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AyahResponse {
    data: Ayah,
}

/// Client for the alquran.cloud REST API.
pub struct AlQuranCloud {
    client: reqwest::Client,
    api_base: String,
}

impl AlQuranCloud {
    pub fn new(config: &ContentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| WirdError::Config(format!("cannot build http client: {e}")))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{path}", self.api_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WirdError::Content(format!("{path}: {e}")))?;
        if !response.status().is_success() {
            return Err(WirdError::Content(format!(
                "{path}: http {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| WirdError::Content(format!("{path}: invalid response: {e}")))
    }
}

#[async_trait]
impl ContentInfoProvider for AlQuranCloud {
    async fn page_info(&self, page: u16) -> Result<PageInfo> {
        let response: PageResponse = self
            .get_json(&format!("page/{page}/quran-uthmani"))
            .await?;
        let first = response
            .data
            .ayahs
            .first()
            .ok_or_else(|| WirdError::Content(format!("page {page}: no ayahs in response")))?;
        Ok(PageInfo {
            surah_name: first
                .surah
                .as_ref()
                .map(|s| s.name.clone())
                .unwrap_or_else(|| PageInfo::placeholder().surah_name),
            juz: first.juz,
        })
    }

    async fn random_ayah(&self) -> Result<String> {
        let number = rand::thread_rng().gen_range(1..=AYAH_COUNT);
        let response: AyahResponse = self.get_json(&format!("ayah/{number}")).await?;
        if response.data.text.trim().is_empty() {
            return Err(WirdError::Content(format!("ayah {number}: empty text")));
        }
        Ok(response.data.text)
    }
}
