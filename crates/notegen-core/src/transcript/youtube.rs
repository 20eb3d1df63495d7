//! YouTube caption retrieval.
//!
//! Flow:
//! 1. Parse the video id out of whatever URL form the user gave.
//! 2. Load the watch page to obtain the innertube API key.
//! 3. Ask the innertube player endpoint for the caption track list.
//! 4. Pick a track (English preferred) and download its timed-text XML.
//! 5. Decode the caption segments and join them with spaces.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, COOKIE};
use serde::Deserialize;
use url::Url;

use super::TranscriptSource;
use crate::error::{Error, Result};

const WATCH_URL: &str = "https://www.youtube.com/watch";
const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

/// Language preferred when choosing a caption track
const PREFERRED_LANGUAGE: &str = "en";

/// Fetches transcripts from YouTube captions
#[derive(Debug, Clone)]
pub struct YouTubeSource {
    client: reqwest::Client,
}

impl YouTubeSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));
        // Skips the EU consent interstitial
        headers.insert(COOKIE, HeaderValue::from_static("CONSENT=YES+cb; SOCS=CAI"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::source_failed(format!("request to YouTube failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::source_failed(
                "YouTube is rate limiting requests from this IP",
            ));
        }
        if !status.is_success() {
            return Err(Error::source_failed(format!("YouTube returned {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| Error::source_failed(format!("failed to read YouTube response: {}", e)))
    }

    async fn fetch_innertube_key(&self, video_id: &str) -> Result<String> {
        let html = self
            .get_text(&format!("{}?v={}", WATCH_URL, video_id))
            .await?;

        extract_innertube_key(&html).ok_or_else(|| {
            if html.contains("class=\"g-recaptcha\"") {
                Error::source_failed("YouTube is asking for a captcha; requests from this IP are blocked")
            } else {
                Error::source_failed("could not find the innertube API key on the watch page")
            }
        })
    }

    async fn fetch_player(&self, video_id: &str, api_key: &str) -> Result<PlayerResponse> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": video_id,
        });

        let response = self
            .client
            .post(format!("{}?key={}", PLAYER_URL, api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::source_failed(format!("player request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::source_failed(format!(
                "player endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::source_failed(format!("malformed player response: {}", e)))
    }
}

#[async_trait]
impl TranscriptSource for YouTubeSource {
    async fn fetch(&self, source_id: &str) -> Result<String> {
        let video_id = parse_video_id(source_id).ok_or_else(|| {
            Error::NotFound(format!("'{}' is not a recognisable YouTube video", source_id))
        })?;

        let api_key = self.fetch_innertube_key(&video_id).await?;
        let player = self.fetch_player(&video_id, &api_key).await?;
        let tracks = caption_tracks(&video_id, player)?;

        let track = select_track(&tracks)
            .ok_or_else(|| Error::NotFound(format!("no transcripts available for {}", video_id)))?;
        tracing::info!(
            video_id = %video_id,
            language = %track.language_code,
            generated = track.is_generated(),
            "Selected caption track"
        );

        let xml = self.get_text(&track.base_url.replace("&fmt=srv3", "")).await?;
        let text = parse_timed_text(&xml);
        if text.trim().is_empty() {
            return Err(Error::NotFound(format!("transcript for {} is empty", video_id)));
        }

        Ok(text)
    }

    fn canonicalize(&self, source_id: &str) -> String {
        match parse_video_id(source_id) {
            Some(id) => format!("{}?v={}", WATCH_URL, id),
            None => source_id.trim().to_string(),
        }
    }

    fn name(&self) -> &'static str {
        "youtube"
    }
}

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id regex"))
}

fn is_video_id(candidate: &str) -> bool {
    video_id_regex().is_match(candidate)
}

/// Extract the 11-character video id from a URL or bare id.
///
/// Accepts `watch?v=`, `youtu.be/<id>`, `/shorts/<id>`, `/embed/<id>`,
/// `/live/<id>` and `/v/<id>` forms, with or without a scheme.
pub fn parse_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }

    let url = Url::parse(input)
        .or_else(|_| Url::parse(&format!("https://{}", input)))
        .ok()?;
    let host = url.host_str()?.trim_start_matches("www.");
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

fn innertube_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid innertube regex")
    })
}

fn extract_innertube_key(html: &str) -> Option<String> {
    innertube_key_regex()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Turn a player response into its caption track list, mapping playability
/// failures onto the error taxonomy.
fn caption_tracks(video_id: &str, player: PlayerResponse) -> Result<Vec<CaptionTrack>> {
    if let Some(status) = player.playability_status {
        match status.status.as_str() {
            "OK" => {}
            "ERROR" => {
                return Err(Error::NotFound(format!(
                    "video {} is unavailable: {}",
                    video_id,
                    status.reason.unwrap_or_default()
                )))
            }
            other => {
                return Err(Error::source_failed(format!(
                    "video {} is not playable ({}): {}",
                    video_id,
                    other,
                    status.reason.unwrap_or_default()
                )))
            }
        }
    }

    let tracks = player
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .map(|r| r.caption_tracks)
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(Error::NotFound(format!(
            "transcripts are disabled for video {}",
            video_id
        )));
    }

    Ok(tracks)
}

/// Pick the caption track to use.
///
/// Order: first manually created English track, then first auto-generated
/// English track, then the first track listed.
pub fn select_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    let english = |t: &&CaptionTrack| t.is_language(PREFERRED_LANGUAGE);

    tracks
        .iter()
        .filter(english)
        .find(|t| !t.is_generated())
        .or_else(|| tracks.iter().find(english))
        .or_else(|| tracks.first())
}

fn text_segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").expect("valid segment regex"))
}

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup regex"))
}

/// Decode timed-text XML into plain text, one space between segments.
pub fn parse_timed_text(xml: &str) -> String {
    text_segment_regex()
        .captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| {
            // Segment text is entity-escaped twice (`&amp;#39;`)
            let once = html_escape::decode_html_entities(m.as_str());
            let twice = html_escape::decode_html_entities(&once);
            let stripped = markup_regex().replace_all(&twice, "");
            stripped.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Innertube Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<CaptionTrack>,
}

/// One caption track offered for a video
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    /// `"asr"` for auto-generated tracks
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    /// Matches `lang` exactly or as the primary subtag (`en` matches `en-GB`).
    pub fn is_language(&self, lang: &str) -> bool {
        self.language_code == lang
            || self
                .language_code
                .strip_prefix(lang)
                .is_some_and(|rest| rest.starts_with('-'))
    }
}
