use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Normalized post handed to the poll loop (provider-agnostic).
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub media: Vec<Media>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub kind: MediaKind,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedGif,
}

impl MediaKind {
    pub fn from_api(kind: &str) -> Option<Self> {
        match kind {
            "photo" => Some(Self::Photo),
            "video" => Some(Self::Video),
            "animated_gif" => Some(Self::AnimatedGif),
            _ => None,
        }
    }
}

// ── X API v2 Deserialization ─────────────────────────────────────────

/// `GET /2/users/by/username/:handle`. Unknown users come back as 200 with
/// only `errors` populated.
#[derive(Debug, Deserialize)]
pub struct UserLookupResponse {
    pub data: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
    pub id: String,
    pub name: String,
    pub username: String,
    pub profile_image_url: Option<String>,
}

/// `GET /2/users/:id/tweets`
#[derive(Debug, Deserialize)]
pub struct TimelineResponse {
    #[serde(default)]
    pub data: Vec<ApiTweet>,
    pub includes: Option<TimelineIncludes>,
}

#[derive(Debug, Deserialize)]
pub struct ApiTweet {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub attachments: Option<ApiAttachments>,
}

#[derive(Debug, Deserialize)]
pub struct ApiAttachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineIncludes {
    #[serde(default)]
    pub media: Vec<ApiMedia>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMedia {
    pub media_key: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: Option<String>,
    #[serde(default)]
    pub variants: Vec<ApiMediaVariant>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMediaVariant {
    pub url: String,
    pub content_type: Option<String>,
}

impl ApiMedia {
    /// Photos link the image itself; videos and GIFs link their first variant.
    pub fn to_media(&self) -> Option<Media> {
        let kind = MediaKind::from_api(&self.media_type)?;
        let url = match kind {
            MediaKind::Photo => self.url.clone()?,
            MediaKind::Video | MediaKind::AnimatedGif => self.variants.first()?.url.clone(),
        };
        Some(Media { kind, url })
    }
}

impl TimelineResponse {
    /// Build a `Post` from the newest tweet, resolving its media keys against
    /// the `includes` block.
    pub fn into_latest_post(self, user: &ApiUser) -> Option<Post> {
        let includes = self.includes;
        let tweet = self.data.into_iter().next()?;

        let media = tweet
            .attachments
            .map(|a| a.media_keys)
            .unwrap_or_default()
            .iter()
            .filter_map(|key| {
                includes
                    .as_ref()?
                    .media
                    .iter()
                    .find(|m| &m.media_key == key)
            })
            .filter_map(ApiMedia::to_media)
            .collect();

        Some(Post {
            id: tweet.id,
            author: user.username.clone(),
            author_name: Some(user.name.clone()),
            author_avatar: user.profile_image_url.clone(),
            text: tweet.text,
            created_at: tweet.created_at,
            media,
        })
    }
}
