use super::types::*;
use crate::config::{DisplayConfig, TwitterConfig};
use crate::feed::types::{MediaKind, Post};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

pub const EMBED_COLOR_BLUE: u32 = 0x3498DB;
pub const TWITTER_ICON: &str = "https://abs.twimg.com/icons/apple-touch-icon-192x192.png";
const MAX_DESCRIPTION_CHARS: usize = 4096;
/// Discord rejects empty field names.
const BLANK_FIELD_NAME: &str = "\u{200b}";

/// Presentation settings shared by every notification.
#[derive(Debug, Clone)]
pub struct EmbedStyle {
    pub web_base: String,
    pub timezone: Tz,
    pub footer_text: String,
    pub footer_icon: String,
}

impl EmbedStyle {
    pub fn from_config(twitter: &TwitterConfig, display: &DisplayConfig) -> Result<Self> {
        Ok(Self {
            web_base: twitter.web_base.trim_end_matches('/').to_string(),
            timezone: display.tz()?,
            footer_text: display.footer_text.clone(),
            footer_icon: display.footer_icon.clone(),
        })
    }
}

/// e.g. "March 19, 2025 at 10:07 AM"
pub fn format_posted_at(created_at: DateTime<Utc>, tz: Tz) -> String {
    created_at
        .with_timezone(&tz)
        .format("%B %d, %Y at %I:%M %p")
        .to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => {
            let mut cut: String = text[..idx].chars().take(max - 1).collect();
            cut.push('…');
            cut
        }
        None => text.to_string(),
    }
}

/// The first photo becomes the inline image; videos and GIFs are listed as
/// plain URLs in their own field.
pub fn build_post_embed(handle: &str, post: &Post, style: &EmbedStyle, sent_at: DateTime<Utc>) -> Embed {
    let profile_url = format!("{}/{}", style.web_base, handle);
    let status_url = format!("{}/{}/status/{}", style.web_base, handle, post.id);

    let mut fields = vec![
        EmbedField {
            name: BLANK_FIELD_NAME.to_string(),
            value: format!("🔗 [View Tweet]({})", status_url),
            inline: false,
        },
        EmbedField {
            name: "🗓️ Posted At".to_string(),
            value: format_posted_at(post.created_at, style.timezone),
            inline: true,
        },
    ];

    let image = post
        .media
        .iter()
        .find(|m| m.kind == MediaKind::Photo)
        .map(|m| EmbedImage { url: m.url.clone() });

    let motion_urls: Vec<&str> = post
        .media
        .iter()
        .filter(|m| matches!(m.kind, MediaKind::Video | MediaKind::AnimatedGif))
        .map(|m| m.url.as_str())
        .collect();
    if !motion_urls.is_empty() {
        fields.push(EmbedField {
            name: "📹 Media Attachments".to_string(),
            value: motion_urls.join("\n"),
            inline: false,
        });
    }

    Embed {
        title: format!("New Tweet from @{} 💬", handle),
        description: truncate_chars(&post.text, MAX_DESCRIPTION_CHARS),
        color: EMBED_COLOR_BLUE,
        timestamp: sent_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        author: EmbedAuthor {
            name: post.author_name.clone().unwrap_or_else(|| handle.to_string()),
            url: profile_url,
            icon_url: post
                .author_avatar
                .clone()
                .unwrap_or_else(|| TWITTER_ICON.to_string()),
        },
        footer: EmbedFooter {
            text: style.footer_text.clone(),
            icon_url: style.footer_icon.clone(),
        },
        fields,
        image,
    }
}
