/// How many messages before the drop are searched for the card image
pub const HISTORY_WINDOW: usize = 3;

/// Where a card image was found on a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Attachment { url: String },
    EmbeddedImage { url: String },
}

impl ImageSource {
    pub fn image_url(&self) -> &str {
        match self {
            ImageSource::Attachment { url } | ImageSource::EmbeddedImage { url } => url,
        }
    }
}

/// A user mentioned on a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionedUser {
    pub id: u64,
    pub display_name: String,
}

impl MentionedUser {
    /// Discord mention markup
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Platform-neutral view of a message from channel history
#[derive(Debug, Clone, Default)]
pub struct HistoryMessage {
    pub id: u64,
    pub author_id: u64,
    pub attachment_urls: Vec<String>,
    /// Image of the first embed, if any
    pub embed_image_url: Option<String>,
    pub mentions: Vec<MentionedUser>,
}

impl HistoryMessage {
    /// Attachment first, then embed image
    pub fn image_source(&self) -> Option<ImageSource> {
        if let Some(url) = self.attachment_urls.first() {
            return Some(ImageSource::Attachment { url: url.clone() });
        }
        self.embed_image_url
            .as_ref()
            .map(|url| ImageSource::EmbeddedImage { url: url.clone() })
    }
}

/// The card image for a drop and who it is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub source: ImageSource,
    pub source_message_id: u64,
    pub attributed_user: Option<MentionedUser>,
}

impl ImageReference {
    pub fn image_url(&self) -> &str {
        self.source.image_url()
    }
}

/// Find the image message among the messages preceding a drop
///
/// `history` is newest first and must not include the drop itself. Only
/// messages from the source or relay account count; the first one carrying
/// an image wins.
pub fn locate_image(
    history: &[HistoryMessage],
    source_bot_id: u64,
    relay_bot_id: u64,
) -> Option<ImageReference> {
    history
        .iter()
        .take(HISTORY_WINDOW)
        .filter(|msg| msg.author_id == source_bot_id || msg.author_id == relay_bot_id)
        .find_map(|msg| {
            msg.image_source().map(|source| ImageReference {
                source,
                source_message_id: msg.id,
                attributed_user: msg.mentions.first().cloned(),
            })
        })
}
