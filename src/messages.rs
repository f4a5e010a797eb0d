// src/messages.rs

pub const ALERT_TITLE: &str = "𝑷𝑶𝑮𝑮𝑬𝑹𝑺";
pub const ALERT_COLOR: u32 = 0x87CEEB;
pub const JUMP_BUTTON_LABEL: &str = "Jump to Message";
pub const UNKNOWN_USER: &str = "Unknown";

pub fn pog_acknowledgement(mention: &str, target_channel_id: u64) -> String {
    format!(
        "🎉 {} Pogged! Check it out in <#{}>",
        mention, target_channel_id
    )
}

pub fn alert_description(mention: &str, drop_content: &str) -> String {
    format!(
        "{} triggered a POG!\n\n\
        {}\n\n\
        **Attachment:**",
        mention, drop_content
    )
}

pub fn alert_footer(display_name: &str) -> String {
    format!("Dropped by: {}", display_name)
}

pub fn channel_set_message(channel_id: u64) -> String {
    format!("✅ Target channel set to <#{}>", channel_id)
}

pub const INVALID_CHANNEL_ID: &str = "❌ Invalid channel ID.";
pub const CHANNEL_NOT_MESSAGEABLE: &str = "❌ Invalid channel - cannot send messages.";
pub const CHANNEL_SAVE_FAILED: &str = "❌ Could not save the channel, please try again later.";
