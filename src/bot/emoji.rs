//! Emoji-reaction table.
//!
//! Static configuration consulted during Idle free-text dispatch: when a
//! message starts with an emoji from this table, the bot echoes one
//! uniformly random emoji back instead of running a keyword lookup.

const EMOJI: &[&str] = &[
    "😀", "😁", "😂", "😃", "😄", "😅", "😆", "😇", "😈", "😉", "😊", "😋", "😌", "😍",
    "😎", "😏", "😐", "😑", "😒", "😓", "😔", "😕", "😖", "😗", "😘", "😙", "😚", "😛",
    "😜", "😝", "😞", "😟", "😠", "😡", "😢", "😣", "😤", "😥", "😦", "😧", "😨", "😩",
    "😪", "😫", "😬", "😭", "😮", "😯", "😰", "😱", "😲", "😳", "😴", "😵", "😶", "😷",
    "🙀", "🙁", "🙂", "🙃", "🙄", "👻", "👽", "👾", "💀", "💩", "👍", "👎", "👏", "🙌",
    "🙏", "💪", "👀", "❤️", "💔", "💕", "💖", "💙", "💚", "💛", "💜", "⭐️", "🌟", "✨",
    "🔥", "⚡️", "🌈", "☀️", "🌙", "❄️", "🌊", "🌸", "🌹", "🌻", "🍀", "🎉", "🎊", "🎁",
    "🎂", "🍕", "🍔", "🍟", "🍺", "☕️", "⚽️", "🏀", "🎸", "🎧", "🚀", "✈️", "🚗", "🐶",
    "🐱", "🐭", "🐼", "🐸", "🐝", "🦄",
];

/// True when the text starts with an emoji from the table.
pub fn is_emoji_trigger(text: &str) -> bool {
    EMOJI.iter().any(|emoji| text.starts_with(emoji))
}

/// Uniformly random emoji from the table.
pub fn random_emoji() -> &'static str {
    EMOJI[fastrand::usize(..EMOJI.len())]
}

/// True when the text is itself an entry of the table.
pub fn is_known_emoji(text: &str) -> bool {
    EMOJI.contains(&text)
}
