/// What kind of character data the reader is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextType {
    #[default]
    Text,
    CData,
    Entity,
}

/// Encodes every character as a numeric character reference.
pub fn encode_character_references(text: &str) -> String {
    text.chars().map(|c| format!("&#{};", c as u32)).collect()
}
