//! Keeps long embed text within Discord's limits.

use poise::serenity_prelude::CreateEmbed;

const DESCRIPTION_LIMIT: usize = 2000;
const FIELD_LIMIT: usize = 1024;

/// Name given to overflow fields; renders as nothing.
pub const BLANK_FIELD: &str = "\u{2063}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline,
        }
    }

    fn blank(value: String) -> Self {
        Self::new(BLANK_FIELD, value, false)
    }
}

/// The text parts of an embed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedText {
    pub description: String,
    pub fields: Vec<Field>,
}

impl EmbedText {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(Field::new(name, value, inline));
        self
    }

    pub fn apply(self, embed: CreateEmbed) -> CreateEmbed {
        let embed = if self.description.is_empty() {
            embed
        } else {
            embed.description(self.description)
        };
        self.fields
            .into_iter()
            .fold(embed, |embed, f| embed.field(f.name, f.value, f.inline))
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn chunk_chars(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(limit).map(|c| c.iter().collect()).collect()
}

/// Greedily packs `separator`-joined parts into chunks shorter than `limit`.
fn pack(text: &str, separator: &str, limit: usize) -> Vec<String> {
    let parts: Vec<&str> = text.split(separator).collect();
    if parts.len() == 1 {
        return chunk_chars(text, limit);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for part in parts {
        if char_len(&current) + char_len(part) + char_len(separator) < limit {
            current.push_str(part);
            current.push_str(separator);
        } else {
            if !current.trim().is_empty() {
                chunks.push(current.trim().to_string());
            }
            current = format!("{part}{separator}");
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
        .into_iter()
        .flat_map(|chunk| {
            if char_len(&chunk) > limit {
                chunk_chars(&chunk, limit)
            } else {
                vec![chunk]
            }
        })
        .collect()
}

/// Moves description overflow into a leading blank field, then splits every
/// field longer than Discord allows into consecutive blank fields.
pub fn split_embed_text(text: EmbedText, separator: &str) -> EmbedText {
    let EmbedText { mut description, fields } = text;
    let mut overflow = None;

    if char_len(&description) > DESCRIPTION_LIMIT {
        let parts: Vec<&str> = description.split(separator).collect();
        if parts.len() == 1 {
            let chars: Vec<char> = description.chars().collect();
            overflow = Some(chars[DESCRIPTION_LIMIT..].iter().collect::<String>());
            description = chars[..DESCRIPTION_LIMIT].iter().collect();
        } else {
            let mut current = String::new();
            let mut rest = None;
            for (i, part) in parts.iter().enumerate() {
                if char_len(&current) + char_len(part) + char_len(separator) < DESCRIPTION_LIMIT {
                    current.push_str(part);
                    current.push_str(separator);
                } else {
                    rest = Some(parts[i..].join(separator));
                    break;
                }
            }
            description = current.trim().to_string();
            overflow = rest;
        }
    }

    let mut split = Vec::new();
    for field in overflow.map(Field::blank).into_iter().chain(fields) {
        let mut values = pack(&field.value, separator, FIELD_LIMIT).into_iter();
        let first = values.next().unwrap_or_default();
        let rest: Vec<String> = values.collect();

        split.push(Field {
            inline: field.inline && rest.is_empty(),
            name: field.name,
            value: first,
        });
        split.extend(rest.into_iter().map(Field::blank));
    }

    EmbedText {
        description,
        fields: split,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(count: usize, width: usize) -> String {
        (0..count)
            .map(|i| format!("{i:0width$}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn short_text_is_untouched() {
        let text = EmbedText::new("hello").field("Teams", "a\nb", true);
        assert_eq!(split_embed_text(text.clone(), "\n"), text);
    }

    #[test]
    fn long_description_overflows_into_a_leading_field() {
        let text = EmbedText::new(lines(300, 9)).field("Teams", "x", true);
        let split = split_embed_text(text, "\n");

        assert!(char_len(&split.description) < DESCRIPTION_LIMIT);
        assert_eq!(split.fields[0].name, BLANK_FIELD);
        assert_eq!(split.fields.last().map(|f| f.name.as_str()), Some("Teams"));
        assert!(split.fields.iter().all(|f| char_len(&f.value) <= FIELD_LIMIT));
    }

    #[test]
    fn unbroken_description_is_cut_at_the_limit() {
        let split = split_embed_text(EmbedText::new("a".repeat(2500)), "\n");
        assert_eq!(char_len(&split.description), DESCRIPTION_LIMIT);
        assert_eq!(split.fields.len(), 1);
        assert_eq!(char_len(&split.fields[0].value), 500);
    }

    #[test]
    fn long_field_is_split_on_lines() {
        let value = lines(200, 9);
        let split = split_embed_text(EmbedText::new("").field("Current Teams", value.clone(), true), "\n");

        assert!(split.fields.len() > 1);
        assert_eq!(split.fields[0].name, "Current Teams");
        assert!(!split.fields[0].inline);
        assert!(split.fields[1..].iter().all(|f| f.name == BLANK_FIELD));

        let joined: Vec<String> = split.fields.iter().map(|f| f.value.clone()).collect();
        assert_eq!(joined.join("\n"), value);
    }
}
