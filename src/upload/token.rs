use std::fmt;

/// Per-attempt identifier shared by the song and image blob keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadToken(String);

impl UploadToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn song_key(&self) -> String {
        format!("song-{}", self.0)
    }

    pub fn image_key(&self) -> String {
        format!("image-{}", self.0)
    }
}

impl fmt::Display for UploadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of upload tokens. Every call must mint a value never handed out before.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> UploadToken;
}

/// 122 random bits from a v4 UUID, rendered as 32 lowercase hex characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokens;

impl TokenGenerator for RandomTokens {
    fn generate(&self) -> UploadToken {
        UploadToken(uuid::Uuid::new_v4().simple().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::object_store::validate_key;

    #[test]
    fn keys_share_the_token() {
        let token = UploadToken::new("abc123");
        assert_eq!(token.song_key(), "song-abc123");
        assert_eq!(token.image_key(), "image-abc123");
    }

    #[test]
    fn random_tokens_are_valid_storage_keys() {
        let token = RandomTokens.generate();
        assert_eq!(token.as_str().len(), 32);
        assert!(validate_key(&token.song_key()).is_ok());
        assert!(validate_key(&token.image_key()).is_ok());
    }

    #[test]
    fn consecutive_tokens_never_repeat() {
        let mut seen = HashSet::with_capacity(100_000);
        let mut previous = RandomTokens.generate();
        for _ in 0..100_000 {
            let token = RandomTokens.generate();
            assert_ne!(token, previous);
            assert!(seen.insert(token.clone()), "collision on {token}");
            previous = token;
        }
    }
}
