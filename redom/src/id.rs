use nanoid::nanoid;
use uuid::Uuid;

/// Alphabet for token primary keys (no ambiguous glyphs).
const TOKEN_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const TOKEN_LENGTH: usize = 20;

/// Generates a token primary key. Never checked against the store for collisions.
pub fn generate_token() -> String {
    nanoid!(TOKEN_LENGTH, TOKEN_ALPHABET)
}

/// Placeholder written into a list slot right before the slot is removed.
pub(crate) fn list_sentinel() -> String {
    format!("__redom_del_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_expected_length_and_charset() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.chars().all(|c| TOKEN_ALPHABET.contains(&c)));
    }

    #[test]
    fn sentinels_differ() {
        assert_ne!(list_sentinel(), list_sentinel());
    }
}
