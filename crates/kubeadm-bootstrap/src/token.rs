//! Bootstrap token generation.
//!
//! Tokens have the kubeadm shape `[a-z0-9]{6}.[a-z0-9]{16}`: a public id that is
//! a valid DNS label, followed by the secret.

use std::fmt;
use std::sync::LazyLock;

use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;

use crate::error::BootstrapError;

/// Number of characters in the token id.
pub const TOKEN_ID_LEN: usize = 6;

/// Number of characters in the token secret.
pub const TOKEN_SECRET_LEN: usize = 16;

/// Characters allowed in a bootstrap token.
const TOKEN_CHARS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 256 % 36 == 4, so bytes at or above this value would bias the low characters.
const MAX_BYTE_VALUE: u8 = 252;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-z]{6}\.[0-9a-z]{16}$").expect("token pattern is valid")
});

/// A kubeadm bootstrap token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    id: String,
    secret: String,
}

impl Token {
    /// Public token id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.secret)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl std::str::FromStr for Token {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !TOKEN_PATTERN.is_match(s) {
            return Err(BootstrapError::config(format!(
                "Invalid bootstrap token: expected [a-z0-9]{{{TOKEN_ID_LEN}}}.[a-z0-9]{{{TOKEN_SECRET_LEN}}}"
            )));
        }
        let (id, secret) = s.split_at(TOKEN_ID_LEN);
        Ok(Self {
            id: id.to_string(),
            secret: secret[1..].to_string(),
        })
    }
}

/// Buffered reader over an RNG, refilled in chunks like a bufio reader.
struct ByteReader<'a, R: RngCore + ?Sized> {
    rng: &'a mut R,
    buf: Vec<u8>,
    pos: usize,
}

impl<'a, R: RngCore + ?Sized> ByteReader<'a, R> {
    fn new(rng: &'a mut R, capacity: usize) -> Self {
        let buf = vec![0; capacity.max(1)];
        let pos = buf.len();
        Self { rng, buf, pos }
    }

    fn read_byte(&mut self) -> Result<u8, BootstrapError> {
        if self.pos == self.buf.len() {
            self.rng.try_fill_bytes(&mut self.buf)?;
            self.pos = 0;
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }
}

/// Draw `length` characters from the token alphabet without modulo bias.
fn random_chars<R: RngCore + ?Sized>(rng: &mut R, length: usize) -> Result<String, BootstrapError> {
    let mut reader = ByteReader::new(rng, length * 2);
    let mut out = String::with_capacity(length);

    for _ in 0..length {
        let b = loop {
            let b = reader.read_byte()?;
            if b < MAX_BYTE_VALUE {
                break b;
            }
        };
        out.push(char::from(TOKEN_CHARS[usize::from(b) % TOKEN_CHARS.len()]));
    }

    Ok(out)
}

/// Generate a token from the given random source.
pub fn generate_token_with<R: RngCore + ?Sized>(rng: &mut R) -> Result<Token, BootstrapError> {
    let id = random_chars(rng, TOKEN_ID_LEN)?;
    let secret = random_chars(rng, TOKEN_SECRET_LEN)?;
    Ok(Token { id, secret })
}

/// Generate a token from the operating system's secure random source.
pub fn generate_token() -> Result<Token, BootstrapError> {
    generate_token_with(&mut OsRng)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed byte sequence, cycling when exhausted.
    struct ScriptedRng {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl ScriptedRng {
        fn new(bytes: Vec<u8>) -> Self {
            Self { bytes, pos: 0 }
        }
    }

    impl RngCore for ScriptedRng {
        fn next_u32(&mut self) -> u32 {
            let mut b = [0u8; 4];
            self.fill_bytes(&mut b);
            u32::from_le_bytes(b)
        }

        fn next_u64(&mut self) -> u64 {
            let mut b = [0u8; 8];
            self.fill_bytes(&mut b);
            u64::from_le_bytes(b)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest.iter_mut() {
                *b = self.bytes[self.pos % self.bytes.len()];
                self.pos += 1;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {}

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "entropy exhausted",
            )))
        }
    }

    #[test]
    fn test_token_format() {
        for _ in 0..100 {
            let token = generate_token().unwrap().to_string();
            assert!(TOKEN_PATTERN.is_match(&token), "bad token: {token}");
        }
    }

    #[test]
    fn test_successive_tokens_differ() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_high_bytes_are_rejected() {
        // Every byte >= 252 must be skipped; 252 % 36 == 0 would otherwise emit '0'.
        let mut rng = ScriptedRng::new(vec![252, 253, 254, 255, 10]);
        let token = generate_token_with(&mut rng).unwrap();
        assert_eq!(token.id(), "aaaaaa");
        assert_eq!(token.secret(), "aaaaaaaaaaaaaaaa");
    }

    #[test]
    fn test_byte_mapping_wraps_modulo_alphabet() {
        // 35 -> 'z', 36 -> '0', 251 -> 251 % 36 = 35 -> 'z'
        let mut rng = ScriptedRng::new(vec![35, 36, 251, 0, 1, 2]);
        let token = generate_token_with(&mut rng).unwrap();
        assert_eq!(token.id(), "z0z012");
    }

    #[test]
    fn test_distribution_covers_alphabet_evenly() {
        let mut counts = [0usize; 36];
        let mut rng = OsRng;
        let samples = 36 * 2000;
        let chars = random_chars(&mut rng, samples).unwrap();
        for c in chars.bytes() {
            let idx = TOKEN_CHARS.iter().position(|&t| t == c).unwrap();
            counts[idx] += 1;
        }
        // Expected 2000 per bucket; allow a wide margin to keep the test stable.
        for (i, count) in counts.iter().enumerate() {
            assert!(
                (1600..=2400).contains(count),
                "character {} appeared {count} times",
                TOKEN_CHARS[i] as char
            );
        }
    }

    #[test]
    fn test_random_source_failure() {
        let err = generate_token_with(&mut BrokenRng).unwrap_err();
        assert!(matches!(err, BootstrapError::RandomSource(_)));
    }

    #[test]
    fn test_parse_valid_token() {
        let token: Token = "abcdef.0123456789abcdef".parse().unwrap();
        assert_eq!(token.id(), "abcdef");
        assert_eq!(token.secret(), "0123456789abcdef");
        assert_eq!(token.to_string(), "abcdef.0123456789abcdef");
    }

    #[test]
    fn test_parse_rejects_malformed_token() {
        for bad in [
            "",
            "abc.def",
            "ABCDEF.0123456789abcdef",
            "abcdef0123456789abcdef",
            "abcdef.0123456789abcde!",
        ] {
            let err = bad.parse::<Token>().unwrap_err();
            assert!(matches!(err, BootstrapError::Configuration(_)), "{bad}");
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let token: Token = "abcdef.0123456789abcdef".parse().unwrap();
        let debug = format!("{token:?}");
        assert!(debug.contains("abcdef"));
        assert!(!debug.contains("0123456789abcdef"));
    }
}
