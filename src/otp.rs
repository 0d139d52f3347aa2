use std::fmt;

use rand::Rng;

/// A 6-digit one-time passcode. Generated per request and never
/// persisted; the caller relays it to whoever completes verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Otp(String);

impl Otp {
    pub fn generate() -> Self {
        let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
        Self(code.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Otp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Otp;

    #[test]
    fn six_ascii_digits() {
        for _ in 0..1000 {
            let otp = Otp::generate();
            assert_eq!(otp.as_str().len(), 6);
            assert!(otp.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn never_zero_padded() {
        // The range starts at 100000, so a leading zero cannot occur.
        for _ in 0..1000 {
            let otp = Otp::generate();
            assert_ne!(otp.as_str().as_bytes()[0], b'0');
        }
    }
}
