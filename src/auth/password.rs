use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::collections::HashMap;

use rand::rngs::OsRng;
use tracing::error;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// The most common leaked passwords; anything on this list is refused.
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "password", "12345678", "qwerty", "123456789", "12345", "1234", "111111",
    "1234567", "dragon", "123123", "baseball", "abc123", "football", "monkey", "letmein",
    "696969", "shadow", "master", "666666", "qwertyuiop", "123321", "mustang", "1234567890",
    "michael", "654321", "superman", "1qaz2wsx", "7777777", "121212", "000000", "qazwsx",
    "123qwe", "killer", "trustno1", "jordan", "jennifer", "zxcvbnm", "asdfgh", "hunter",
    "buster", "soccer", "harley", "batman", "andrew", "tigger", "sunshine", "iloveyou",
    "2000", "charlie", "robert", "thomas", "hockey", "ranger", "daniel", "starwars",
    "klaster", "112233", "george", "computer", "michelle", "jessica", "pepper", "1111",
    "zxcvbn", "555555", "11111111", "131313", "freedom", "777777", "pass", "maggie",
    "159753", "aaaaaa", "ginger", "princess", "joshua", "cheese", "amanda", "summer",
    "love", "ashley", "nicole", "chelsea", "biteme", "matthew", "access", "yankees",
    "987654321", "dallas", "austin", "thunder", "taylor", "matrix", "password1",
    "password123", "welcome", "admin", "passw0rd", "p@ssw0rd", "qwerty123", "changeme",
];

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Checks a new password against the strength policy, returning every
/// message that applies.
///
/// `attributes` are the other values the user submitted (username, email);
/// a password that is mostly one of them is rejected.
pub fn validate_password_strength(password: &str, attributes: &[(&str, &str)]) -> Vec<String> {
    let mut problems = Vec::new();

    for (label, value) in attributes {
        if too_similar(password, value) {
            problems.push(format!("The password is too similar to the {label}."));
            break;
        }
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        ));
    }

    let lowered = password.trim().to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }

    problems
}

/// Similarity at or above which a password is refused.
const MAX_SIMILARITY: f64 = 0.7;

/// True when the password is too close to the attribute or to any of its
/// words. Closeness is the share of characters the two have in common,
/// ignoring order: `2 * shared / (len(a) + len(b))`.
fn too_similar(password: &str, attribute: &str) -> bool {
    let password = password.to_lowercase();
    let attribute = attribute.to_lowercase();
    if password.is_empty() || attribute.is_empty() {
        return false;
    }
    let parts = attribute
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .chain(std::iter::once(attribute.as_str()));
    for part in parts {
        if exceeds_length_ratio(&password, part) {
            continue;
        }
        if shared_char_ratio(&password, part) >= MAX_SIMILARITY {
            return true;
        }
    }
    false
}

/// A part far shorter than the password cannot make it similar.
fn exceeds_length_ratio(password: &str, part: &str) -> bool {
    let pwd_len = password.chars().count();
    let part_len = part.chars().count();
    let bound = MAX_SIMILARITY / 2.0 * pwd_len as f64;
    pwd_len >= 10 * part_len && (part_len as f64) < bound
}

fn shared_char_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let mut shared = 0usize;
    for c in a.chars() {
        if let Some(n) = counts.get_mut(&c) {
            if *n > 0 {
                *n -= 1;
                shared += 1;
            }
        }
    }
    2.0 * shared as f64 / total as f64
}
