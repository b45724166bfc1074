//! User registration, login, and signed access tokens
//!
//! Users live in a JSON file on disk, guarded by a mutex for concurrent
//! handler access. Passwords are stored as salted SHA-256 digests. Access
//! tokens are compact signed blobs: base64url claims joined to a base64url
//! SHA-256 signature over the secret and the encoded claims.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::config::AuthConfig;
use crate::error::{Result, SahayakError};

const GOOGLE_DOMAINS: &[&str] = &["gmail.com", "googlemail.com", "google.com"];
const MIN_PASSWORD_LEN: usize = 6;

/// A registered user as persisted to the users file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier assigned at registration.
    pub id: String,
    /// Display name, unique case-insensitively.
    pub username: String,
    /// Lowercased email, unique.
    pub email: String,
    /// `salt$digest`, both base64url.
    password: String,
    /// Registration timestamp.
    pub created_at: chrono::DateTime<Utc>,
}

/// File-backed user store.
///
/// Loads the users file once at startup; every mutation rewrites the whole
/// file (the store is tiny and this matches how the file is consumed).
pub struct UserStore {
    path: PathBuf,
    users: Mutex<Vec<User>>,
}

impl UserStore {
    /// Opens the store, loading existing users when the file is present.
    ///
    /// A malformed file is treated as empty with a warning rather than an
    /// error, so a corrupt users file never prevents startup.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let users = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(users) => users,
                Err(e) => {
                    tracing::warn!("Ignoring malformed users file {}: {}", path.display(), e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    /// Registers a new user and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns an [`SahayakError::Auth`] for invalid or non-Google email,
    /// short password, or a duplicate email/username.
    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(SahayakError::Auth("All fields are required".to_string()).into());
        }
        if !is_valid_email(email) {
            return Err(
                SahayakError::Auth("Please enter a valid email address".to_string()).into(),
            );
        }
        if !is_google_email(email) {
            return Err(SahayakError::Auth(
                "Please use a Google email address (Gmail)".to_string(),
            )
            .into());
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(SahayakError::Auth(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            ))
            .into());
        }

        let email = email.to_lowercase();
        let mut users = self.users.lock().expect("users lock");

        if users.iter().any(|u| u.email == email) {
            return Err(SahayakError::Auth("Email already registered".to_string()).into());
        }
        if users
            .iter()
            .any(|u| u.username.eq_ignore_ascii_case(username))
        {
            return Err(SahayakError::Auth("Username already taken".to_string()).into());
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email,
            password: hash_password(password, &new_salt()),
            created_at: Utc::now(),
        };

        users.push(user.clone());
        self.persist(&users)?;
        tracing::info!(username = %user.username, "registered new user");

        Ok(user)
    }

    /// Verifies credentials and returns the matching user.
    ///
    /// Unknown email and wrong password produce the same message so the
    /// endpoint does not leak which one was wrong.
    pub fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = email.to_lowercase();
        let users = self.users.lock().expect("users lock");

        let user = users
            .iter()
            .find(|u| u.email == email)
            .filter(|u| verify_password(password, &u.password))
            .ok_or_else(|| SahayakError::Auth("Invalid email or password".to_string()))?;

        Ok(user.clone())
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.lock().expect("users lock").len()
    }

    /// Whether no users are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, users: &[User]) -> Result<()> {
        let json = serde_json::to_string_pretty(users)?;
        std::fs::write(&self.path, json)
            .map_err(|e| SahayakError::Storage(format!("Failed to write users file: {}", e)))?;
        Ok(())
    }
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"))
}

fn is_valid_email(email: &str) -> bool {
    email_re().is_match(email)
}

fn is_google_email(email: &str) -> bool {
    email
        .rsplit_once('@')
        .map(|(_, domain)| GOOGLE_DOMAINS.contains(&domain.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn new_salt() -> String {
    use rand::RngCore as _;

    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_password(password: &str, salt: &str) -> String {
    let digest = Sha256::digest(format!("{}{}", salt, password).as_bytes());
    format!("{}${}", salt, URL_SAFE_NO_PAD.encode(digest))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, _)) => hash_password(password, salt) == stored,
        None => false,
    }
}

/// Claims carried inside an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: String,
    /// Username.
    pub username: String,
    /// Email.
    pub email: String,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// Issues and verifies signed access tokens.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    secret: String,
    ttl_days: i64,
}

impl TokenSigner {
    /// Creates a signer from the auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.token_secret.clone(),
            ttl_days: config.token_ttl_days,
        }
    }

    /// Issues a token for a user, expiring after the configured lifetime.
    pub fn issue(&self, user: &User) -> Result<String> {
        let claims = Claims {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            exp: (Utc::now() + chrono::Duration::days(self.ttl_days)).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signature = self.sign(&payload);
        Ok(format!("{}.{}", payload, signature))
    }

    /// Verifies a token's signature and expiry, returning its claims.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::Auth`] when the token is malformed, the
    /// signature does not match, or the token has expired.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| SahayakError::Auth("Malformed token".to_string()))?;

        if self.sign(payload) != signature {
            return Err(SahayakError::Auth("Invalid or expired token".to_string()).into());
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SahayakError::Auth("Malformed token".to_string()))?;
        let claims: Claims = serde_json::from_slice(&bytes)
            .map_err(|_| SahayakError::Auth("Malformed token".to_string()))?;

        if claims.exp < Utc::now().timestamp() {
            return Err(SahayakError::Auth("Invalid or expired token".to_string()).into());
        }

        Ok(claims)
    }

    fn sign(&self, payload: &str) -> String {
        let digest = Sha256::digest(format!("{}{}", self.secret, payload).as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> UserStore {
        UserStore::open(dir.path().join("users.json")).unwrap()
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(&AuthConfig {
            token_secret: "test-secret".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_register_and_login_roundtrip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let user = store
            .register("asha", "asha@gmail.com", "secret123")
            .unwrap();
        assert_eq!(user.email, "asha@gmail.com");

        let logged_in = store.login("Asha@Gmail.com", "secret123").unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[test]
    fn test_registration_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");

        let store = UserStore::open(&path).unwrap();
        store.register("asha", "asha@gmail.com", "secret123").unwrap();
        drop(store);

        let reopened = UserStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.login("asha@gmail.com", "secret123").is_ok());
    }

    #[test]
    fn test_register_rejects_invalid_email() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.register("a", "not-an-email", "secret123").is_err());
    }

    #[test]
    fn test_register_rejects_non_google_email() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let err = store
            .register("a", "a@example.com", "secret123")
            .unwrap_err();
        assert!(err.to_string().contains("Google"));
    }

    #[test]
    fn test_register_rejects_short_password() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.register("a", "a@gmail.com", "short").is_err());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.register("asha", "asha@gmail.com", "secret123").unwrap();

        assert!(store
            .register("other", "asha@gmail.com", "secret123")
            .is_err());
        assert!(store
            .register("ASHA", "asha2@gmail.com", "secret123")
            .is_err());
    }

    #[test]
    fn test_login_wrong_password_fails() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.register("asha", "asha@gmail.com", "secret123").unwrap();

        let err = store.login("asha@gmail.com", "wrong-pass").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Authentication error: Invalid email or password"
        );
    }

    #[test]
    fn test_malformed_users_file_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = UserStore::open(&path).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let a = hash_password("password", &new_salt());
        let b = hash_password("password", &new_salt());
        assert_ne!(a, b);
        assert!(verify_password("password", &a));
        assert!(!verify_password("other", &a));
    }

    #[test]
    fn test_token_roundtrip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let user = store.register("asha", "asha@gmail.com", "secret123").unwrap();

        let signer = signer();
        let token = signer.issue(&user).unwrap();
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.username, "asha");
    }

    #[test]
    fn test_tampered_token_fails_verification() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let user = store.register("asha", "asha@gmail.com", "secret123").unwrap();

        let signer = signer();
        let token = signer.issue(&user).unwrap();
        let tampered = format!("{}x", token);
        assert!(signer.verify(&tampered).is_err());
        assert!(signer.verify("no-dot-here").is_err());
    }

    #[test]
    fn test_expired_token_fails_verification() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let user = store.register("asha", "asha@gmail.com", "secret123").unwrap();

        let expired_signer = TokenSigner {
            secret: "test-secret".to_string(),
            ttl_days: -1,
        };
        let token = expired_signer.issue(&user).unwrap();
        assert!(expired_signer.verify(&token).is_err());
    }
}
