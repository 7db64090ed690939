use anyhow::{Result, anyhow};
use async_trait::async_trait;
use argon2::{
    password_hash::{SaltString, PasswordHasher as _, PasswordVerifier as _, PasswordHash},
    Argon2, Algorithm, Version, Params
};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::Sha256;
use log::debug;

/// Argon2 time cost (passes over memory)
const TIME_COST: u32 = 2;

/// Turns plaintext passwords into digests and checks them later
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password into a self-describing digest
    async fn hash(&self, password: &str) -> Result<String>;

    /// Check a plaintext password against a stored digest
    async fn verify(&self, password: &str, digest: &str) -> Result<bool>;
}

/// Argon2id hasher with an optional HMAC pepper
#[derive(Clone)]
pub struct Argon2Hasher {
    memory_cost: u32,
    pepper: Option<Vec<u8>>,
}

impl Argon2Hasher {
    pub fn new(memory_cost: u32, pepper: Option<&str>) -> Self {
        Self {
            memory_cost,
            pepper: pepper.map(|p| p.as_bytes().to_vec()),
        }
    }

    /// Combine the password with the pepper, if one is configured
    fn prepare(&self, password: &str) -> Result<String> {
        match &self.pepper {
            Some(pepper) => apply_pepper(password, pepper),
            None => Ok(password.to_string()),
        }
    }

    /// Run a memory-hard operation on the blocking pool
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Argon2Hasher) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let hasher = self.clone();

        tokio::task::spawn_blocking(move || op(&hasher))
            .await
            .map_err(|e| anyhow!("Password task failed: {}", e))?
    }

    fn hash_blocking(&self, password: &str) -> Result<String> {
        let prepared = self.prepare(password)?;

        // Generate a random salt
        let salt = SaltString::generate(&mut OsRng);

        // Configure Argon2id
        let argon2 = Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(
                self.memory_cost, // Memory cost (kibibytes)
                TIME_COST,
                1,                // Parallelism
                None,             // Output length (defaults to 32 bytes)
            ).map_err(|e| anyhow!("Invalid Argon2 parameters: {}", e))?,
        );

        let digest = argon2.hash_password(prepared.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {}", e))?
            .to_string();

        debug!("Password hashed with memory cost {}", self.memory_cost);
        Ok(digest)
    }

    fn verify_blocking(&self, password: &str, digest: &str) -> Result<bool> {
        let prepared = self.prepare(password)?;

        // Parameters are read back from the PHC string
        let parsed_hash = PasswordHash::new(digest)
            .map_err(|e| anyhow!("Failed to parse password hash: {}", e))?;

        match Argon2::default().verify_password(prepared.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification error: {}", e)),
        }
    }
}

#[async_trait]
impl PasswordHasher for Argon2Hasher {
    async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        self.run(move |hasher| hasher.hash_blocking(&password)).await
    }

    async fn verify(&self, password: &str, digest: &str) -> Result<bool> {
        let password = password.to_string();
        let digest = digest.to_string();
        self.run(move |hasher| hasher.verify_blocking(&password, &digest)).await
    }
}

/// Apply the pepper to a password
fn apply_pepper(password: &str, pepper: &[u8]) -> Result<String> {
    // Create HMAC with the pepper as key
    let mut mac = Hmac::<Sha256>::new_from_slice(pepper)
        .map_err(|e| anyhow!("Failed to create HMAC: {}", e))?;

    mac.update(password.as_bytes());

    // Convert to hex string for easier handling
    Ok(hex::encode(mac.finalize().into_bytes()))
}
