use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use gallery_db::{is_unique_violation, models::UserRow};
use gallery_types::models::User;

use crate::error::ApiError;
use crate::state::AppStateInner;
use crate::token::Identity;
use crate::validate::{Credentials, NewAccount};

impl AppStateInner {
    /// Create an account and sign the new user in.
    pub async fn register(&self, account: NewAccount) -> Result<(String, User), ApiError> {
        let NewAccount {
            name,
            email,
            password,
        } = account;

        let lookup = email.clone();
        let existing = self
            .blocking(move |db| db.get_user_by_email(&lookup).map_err(ApiError::store))
            .await?;
        if existing.is_some() {
            warn!("Registration refused: email already registered");
            return Err(ApiError::DuplicateEmail);
        }

        let password_hash = hash_password(password).await?;
        let user_id = Uuid::new_v4();

        let (id, n, e) = (user_id.to_string(), name.clone(), email.clone());
        self.blocking(move |db| {
            db.create_user(&id, &n, &e, &password_hash).map_err(|err| {
                // Lost a race with a concurrent registration of the same email.
                if is_unique_violation(&err) {
                    ApiError::DuplicateEmail
                } else {
                    ApiError::store(err)
                }
            })
        })
        .await?;

        info!("Registered user {}", user_id);

        let token = self.tokens.issue(user_id, &email)?;
        Ok((
            token,
            User {
                id: user_id,
                name,
                email,
            },
        ))
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, credentials: Credentials) -> Result<(String, User), ApiError> {
        let Credentials { email, password } = credentials;

        let row = self
            .blocking(move |db| db.get_user_by_email(&email).map_err(ApiError::store))
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        if !verify_password(password, row.password.clone()).await? {
            return Err(ApiError::InvalidCredentials);
        }

        let user = user_from_row(row)?;
        let token = self.tokens.issue(user.id, &user.email)?;
        info!("User {} logged in", user.id);
        Ok((token, user))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, ApiError> {
        self.tokens.verify(token)
    }

    /// Resolve a verified identity to its stored account.
    pub async fn current_user(&self, identity: &Identity) -> Result<User, ApiError> {
        let id = identity.user_id.to_string();
        let row = self
            .blocking(move |db| db.get_user_by_id(&id).map_err(ApiError::store))
            .await?
            .ok_or(ApiError::InvalidToken)?;
        user_from_row(row)
    }
}

fn user_from_row(row: UserRow) -> Result<User, ApiError> {
    let id = row.id.parse::<Uuid>().map_err(|e| {
        error!("Corrupt user id '{}': {}", row.id, e);
        ApiError::StoreFailure
    })?;
    Ok(User {
        id,
        name: row.name,
        email: row.email,
    })
}

/// Argon2id with a fresh salt. CPU-bound, so it runs on the blocking pool.
async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
    .map_err(|e| {
        error!("Password hashing failed: {}", e);
        ApiError::Internal
    })
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)?;
        Ok::<_, argon2::password_hash::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })?
    .map_err(|e| {
        error!("Stored password hash is unreadable: {}", e);
        ApiError::StoreFailure
    })
}
