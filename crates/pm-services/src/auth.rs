//! Authentication and user account service
//!
//! Registration, login, password change and the profile operations around
//! them. Emails are normalized (trimmed, lowercased) before any lookup or
//! write; login failures are deliberately indistinguishable between "no
//! such user" and "wrong password".

use std::sync::Arc;

use pm_auth::{hash_password, verify_password, ClaimSet, JwtCodec};
use pm_core::{Id, PmError, PmResult, ValidationErrors};
use pm_models::{Role, User};
use tracing::info;

use crate::store::{NewUser, ProfileUpdate, UserStore};

const MIN_PASSWORD_LEN: usize = 8;

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterParams {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Orchestrates credential verification and token issuance
pub struct AuthService {
    users: Arc<dyn UserStore>,
    codec: Arc<JwtCodec>,
    token_ttl_secs: i64,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, codec: Arc<JwtCodec>, token_ttl_secs: i64) -> Self {
        Self {
            users,
            codec,
            token_ttl_secs,
        }
    }

    /// Register a new account and issue a token for it.
    ///
    /// Fails with a validation error on malformed input or password
    /// mismatch, and with `DuplicateEmail` if the email is already taken
    /// under any letter casing.
    pub async fn register(&self, params: RegisterParams) -> PmResult<(User, String)> {
        validate_registration(&params)?;

        let email = normalize_email(&params.email);
        if self.users.email_exists(&email).await? {
            return Err(PmError::DuplicateEmail { email });
        }

        let password_hash = hash_password(&params.password)?;
        let user = self
            .users
            .insert(NewUser {
                first_name: params.first_name.trim().to_string(),
                last_name: params.last_name.trim().to_string(),
                email,
                password_hash,
                role: Role::User,
            })
            .await?;

        info!(user_id = user.id, "registered new user");
        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// Verify credentials and issue a token.
    ///
    /// A missing account, an inactive account and a wrong password all
    /// produce the same `InvalidCredentials` value.
    pub async fn login(&self, email: &str, password: &str) -> PmResult<(User, String)> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_active_by_email(&email)
            .await?
            .ok_or(PmError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(PmError::InvalidCredentials);
        }

        info!(user_id = user.id, "user logged in");
        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// Change password after re-verifying the current one
    pub async fn change_password(
        &self,
        user_id: Id,
        current_password: &str,
        new_password: &str,
    ) -> PmResult<()> {
        let user = self.require_user(user_id).await?;

        if !verify_password(current_password, &user.password_hash) {
            return Err(PmError::InvalidCredentials);
        }

        let mut errors = ValidationErrors::new();
        validate_password(new_password, &mut errors);
        errors.into_result()?;

        let password_hash = hash_password(new_password)?;
        self.users
            .update_password_hash(user_id, &password_hash)
            .await
    }

    /// Soft-delete a user. Outstanding tokens for the account stop
    /// authenticating on their next use because the filter re-looks-up the
    /// identity per decode.
    pub async fn deactivate(&self, user_id: Id) -> PmResult<()> {
        self.require_user(user_id).await?;
        self.users.deactivate(user_id).await
    }

    pub async fn get_user(&self, user_id: Id) -> PmResult<User> {
        self.require_user(user_id).await
    }

    /// Update profile fields; an email change re-checks uniqueness
    pub async fn update_profile(
        &self,
        user_id: Id,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> PmResult<User> {
        let user = self.require_user(user_id).await?;

        let mut errors = ValidationErrors::new();
        if first_name.trim().is_empty() {
            errors.add("firstName", "is required");
        }
        if last_name.trim().is_empty() {
            errors.add("lastName", "is required");
        }
        let email = normalize_email(email);
        validate_email(&email, &mut errors);
        errors.into_result()?;

        if email != user.email && self.users.email_exists(&email).await? {
            return Err(PmError::DuplicateEmail { email });
        }

        self.users
            .update_profile(
                user_id,
                ProfileUpdate {
                    first_name: first_name.trim().to_string(),
                    last_name: last_name.trim().to_string(),
                    email,
                },
            )
            .await
    }

    pub async fn list_active_users(&self) -> PmResult<Vec<User>> {
        self.users.list_active().await
    }

    /// Search active users by name; a blank term lists everyone
    pub async fn search_users(&self, term: &str) -> PmResult<Vec<User>> {
        let term = term.trim();
        if term.is_empty() {
            self.users.list_active().await
        } else {
            self.users.search_by_name(term).await
        }
    }

    pub async fn count_active_users(&self) -> PmResult<u64> {
        self.users.count_active().await
    }

    /// Whether an email (case-insensitively) is still free
    pub async fn email_available(&self, email: &str) -> PmResult<bool> {
        Ok(!self.users.email_exists(&normalize_email(email)).await?)
    }

    async fn require_user(&self, user_id: Id) -> PmResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PmError::not_found("user", "id", user_id))
    }

    fn issue_token(&self, user: &User) -> PmResult<String> {
        let claims = ClaimSet {
            user_id: user.id,
            role: user.role.to_string(),
            full_name: user.full_name(),
            extra: Default::default(),
        };
        Ok(self.codec.issue(&user.email, claims, self.token_ttl_secs)?)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str, errors: &mut ValidationErrors) {
    if email.is_empty() {
        errors.add("email", "is required");
    } else if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        errors.add("email", "is not a valid email address");
    }
}

fn validate_password(password: &str, errors: &mut ValidationErrors) {
    if password.len() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        );
    }
}

fn validate_registration(params: &RegisterParams) -> PmResult<()> {
    let mut errors = ValidationErrors::new();

    if params.first_name.trim().is_empty() {
        errors.add("firstName", "is required");
    }
    if params.last_name.trim().is_empty() {
        errors.add("lastName", "is required");
    }
    validate_email(&normalize_email(&params.email), &mut errors);
    validate_password(&params.password, &mut errors);
    if params.password != params.confirm_password {
        errors.add("confirmPassword", "does not match password");
    }

    errors.into_result()
}
