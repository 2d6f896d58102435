// src/services/auth_service.rs

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::Error as JwtError, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, DateTime};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::Collection;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AuthConfig;
use crate::error::ApiResult;
use crate::models::token::{TokenKind, TokenRecord};
use crate::models::user::{Role, UserModel};

/// Lifetime of an email verification link.
pub const VERIFICATION_TOKEN_HOURS: i64 = 24;
/// Lifetime of a password reset token.
pub const RESET_TOKEN_HOURS: i64 = 1;

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// JWT claims carried by access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id (ObjectId hex).
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: usize,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
}

/// Verifies a plain password against a hashed password.
pub fn verify_password(plain_password: &str, hashed_password: &str) -> bool {
    verify(plain_password, hashed_password).unwrap_or(false)
}

/// Hashes a password using bcrypt.
pub fn get_password_hash(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Random alphanumeric string used for verification, reset and refresh tokens.
pub fn generate_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// `DateTime` `delta` from now.
pub fn expires_in(delta: Duration) -> DateTime {
    DateTime::from_millis((Utc::now() + delta).timestamp_millis())
}

/// Creates an access token (JWT) for the user. Returns the token and its expiry timestamp.
pub fn create_access_token(auth: &AuthConfig, user: &UserModel) -> Result<(String, usize), JwtError> {
    let now = Utc::now();
    let expire = now + Duration::minutes(auth.access_token_minutes);
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp() as usize,
        exp: expire.timestamp() as usize,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret_key.as_ref()))?;
    Ok((token, claims.exp))
}

/// Verifies a JWT token and returns the decoded claims if valid.
pub fn verify_jwt_token(auth: &AuthConfig, token: &str) -> Result<Claims, JwtError> {
    let validation = Validation::default();
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(auth.secret_key.as_ref()), &validation)?;
    Ok(token_data.claims)
}

/// Retrieves a user from the MongoDB collection by email.
pub async fn get_user(collection: &Collection<UserModel>, email: &str) -> mongodb::error::Result<Option<UserModel>> {
    collection.find_one(doc! { "email": email.to_lowercase() }, None).await
}

pub async fn get_user_by_id(collection: &Collection<UserModel>, id: &str) -> mongodb::error::Result<Option<UserModel>> {
    collection.find_one(doc! { "_id": id }, None).await
}

/// True when a write was rejected by a unique index.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

/// Hashes the password held in `hashed_password` and inserts the user.
/// Returns `None` when the email is already taken.
pub async fn create_user(collection: &Collection<UserModel>, mut user: UserModel) -> ApiResult<Option<UserModel>> {
    user.hashed_password = get_password_hash(&user.hashed_password)?;
    user.email_verified = false;
    match collection.insert_one(&user, None).await {
        Ok(_) => Ok(Some(user)),
        Err(e) if is_duplicate_key(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Stores a fresh verification token on the user and returns it.
pub async fn set_verification_token(collection: &Collection<UserModel>, user_id: &str) -> mongodb::error::Result<String> {
    let token = generate_token(32);
    collection
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": {
                "verification_token": token.as_str(),
                "verification_expires": expires_in(Duration::hours(VERIFICATION_TOKEN_HOURS)),
                "updated_at": DateTime::now(),
            } },
            None,
        )
        .await?;
    Ok(token)
}

/// Marks the owner of an unexpired verification token as verified.
/// Returns `false` when no user holds the token.
pub async fn verify_email_token(collection: &Collection<UserModel>, token: &str) -> mongodb::error::Result<bool> {
    let filter = doc! {
        "verification_token": token,
        "verification_expires": { "$gt": DateTime::now() },
    };
    let update = doc! {
        "$set": { "email_verified": true, "updated_at": DateTime::now() },
        "$unset": { "verification_token": "", "verification_expires": "" }
    };
    let update_result = collection.update_one(filter, update, None).await?;
    Ok(update_result.modified_count > 0)
}

/// Stores a reset token on the user with this email and returns it.
pub async fn set_reset_token(collection: &Collection<UserModel>, email: &str) -> mongodb::error::Result<String> {
    let token = generate_token(40);
    collection
        .update_one(
            doc! { "email": email.to_lowercase() },
            doc! { "$set": {
                "reset_token": token.as_str(),
                "reset_expires": expires_in(Duration::hours(RESET_TOKEN_HOURS)),
                "updated_at": DateTime::now(),
            } },
            None,
        )
        .await?;
    Ok(token)
}

/// Finds the user holding an unexpired reset token.
pub async fn find_by_reset_token(collection: &Collection<UserModel>, token: &str) -> mongodb::error::Result<Option<UserModel>> {
    let filter = doc! { "reset_token": token, "reset_expires": { "$gt": DateTime::now() } };
    collection.find_one(filter, None).await
}

/// Replaces the password hash and drops any pending reset token.
pub async fn update_password(collection: &Collection<UserModel>, user_id: &str, new_password: &str) -> ApiResult<bool> {
    let hashed_password = get_password_hash(new_password)?;
    let update = doc! {
        "$set": { "hashed_password": hashed_password, "updated_at": DateTime::now() },
        "$unset": { "reset_token": "", "reset_expires": "" }
    };
    let update_result = collection.update_one(doc! { "_id": user_id }, update, None).await?;
    Ok(update_result.matched_count > 0)
}

/// Issues an access token plus a stored refresh token and returns them as the
/// JSON fields of a session reply.
pub async fn issue_session(tokens: &Collection<TokenRecord>, auth: &AuthConfig, user: &UserModel) -> ApiResult<Value> {
    let (access_token, exp) = create_access_token(auth, user)?;
    let refresh_token = generate_token(64);
    let record = TokenRecord::new(
        refresh_token.clone(),
        TokenKind::Refresh,
        user.id.clone(),
        expires_in(Duration::days(auth.refresh_token_days)),
    );
    tokens.insert_one(&record, None).await?;

    Ok(json!({
        "accessToken": access_token,
        "refreshToken": refresh_token,
        "tokenType": "bearer",
        "expiresAt": exp,
    }))
}

pub async fn find_refresh_token(tokens: &Collection<TokenRecord>, token: &str) -> mongodb::error::Result<Option<TokenRecord>> {
    tokens
        .find_one(doc! { "token": token, "kind": TokenKind::Refresh.as_str() }, None)
        .await
}

pub async fn delete_token(tokens: &Collection<TokenRecord>, token: &str) -> mongodb::error::Result<u64> {
    Ok(tokens.delete_one(doc! { "token": token }, None).await?.deleted_count)
}

pub async fn delete_refresh_tokens(tokens: &Collection<TokenRecord>, user_id: &str) -> mongodb::error::Result<u64> {
    let result = tokens
        .delete_many(doc! { "user_id": user_id, "kind": TokenKind::Refresh.as_str() }, None)
        .await?;
    Ok(result.deleted_count)
}

/// Records an access token as revoked until it would have expired anyway.
pub async fn revoke_access_token(tokens: &Collection<TokenRecord>, token: &str, user_id: &str, exp: usize) -> mongodb::error::Result<()> {
    let record = TokenRecord::new(
        token.to_string(),
        TokenKind::Revoked,
        user_id.to_string(),
        DateTime::from_millis(exp as i64 * 1000),
    );
    tokens.insert_one(&record, None).await?;
    Ok(())
}

pub async fn is_token_revoked(tokens: &Collection<TokenRecord>, token: &str) -> mongodb::error::Result<bool> {
    let found = tokens
        .find_one(doc! { "token": token, "kind": TokenKind::Revoked.as_str() }, None)
        .await?;
    Ok(found.is_some())
}
