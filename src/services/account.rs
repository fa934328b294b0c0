// src/services/account.rs

use serde::Serialize;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::user::{CreateUserRequest, LoginRequest, ROLE_ADMIN, ROLE_USER, User},
    repositories::Store,
    utils::{
        jwt::sign_jwt,
        password::{hash_password, verify_password},
    },
};

/// Login response body.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub role: String,
}

/// Registration, login and the bootstrap admin account.
#[derive(Clone)]
pub struct AccountService {
    store: Store,
    config: Config,
}

impl AccountService {
    pub fn new(store: Store, config: Config) -> Self {
        Self { store, config }
    }

    /// Registers a regular user. The password is stored as an Argon2 hash.
    pub async fn register(&self, req: CreateUserRequest) -> AppResult<User> {
        req.validate()?;

        let hashed = hash_password(&req.password)?;
        let user = self
            .store
            .users
            .create(&req.username, &hashed, ROLE_USER)
            .await?;

        tracing::info!(user_id = user.id, "user registered");
        Ok(user)
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<TokenResponse> {
        req.validate()?;

        let user = self
            .store
            .users
            .find_by_username(&req.username)
            .await?
            .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

        if !verify_password(&req.password, &user.password)? {
            tracing::warn!(username = %req.username, "login failed");
            return Err(AppError::AuthError("Invalid username or password".to_string()));
        }

        let token = sign_jwt(
            user.id,
            &user.role,
            &self.config.jwt_secret,
            self.config.jwt_expiration,
        )?;

        Ok(TokenResponse {
            token,
            token_type: "Bearer",
            role: user.role,
        })
    }

    /// Creates the configured admin account if it does not exist yet.
    pub async fn seed_admin(&self) -> AppResult<()> {
        let (Some(username), Some(password)) =
            (&self.config.admin_username, &self.config.admin_password)
        else {
            return Ok(());
        };

        if self.store.users.find_by_username(username).await?.is_some() {
            return Ok(());
        }

        tracing::info!("Seeding admin user: {}", username);
        let hashed = hash_password(password)?;
        self.store.users.create(username, &hashed, ROLE_ADMIN).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::jwt::verify_jwt;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: "unit_test_secret".into(),
            jwt_expiration: 600,
            rust_log: "error".into(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            admin_username: Some("root".into()),
            admin_password: Some("rootpass".into()),
        }
    }

    fn credentials(username: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let service = AccountService::new(Store::in_memory(), config());

        let user = service.register(credentials("carol", "secret1")).await.unwrap();
        assert_eq!(user.role, ROLE_USER);
        assert_ne!(user.password, "secret1");

        let token = service
            .login(LoginRequest {
                username: "carol".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        assert_eq!(token.token_type, "Bearer");

        let claims = verify_jwt(&token.token, "unit_test_secret").unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert!(!claims.is_admin());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let service = AccountService::new(Store::in_memory(), config());
        service.register(credentials("dave", "secret1")).await.unwrap();

        assert!(matches!(
            service.register(credentials("dave", "other12")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let service = AccountService::new(Store::in_memory(), config());
        service.register(credentials("erin", "secret1")).await.unwrap();

        let err = service
            .login(LoginRequest {
                username: "erin".into(),
                password: "nope".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn seed_admin_is_idempotent() {
        let store = Store::in_memory();
        let service = AccountService::new(store.clone(), config());

        service.seed_admin().await.unwrap();
        service.seed_admin().await.unwrap();

        assert_eq!(store.users.count().await.unwrap(), 1);
        let admin = store.users.find_by_username("root").await.unwrap().unwrap();
        assert_eq!(admin.role, ROLE_ADMIN);
    }
}
