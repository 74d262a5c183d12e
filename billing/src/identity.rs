use async_trait::async_trait;

use common::error::Res;

/// Source of a user's contact email. Backed by the application's user store;
/// resolution treats lookup failures as "no email on file".
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_email(&self, user_id: &str) -> Res<Option<String>>;
}
