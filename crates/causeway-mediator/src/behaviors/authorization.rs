//! Claim-based authorization ahead of the handler.

use std::sync::Arc;

use async_trait::async_trait;

use causeway_core::error::CoreError;

use crate::behavior::{BoxedResponse, Exchange, Next, PipelineBehavior};
use crate::request::AuthorizationClaim;

/// Decides whether a claim is allowed. Implemented by the host application.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns `true` when the subject may perform the claimed action.
    ///
    /// # Errors
    ///
    /// Returns an error when the decision itself cannot be made, for
    /// example when a policy store is unreachable.
    async fn authorize(&self, claim: &AuthorizationClaim) -> Result<bool, CoreError>;
}

/// Rejects requests whose claim the authorizer denies. Requests without a
/// claim pass through untouched.
pub struct AuthorizationBehavior {
    authorizer: Arc<dyn Authorizer>,
}

impl AuthorizationBehavior {
    #[must_use]
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }
}

#[async_trait]
impl PipelineBehavior for AuthorizationBehavior {
    async fn handle(
        &self,
        exchange: &Exchange,
        next: Next<'_>,
    ) -> Result<BoxedResponse, CoreError> {
        if let Some(claim) = exchange.request().authorization_claim() {
            let allowed = self.authorizer.authorize(&claim).await?;
            if !allowed {
                tracing::warn!(
                    subject = %claim.subject,
                    action = %claim.action,
                    resource = %claim.resource,
                    "request denied"
                );
                return Err(CoreError::Authorization(format!(
                    "{} may not {} on {}",
                    claim.subject, claim.action, claim.resource
                )));
            }
        }
        next.run(exchange).await
    }
}
