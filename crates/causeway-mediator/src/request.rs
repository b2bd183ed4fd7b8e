//! Request abstractions.

use std::any::Any;

/// Whether a request mutates state. Only commands get a transaction scope
/// and saga triggering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Mutating request.
    Command,
    /// Read-only request.
    Query,
}

/// The subject/action/resource triple an authorizable request declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationClaim {
    /// Who is asking.
    pub subject: String,
    /// What they want to do.
    pub action: String,
    /// What they want to do it to.
    pub resource: String,
}

/// Trait that all commands and queries implement.
pub trait Request: Send + Sync + 'static {
    /// The handler's result type for this request.
    type Response: Send + 'static;

    /// Command or query.
    fn kind() -> RequestKind;

    /// Stable request name for logs and audit records.
    fn name() -> &'static str;

    /// Authorization claim, for requests subject to an access check.
    /// `None` (the default) passes through the authorization behavior.
    fn authorization(&self) -> Option<AuthorizationClaim> {
        None
    }

    /// Snapshot serialized into audit records. Defaults to `null`; requests
    /// carrying sensitive fields leave them out here.
    fn audit_payload(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Object-safe view of a request, used by behaviors and the saga trigger.
pub trait ErasedRequest: Send + Sync {
    /// See [`Request::name`].
    fn request_name(&self) -> &'static str;
    /// See [`Request::kind`].
    fn request_kind(&self) -> RequestKind;
    /// See [`Request::authorization`].
    fn authorization_claim(&self) -> Option<AuthorizationClaim>;
    /// See [`Request::audit_payload`].
    fn audit_payload(&self) -> serde_json::Value;
    /// Downcasting hook for typed consumers.
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

impl<R: Request> ErasedRequest for R {
    fn request_name(&self) -> &'static str {
        R::name()
    }

    fn request_kind(&self) -> RequestKind {
        R::kind()
    }

    fn authorization_claim(&self) -> Option<AuthorizationClaim> {
        self.authorization()
    }

    fn audit_payload(&self) -> serde_json::Value {
        Request::audit_payload(self)
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }
}
