//! Request validation: all validators run, all violations aggregate.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use causeway_core::error::CoreError;

use crate::behavior::{BoxedResponse, Exchange, Next, PipelineBehavior};
use crate::request::Request;

/// Validates one request type. Closures `Fn(&R) -> Result<(), Vec<String>>`
/// implement this via the blanket impl below.
pub trait Validator<R: Request>: Send + Sync {
    /// Returns every violation found, or `Ok` for a clean request.
    ///
    /// # Errors
    ///
    /// The `Err` list holds human-readable violation messages.
    fn validate(&self, request: &R) -> Result<(), Vec<String>>;
}

impl<R, F> Validator<R> for F
where
    R: Request,
    F: Fn(&R) -> Result<(), Vec<String>> + Send + Sync,
{
    fn validate(&self, request: &R) -> Result<(), Vec<String>> {
        self(request)
    }
}

type ErasedValidator = Box<dyn Fn(&dyn Any) -> Vec<String> + Send + Sync>;

/// Validators keyed by request type, erased at registration.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: HashMap<TypeId, Vec<ErasedValidator>>,
}

impl ValidatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validator for `R`. A request type may carry any number of
    /// validators; all of them run on every send.
    pub fn add<R: Request>(&mut self, validator: impl Validator<R> + 'static) {
        self.validators
            .entry(TypeId::of::<R>())
            .or_default()
            .push(Box::new(move |any| {
                any.downcast_ref::<R>()
                    .map(|request| validator.validate(request).err().unwrap_or_default())
                    .unwrap_or_default()
            }));
    }

    fn violations(&self, request_type: TypeId, request: &dyn Any) -> Vec<String> {
        self.validators
            .get(&request_type)
            .map(|validators| {
                validators
                    .iter()
                    .flat_map(|validator| validator(request))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Runs every validator registered for the request type and aggregates the
/// violations; on any violation the handler never runs.
pub struct ValidationBehavior {
    registry: Arc<ValidatorRegistry>,
}

impl ValidationBehavior {
    /// Wires the behavior over a finished registry.
    #[must_use]
    pub fn new(registry: Arc<ValidatorRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl PipelineBehavior for ValidationBehavior {
    async fn handle(
        &self,
        exchange: &Exchange,
        next: Next<'_>,
    ) -> Result<BoxedResponse, CoreError> {
        let request = exchange.request().as_any();
        let violations = self.registry.violations(request.type_id(), request);
        if violations.is_empty() {
            next.run(exchange).await
        } else {
            Err(CoreError::Validation(violations))
        }
    }
}
