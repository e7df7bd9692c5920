// src/services/cascade.rs
//
// Ordered fallback resolution. A cascade is a list of attempts tried in the
// order they were declared; the first one that yields a present value wins
// and nothing after it is invoked. Errors inside an attempt never escape.

use crate::models::TimeSeries;
use crate::BoxError;
use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

pub type AttemptFuture<'a, T> = Pin<Box<dyn Future<Output = Result<Option<T>, BoxError>> + 'a>>;
type Producer<'a, T> = Box<dyn FnOnce() -> AttemptFuture<'a, T> + 'a>;

/// Precedence layers, in the order a complete cascade visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLayer {
    Local,
    PrimaryRemote,
    FallbackRemote,
    LastKnown,
    Override,
    StaticDefault,
}

impl SourceLayer {
    pub fn requires_network(self) -> bool {
        matches!(self, SourceLayer::PrimaryRemote | SourceLayer::FallbackRemote)
    }

    /// Layers whose value came from real data rather than an operator
    /// setting or a placeholder. Only these refresh last-good caches.
    pub fn is_fetched(self) -> bool {
        matches!(
            self,
            SourceLayer::Local | SourceLayer::PrimaryRemote | SourceLayer::FallbackRemote
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceLayer::Local => "local",
            SourceLayer::PrimaryRemote => "primary-remote",
            SourceLayer::FallbackRemote => "fallback-remote",
            SourceLayer::LastKnown => "last-known",
            SourceLayer::Override => "override",
            SourceLayer::StaticDefault => "static-default",
        }
    }
}

impl fmt::Display for SourceLayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a produced value counts as a usable result.
pub trait Present {
    fn is_present(&self) -> bool;
}

impl Present for f64 {
    fn is_present(&self) -> bool {
        self.is_finite()
    }
}

impl Present for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Present for TimeSeries {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Present for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

pub struct SourceAttempt<'a, T> {
    pub label: String,
    pub layer: SourceLayer,
    pub requires_network: bool,
    producer: Producer<'a, T>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Won,
    Empty,
    Abstained(String),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct AttemptLog {
    pub label: String,
    pub layer: SourceLayer,
    pub outcome: AttemptOutcome,
}

#[derive(Debug)]
pub struct Resolved<T> {
    pub value: Option<T>,
    pub label: Option<String>,
    pub layer: Option<SourceLayer>,
    pub trail: Vec<AttemptLog>,
}

impl<T> Resolved<T> {
    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    /// The value, if it won at a fetched layer.
    pub fn fetched(&self) -> Option<&T> {
        match self.layer {
            Some(layer) if layer.is_fetched() => self.value.as_ref(),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (Option<T>, Option<String>) {
        (self.value, self.label)
    }
}

pub struct Cascade<'a, T> {
    name: String,
    offline: bool,
    attempts: Vec<SourceAttempt<'a, T>>,
}

impl<'a, T: Present + 'a> Cascade<'a, T> {
    pub fn new(name: impl Into<String>) -> Self {
        Cascade {
            name: name.into(),
            offline: false,
            attempts: Vec::new(),
        }
    }

    /// Offline cascades skip network attempts without invoking them.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn attempt<F, Fut>(mut self, label: impl Into<String>, layer: SourceLayer, producer: F) -> Self
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = Result<Option<T>, BoxError>> + 'a,
    {
        let producer: Producer<'a, T> = Box::new(move || Box::pin(producer()) as AttemptFuture<'a, T>);
        self.attempts.push(SourceAttempt {
            label: label.into(),
            layer,
            requires_network: layer.requires_network(),
            producer,
        });
        self
    }

    /// A layer whose value is already known (override or static default).
    pub fn constant(self, label: impl Into<String>, layer: SourceLayer, value: Option<T>) -> Self {
        self.attempt(label, layer, move || async move { Ok(value) })
    }

    pub async fn resolve(self) -> Resolved<T> {
        let mut trail = Vec::with_capacity(self.attempts.len());

        for attempt in self.attempts {
            if self.offline && attempt.requires_network {
                debug!("[{}] skipping {} (offline)", self.name, attempt.label);
                trail.push(AttemptLog {
                    label: attempt.label,
                    layer: attempt.layer,
                    outcome: AttemptOutcome::Skipped,
                });
                continue;
            }

            let outcome = match (attempt.producer)().await {
                Ok(Some(value)) if value.is_present() => {
                    info!(
                        "[{}] resolved via {} ({})",
                        self.name, attempt.label, attempt.layer
                    );
                    trail.push(AttemptLog {
                        label: attempt.label.clone(),
                        layer: attempt.layer,
                        outcome: AttemptOutcome::Won,
                    });
                    return Resolved {
                        value: Some(value),
                        label: Some(attempt.label),
                        layer: Some(attempt.layer),
                        trail,
                    };
                }
                Ok(_) => {
                    debug!("[{}] {} produced nothing", self.name, attempt.label);
                    AttemptOutcome::Empty
                }
                Err(e) => {
                    warn!("[{}] {} failed: {}", self.name, attempt.label, e);
                    AttemptOutcome::Abstained(e.to_string())
                }
            };
            trail.push(AttemptLog {
                label: attempt.label,
                layer: attempt.layer,
                outcome,
            });
        }

        warn!("[{}] unresolved, every layer abstained", self.name);
        Resolved {
            value: None,
            label: None,
            layer: None,
            trail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tracked<'a>(
        calls: &Rc<RefCell<Vec<&'static str>>>,
        label: &'static str,
        result: Result<Option<f64>, &'static str>,
    ) -> impl FnOnce() -> AttemptFuture<'a, f64> {
        let calls = Rc::clone(calls);
        move || {
            calls.borrow_mut().push(label);
            Box::pin(async move { result.map_err(BoxError::from) })
        }
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let resolved = Cascade::new("test")
            .attempt("a", SourceLayer::Local, tracked(&calls, "a", Err("boom")))
            .attempt("b", SourceLayer::LastKnown, tracked(&calls, "b", Ok(None)))
            .attempt("c", SourceLayer::Override, tracked(&calls, "c", Ok(Some(0.7))))
            .attempt("d", SourceLayer::StaticDefault, tracked(&calls, "d", Ok(Some(0.1))))
            .resolve()
            .await;

        assert_eq!(*calls.borrow(), vec!["a", "b", "c"]);
        assert_eq!(resolved.layer, Some(SourceLayer::Override));
        assert_eq!(resolved.into_parts(), (Some(0.7), Some("c".to_string())));
    }

    #[tokio::test]
    async fn non_finite_values_are_treated_as_absent() {
        let resolved = Cascade::new("test")
            .constant("nan", SourceLayer::Local, Some(f64::NAN))
            .constant("fallback", SourceLayer::StaticDefault, Some(0.3))
            .resolve()
            .await;
        assert_eq!(resolved.label.as_deref(), Some("fallback"));
        assert_eq!(resolved.trail[0].outcome, AttemptOutcome::Empty);
    }

    #[tokio::test]
    async fn all_abstain_yields_nothing() {
        let resolved: Resolved<f64> = Cascade::new("test")
            .attempt("a", SourceLayer::PrimaryRemote, || async { Err("down".into()) })
            .constant("default", SourceLayer::StaticDefault, None)
            .resolve()
            .await;
        assert!(!resolved.is_resolved());
        assert_eq!(resolved.into_parts(), (None, None));
    }

    #[tokio::test]
    async fn offline_skips_network_layers_without_invoking_them() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let resolved = Cascade::new("test")
            .offline(true)
            .attempt("remote", SourceLayer::PrimaryRemote, tracked(&calls, "remote", Ok(Some(1.0))))
            .attempt("cache", SourceLayer::LastKnown, tracked(&calls, "cache", Ok(Some(2.0))))
            .resolve()
            .await;
        assert_eq!(*calls.borrow(), vec!["cache"]);
        assert_eq!(resolved.value, Some(2.0));
        assert_eq!(resolved.trail[0].outcome, AttemptOutcome::Skipped);
    }

    #[tokio::test]
    async fn same_inputs_pick_same_winner() {
        for _ in 0..3 {
            let resolved = Cascade::new("test")
                .attempt("a", SourceLayer::Local, || async { Ok(None) })
                .constant("b", SourceLayer::Override, Some(0.55))
                .resolve()
                .await;
            assert_eq!(resolved.into_parts(), (Some(0.55), Some("b".to_string())));
        }
    }

    #[tokio::test]
    async fn only_fetched_layers_count_as_fetched() {
        let fetched = Cascade::new("test")
            .constant("local", SourceLayer::Local, Some(0.4))
            .resolve()
            .await;
        assert_eq!(fetched.fetched(), Some(&0.4));

        for layer in [SourceLayer::LastKnown, SourceLayer::Override, SourceLayer::StaticDefault] {
            let resolved = Cascade::new("test")
                .constant("x", layer, Some(0.4))
                .resolve()
                .await;
            assert_eq!(resolved.value, Some(0.4));
            assert_eq!(resolved.fetched(), None);
        }
    }
}
