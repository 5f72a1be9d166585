//! Name resolution and realization
//!
//! Walks parsed [`ActionRule`]s, resolves module and symbol references
//! against the network, partially evaluates each effect expression —
//! folding all-constant subtrees through the binding algebra at compile
//! time — and decides how every term is realized:
//!
//! - a bare module of the target's dimensionality → direct route;
//! - a bind with a compile-time-constant operand → one linear transform
//!   (the constant's circulant matrix) on the variable operand;
//! - a bind of two module outputs → a two-input binding network, flagged
//!   distinctly for the downstream builder;
//! - an inversion → the involution permutation composed onto whatever
//!   transform the term already produces;
//! - a `translate(...)` → a cross-vocabulary translation matrix composed
//!   the same way.
//!
//! Same-target contributions from every rule of the batch merge into one
//! weighted-sum specification. Any resolution error aborts the batch.

use tracing::{debug, trace};

use crate::algebra::{self, LinearMap, SemanticPointer};
use crate::compiler::{
    ActionRule, ConnectionPlan, ConnectionSpec, Expr, ModuleTap, SignalSource,
};
use crate::network::Network;
use crate::translation::{self, TranslationMap};
use crate::vocabulary::SharedVocabulary;
use crate::{ActionError, Result};

/// Resolve a batch of rules into a merged connection plan.
pub(crate) fn resolve(network: &Network, rules: &[ActionRule]) -> Result<ConnectionPlan> {
    let mut plan = ConnectionPlan::default();
    for rule in rules {
        let module = network.module(&rule.target)?;
        let target_dims = module.dimensions();
        let vocab = module.vocabulary();
        trace!(target_module = %rule.target, "resolving rule");
        let value = evaluate(network, &rule.effect, &vocab)?;
        push_contributions(network, &mut plan, &rule.target, target_dims, value)?;
    }
    debug!(targets = plan.len(), "resolved action batch");
    Ok(plan)
}

/// A module output routed through an optional pre-transform.
#[derive(Debug, Clone)]
struct Route {
    module: String,
    transform: Option<LinearMap>,
}

impl Route {
    fn tap(self) -> ModuleTap {
        ModuleTap {
            module: self.module,
            transform: self.transform,
        }
    }
}

/// Partially evaluated expression value.
#[derive(Debug, Clone)]
enum Value {
    /// A pure scalar weight.
    Scalar(f64),
    /// A compile-time constant vector.
    Constant(SemanticPointer),
    /// A single module signal.
    Routed { route: Route, gain: f64 },
    /// A runtime binding of two module signals, optionally post-transformed.
    Product {
        a: Route,
        b: Route,
        transform: Option<LinearMap>,
        gain: f64,
    },
    /// A superposition of values.
    Sum(Vec<Value>),
}

fn evaluate(network: &Network, expr: &Expr, vocab: &SharedVocabulary) -> Result<Value> {
    match expr {
        Expr::Symbol(name) => Ok(Value::Constant(vocab.write().entry(name)?)),
        Expr::Scalar(value) => Ok(Value::Scalar(*value)),
        Expr::Module(name) => {
            network.module(name)?;
            Ok(Value::Routed {
                route: Route {
                    module: name.clone(),
                    transform: None,
                },
                gain: 1.0,
            })
        }
        Expr::Invert(inner) => invert_value(network, evaluate(network, inner, vocab)?),
        Expr::Bind(left, right) => {
            let left = evaluate(network, left, vocab)?;
            let right = evaluate(network, right, vocab)?;
            bind_values(network, left, right)
        }
        Expr::Sum(left, right) => {
            let mut terms = Vec::new();
            flatten_sum(evaluate(network, left, vocab)?, &mut terms);
            flatten_sum(evaluate(network, right, vocab)?, &mut terms);
            Ok(Value::Sum(terms))
        }
        Expr::Translate { expr, populate } => {
            let source_module = first_module(expr).ok_or_else(|| {
                ActionError::Unsupported("translate() requires a module operand".into())
            })?;
            let source_vocab = network.module(&source_module)?.vocabulary();
            let inner = evaluate(network, expr, &source_vocab)?;
            let map = lookup_translation(network, &source_vocab, vocab, *populate)?;
            apply_translation(network, inner, &map)
        }
    }
}

fn flatten_sum(value: Value, terms: &mut Vec<Value>) {
    match value {
        Value::Sum(inner) => terms.extend(inner),
        other => terms.push(other),
    }
}

/// The first module referenced in an expression, if any. Inside a
/// `translate(...)` this names the source vocabulary.
fn first_module(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Module(name) => Some(name.clone()),
        Expr::Symbol(_) | Expr::Scalar(_) => None,
        Expr::Invert(inner) => first_module(inner),
        Expr::Bind(left, right) | Expr::Sum(left, right) => {
            first_module(left).or_else(|| first_module(right))
        }
        Expr::Translate { expr, .. } => first_module(expr),
    }
}

/// Output dimensionality of a routed signal.
fn route_dims(network: &Network, route: &Route) -> Result<usize> {
    match &route.transform {
        Some(map) => Ok(map.rows()),
        None => Ok(network.module(&route.module)?.dimensions()),
    }
}

/// Output dimensionality of a binding product.
fn product_dims(network: &Network, a: &Route, transform: &Option<LinearMap>) -> Result<usize> {
    match transform {
        Some(map) => Ok(map.rows()),
        None => route_dims(network, a),
    }
}

/// Compose `outer` onto a route's existing transform, checking shapes.
fn pre_transform(network: &Network, route: &Route, outer: &LinearMap) -> Result<Route> {
    let dims = route_dims(network, route)?;
    algebra::check_dimensions(outer.cols(), dims)?;
    let transform = Some(match &route.transform {
        Some(inner) => outer.compose(inner)?,
        None => outer.clone(),
    });
    Ok(Route {
        module: route.module.clone(),
        transform,
    })
}

/// Compose `outer` onto a product's post-transform, checking shapes.
fn post_transform(
    network: &Network,
    a: &Route,
    transform: &Option<LinearMap>,
    outer: &LinearMap,
) -> Result<Option<LinearMap>> {
    let dims = product_dims(network, a, transform)?;
    algebra::check_dimensions(outer.cols(), dims)?;
    Ok(Some(match transform {
        Some(inner) => outer.compose(inner)?,
        None => outer.clone(),
    }))
}

fn invert_value(network: &Network, value: Value) -> Result<Value> {
    match value {
        // The involution of a scaled identity is itself.
        Value::Scalar(s) => Ok(Value::Scalar(s)),
        Value::Constant(v) => Ok(Value::Constant(algebra::involution(&v))),
        Value::Routed { route, gain } => {
            let dims = route_dims(network, &route)?;
            let route = pre_transform(network, &route, &LinearMap::involution(dims))?;
            Ok(Value::Routed { route, gain })
        }
        Value::Product {
            a,
            b,
            transform,
            gain,
        } => {
            let dims = product_dims(network, &a, &transform)?;
            let transform = post_transform(network, &a, &transform, &LinearMap::involution(dims))?;
            Ok(Value::Product {
                a,
                b,
                transform,
                gain,
            })
        }
        Value::Sum(terms) => {
            let inverted: Result<Vec<Value>> = terms
                .into_iter()
                .map(|t| invert_value(network, t))
                .collect();
            Ok(Value::Sum(inverted?))
        }
    }
}

fn bind_values(network: &Network, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        // Binding distributes over superposition.
        (Value::Sum(terms), other) | (other, Value::Sum(terms)) => {
            let bound: Result<Vec<Value>> = terms
                .into_iter()
                .map(|t| bind_values(network, t, other.clone()))
                .collect();
            Ok(Value::Sum(bound?))
        }

        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a * b)),
        (Value::Scalar(s), Value::Constant(v)) | (Value::Constant(v), Value::Scalar(s)) => {
            Ok(Value::Constant(v.scale(s)))
        }
        (Value::Scalar(s), Value::Routed { route, gain })
        | (Value::Routed { route, gain }, Value::Scalar(s)) => Ok(Value::Routed {
            route,
            gain: gain * s,
        }),
        (
            Value::Scalar(s),
            Value::Product {
                a,
                b,
                transform,
                gain,
            },
        )
        | (
            Value::Product {
                a,
                b,
                transform,
                gain,
            },
            Value::Scalar(s),
        ) => Ok(Value::Product {
            a,
            b,
            transform,
            gain: gain * s,
        }),

        (Value::Constant(x), Value::Constant(y)) => {
            Ok(Value::Constant(algebra::bind(&x, &y)?))
        }
        (Value::Constant(c), Value::Routed { route, gain })
        | (Value::Routed { route, gain }, Value::Constant(c)) => {
            let route = pre_transform(network, &route, &LinearMap::convolution(&c))?;
            Ok(Value::Routed { route, gain })
        }
        (
            Value::Constant(c),
            Value::Product {
                a,
                b,
                transform,
                gain,
            },
        )
        | (
            Value::Product {
                a,
                b,
                transform,
                gain,
            },
            Value::Constant(c),
        ) => {
            let transform =
                post_transform(network, &a, &transform, &LinearMap::convolution(&c))?;
            Ok(Value::Product {
                a,
                b,
                transform,
                gain,
            })
        }

        (
            Value::Routed {
                route: a,
                gain: gain_a,
            },
            Value::Routed {
                route: b,
                gain: gain_b,
            },
        ) => {
            let left_dims = route_dims(network, &a)?;
            let right_dims = route_dims(network, &b)?;
            algebra::check_dimensions(left_dims, right_dims)?;
            Ok(Value::Product {
                a,
                b,
                transform: None,
                gain: gain_a * gain_b,
            })
        }

        (Value::Product { .. }, _) | (_, Value::Product { .. }) => Err(ActionError::Unsupported(
            "binding more than two module outputs at runtime".into(),
        )),
    }
}

/// Locate or build the translation map between two vocabularies.
fn lookup_translation(
    network: &Network,
    source: &SharedVocabulary,
    target: &SharedVocabulary,
    populate: bool,
) -> Result<TranslationMap> {
    if std::sync::Arc::ptr_eq(source, target) {
        let dims = source.read().dimensions();
        return Ok(TranslationMap::identity(dims));
    }
    let source_dims = source.read().dimensions();
    let target_dims = target.read().dimensions();
    if let Some(map) = network.translation(source_dims, target_dims) {
        return Ok(map.clone());
    }
    if populate {
        return translation::resolve(source, target);
    }
    Err(ActionError::MissingTranslation {
        source: source_dims,
        target: target_dims,
    })
}

/// Route a value through a translation map into the target space.
fn apply_translation(network: &Network, value: Value, map: &TranslationMap) -> Result<Value> {
    match value {
        Value::Scalar(_) => Err(ActionError::Unsupported(
            "translate() requires a module operand".into(),
        )),
        Value::Constant(v) => Ok(Value::Constant(map.apply(&v)?)),
        Value::Routed { route, gain } => {
            let route = pre_transform(network, &route, map.linear_map())?;
            Ok(Value::Routed { route, gain })
        }
        Value::Product {
            a,
            b,
            transform,
            gain,
        } => {
            let transform = post_transform(network, &a, &transform, map.linear_map())?;
            Ok(Value::Product {
                a,
                b,
                transform,
                gain,
            })
        }
        Value::Sum(terms) => {
            let mapped: Result<Vec<Value>> = terms
                .into_iter()
                .map(|t| apply_translation(network, t, map))
                .collect();
            Ok(Value::Sum(mapped?))
        }
    }
}

/// Turn a resolved value into weighted connection specs, checking that
/// every contribution lands in the target's space.
fn push_contributions(
    network: &Network,
    plan: &mut ConnectionPlan,
    target: &str,
    target_dims: usize,
    value: Value,
) -> Result<()> {
    match value {
        Value::Scalar(s) => plan.push(
            target,
            ConnectionSpec {
                source: SignalSource::Constant(algebra::identity(target_dims).scale(s)),
                weight: 1.0,
            },
        ),
        Value::Constant(v) => {
            algebra::check_dimensions(v.dimensions(), target_dims)?;
            plan.push(
                target,
                ConnectionSpec {
                    source: SignalSource::Constant(v),
                    weight: 1.0,
                },
            )
        }
        Value::Routed { route, gain } => {
            let dims = route_dims(network, &route)?;
            if dims != target_dims {
                return Err(ActionError::MissingTranslation {
                    source: dims,
                    target: target_dims,
                });
            }
            plan.push(
                target,
                ConnectionSpec {
                    source: SignalSource::Module(route.tap()),
                    weight: gain,
                },
            )
        }
        Value::Product {
            a,
            b,
            transform,
            gain,
        } => {
            let dims = product_dims(network, &a, &transform)?;
            if dims != target_dims {
                return Err(ActionError::MissingTranslation {
                    source: dims,
                    target: target_dims,
                });
            }
            plan.push(
                target,
                ConnectionSpec {
                    source: SignalSource::BindingNetwork {
                        a: a.tap(),
                        b: b.tap(),
                        transform,
                    },
                    weight: gain,
                },
            )
        }
        Value::Sum(terms) => {
            for term in terms {
                push_contributions(network, plan, target, target_dims, term)?;
            }
            Ok(())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
