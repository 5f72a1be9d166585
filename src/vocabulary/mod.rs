//! Vocabularies: deterministic name → semantic pointer mapping
//!
//! A vocabulary owns every symbol of one dimensionality. Symbols are
//! generated lazily: the first time a name is referenced — by
//! [`Vocabulary::parse`], [`Vocabulary::populate`], or the action compiler —
//! a pointer is derived from SHA-256(seed ‖ name) feeding a ChaCha8 RNG and
//! memoized for the vocabulary's lifetime. The same name therefore ALWAYS
//! maps to the same vector within a vocabulary, and two vocabularies built
//! from the same seed agree on every symbol regardless of the order the
//! symbols were first touched.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::algebra::{self, SemanticPointer};
use crate::compiler::{parser, Expr};
use crate::{ActionError, Result};

/// How pointers for new symbols are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPolicy {
    /// Gaussian vector normalized to unit length.
    #[default]
    UnitNorm,
    /// Vector whose Fourier coefficients all have unit magnitude. Binding
    /// with such a pointer is exactly invertible by involution.
    Unitary,
}

/// A symbol table for one dimensionality.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    dimensions: usize,
    seed: u64,
    policy: GenerationPolicy,
    strict: bool,
    entries: HashMap<String, SemanticPointer>,
}

impl Vocabulary {
    /// Create a vocabulary with a seed drawn from OS entropy. Generation is
    /// stable within this instance's lifetime but differs across runs.
    pub fn new(dimensions: usize) -> Self {
        Self::with_seed(dimensions, rand::random::<u64>())
    }

    /// Create a vocabulary with an explicit seed. The same seed reproduces
    /// every symbol vector across runs and machines.
    pub fn with_seed(dimensions: usize, seed: u64) -> Self {
        Self {
            dimensions,
            seed,
            policy: GenerationPolicy::default(),
            strict: false,
            entries: HashMap::new(),
        }
    }

    /// Set the generation policy for symbols not yet created.
    pub fn with_policy(mut self, policy: GenerationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Vector dimensionality of every symbol in this vocabulary.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The generation seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of symbols currently defined.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no symbols are defined yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a symbol is already defined.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Defined symbol names, sorted for deterministic iteration.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up a defined symbol without creating it.
    pub fn get(&self, name: &str) -> Option<&SemanticPointer> {
        self.entries.get(name)
    }

    /// Make the vocabulary strict: referencing an unknown symbol becomes a
    /// [`ActionError::Name`] error instead of generating it.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Whether the vocabulary rejects auto-creation.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Get a symbol's pointer, generating and memoizing it on first use.
    ///
    /// Fails with [`ActionError::Name`] when the vocabulary is strict and
    /// the symbol is unknown.
    pub fn entry(&mut self, name: &str) -> Result<SemanticPointer> {
        if let Some(pointer) = self.entries.get(name) {
            return Ok(pointer.clone());
        }
        if self.strict {
            return Err(ActionError::Name {
                name: name.to_string(),
            });
        }
        let pointer = self.generate(name);
        trace!(symbol = name, dimensions = self.dimensions, "generated symbol");
        self.entries.insert(name.to_string(), pointer.clone());
        Ok(pointer)
    }

    /// Define a symbol explicitly.
    ///
    /// Re-adding an identical definition is a no-op; a conflicting one
    /// fails with [`ActionError::NameConflict`].
    pub fn add(&mut self, name: &str, pointer: SemanticPointer) -> Result<()> {
        algebra::check_dimensions(self.dimensions, pointer.dimensions())?;
        if let Some(existing) = self.entries.get(name) {
            let same = existing
                .data()
                .iter()
                .zip(pointer.data().iter())
                .all(|(a, b)| (a - b).abs() < 1e-10);
            if same {
                return Ok(());
            }
            return Err(ActionError::NameConflict {
                name: name.to_string(),
            });
        }
        self.entries.insert(name.to_string(), pointer);
        Ok(())
    }

    /// Batch-declare symbols from a semicolon-separated spec.
    ///
    /// Each declaration is either a bare name (`"A; B; C"`) or a definition
    /// by expression (`"D = A*B"`). Idempotent for identical definitions;
    /// a conflicting redefinition fails with [`ActionError::NameConflict`].
    pub fn populate(&mut self, spec: &str) -> Result<()> {
        for declaration in spec.split(';') {
            let declaration = declaration.trim();
            if declaration.is_empty() {
                continue;
            }
            match declaration.split_once('=') {
                Some((name, expression)) => {
                    let name = name.trim();
                    check_symbol_name(name)?;
                    let pointer = self.parse(expression)?;
                    self.add(name, pointer)?;
                }
                None => {
                    check_symbol_name(declaration)?;
                    if !self.contains(declaration) {
                        let pointer = self.generate(declaration);
                        self.entries.insert(declaration.to_string(), pointer);
                    }
                }
            }
        }
        Ok(())
    }

    /// Evaluate an algebraic expression over this vocabulary's symbols.
    ///
    /// The grammar is the rule right-hand-side grammar restricted to
    /// symbols and scalars: `*` binds, `+` superposes, prefix `~` inverts,
    /// parentheses group. A bare scalar `s` evaluates to `s` times the
    /// binding identity, so `"1"` is the identity vector and `"0"` the zero
    /// vector. Unknown symbols are auto-created unless the vocabulary is
    /// strict.
    pub fn parse(&mut self, expression: &str) -> Result<SemanticPointer> {
        let expr = parser::parse_expression(expression)?;
        self.evaluate(&expr)
    }

    /// Evaluate an already-parsed expression over this vocabulary.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<SemanticPointer> {
        match expr {
            Expr::Symbol(name) => self.entry(name),
            Expr::Scalar(value) => Ok(algebra::identity(self.dimensions).scale(*value)),
            Expr::Module(name) => Err(ActionError::Name {
                name: name.clone(),
            }),
            Expr::Invert(inner) => Ok(algebra::involution(&self.evaluate(inner)?)),
            Expr::Bind(left, right) => {
                algebra::bind(&self.evaluate(left)?, &self.evaluate(right)?)
            }
            Expr::Sum(left, right) => {
                algebra::superpose(&self.evaluate(left)?, &self.evaluate(right)?)
            }
            Expr::Translate { .. } => Err(ActionError::Unsupported(
                "translate() is not valid inside a vocabulary expression".into(),
            )),
        }
    }

    /// Derive the pointer for a name: SHA-256(seed ‖ name) seeds a ChaCha8
    /// RNG, which draws the vector under the generation policy.
    fn generate(&self, name: &str) -> SemanticPointer {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(name.as_bytes());
        let hash = hasher.finalize();
        let seed = u64::from_le_bytes(hash[0..8].try_into().expect("sha256 yields 32 bytes"));
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        match self.policy {
            GenerationPolicy::UnitNorm => {
                let data: Vec<f64> = (0..self.dimensions)
                    .map(|_| rng.sample::<f64, _>(StandardNormal))
                    .collect();
                SemanticPointer::new(data).normalized()
            }
            GenerationPolicy::Unitary => unitary_pointer(&mut rng, self.dimensions),
        }
    }
}

/// A vocabulary shared between modules and the compiler.
pub type SharedVocabulary = Arc<RwLock<Vocabulary>>;

/// Wrap a vocabulary for sharing.
pub fn shared(vocabulary: Vocabulary) -> SharedVocabulary {
    Arc::new(RwLock::new(vocabulary))
}

/// Synthesize a vector whose Fourier coefficients all have unit magnitude:
/// random phases with conjugate symmetry, inverted directly. Such a vector
/// has unit norm and binds exactly invertibly.
fn unitary_pointer(rng: &mut ChaCha8Rng, dimensions: usize) -> SemanticPointer {
    use std::f64::consts::TAU;

    let even = dimensions % 2 == 0;
    let dc: f64 = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    let nyquist: f64 = if even {
        if rng.gen_bool(0.5) {
            1.0
        } else {
            -1.0
        }
    } else {
        0.0
    };
    let free = if even {
        dimensions / 2 - 1
    } else {
        dimensions / 2
    };
    let phases: Vec<f64> = (0..free).map(|_| rng.gen_range(0.0..TAU)).collect();

    let mut data = vec![0.0; dimensions];
    for (n, slot) in data.iter_mut().enumerate() {
        let mut acc = dc;
        if even {
            acc += nyquist * if n % 2 == 0 { 1.0 } else { -1.0 };
        }
        for (i, &phase) in phases.iter().enumerate() {
            let k = (i + 1) as f64;
            acc += 2.0 * (TAU * k * n as f64 / dimensions as f64 + phase).cos();
        }
        *slot = acc / dimensions as f64;
    }
    SemanticPointer::new(data)
}

/// Symbol names start with an uppercase letter and continue with
/// alphanumerics or underscores.
fn check_symbol_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_alphanumeric() || c == '_');
    if !valid {
        return Err(ActionError::Config(format!(
            "symbol names start with an uppercase letter: '{}'",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{bind, identity, involution};

    // =========================================================================
    // Generation determinism
    // =========================================================================

    #[test]
    fn test_same_seed_same_vectors() {
        let mut v1 = Vocabulary::with_seed(32, 42);
        let mut v2 = Vocabulary::with_seed(32, 42);
        assert_eq!(v1.entry("Cat").unwrap(), v2.entry("Cat").unwrap());
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut v1 = Vocabulary::with_seed(32, 42);
        let mut v2 = Vocabulary::with_seed(32, 43);
        assert_ne!(v1.entry("Cat").unwrap(), v2.entry("Cat").unwrap());
    }

    #[test]
    fn test_generation_is_order_independent() {
        let mut v1 = Vocabulary::with_seed(32, 7);
        v1.entry("A").unwrap();
        v1.entry("B").unwrap();

        let mut v2 = Vocabulary::with_seed(32, 7);
        v2.entry("B").unwrap();
        v2.entry("A").unwrap();

        assert_eq!(v1.entry("A").unwrap(), v2.entry("A").unwrap());
        assert_eq!(v1.entry("B").unwrap(), v2.entry("B").unwrap());
    }

    #[test]
    fn test_memoized_not_regenerated() {
        let mut vocab = Vocabulary::with_seed(16, 1);
        let first = vocab.entry("A").unwrap();
        let second = vocab.entry("A").unwrap();
        assert_eq!(first, second);
        assert_eq!(vocab.len(), 1);
    }

    #[test]
    fn test_unit_norm_generation() {
        let mut vocab = Vocabulary::with_seed(64, 5);
        let a = vocab.entry("A").unwrap();
        assert!((a.norm() - 1.0).abs() < 1e-10);
    }

    // =========================================================================
    // Unitary policy
    // =========================================================================

    #[test]
    fn test_unitary_pointer_unit_norm() {
        for dims in [1, 2, 15, 16, 64] {
            let mut vocab =
                Vocabulary::with_seed(dims, 9).with_policy(GenerationPolicy::Unitary);
            let a = vocab.entry("A").unwrap();
            assert!((a.norm() - 1.0).abs() < 1e-10, "dims {}", dims);
        }
    }

    #[test]
    fn test_unitary_binding_exactly_invertible() {
        let mut vocab = Vocabulary::with_seed(32, 11).with_policy(GenerationPolicy::Unitary);
        let a = vocab.entry("A").unwrap();
        let unbound = bind(&a, &involution(&a)).unwrap();
        let id = identity(32);
        for k in 0..32 {
            assert!((unbound[k] - id[k]).abs() < 1e-10);
        }
    }

    // =========================================================================
    // Expression evaluation
    // =========================================================================

    #[test]
    fn test_parse_matches_direct_bind() {
        let mut vocab = Vocabulary::with_seed(32, 3);
        let parsed = vocab.parse("A*B").unwrap();
        let direct = bind(
            &vocab.get("A").unwrap().clone(),
            &vocab.get("B").unwrap().clone(),
        )
        .unwrap();
        assert!((parsed.cosine(&direct).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_precedence_and_parens() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        let a = vocab.entry("A").unwrap();
        let b = vocab.entry("B").unwrap();
        let c = vocab.entry("C").unwrap();

        let parsed = vocab.parse("A+B*C").unwrap();
        let expected = algebra::superpose(&a, &bind(&b, &c).unwrap()).unwrap();
        assert_eq!(parsed, expected);

        let parsed = vocab.parse("(A+B)*C").unwrap();
        let expected = bind(&algebra::superpose(&a, &b).unwrap(), &c).unwrap();
        for k in 0..16 {
            assert!((parsed[k] - expected[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_parse_invert() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        let a = vocab.entry("A").unwrap();
        let parsed = vocab.parse("~A").unwrap();
        assert_eq!(parsed, involution(&a));
    }

    #[test]
    fn test_parse_scalars() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        let one = vocab.parse("1").unwrap();
        assert_eq!(one, identity(16));
        let zero = vocab.parse("0").unwrap();
        assert_eq!(zero, SemanticPointer::zeros(16));

        // Binding with a scaled identity scales the operand.
        let a = vocab.entry("A").unwrap();
        let scaled = vocab.parse("2*A").unwrap();
        for k in 0..16 {
            assert!((scaled[k] - 2.0 * a[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_parse_module_reference_is_name_error() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        let err = vocab.parse("buffer1").unwrap_err();
        assert_eq!(err.name(), Some("buffer1"));
    }

    #[test]
    fn test_parse_auto_populates() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        assert!(!vocab.contains("New"));
        vocab.parse("New*Old").unwrap();
        assert!(vocab.contains("New"));
        assert!(vocab.contains("Old"));
    }

    // =========================================================================
    // Strict mode
    // =========================================================================

    #[test]
    fn test_strict_rejects_unknown() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        vocab.populate("A").unwrap();
        vocab.set_strict(true);
        assert!(vocab.parse("A").is_ok());
        let err = vocab.parse("B").unwrap_err();
        assert_eq!(err.name(), Some("B"));
    }

    // =========================================================================
    // Populate
    // =========================================================================

    #[test]
    fn test_populate_bare_names() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        vocab.populate("A; B; C").unwrap();
        assert_eq!(vocab.len(), 3);
        assert!(vocab.contains("A") && vocab.contains("B") && vocab.contains("C"));
    }

    #[test]
    fn test_populate_idempotent() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        vocab.populate("A; B").unwrap();
        let a = vocab.get("A").unwrap().clone();
        vocab.populate("A; B").unwrap();
        assert_eq!(vocab.get("A").unwrap(), &a);
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_populate_expression_definition() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        vocab.populate("A; B; D = A*B").unwrap();
        let d = vocab.get("D").unwrap().clone();
        let expected = vocab.parse("A*B").unwrap();
        assert_eq!(d, expected);

        // Same definition again is a no-op.
        vocab.populate("D = A*B").unwrap();
    }

    #[test]
    fn test_populate_conflict() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        vocab.populate("A; B; C; D = A*B").unwrap();
        let err = vocab.populate("D = A*C").unwrap_err();
        assert!(matches!(err, ActionError::NameConflict { ref name } if name == "D"));
    }

    #[test]
    fn test_populate_rejects_lowercase() {
        let mut vocab = Vocabulary::with_seed(16, 3);
        assert!(vocab.populate("a").is_err());
    }
}
