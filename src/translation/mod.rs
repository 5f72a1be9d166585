//! Cross-vocabulary translation
//!
//! When a value must move between vocabularies of different dimensionality,
//! a linear map carries it across. Two construction strategies:
//!
//! - **Fit**: when the target vocabulary already defines names the source
//!   vocabulary knows, the map is the least-squares solution sending every
//!   shared source vector onto the corresponding target vector (min-norm
//!   through the Gram matrix of the source set — exact on the fit set when
//!   the source vectors are linearly independent).
//! - **Projection**: with no shared names, a random orthonormal dimension
//!   extension/reduction, deterministic given the vocabulary seeds. It
//!   preserves dot products up to the rank of the smaller space.
//!
//! In both cases, source symbols the target vocabulary lacks are mapped
//! through and registered into it (normalized) as a durable side effect —
//! after resolution, the same name denotes corresponding vectors on both
//! sides.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algebra::{LinearMap, SemanticPointer};
use crate::vocabulary::{SharedVocabulary, Vocabulary};
use crate::{ActionError, Result};

/// A linear operator carrying values from a source vocabulary's space into
/// a target vocabulary's space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationMap {
    map: LinearMap,
}

impl TranslationMap {
    /// Wrap an explicit linear map.
    pub fn new(map: LinearMap) -> Self {
        Self { map }
    }

    /// The identity translation within one space.
    pub fn identity(dimensions: usize) -> Self {
        Self {
            map: LinearMap::identity(dimensions),
        }
    }

    /// Source-space dimensionality.
    pub fn source_dimensions(&self) -> usize {
        self.map.cols()
    }

    /// Target-space dimensionality.
    pub fn target_dimensions(&self) -> usize {
        self.map.rows()
    }

    /// The underlying matrix.
    pub fn linear_map(&self) -> &LinearMap {
        &self.map
    }

    /// Carry a source-space vector into the target space.
    pub fn apply(&self, v: &SemanticPointer) -> Result<SemanticPointer> {
        self.map.apply(v)
    }
}

/// Build the translation map between two vocabularies, registering mapped
/// symbols into the target as a side effect.
pub fn resolve(source: &SharedVocabulary, target: &SharedVocabulary) -> Result<TranslationMap> {
    if std::sync::Arc::ptr_eq(source, target) {
        let dims = source.read().dimensions();
        return Ok(TranslationMap::identity(dims));
    }

    let src = source.read();
    let mut tgt = target.write();

    let source_names = src.names();
    let shared: Vec<&String> = source_names
        .iter()
        .filter(|name| tgt.contains(name))
        .collect();

    let map = if shared.is_empty() {
        let seed = src
            .seed()
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(tgt.seed());
        debug!(
            source = src.dimensions(),
            target = tgt.dimensions(),
            "building orthonormal projection"
        );
        orthonormal_projection(src.dimensions(), tgt.dimensions(), seed)
    } else {
        debug!(
            shared = shared.len(),
            source = src.dimensions(),
            target = tgt.dimensions(),
            "fitting translation to shared symbols"
        );
        fit(&src, &tgt, &shared)?
    };

    // Carry every symbol the target lacks across and register it.
    for name in &source_names {
        if !tgt.contains(name) {
            let vector = src
                .get(name)
                .ok_or_else(|| ActionError::Name { name: name.clone() })?;
            let mapped = map.apply(vector)?.normalized();
            tgt.add(name, mapped)?;
        }
    }

    Ok(TranslationMap::new(map))
}

/// Least-squares map sending each shared source vector onto its target
/// counterpart: `T = B · G⁻¹ · Aᵀ` with `G` the Gram matrix of the source
/// set. Exact on the fit set when the source vectors are independent.
fn fit(source: &Vocabulary, target: &Vocabulary, shared: &[&String]) -> Result<LinearMap> {
    let n = shared.len();
    let ds = source.dimensions();
    let dt = target.dimensions();

    let src_vecs: Vec<&SemanticPointer> = shared
        .iter()
        .filter_map(|name| source.get(name))
        .collect();
    let tgt_vecs: Vec<&SemanticPointer> = shared
        .iter()
        .filter_map(|name| target.get(name))
        .collect();

    // Gram matrix of the source set.
    let mut gram = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            gram[i][j] = src_vecs[i].dot(src_vecs[j])?;
        }
    }

    // Solve G · X = Aᵀ, where row i of Aᵀ is the i-th source vector.
    let rhs: Vec<Vec<f64>> = src_vecs.iter().map(|v| v.data().to_vec()).collect();
    let x = solve(gram, rhs)?;

    // T = B · X.
    let mut map = LinearMap::zeros(dt, ds);
    for (i, tgt_vec) in tgt_vecs.iter().enumerate() {
        for r in 0..dt {
            let b = tgt_vec[r];
            if b == 0.0 {
                continue;
            }
            for c in 0..ds {
                let v = map.at(r, c) + b * x[i][c];
                map.set(r, c, v);
            }
        }
    }
    Ok(map)
}

/// Gauss–Jordan elimination with partial pivoting on `G · X = RHS`.
fn solve(mut gram: Vec<Vec<f64>>, mut rhs: Vec<Vec<f64>>) -> Result<Vec<Vec<f64>>> {
    let n = gram.len();
    for col in 0..n {
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if gram[row][col].abs() > gram[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        if gram[pivot_row][col].abs() < 1e-12 {
            return Err(ActionError::Config(
                "degenerate translation fit: shared symbols are linearly dependent".into(),
            ));
        }
        gram.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        let pivot = gram[col][col];
        let pivot_gram = gram[col].clone();
        let pivot_rhs = rhs[col].clone();
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = gram[row][col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                gram[row][k] -= factor * pivot_gram[k];
            }
            for (slot, p) in rhs[row].iter_mut().zip(pivot_rhs.iter()) {
                *slot -= factor * p;
            }
        }
    }
    for (row, gram_row) in gram.iter().enumerate() {
        let pivot = gram_row[row];
        for slot in rhs[row].iter_mut() {
            *slot /= pivot;
        }
    }
    Ok(rhs)
}

/// A random matrix with orthonormal columns (Dt ≥ Ds) or rows (Dt < Ds):
/// the dimension extension/reduction used when no shared symbols anchor a
/// fit. Deterministic given the seed.
fn orthonormal_projection(ds: usize, dt: usize, seed: u64) -> LinearMap {
    let count = ds.min(dt);
    let length = ds.max(dt);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(count);
    while basis.len() < count {
        let mut v: Vec<f64> = (0..length)
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect();
        for prev in &basis {
            let proj: f64 = v.iter().zip(prev.iter()).map(|(a, b)| a * b).sum();
            for (slot, p) in v.iter_mut().zip(prev.iter()) {
                *slot -= proj * p;
            }
        }
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-8 {
            continue;
        }
        for slot in v.iter_mut() {
            *slot /= norm;
        }
        basis.push(v);
    }

    let mut map = LinearMap::zeros(dt, ds);
    if dt >= ds {
        // Columns are the orthonormal vectors: an isometry into the
        // larger space.
        for (c, v) in basis.iter().enumerate() {
            for (r, &value) in v.iter().enumerate() {
                map.set(r, c, value);
            }
        }
    } else {
        // Rows are the orthonormal vectors: a projection onto the
        // smaller space.
        for (r, v) in basis.iter().enumerate() {
            for (c, &value) in v.iter().enumerate() {
                map.set(r, c, value);
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{self, Vocabulary};

    fn shared_vocab(dimensions: usize, seed: u64) -> SharedVocabulary {
        vocabulary::shared(Vocabulary::with_seed(dimensions, seed))
    }

    #[test]
    fn test_fit_maps_shared_symbols_exactly() {
        let source = shared_vocab(16, 1);
        let target = shared_vocab(32, 2);
        source.write().populate("A; B; C").unwrap();
        target.write().populate("A; B; C").unwrap();

        let map = resolve(&source, &target).unwrap();
        assert_eq!(map.source_dimensions(), 16);
        assert_eq!(map.target_dimensions(), 32);

        for name in ["A", "B", "C"] {
            let s = source.read().get(name).unwrap().clone();
            let t = target.read().get(name).unwrap().clone();
            let mapped = map.apply(&s).unwrap();
            assert!(
                (mapped.cosine(&t).unwrap() - 1.0).abs() < 1e-8,
                "symbol {}",
                name
            );
        }
    }

    #[test]
    fn test_fit_registers_missing_symbols() {
        let source = shared_vocab(16, 3);
        let target = shared_vocab(32, 4);
        source.write().populate("A; B; D").unwrap();
        target.write().populate("A; B").unwrap();

        let map = resolve(&source, &target).unwrap();
        assert!(target.read().contains("D"));

        let d_src = source.read().get("D").unwrap().clone();
        let d_tgt = target.read().get("D").unwrap().clone();
        let mapped = map.apply(&d_src).unwrap();
        assert!((mapped.cosine(&d_tgt).unwrap() - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_projection_preserves_dot_products() {
        // Dt >= Ds: the projection is an isometry.
        let source = shared_vocab(16, 5);
        let target = shared_vocab(64, 6);
        source.write().populate("A; B").unwrap();

        let map = resolve(&source, &target).unwrap();
        let a = source.read().get("A").unwrap().clone();
        let b = source.read().get("B").unwrap().clone();
        let before = a.dot(&b).unwrap();
        let after = map.apply(&a).unwrap().dot(&map.apply(&b).unwrap()).unwrap();
        assert!((before - after).abs() < 1e-10);
    }

    #[test]
    fn test_projection_down_has_orthonormal_rows() {
        let source = shared_vocab(32, 7);
        let target = shared_vocab(8, 8);
        source.write().populate("A").unwrap();

        let map = resolve(&source, &target).unwrap();
        let m = map.linear_map();
        // T · Tᵀ = I on the smaller space.
        let gram = m.compose(&m.transpose()).unwrap();
        for i in 0..8 {
            for j in 0..8 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram.at(i, j) - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let build = || {
            let source = shared_vocab(16, 9);
            let target = shared_vocab(32, 10);
            source.write().populate("A; B").unwrap();
            resolve(&source, &target).unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_same_vocabulary_is_identity() {
        let vocab = shared_vocab(16, 11);
        let map = resolve(&vocab, &vocab).unwrap();
        assert_eq!(map.linear_map(), &LinearMap::identity(16));
    }

    #[test]
    fn test_solve_small_system() {
        // [2 0; 0 4] · X = [[2, 4], [8, 4]] → X = [[1, 2], [2, 1]]
        let gram = vec![vec![2.0, 0.0], vec![0.0, 4.0]];
        let rhs = vec![vec![2.0, 4.0], vec![8.0, 4.0]];
        let x = solve(gram, rhs).unwrap();
        assert!((x[0][0] - 1.0).abs() < 1e-12);
        assert!((x[0][1] - 2.0).abs() < 1e-12);
        assert!((x[1][0] - 2.0).abs() < 1e-12);
        assert!((x[1][1] - 1.0).abs() < 1e-12);
    }
}
