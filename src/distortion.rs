use alloc::vec;
use alloc::vec::Vec;
use num_traits::Float;

/// The distortion measure used to score a candidate quantizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistortionMeasure {
    /// `d(i, j) = (i - j)^2`.
    Mse,
    /// `d(i, j) = |i - j|`.
    Manhattan,
    /// `d(i, j) = log2(1 + |i - j|)`.
    Lorentz,
}

impl DistortionMeasure {
    fn cost(self, i: i32, j: i32) -> f64 {
        let diff = (i - j) as f64;
        match self {
            DistortionMeasure::Mse => diff * diff,
            DistortionMeasure::Manhattan => diff.abs(),
            DistortionMeasure::Lorentz => (1.0 + diff.abs()).log2(),
        }
    }
}

/// A precomputed, symmetric `A x A` matrix of pairwise symbol distortions
/// with a zero diagonal, built once per run from a [`DistortionMeasure`].
///
/// All three supported measures are symmetric in `|i - j|` by construction,
/// so symmetry and a zero diagonal hold by inspection of `cost` above; the
/// table still precomputes every entry rather than calling `cost` on every
/// lookup, since the quantizer designer's inner loop is `O(M * A^2)` and
/// re-deriving `log2(1 + |i - j|)` per call would dominate runtime for
/// nontrivial alphabets.
#[derive(Debug, Clone)]
pub struct DistortionTable {
    size: usize,
    entries: Vec<f64>,
}

impl DistortionTable {
    pub fn new(measure: DistortionMeasure, size: usize) -> Self {
        let mut entries = vec![0.0; size * size];
        for i in 0..size {
            for j in 0..size {
                entries[i * size + j] = measure.cost(i as i32, j as i32);
            }
        }
        Self { size, entries }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Distortion of reproducing symbol `i` as symbol `j`, both given as raw
    /// symbol values in `[0, size)`.
    pub fn get(&self, i: u8, j: u8) -> f64 {
        self.entries[i as usize * self.size + j as usize]
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.size).all(|i| {
            (0..self.size).all(|j| (self.get(i as u8, j as u8) - self.get(j as u8, i as u8)).abs() < 1e-9)
        })
    }

    pub fn has_zero_diagonal(&self) -> bool {
        (0..self.size).all(|i| self.get(i as u8, i as u8) == 0.0)
    }
}
