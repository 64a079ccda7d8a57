//! 3x3 matrix operations
//!
//! Used for connection stages, chromatic adaptation and the Newton steps of
//! reverse pipeline evaluation. All operations use f64.

use std::ops::{Index, IndexMut, Mul};

/// Determinant magnitude below which a matrix is treated as singular
pub const MATRIX_DET_TOLERANCE: f64 = 1e-4;

/// Column vector operand of [`Matrix3x3`]
pub type Vec3 = [f64; 3];

/// A 3x3 matrix stored row-major: m[row][col]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3x3 {
    pub m: [[f64; 3]; 3],
}

impl Matrix3x3 {
    #[inline]
    pub const fn new(m: [[f64; 3]; 3]) -> Self {
        Self { m }
    }

    #[inline]
    pub const fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { m: [[0.0; 3]; 3] }
    }

    #[inline]
    pub const fn diagonal(d0: f64, d1: f64, d2: f64) -> Self {
        Self {
            m: [[d0, 0.0, 0.0], [0.0, d1, 0.0], [0.0, 0.0, d2]],
        }
    }

    /// Build from 9 coefficients in row-major order
    pub fn from_row_slice(v: &[f64]) -> Option<Self> {
        if v.len() != 9 {
            return None;
        }
        Some(Self {
            m: [[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]],
        })
    }

    /// Coefficients in row-major order
    pub fn to_row_vec(&self) -> Vec<f64> {
        self.m.iter().flatten().copied().collect()
    }

    /// Returns M × v
    #[inline]
    pub fn multiply_vec(&self, v: Vec3) -> Vec3 {
        self.m.map(|row| row[0] * v[0] + row[1] * v[1] + row[2] * v[2])
    }

    /// Returns self × other
    #[inline]
    pub fn multiply(&self, other: &Self) -> Self {
        let col = |j: usize| [other.m[0][j], other.m[1][j], other.m[2][j]];
        let cols = [col(0), col(1), col(2)];
        Self {
            m: self
                .m
                .map(|row| cols.map(|c| row[0] * c[0] + row[1] * c[1] + row[2] * c[2])),
        }
    }

    /// Cofactor of entry (row, col), signs included
    #[inline]
    fn cofactor(&self, row: usize, col: usize) -> f64 {
        let (r0, r1) = ((row + 1) % 3, (row + 2) % 3);
        let (c0, c1) = ((col + 1) % 3, (col + 2) % 3);
        self.m[r0][c0] * self.m[r1][c1] - self.m[r0][c1] * self.m[r1][c0]
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        (0..3).map(|j| self.m[0][j] * self.cofactor(0, j)).sum()
    }

    /// Inverse, or None when |det| is below [`MATRIX_DET_TOLERANCE`]
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < MATRIX_DET_TOLERANCE {
            return None;
        }

        // Adjugate is the transposed cofactor matrix
        let mut inv = Self::zero();
        for (i, row) in inv.m.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = self.cofactor(j, i) / det;
            }
        }
        Some(inv)
    }

    /// Solve self × x = b
    pub fn solve(&self, b: Vec3) -> Option<Vec3> {
        self.inverse().map(|inv| inv.multiply_vec(b))
    }

    #[inline]
    pub fn scale(&self, s: f64) -> Self {
        Self {
            m: self.m.map(|row| row.map(|v| v * s)),
        }
    }

    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(other.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.approx_eq(&Self::identity(), epsilon)
    }
}

impl Default for Matrix3x3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Index<usize> for Matrix3x3 {
    type Output = [f64; 3];

    fn index(&self, row: usize) -> &Self::Output {
        &self.m[row]
    }
}

impl IndexMut<usize> for Matrix3x3 {
    fn index_mut(&mut self, row: usize) -> &mut Self::Output {
        &mut self.m[row]
    }
}

impl Mul for Matrix3x3 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.multiply(&rhs)
    }
}

impl Mul<Vec3> for Matrix3x3 {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Self::Output {
        self.multiply_vec(rhs)
    }
}

/// Euclidean distance between the first `n` components
pub fn euclidean_distance(a: &[f32], b: &[f32], n: usize) -> f64 {
    a.iter()
        .zip(b)
        .take(n)
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_multiply_vec() {
        let v = [1.0, 2.0, 3.0];
        assert_eq!(Matrix3x3::identity() * v, v);
        let d = Matrix3x3::diagonal(2.0, 0.5, -1.0);
        assert_eq!(d.multiply_vec(v), [2.0, 1.0, -3.0]);
    }

    #[test]
    fn test_multiply_matrices() {
        let a = Matrix3x3::new([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        let id = Matrix3x3::identity();
        assert!(a.multiply(&id).approx_eq(&a, EPSILON));
        assert!(id.multiply(&a).approx_eq(&a, EPSILON));
    }

    #[test]
    fn test_row_slice() {
        let coeffs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let m = Matrix3x3::from_row_slice(&coeffs).unwrap();
        assert_eq!(m[1][2], 6.0);
        assert_eq!(m.to_row_vec(), coeffs.to_vec());
        assert!(Matrix3x3::from_row_slice(&coeffs[..8]).is_none());
    }

    #[test]
    fn test_inverse() {
        let a = Matrix3x3::new([[1.0, 2.0, 3.0], [0.0, 1.0, 4.0], [5.0, 6.0, 0.0]]);
        assert!((a.determinant() - 1.0).abs() < EPSILON);
        let a_inv = a.inverse().unwrap();
        assert!(a.multiply(&a_inv).is_identity(1e-9));
    }

    #[test]
    fn test_singular_matrix() {
        let singular = Matrix3x3::new([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [5.0, 7.0, 9.0]]);
        assert!(singular.inverse().is_none());
        // Below the shared tolerance counts as singular too
        assert!(Matrix3x3::diagonal(0.01, 0.01, 0.5).inverse().is_none());
    }

    #[test]
    fn test_solve() {
        let a = Matrix3x3::new([[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [1.0, 0.0, 1.0]]);
        let x = a.solve([2.0, 8.0, 4.0]).unwrap();
        assert!((x[0] - 1.0).abs() < EPSILON);
        assert!((x[1] - 2.0).abs() < EPSILON);
        assert!((x[2] - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_scale() {
        let a = Matrix3x3::new([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        assert_eq!(a.scale(2.0)[2][2], 18.0);
        assert!((a * Matrix3x3::identity()).approx_eq(&a, EPSILON));
    }

    #[test]
    fn test_euclidean_distance() {
        let d = euclidean_distance(&[0.0, 3.0, 0.0, 9.0], &[4.0, 0.0, 0.0, 0.0], 3);
        assert!((d - 5.0).abs() < 1e-6);
    }
}
