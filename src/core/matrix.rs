//! Dense 3x3 matrix used for inertia tensors and rotations.

use std::ops::{Add, AddAssign, Index, Mul, MulAssign, Neg, Sub, SubAssign};

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{CollisionError, Result};

/// Row-major 3x3 matrix of `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix3 {
    rows: [[f64; 3]; 3],
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::zero()
    }
}

impl Matrix3 {
    pub const ZERO: Self = Self {
        rows: [[0.0; 3]; 3],
    };

    pub const IDENTITY: Self = Self {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a1: f64,
        a2: f64,
        a3: f64,
        b1: f64,
        b2: f64,
        b3: f64,
        c1: f64,
        c2: f64,
        c3: f64,
    ) -> Self {
        Self {
            rows: [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]],
        }
    }

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Matrix with every entry set to `value`.
    pub fn splat(value: f64) -> Self {
        Self {
            rows: [[value; 3]; 3],
        }
    }

    pub fn from_rows(r0: DVec3, r1: DVec3, r2: DVec3) -> Self {
        Self {
            rows: [r0.to_array(), r1.to_array(), r2.to_array()],
        }
    }

    pub fn from_diagonal(diagonal: DVec3) -> Self {
        Self::new(
            diagonal.x, 0.0, 0.0, 0.0, diagonal.y, 0.0, 0.0, 0.0, diagonal.z,
        )
    }

    /// Matrix `[v]x` such that `[v]x * w == v.cross(w)`.
    pub fn skew_symmetric(v: DVec3) -> Self {
        Self::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_all_values(
        &mut self,
        a1: f64,
        a2: f64,
        a3: f64,
        b1: f64,
        b2: f64,
        b3: f64,
        c1: f64,
        c2: f64,
        c3: f64,
    ) {
        self.rows = [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]];
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.rows[row][column]
    }

    pub fn set(&mut self, row: usize, column: usize, value: f64) {
        self.rows[row][column] = value;
    }

    pub fn row(&self, index: usize) -> DVec3 {
        DVec3::from_array(self.rows[index])
    }

    pub fn column(&self, index: usize) -> DVec3 {
        DVec3::new(
            self.rows[0][index],
            self.rows[1][index],
            self.rows[2][index],
        )
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.rows;
        m[0][0] * (m[1][1] * m[2][2] - m[2][1] * m[1][2])
            - m[0][1] * (m[1][0] * m[2][2] - m[2][0] * m[1][2])
            + m[0][2] * (m[1][0] * m[2][1] - m[2][0] * m[1][1])
    }

    pub fn trace(&self) -> f64 {
        self.rows[0][0] + self.rows[1][1] + self.rows[2][2]
    }

    pub fn transpose(&self) -> Self {
        let m = &self.rows;
        Self::new(
            m[0][0], m[1][0], m[2][0], m[0][1], m[1][1], m[2][1], m[0][2], m[1][2], m[2][2],
        )
    }

    /// Inverse through the cofactor matrix; fails only on an exactly zero determinant.
    pub fn inverse(&self) -> Result<Self> {
        self.try_inverse(0.0)
    }

    /// Inverse that also rejects matrices with `|det| <= tolerance`.
    pub fn try_inverse(&self, tolerance: f64) -> Result<Self> {
        let determinant = self.determinant();
        if determinant == 0.0 || determinant.abs() <= tolerance || !determinant.is_finite() {
            return Err(CollisionError::SingularMatrix { determinant });
        }

        let m = &self.rows;
        let cofactors = Self::new(
            m[1][1] * m[2][2] - m[2][1] * m[1][2],
            -(m[1][0] * m[2][2] - m[2][0] * m[1][2]),
            m[1][0] * m[2][1] - m[2][0] * m[1][1],
            -(m[0][1] * m[2][2] - m[2][1] * m[0][2]),
            m[0][0] * m[2][2] - m[2][0] * m[0][2],
            -(m[0][0] * m[2][1] - m[2][0] * m[0][1]),
            m[0][1] * m[1][2] - m[0][2] * m[1][1],
            -(m[0][0] * m[1][2] - m[1][0] * m[0][2]),
            m[0][0] * m[1][1] - m[0][1] * m[1][0],
        );

        Ok(cofactors.transpose() * (1.0 / determinant))
    }

    /// Entry-wise absolute value.
    pub fn abs(&self) -> Self {
        let mut out = *self;
        for row in &mut out.rows {
            for value in row.iter_mut() {
                *value = value.abs();
            }
        }
        out
    }

    pub fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.rows
            .iter()
            .flatten()
            .zip(other.rows.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    fn map2(self, other: Self, op: impl Fn(f64, f64) -> f64) -> Self {
        let mut out = self;
        for r in 0..3 {
            for c in 0..3 {
                out.rows[r][c] = op(self.rows[r][c], other.rows[r][c]);
            }
        }
        out
    }
}

impl Index<(usize, usize)> for Matrix3 {
    type Output = f64;

    fn index(&self, (row, column): (usize, usize)) -> &f64 {
        &self.rows[row][column]
    }
}

impl Mul for Matrix3 {
    type Output = Matrix3;

    fn mul(self, rhs: Matrix3) -> Matrix3 {
        let mut out = Matrix3::ZERO;
        for r in 0..3 {
            for c in 0..3 {
                out.rows[r][c] = self.rows[r][0] * rhs.rows[0][c]
                    + self.rows[r][1] * rhs.rows[1][c]
                    + self.rows[r][2] * rhs.rows[2][c];
            }
        }
        out
    }
}

impl MulAssign for Matrix3 {
    fn mul_assign(&mut self, rhs: Matrix3) {
        *self = *self * rhs;
    }
}

impl Mul<DVec3> for Matrix3 {
    type Output = DVec3;

    fn mul(self, rhs: DVec3) -> DVec3 {
        DVec3::new(self.row(0).dot(rhs), self.row(1).dot(rhs), self.row(2).dot(rhs))
    }
}

impl Mul<f64> for Matrix3 {
    type Output = Matrix3;

    fn mul(self, rhs: f64) -> Matrix3 {
        let mut out = self;
        for row in &mut out.rows {
            for value in row.iter_mut() {
                *value *= rhs;
            }
        }
        out
    }
}

impl Mul<Matrix3> for f64 {
    type Output = Matrix3;

    fn mul(self, rhs: Matrix3) -> Matrix3 {
        rhs * self
    }
}

impl MulAssign<f64> for Matrix3 {
    fn mul_assign(&mut self, rhs: f64) {
        *self = *self * rhs;
    }
}

impl Add for Matrix3 {
    type Output = Matrix3;

    fn add(self, rhs: Matrix3) -> Matrix3 {
        self.map2(rhs, |a, b| a + b)
    }
}

impl AddAssign for Matrix3 {
    fn add_assign(&mut self, rhs: Matrix3) {
        *self = *self + rhs;
    }
}

impl Sub for Matrix3 {
    type Output = Matrix3;

    fn sub(self, rhs: Matrix3) -> Matrix3 {
        self.map2(rhs, |a, b| a - b)
    }
}

impl SubAssign for Matrix3 {
    fn sub_assign(&mut self, rhs: Matrix3) {
        *self = *self - rhs;
    }
}

impl Neg for Matrix3 {
    type Output = Matrix3;

    fn neg(self) -> Matrix3 {
        self * -1.0
    }
}

impl From<DMat3> for Matrix3 {
    fn from(m: DMat3) -> Self {
        // glam stores columns.
        Self::new(
            m.x_axis.x, m.y_axis.x, m.z_axis.x, m.x_axis.y, m.y_axis.y, m.z_axis.y, m.x_axis.z,
            m.y_axis.z, m.z_axis.z,
        )
    }
}

impl From<Matrix3> for DMat3 {
    fn from(m: Matrix3) -> Self {
        DMat3::from_cols(m.column(0), m.column(1), m.column(2))
    }
}
