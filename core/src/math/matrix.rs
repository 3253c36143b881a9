use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Conversions between the ndarray containers and nalgebra's dense types.
pub struct MatrixHelper;

impl MatrixHelper {
    pub fn to_dmatrix(array: ArrayView2<f64>) -> DMatrix<f64> {
        let (rows, cols) = array.dim();
        DMatrix::from_fn(rows, cols, |i, j| array[[i, j]])
    }

    pub fn to_dvector(array: ArrayView1<f64>) -> DVector<f64> {
        DVector::from_iterator(array.len(), array.iter().copied())
    }

    pub fn to_array2(matrix: &DMatrix<f64>) -> Array2<f64> {
        Array2::from_shape_fn(matrix.shape(), |(i, j)| matrix[(i, j)])
    }

    pub fn to_array1(vector: &DVector<f64>) -> Array1<f64> {
        vector.iter().copied().collect()
    }
}
