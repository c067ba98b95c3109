use faer::Mat;

/// Square submatrix on the given row/column indices.
#[must_use]
pub fn select_square(matrix: &Mat<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::from_fn(indices.len(), indices.len(), |i, j| {
        matrix[(indices[i], indices[j])]
    })
}

#[must_use]
pub fn select_values(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|idx| values[*idx]).collect()
}

#[must_use]
pub fn column_to_vec(column: &Mat<f64>) -> Vec<f64> {
    (0..column.nrows()).map(|row| column[(row, 0)]).collect()
}
