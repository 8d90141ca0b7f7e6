use super::factorization::Matrix;

use anyhow::{Context, Result};
use std::path::Path;

/// Loads a `;`-separated `userId;movieId;rating` file (with header) into a dense matrix.
///
/// The matrix is sized `max userId + 1` by `max movieId + 1`; missing entries are zero.
pub fn load_ratings(path: impl AsRef<Path>) -> Result<Matrix> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening ratings file {}", path.display()))?;

    let mut records = Vec::new();
    for (line, record) in reader.deserialize::<(usize, usize, f64)>().enumerate() {
        let record =
            record.with_context(|| format!("parsing record {} of {}", line + 1, path.display()))?;
        records.push(record);
    }

    if records.is_empty() {
        anyhow::bail!("ratings file {} has no records", path.display());
    }

    let max_user = records.iter().map(|(user, _, _)| *user).max().unwrap_or(0);
    let max_movie = records.iter().map(|(_, movie, _)| *movie).max().unwrap_or(0);

    let mut ratings = vec![vec![0.0; max_movie + 1]; max_user + 1];
    for (user, movie, rating) in records {
        ratings[user][movie] = rating;
    }

    tracing::info!(
        "Loaded ratings matrix {}x{} from {}",
        max_user + 1,
        max_movie + 1,
        path.display()
    );
    Ok(ratings)
}
