use crate::models::Review;

/// Unweighted mean of the review's scores, `None` when it has none.
pub fn average_review_score(review: &Review) -> Option<f64> {
    if review.scores.is_empty() {
        return None;
    }

    let total: i64 = review.scores.iter().map(|score| i64::from(score.value)).sum();
    Some(total as f64 / review.scores.len() as f64)
}

/// Mean of the per-review averages, skipping reviews without scores.
pub fn average_group_score<'a, I>(reviews: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Review>,
{
    let values: Vec<f64> = reviews.into_iter().filter_map(average_review_score).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
