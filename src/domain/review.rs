//! Course reviews and rating aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::types::PaginationMeta;

/// Review entity; also the `reviews` document shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    /// Author display name at the time of writing
    pub author_name: String,
    #[schema(example = 5, minimum = 1, maximum = 5)]
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewReview {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ReviewPatch {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i16>,
    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,
}

/// Average rating rounded to one decimal, and the number of reviews
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, ToSchema)]
pub struct RatingSummary {
    #[schema(example = 4.6)]
    pub average: f64,
    pub count: u64,
}

impl RatingSummary {
    pub fn from_totals(sum: i64, count: u64) -> Self {
        if count == 0 {
            return Self::default();
        }
        let average = (sum as f64 / count as f64 * 10.0).round() / 10.0;
        Self { average, count }
    }

    pub fn from_ratings(ratings: &[i16]) -> Self {
        let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
        Self::from_totals(sum, ratings.len() as u64)
    }
}

/// A page of reviews for a course, with the course-wide summary
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewList {
    pub summary: RatingSummary,
    pub reviews: Vec<Review>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_rounds_to_one_decimal() {
        let s = RatingSummary::from_ratings(&[5, 4, 4]);
        assert_eq!(s.count, 3);
        assert_eq!(s.average, 4.3);

        let s = RatingSummary::from_ratings(&[5, 4]);
        assert_eq!(s.average, 4.5);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(RatingSummary::from_ratings(&[]), RatingSummary::default());
    }

    #[test]
    fn test_rating_bounds() {
        let ok = NewReview { rating: 5, comment: None };
        let low = NewReview { rating: 0, comment: None };
        let long = NewReview { rating: 3, comment: Some("x".repeat(2001)) };

        assert!(ok.validate().is_ok());
        assert!(low.validate().is_err());
        assert!(long.validate().is_err());
    }
}
