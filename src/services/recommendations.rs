//! Genre-affinity recommendations and trending books

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::LibraryConfig,
    error::AppResult,
    models::book::BookSummary,
    repository::{with_db_retry, Repository},
};

use super::{
    redis::{cache_get, cache_put, RedisService},
    stats::DASHBOARD_CACHE_KEY,
};

pub const TRENDING_CACHE_KEY: &str = "trending:books";
const RECOMMENDATION_KEY_PATTERN: &str = "recommendations:*";

fn recommendation_key(user_id: Uuid) -> String {
    format!("recommendations:{}", user_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(flatten)]
    pub book: BookSummary,
    /// Number of the user's past borrows in this book's genre
    pub genre_affinity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRecommendations {
    pub user_id: Uuid,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendingBook {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub book: BookSummary,
    pub borrow_count: i64,
}

/// Rank unread candidates by the user's affinity for their genre, then by rating
pub fn rank_recommendations(
    genre_history: &[(String, i64)],
    candidates: Vec<BookSummary>,
    limit: usize,
) -> Vec<Recommendation> {
    let affinity: HashMap<&str, i64> = genre_history
        .iter()
        .map(|(genre, count)| (genre.as_str(), *count))
        .collect();

    let mut ranked: Vec<Recommendation> = candidates
        .into_iter()
        .filter_map(|book| {
            let genre_affinity = *affinity.get(book.genre.as_str())?;
            Some(Recommendation { book, genre_affinity })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.genre_affinity
            .cmp(&a.genre_affinity)
            .then(b.book.rating.total_cmp(&a.book.rating))
            .then_with(|| a.book.title.cmp(&b.book.title))
    });
    ranked.truncate(limit);
    ranked
}

#[derive(Clone)]
pub struct RecommendationsService {
    repository: Repository,
    redis: Option<RedisService>,
    per_user: usize,
    cache_ttl_seconds: u64,
    trending_window_days: i64,
    trending_limit: i64,
}

impl RecommendationsService {
    pub fn new(repository: Repository, redis: Option<RedisService>, library: &LibraryConfig) -> Self {
        Self {
            repository,
            redis,
            per_user: library.recommendations_per_user,
            cache_ttl_seconds: library.recommendation_cache_ttl_seconds,
            trending_window_days: library.trending_window_days,
            trending_limit: library.trending_limit,
        }
    }

    /// Cached recommendations for one user, computed on a miss
    pub async fn for_user(&self, user_id: Uuid) -> AppResult<Vec<Recommendation>> {
        let key = recommendation_key(user_id);
        if let Some(cached) = cache_get(self.redis.as_ref(), &key).await {
            return Ok(cached);
        }

        let recommendations = self.compute_for(user_id).await?;
        cache_put(self.redis.as_ref(), &key, &recommendations, self.cache_ttl_seconds).await;
        Ok(recommendations)
    }

    async fn compute_for(&self, user_id: Uuid) -> AppResult<Vec<Recommendation>> {
        let pool = &self.repository.pool;

        let history = with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, (String, i64)>(
                r#"
                SELECT b.genre, COUNT(*)
                FROM borrow_records br
                JOIN books b ON b.id = br.book_id
                WHERE br.user_id = $1 AND br.status IN ('BORROWED', 'RETURNED')
                GROUP BY b.genre
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
        })
        .await?;

        if history.is_empty() {
            return Ok(Vec::new());
        }

        let genres: Vec<String> = history.iter().map(|(genre, _)| genre.clone()).collect();
        let genres = &genres;
        let candidates = with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, BookSummary>(
                r#"
                SELECT id, title, author, genre, rating, cover_url, cover_color, available_copies
                FROM books
                WHERE is_active
                  AND genre = ANY($2)
                  AND id NOT IN (SELECT book_id FROM borrow_records WHERE user_id = $1)
                "#,
            )
            .bind(user_id)
            .bind(genres)
            .fetch_all(pool)
        })
        .await?;

        Ok(rank_recommendations(&history, candidates, self.per_user))
    }

    /// Recompute and cache recommendations for every user with borrow history
    pub async fn generate_all(&self) -> AppResult<Vec<UserRecommendations>> {
        let pool = &self.repository.pool;
        let user_ids = with_db_retry(self.repository.retry, move || {
            sqlx::query_scalar::<_, Uuid>(
                "SELECT DISTINCT user_id FROM borrow_records WHERE status IN ('BORROWED', 'RETURNED')",
            )
            .fetch_all(pool)
        })
        .await?;

        let mut results = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let recommendations = self.compute_for(user_id).await?;
            cache_put(
                self.redis.as_ref(),
                &recommendation_key(user_id),
                &recommendations,
                self.cache_ttl_seconds,
            )
            .await;
            results.push(UserRecommendations {
                user_id,
                recommendations,
            });
        }

        tracing::info!(users = results.len(), "Recommendations generated");
        Ok(results)
    }

    pub async fn trending(&self) -> AppResult<Vec<TrendingBook>> {
        if let Some(cached) = cache_get(self.redis.as_ref(), TRENDING_CACHE_KEY).await {
            return Ok(cached);
        }
        self.update_trending().await
    }

    /// Most borrowed active books in the trailing window, written to cache
    pub async fn update_trending(&self) -> AppResult<Vec<TrendingBook>> {
        let since = Utc::now() - Duration::days(self.trending_window_days);
        let limit = self.trending_limit;
        let pool = &self.repository.pool;

        let trending = with_db_retry(self.repository.retry, move || {
            sqlx::query_as::<_, TrendingBook>(
                r#"
                SELECT b.id, b.title, b.author, b.genre, b.rating, b.cover_url, b.cover_color,
                       b.available_copies, COUNT(br.id) AS borrow_count
                FROM books b
                JOIN borrow_records br ON br.book_id = b.id
                WHERE b.is_active AND br.borrow_date >= $1
                GROUP BY b.id
                ORDER BY borrow_count DESC, b.rating DESC
                LIMIT $2
                "#,
            )
            .bind(since)
            .bind(limit)
            .fetch_all(pool)
        })
        .await?;

        cache_put(self.redis.as_ref(), TRENDING_CACHE_KEY, &trending, self.cache_ttl_seconds).await;
        tracing::info!(count = trending.len(), "Trending books updated");
        Ok(trending)
    }

    /// Drop cached recommendations, trending books and the dashboard; returns keys removed
    pub async fn refresh_cache(&self) -> AppResult<usize> {
        let Some(redis) = self.redis.as_ref() else {
            return Ok(0);
        };

        let mut cleared = redis.delete_matching(RECOMMENDATION_KEY_PATTERN).await?;
        cleared += redis.delete_matching(TRENDING_CACHE_KEY).await?;
        cleared += redis.delete_matching(DASHBOARD_CACHE_KEY).await?;

        tracing::info!(cleared, "Recommendation cache cleared");
        Ok(cleared)
    }
}
