//! Order identifier slugs.
//!
//! An order's public identifier is derived from its primary key before the
//! row exists, then checked against the `orders` table. Collisions get a
//! short random suffix and are checked again.

use rand::Rng;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entities::order;

/// Length of the slug taken from the order's UUID
pub const SLUG_LEN: usize = 10;
/// Length of the random suffix appended on collision
pub const SUFFIX_LEN: usize = 4;
/// Candidates tried before giving up, unless configured otherwise
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

const SLUG_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Lowercase hex slug taken from the leading characters of `seed`.
pub fn base_slug(seed: Uuid) -> String {
    seed.simple().to_string().chars().take(SLUG_LEN).collect()
}

/// Random lowercase alphanumeric string of `len` characters.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SLUG_CHARSET[rng.gen_range(0..SLUG_CHARSET.len())] as char)
        .collect()
}

/// A slug is short, lowercase and URL-safe.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 120
        && slug
            .bytes()
            .all(|b| b == b'-' || SLUG_CHARSET.contains(&b))
}

async fn order_id_taken<C>(db: &C, candidate: &str) -> Result<bool, DbErr>
where
    C: ConnectionTrait,
{
    let count = order::Entity::find()
        .filter(order::Column::OrderId.eq(candidate))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Produces an order identifier that no stored order currently uses,
/// trying at most `max_attempts` candidates.
pub async fn generate_unique_order_id<C>(
    db: &C,
    seed: Uuid,
    max_attempts: u32,
) -> Result<String, DbErr>
where
    C: ConnectionTrait,
{
    let base = base_slug(seed);
    let mut candidate = base.clone();

    for attempt in 1..=max_attempts {
        debug_assert!(is_valid_slug(&candidate), "malformed slug {}", candidate);
        if !order_id_taken(db, &candidate).await? {
            debug!(order_id = %candidate, attempt, "assigned order identifier");
            return Ok(candidate);
        }
        warn!(order_id = %candidate, attempt, "order identifier collision");
        candidate = format!("{}-{}", base, random_suffix(SUFFIX_LEN));
    }

    Err(DbErr::Custom(format!(
        "could not assign a unique order identifier for {} after {} attempts",
        seed, max_attempts
    )))
}
