use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Property listing record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: i32,
    pub price_id: i32,
    pub title: String,
    pub description: String,
    pub rooms: i32,
    pub parking: i32,
    pub bathrooms: i32,
    pub street: Option<String>,
    pub lat: String,
    pub lng: String,
    pub image: Option<String>,
    pub published: bool,
    pub created_at: OffsetDateTime,
}

/// Owner dashboard row: listing joined with its catalog names and inquiry count.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ListingSummary {
    pub id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub published: bool,
    pub category_name: String,
    pub price_name: String,
    pub message_count: i64,
}

/// Public detail view: listing plus catalog names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ListingDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub rooms: i32,
    pub parking: i32,
    pub bathrooms: i32,
    pub street: Option<String>,
    pub lat: String,
    pub lng: String,
    pub image: Option<String>,
    pub published: bool,
    pub category_name: String,
    pub price_name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PriceRange {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MessageWithSender {
    pub id: Uuid,
    pub body: String,
    pub sender_name: String,
    pub created_at: OffsetDateTime,
}

/// Validated input for creating or updating a listing.
#[derive(Debug, Clone)]
pub struct ListingInput {
    pub title: String,
    pub description: String,
    pub category_id: i32,
    pub price_id: i32,
    pub rooms: i32,
    pub parking: i32,
    pub bathrooms: i32,
    pub street: Option<String>,
    pub lat: String,
    pub lng: String,
}

const LISTING_COLUMNS: &str = "id, user_id, category_id, price_id, title, description, \
     rooms, parking, bathrooms, street, lat, lng, image, published, created_at";

const DETAIL_QUERY: &str = "SELECT l.id, l.user_id, l.title, l.description, l.rooms, l.parking, \
            l.bathrooms, l.street, l.lat, l.lng, l.image, l.published, \
            c.name AS category_name, p.name AS price_name \
       FROM listings l \
       JOIN categories c ON c.id = l.category_id \
       JOIN price_ranges p ON p.id = l.price_id";

impl Listing {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Listing>> {
        let listing =
            sqlx::query_as::<_, Listing>(&format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"))
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(listing)
    }

    pub async fn find_detail(db: &PgPool, id: Uuid) -> anyhow::Result<Option<ListingDetail>> {
        let detail = sqlx::query_as::<_, ListingDetail>(&format!("{DETAIL_QUERY} WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(detail)
    }

    pub async fn create(db: &PgPool, owner: Uuid, input: &ListingInput) -> anyhow::Result<Listing> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            "INSERT INTO listings (user_id, category_id, price_id, title, description, \
                                   rooms, parking, bathrooms, street, lat, lng) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {LISTING_COLUMNS}"
        ))
        .bind(owner)
        .bind(input.category_id)
        .bind(input.price_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.rooms)
        .bind(input.parking)
        .bind(input.bathrooms)
        .bind(&input.street)
        .bind(&input.lat)
        .bind(&input.lng)
        .fetch_one(db)
        .await?;
        Ok(listing)
    }

    /// Update the editable fields; image and publication state stay untouched.
    pub async fn update_fields(db: &PgPool, id: Uuid, input: &ListingInput) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE listings SET category_id = $2, price_id = $3, title = $4, description = $5, \
                    rooms = $6, parking = $7, bathrooms = $8, street = $9, lat = $10, lng = $11 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.category_id)
        .bind(input.price_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.rooms)
        .bind(input.parking)
        .bind(input.bathrooms)
        .bind(&input.street)
        .bind(&input.lat)
        .bind(&input.lng)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Persist the publication fields after a lifecycle transition.
    pub async fn store_publication(db: &PgPool, listing: &Listing) -> anyhow::Result<()> {
        sqlx::query("UPDATE listings SET image = $2, published = $3 WHERE id = $1")
            .bind(listing.id)
            .bind(&listing.image)
            .bind(listing.published)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn page_by_owner(
        db: &PgPool,
        owner: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ListingSummary>> {
        let rows = sqlx::query_as::<_, ListingSummary>(
            "SELECT l.id, l.title, l.image, l.published, \
                    c.name AS category_name, p.name AS price_name, \
                    (SELECT count(*) FROM messages m WHERE m.listing_id = l.id) AS message_count \
               FROM listings l \
               JOIN categories c ON c.id = l.category_id \
               JOIN price_ranges p ON p.id = l.price_id \
              WHERE l.user_id = $1 \
              ORDER BY l.created_at DESC \
              LIMIT $2 OFFSET $3",
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn count_by_owner(db: &PgPool, owner: Uuid) -> anyhow::Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT count(*) FROM listings WHERE user_id = $1")
                .bind(owner)
                .fetch_one(db)
                .await?;
        Ok(count)
    }

    pub async fn latest_published_in_category(
        db: &PgPool,
        category_id: i32,
        limit: i64,
    ) -> anyhow::Result<Vec<ListingDetail>> {
        let rows = sqlx::query_as::<_, ListingDetail>(&format!(
            "{DETAIL_QUERY} WHERE l.category_id = $1 AND l.published \
             ORDER BY l.created_at DESC LIMIT $2"
        ))
        .bind(category_id)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn published_in_category(
        db: &PgPool,
        category_id: i32,
    ) -> anyhow::Result<Vec<ListingDetail>> {
        let rows = sqlx::query_as::<_, ListingDetail>(&format!(
            "{DETAIL_QUERY} WHERE l.category_id = $1 AND l.published \
             ORDER BY l.created_at DESC"
        ))
        .bind(category_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn search_published(db: &PgPool, term: &str) -> anyhow::Result<Vec<ListingDetail>> {
        let pattern = format!("%{}%", term);
        let rows = sqlx::query_as::<_, ListingDetail>(&format!(
            "{DETAIL_QUERY} WHERE l.published AND l.title ILIKE $1 \
             ORDER BY l.created_at DESC"
        ))
        .bind(pattern)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

impl Category {
    pub async fn all(db: &PgPool) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id")
            .fetch_all(db)
            .await?;
        Ok(rows)
    }

    pub async fn find_by_id(db: &PgPool, id: i32) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }
}

impl PriceRange {
    pub async fn all(db: &PgPool) -> anyhow::Result<Vec<PriceRange>> {
        let rows = sqlx::query_as::<_, PriceRange>("SELECT id, name FROM price_ranges ORDER BY id")
            .fetch_all(db)
            .await?;
        Ok(rows)
    }
}

pub async fn create_message(
    db: &PgPool,
    listing_id: Uuid,
    sender: Uuid,
    body: &str,
) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO messages (listing_id, user_id, body) VALUES ($1, $2, $3)")
        .bind(listing_id)
        .bind(sender)
        .bind(body)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn messages_for_listing(
    db: &PgPool,
    listing_id: Uuid,
) -> anyhow::Result<Vec<MessageWithSender>> {
    let rows = sqlx::query_as::<_, MessageWithSender>(
        "SELECT m.id, m.body, u.name AS sender_name, m.created_at \
           FROM messages m \
           JOIN users u ON u.id = m.user_id \
          WHERE m.listing_id = $1 \
          ORDER BY m.created_at ASC",
    )
    .bind(listing_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
