use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::product::Product;
use crate::uploads::StoredImage;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("product not found")]
    NotFound,
    #[error("not allowed to modify this product")]
    Forbidden,
    #[error("unknown category")]
    UnknownCategory,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Fields accepted when listing a product
#[derive(Debug)]
pub struct NewProduct {
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub condition: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_negotiable: bool,
    pub is_hot_sale: bool,
    pub discount_percentage: Option<i32>,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Default)]
pub struct ProductChanges {
    pub category_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_negotiable: Option<bool>,
    pub is_hot_sale: Option<bool>,
    pub is_active: Option<bool>,
    pub discount_percentage: Option<i32>,
}

pub struct ProductService {
    pool: PgPool,
}

impl ProductService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the product and its image rows in one transaction. The first
    /// image of the batch becomes the primary.
    pub async fn create_with_images(
        &self,
        new: NewProduct,
        images: &[StoredImage],
    ) -> Result<Product, ProductError> {
        if let Some(category_id) = new.category_id {
            if !self.category_exists(category_id).await? {
                return Err(ProductError::UnknownCategory);
            }
        }

        let mut tx = self.pool.begin().await?;

        let product: Product = sqlx::query_as(
            r#"
            INSERT INTO products
                (user_id, category_id, title, description, price, original_price, condition,
                 location, latitude, longitude, is_negotiable, is_hot_sale, discount_percentage)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(new.user_id)
        .bind(new.category_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.original_price)
        .bind(&new.condition)
        .bind(&new.location)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(new.is_negotiable)
        .bind(new.is_hot_sale)
        .bind(new.discount_percentage)
        .fetch_one(&mut *tx)
        .await?;

        for (position, image) in images.iter().enumerate() {
            sqlx::query(
                "INSERT INTO product_images (product_id, image_url, is_primary) VALUES ($1, $2, $3)",
            )
            .bind(product.id)
            .bind(&image.url)
            .bind(position == 0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(product_id = %product.id, images = images.len(), "product listed");
        Ok(product)
    }

    /// Apply a partial update, delete the named image rows, and append any new
    /// uploads, all in one transaction.
    pub async fn update_with_images(
        &self,
        product_id: Uuid,
        caller: &AuthUser,
        changes: ProductChanges,
        remove_images: &[Uuid],
        new_images: &[StoredImage],
    ) -> Result<Product, ProductError> {
        let owner_id = self.owner_of(product_id).await?;
        if !caller.can_modify(owner_id) {
            return Err(ProductError::Forbidden);
        }
        if let Some(category_id) = changes.category_id {
            if !self.category_exists(category_id).await? {
                return Err(ProductError::UnknownCategory);
            }
        }

        let mut tx = self.pool.begin().await?;

        let product: Product = sqlx::query_as(
            r#"
            UPDATE products SET
                category_id         = COALESCE($2, category_id),
                title               = COALESCE($3, title),
                description         = COALESCE($4, description),
                price               = COALESCE($5, price),
                original_price      = COALESCE($6, original_price),
                condition           = COALESCE($7, condition),
                location            = COALESCE($8, location),
                latitude            = COALESCE($9, latitude),
                longitude           = COALESCE($10, longitude),
                is_negotiable       = COALESCE($11, is_negotiable),
                is_hot_sale         = COALESCE($12, is_hot_sale),
                is_active           = COALESCE($13, is_active),
                discount_percentage = COALESCE($14, discount_percentage),
                updated_at          = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(changes.category_id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.price)
        .bind(changes.original_price)
        .bind(changes.condition)
        .bind(changes.location)
        .bind(changes.latitude)
        .bind(changes.longitude)
        .bind(changes.is_negotiable)
        .bind(changes.is_hot_sale)
        .bind(changes.is_active)
        .bind(changes.discount_percentage)
        .fetch_one(&mut *tx)
        .await?;

        if !remove_images.is_empty() {
            sqlx::query("DELETE FROM product_images WHERE product_id = $1 AND id = ANY($2)")
                .bind(product_id)
                .bind(remove_images)
                .execute(&mut *tx)
                .await?;
        }

        // TODO: images appended here never become primary; promote the oldest
        // remaining row when the primary gets removed above.
        for image in new_images {
            sqlx::query(
                "INSERT INTO product_images (product_id, image_url, is_primary) VALUES ($1, $2, FALSE)",
            )
            .bind(product_id)
            .bind(&image.url)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(product)
    }

    /// Remove a listing. Image rows, favorites, and payment history cascade.
    pub async fn delete(&self, product_id: Uuid, caller: &AuthUser) -> Result<(), ProductError> {
        let owner_id = self.owner_of(product_id).await?;
        if !caller.can_modify(owner_id) {
            return Err(ProductError::Forbidden);
        }

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(product_id = %product_id, "product deleted");
        Ok(())
    }

    async fn owner_of(&self, product_id: Uuid) -> Result<Uuid, ProductError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(id,)| id).ok_or(ProductError::NotFound)
    }

    async fn category_exists(&self, id: Uuid) -> Result<bool, ProductError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}
