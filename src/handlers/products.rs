use std::collections::HashSet;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::config;
use crate::error::{ApiError, ApiResult};
use crate::listing::ListQuery;
use crate::middleware::{AuthUser, MaybeUser};
use crate::models::product::{ProductDetail, ProductImage, ProductSummary, CONDITIONS};
use crate::services::{NewProduct, ProductChanges, ProductService};
use crate::uploads::{self, UploadForm};

const SORT_FIELDS: &[(&str, &str)] = &[
    ("created_at", "p.created_at"),
    ("price", "p.price"),
    ("views", "p.views"),
    ("rating", "p.rating"),
    ("title", "p.title"),
];

pub(crate) const LIST_SELECT: &str = r#"
    SELECT p.*,
           c.name AS category_name,
           u.username AS seller_username,
           (SELECT pi.image_url FROM product_images pi
             WHERE pi.product_id = p.id
             ORDER BY pi.is_primary DESC, pi.created_at ASC
             LIMIT 1) AS primary_image
    FROM products p
    JOIN users u ON u.id = p.user_id
    LEFT JOIN categories c ON c.id = p.category_id
"#;

// Filters only touch p.* columns, so the count can skip the joins
pub(crate) const LIST_COUNT: &str = "SELECT COUNT(*) FROM products p";

const DETAIL_SELECT: &str = r#"
    SELECT p.*,
           c.name AS category_name,
           u.username AS seller_username,
           u.avatar_url AS seller_avatar_url,
           u.is_verified AS seller_verified
    FROM products p
    JOIN users u ON u.id = p.user_id
    LEFT JOIN categories c ON c.id = p.category_id
    WHERE p.id = $1
"#;

const IMAGES_SELECT: &str =
    "SELECT * FROM product_images WHERE product_id = $1 ORDER BY is_primary DESC, created_at ASC";

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilters {
    pub category: Option<Uuid>,
    pub location: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub condition: Option<String>,
    pub search: Option<String>,
    pub is_hot_sale: Option<bool>,
    pub is_negotiable: Option<bool>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/products. Public browse over active listings.
pub async fn list(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(filters): Query<ProductFilters>,
) -> ApiResult<Json<Value>> {
    let mut query = ListQuery::new();
    query.and("p.is_active = TRUE");
    apply_filters(&mut query, &filters)?;
    query.order_by(filters.sort_by.as_deref(), filters.order.as_deref(), SORT_FIELDS, "p.created_at");
    let cfg = &config().pagination;
    query.paginate(filters.page, filters.limit, cfg.default_limit, cfg.max_limit);

    let (products, pagination): (Vec<ProductSummary>, _) =
        query.fetch_paged(&state.db, LIST_SELECT, LIST_COUNT).await?;
    let products = with_favorites(&state.db, viewer.id(), products).await?;

    Ok(Json(json!({"success": true, "products": products, "pagination": pagination})))
}

/// GET /api/products/:id. Each hit counts as a view, so the bump runs first
/// and doubles as the existence check.
pub async fn detail(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let bumped = sqlx::query("UPDATE products SET views = views + 1 WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if bumped.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    let product: ProductDetail =
        sqlx::query_as(DETAIL_SELECT).bind(id).fetch_one(&state.db).await?;
    let images: Vec<ProductImage> =
        sqlx::query_as(IMAGES_SELECT).bind(id).fetch_all(&state.db).await?;

    let is_favorited = match viewer.id() {
        Some(user_id) => {
            let (favorited,): (bool,) = sqlx::query_as(
                "SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = $1 AND product_id = $2)",
            )
            .bind(user_id)
            .bind(id)
            .fetch_one(&state.db)
            .await?;
            favorited
        }
        None => false,
    };

    let mut payload = serde_json::to_value(&product)?;
    if let Some(map) = payload.as_object_mut() {
        map.insert("images".to_string(), serde_json::to_value(&images)?);
        map.insert("is_favorited".to_string(), Value::Bool(is_favorited));
    }

    Ok(Json(json!({"success": true, "product": payload})))
}

/// POST /api/products. Multipart form: text fields plus up to the configured
/// number of images. The first image of the batch becomes the primary.
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let form = uploads::read_form(&mut multipart).await?;
    let new = parse_new_product(&user, &form)?;

    let cfg = config();
    let stored = uploads::store_all(
        &cfg.uploads.dir,
        &form.files,
        cfg.uploads.max_files,
        cfg.uploads.max_file_bytes,
    )
    .await?;

    let service = ProductService::new(state.db.clone());
    let product = match service.create_with_images(new, &stored).await {
        Ok(product) => product,
        Err(e) => {
            // No rows landed, so the written files are orphans
            uploads::discard(&stored).await;
            return Err(e.into());
        }
    };

    let images: Vec<ProductImage> =
        sqlx::query_as(IMAGES_SELECT).bind(product.id).fetch_all(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Product listed",
            "product": product,
            "images": images,
        })),
    ))
}

/// PUT /api/products/:id. Same multipart shape as create with every field
/// optional. New files append to the gallery; `remove_images` takes a comma
/// separated list of image ids to drop.
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = uploads::read_form(&mut multipart).await?;
    let changes = parse_changes(&form)?;
    let remove_images = parse_remove_images(&form)?;

    let cfg = config();
    let stored = uploads::store_all(
        &cfg.uploads.dir,
        &form.files,
        cfg.uploads.max_files,
        cfg.uploads.max_file_bytes,
    )
    .await?;

    let service = ProductService::new(state.db.clone());
    let product =
        match service.update_with_images(id, &user, changes, &remove_images, &stored).await {
            Ok(product) => product,
            Err(e) => {
                uploads::discard(&stored).await;
                return Err(e.into());
            }
        };

    let images: Vec<ProductImage> =
        sqlx::query_as(IMAGES_SELECT).bind(id).fetch_all(&state.db).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Product updated",
        "product": product,
        "images": images,
    })))
}

/// DELETE /api/products/:id. Owner or admin; images cascade with the row.
pub async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    ProductService::new(state.db.clone()).delete(id, &user).await?;
    Ok(Json(json!({"success": true, "message": "Product deleted"})))
}

#[derive(Debug, Default, Deserialize)]
pub struct MyProductFilters {
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// GET /api/products/my. Sellers see their inactive listings here too.
pub async fn my_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filters): Query<MyProductFilters>,
) -> ApiResult<Json<Value>> {
    let mut query = ListQuery::new();
    query.eq("p.user_id", user.id);
    if let Some(is_active) = filters.is_active {
        query.eq("p.is_active", is_active);
    }
    query.order_by(None, None, SORT_FIELDS, "p.created_at");
    let cfg = &config().pagination;
    query.paginate(filters.page, filters.limit, cfg.default_limit, cfg.max_limit);

    let (products, pagination): (Vec<ProductSummary>, _) =
        query.fetch_paged(&state.db, LIST_SELECT, LIST_COUNT).await?;
    let products = with_favorites(&state.db, Some(user.id), products).await?;

    Ok(Json(json!({"success": true, "products": products, "pagination": pagination})))
}

/// POST /api/products/:id/favorite. Toggles; the response says which way it went.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
        .bind(id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(ApiError::not_found("Product not found"));
    }

    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
        .bind(user.id)
        .bind(id)
        .execute(&state.db)
        .await?;
    if removed.rows_affected() > 0 {
        return Ok(Json(json!({
            "success": true,
            "message": "Removed from favorites",
            "favorited": false,
        })));
    }

    sqlx::query(
        "INSERT INTO favorites (user_id, product_id) VALUES ($1, $2) \
         ON CONFLICT (user_id, product_id) DO NOTHING",
    )
    .bind(user.id)
    .bind(id)
    .execute(&state.db)
    .await?;

    Ok(Json(json!({"success": true, "message": "Added to favorites", "favorited": true})))
}

fn apply_filters(query: &mut ListQuery, filters: &ProductFilters) -> Result<(), ApiError> {
    if let Some(category) = filters.category {
        query.eq("p.category_id", category);
    }
    if let Some(location) = clean(&filters.location) {
        query.contains("p.location", location);
    }
    if let Some(min_price) = filters.min_price {
        query.gte("p.price", min_price);
    }
    if let Some(max_price) = filters.max_price {
        query.lte("p.price", max_price);
    }
    if let Some(condition) = clean(&filters.condition) {
        if !CONDITIONS.contains(&condition) {
            return Err(ApiError::bad_request("Unknown product condition"));
        }
        query.eq("p.condition", condition);
    }
    if let Some(term) = clean(&filters.search) {
        query.search(&["p.title", "p.description"], term);
    }
    if let Some(hot) = filters.is_hot_sale {
        query.eq("p.is_hot_sale", hot);
    }
    if let Some(negotiable) = filters.is_negotiable {
        query.eq("p.is_negotiable", negotiable);
    }
    Ok(())
}

fn clean(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Stamp `is_favorited` onto serialized product rows. Anonymous viewers get
/// `false` across the board without touching the database.
pub(crate) async fn with_favorites<T: Serialize>(
    pool: &PgPool,
    viewer: Option<Uuid>,
    rows: Vec<T>,
) -> Result<Vec<Value>, ApiError> {
    let mut values = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;

    let ids: Vec<Uuid> = values.iter().filter_map(row_id).collect();
    let favorited = match viewer {
        Some(user_id) if !ids.is_empty() => favorite_ids(pool, user_id, &ids).await?,
        _ => HashSet::new(),
    };

    for value in &mut values {
        let is_favorited = row_id(value).map(|id| favorited.contains(&id)).unwrap_or(false);
        if let Some(map) = value.as_object_mut() {
            map.insert("is_favorited".to_string(), Value::Bool(is_favorited));
        }
    }
    Ok(values)
}

async fn favorite_ids(
    pool: &PgPool,
    user_id: Uuid,
    product_ids: &[Uuid],
) -> Result<HashSet<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT product_id FROM favorites WHERE user_id = $1 AND product_id = ANY($2)")
            .bind(user_id)
            .bind(product_ids)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

fn row_id(value: &Value) -> Option<Uuid> {
    value.get("id")?.as_str()?.parse().ok()
}

fn parse_new_product(user: &AuthUser, form: &UploadForm) -> Result<NewProduct, ApiError> {
    let title = require_field(form, "title")?;
    let description = require_field(form, "description")?;
    let price = parse_price(&require_field(form, "price")?)?;
    let condition = require_field(form, "condition")?;
    if !CONDITIONS.contains(&condition.as_str()) {
        return Err(ApiError::bad_request("Unknown product condition"));
    }

    Ok(NewProduct {
        user_id: user.id,
        category_id: field_uuid(form, "category_id")?,
        title,
        description,
        price,
        original_price: field_decimal(form, "original_price")?,
        condition,
        location: form.field("location").map(str::to_string),
        latitude: field_f64(form, "latitude")?,
        longitude: field_f64(form, "longitude")?,
        is_negotiable: field_bool(form, "is_negotiable")?.unwrap_or(false),
        is_hot_sale: field_bool(form, "is_hot_sale")?.unwrap_or(false),
        discount_percentage: field_discount(form)?,
    })
}

fn parse_changes(form: &UploadForm) -> Result<ProductChanges, ApiError> {
    let condition = form.field("condition").map(str::to_string);
    if let Some(condition) = &condition {
        if !CONDITIONS.contains(&condition.as_str()) {
            return Err(ApiError::bad_request("Unknown product condition"));
        }
    }

    Ok(ProductChanges {
        category_id: field_uuid(form, "category_id")?,
        title: form.field("title").map(str::to_string),
        description: form.field("description").map(str::to_string),
        price: form.field("price").map(parse_price).transpose()?,
        original_price: field_decimal(form, "original_price")?,
        condition,
        location: form.field("location").map(str::to_string),
        latitude: field_f64(form, "latitude")?,
        longitude: field_f64(form, "longitude")?,
        is_negotiable: field_bool(form, "is_negotiable")?,
        is_hot_sale: field_bool(form, "is_hot_sale")?,
        is_active: field_bool(form, "is_active")?,
        discount_percentage: field_discount(form)?,
    })
}

fn parse_remove_images(form: &UploadForm) -> Result<Vec<Uuid>, ApiError> {
    match form.field("remove_images") {
        None => Ok(Vec::new()),
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse().map_err(|_| {
                    ApiError::bad_request("remove_images must be a comma separated list of image ids")
                })
            })
            .collect(),
    }
}

fn require_field(form: &UploadForm, name: &str) -> Result<String, ApiError> {
    form.field(name)
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request(format!("{name} is required")))
}

fn parse_price(raw: &str) -> Result<Decimal, ApiError> {
    let price: Decimal = raw.parse().map_err(|_| ApiError::bad_request("price must be a number"))?;
    if price <= Decimal::ZERO {
        return Err(ApiError::bad_request("price must be greater than zero"));
    }
    Ok(price)
}

fn field_decimal(form: &UploadForm, name: &str) -> Result<Option<Decimal>, ApiError> {
    form.field(name)
        .map(|raw| raw.parse().map_err(|_| ApiError::bad_request(format!("{name} must be a number"))))
        .transpose()
}

fn field_f64(form: &UploadForm, name: &str) -> Result<Option<f64>, ApiError> {
    form.field(name)
        .map(|raw| raw.parse().map_err(|_| ApiError::bad_request(format!("{name} must be a number"))))
        .transpose()
}

fn field_uuid(form: &UploadForm, name: &str) -> Result<Option<Uuid>, ApiError> {
    form.field(name)
        .map(|raw| raw.parse().map_err(|_| ApiError::bad_request(format!("{name} must be a valid id"))))
        .transpose()
}

fn field_bool(form: &UploadForm, name: &str) -> Result<Option<bool>, ApiError> {
    match form.field(name) {
        None => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(_) => Err(ApiError::bad_request(format!("{name} must be true or false"))),
    }
}

fn field_discount(form: &UploadForm) -> Result<Option<i32>, ApiError> {
    let discount = match form.field("discount_percentage") {
        None => return Ok(None),
        Some(raw) => raw
            .parse::<i32>()
            .map_err(|_| ApiError::bad_request("discount_percentage must be a whole number"))?,
    };
    if !(0..=100).contains(&discount) {
        return Err(ApiError::bad_request("discount_percentage must be between 0 and 100"));
    }
    Ok(Some(discount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::ROLE_USER;

    fn form(pairs: &[(&str, &str)]) -> UploadForm {
        let mut form = UploadForm::default();
        for (name, value) in pairs {
            form.fields.insert(name.to_string(), value.to_string());
        }
        form
    }

    fn seller() -> AuthUser {
        AuthUser { id: Uuid::new_v4(), username: "seller".to_string(), role: ROLE_USER.to_string() }
    }

    #[test]
    fn test_new_product_requires_core_fields() {
        let missing_price =
            form(&[("title", "Bike"), ("description", "Barely used"), ("condition", "good")]);
        let err = parse_new_product(&seller(), &missing_price).unwrap_err();
        assert!(err.message().contains("price"));
    }

    #[test]
    fn test_price_must_be_positive() {
        assert!(parse_price("150000").is_ok());
        assert!(parse_price("12.50").is_ok());
        assert!(parse_price("0").is_err());
        assert!(parse_price("-5").is_err());
        assert!(parse_price("cheap").is_err());
    }

    #[test]
    fn test_condition_checked_against_allowed_values() {
        let bad = form(&[
            ("title", "Bike"),
            ("description", "Barely used"),
            ("price", "100"),
            ("condition", "mint"),
        ]);
        let err = parse_new_product(&seller(), &bad).unwrap_err();
        assert!(err.message().contains("condition"));
    }

    #[test]
    fn test_discount_range() {
        assert_eq!(field_discount(&form(&[("discount_percentage", "25")])).unwrap(), Some(25));
        assert_eq!(field_discount(&form(&[])).unwrap(), None);
        assert!(field_discount(&form(&[("discount_percentage", "101")])).is_err());
        assert!(field_discount(&form(&[("discount_percentage", "-1")])).is_err());
    }

    #[test]
    fn test_bool_fields_accept_form_spellings() {
        assert_eq!(field_bool(&form(&[("is_active", "true")]), "is_active").unwrap(), Some(true));
        assert_eq!(field_bool(&form(&[("is_active", "0")]), "is_active").unwrap(), Some(false));
        assert!(field_bool(&form(&[("is_active", "maybe")]), "is_active").is_err());
    }

    #[test]
    fn test_remove_images_parses_comma_list() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let parsed =
            parse_remove_images(&form(&[("remove_images", &format!("{a}, {b},"))])).unwrap();
        assert_eq!(parsed, vec![a, b]);
        assert!(parse_remove_images(&form(&[("remove_images", "not-an-id")])).is_err());
    }

    #[test]
    fn test_changes_default_to_untouched() {
        let changes = parse_changes(&form(&[])).unwrap();
        assert!(changes.title.is_none());
        assert!(changes.price.is_none());
        assert!(changes.is_active.is_none());
    }
}
