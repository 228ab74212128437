use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

use super::bind::{push_bind, Bind};
use super::page::Pagination;

/// Accumulates WHERE clauses with positional binds, then renders the page
/// statement and the count statement from the same predicate.
#[derive(Debug)]
pub struct ListQuery {
    conditions: Vec<String>,
    params: Vec<Bind>,
    order_sql: String,
    page: i64,
    limit: i64,
}

impl ListQuery {
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
            params: Vec::new(),
            order_sql: String::new(),
            page: 1,
            limit: 20,
        }
    }

    /// Register a bind value and return its `$n` placeholder
    pub fn param(&mut self, value: impl Into<Bind>) -> String {
        self.params.push(value.into());
        format!("${}", self.params.len())
    }

    /// Append a clause verbatim. Any placeholders in it must come from
    /// [`ListQuery::param`] on the same builder.
    pub fn and(&mut self, clause: impl Into<String>) {
        self.conditions.push(clause.into());
    }

    pub fn eq(&mut self, column: &str, value: impl Into<Bind>) {
        let p = self.param(value);
        self.and(format!("{column} = {p}"));
    }

    pub fn gte(&mut self, column: &str, value: impl Into<Bind>) {
        let p = self.param(value);
        self.and(format!("{column} >= {p}"));
    }

    pub fn lte(&mut self, column: &str, value: impl Into<Bind>) {
        let p = self.param(value);
        self.and(format!("{column} <= {p}"));
    }

    /// Case-insensitive substring match
    pub fn contains(&mut self, column: &str, needle: &str) {
        let p = self.param(format!("%{}%", needle));
        self.and(format!("{column} ILIKE {p}"));
    }

    /// One needle across several columns, sharing a single bind
    pub fn search(&mut self, columns: &[&str], needle: &str) {
        let p = self.param(format!("%{}%", needle));
        let clauses: Vec<String> = columns.iter().map(|c| format!("{c} ILIKE {p}")).collect();
        self.and(format!("({})", clauses.join(" OR ")));
    }

    /// Sort by a requested field when the endpoint allows it, otherwise by the
    /// default column. `allowed` maps public names to qualified columns, which
    /// keeps client input out of the SQL text entirely.
    pub fn order_by(
        &mut self,
        requested: Option<&str>,
        direction: Option<&str>,
        allowed: &[(&str, &str)],
        default_column: &str,
    ) {
        let column = requested
            .and_then(|name| allowed.iter().find(|(key, _)| *key == name))
            .map(|(_, col)| *col)
            .unwrap_or(default_column);
        let dir = match direction {
            Some(d) if d.eq_ignore_ascii_case("asc") => "ASC",
            _ => "DESC",
        };
        self.order_sql = format!("ORDER BY {column} {dir}");
    }

    /// Clamp and store the requested page. Out-of-range values fall back to
    /// usable bounds instead of erroring.
    pub fn paginate(
        &mut self,
        page: Option<i64>,
        limit: Option<i64>,
        default_limit: i64,
        max_limit: i64,
    ) {
        self.page = page.unwrap_or(1).max(1);
        self.limit = limit.unwrap_or(default_limit).clamp(1, max_limit);
    }

    fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Full page statement. LIMIT and OFFSET ride along as the two trailing
    /// binds, after every predicate placeholder.
    pub fn rows_sql(&self, select_prefix: &str) -> (String, Vec<Bind>) {
        let mut params = self.params.clone();
        params.push(Bind::Int(self.limit));
        let limit_ph = params.len();
        params.push(Bind::Int(self.offset()));
        let offset_ph = params.len();

        let parts = vec![
            select_prefix.trim().to_string(),
            self.where_sql(),
            self.order_sql.clone(),
            format!("LIMIT ${limit_ph} OFFSET ${offset_ph}"),
        ];
        let sql = parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ");
        (sql, params)
    }

    /// Count statement over the identical predicate, with no ordering or paging
    pub fn count_sql(&self, count_prefix: &str) -> (String, Vec<Bind>) {
        let parts = vec![count_prefix.trim().to_string(), self.where_sql()];
        let sql = parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" ");
        (sql, self.params.clone())
    }

    /// Run both statements and return the page beside its pagination envelope
    pub async fn fetch_paged<T>(
        &self,
        pool: &PgPool,
        select_prefix: &str,
        count_prefix: &str,
    ) -> Result<(Vec<T>, Pagination), sqlx::Error>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let (sql, binds) = self.rows_sql(select_prefix);
        let mut query = sqlx::query_as::<_, T>(&sql);
        for bind in &binds {
            query = push_bind(query, bind);
        }
        let rows = query.fetch_all(pool).await?;

        let (count_sql, count_binds) = self.count_sql(count_prefix);
        let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql);
        for bind in &count_binds {
            count_query = push_bind(count_query, bind);
        }
        let (total,) = count_query.fetch_one(pool).await?;

        Ok((rows, Pagination::new(total, self.page, self.limit)))
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    const ALLOWED: &[(&str, &str)] = &[("created_at", "p.created_at"), ("price", "p.price")];

    fn sample_query() -> ListQuery {
        let mut q = ListQuery::new();
        q.and("p.is_active = TRUE");
        q.eq("p.category_id", Uuid::nil());
        q.gte("p.price", Decimal::new(1000, 2));
        q.search(&["p.title", "p.description"], "radio");
        q.order_by(Some("price"), Some("asc"), ALLOWED, "p.created_at");
        q.paginate(Some(2), Some(10), 20, 100);
        q
    }

    #[test]
    fn test_rows_sql_appends_paging_after_predicate_binds() {
        let q = sample_query();
        let (sql, binds) = q.rows_sql("SELECT p.* FROM products p");

        assert!(sql.starts_with("SELECT p.* FROM products p WHERE p.is_active = TRUE"));
        assert!(sql.contains("p.category_id = $1"));
        assert!(sql.contains("p.price >= $2"));
        assert!(sql.contains("(p.title ILIKE $3 OR p.description ILIKE $3)"));
        assert!(sql.contains("ORDER BY p.price ASC"));
        assert!(sql.ends_with("LIMIT $4 OFFSET $5"));

        assert_eq!(binds.len(), 5);
        assert_eq!(binds[3], Bind::Int(10));
        // page 2 at limit 10 skips the first 10 rows
        assert_eq!(binds[4], Bind::Int(10));
    }

    #[test]
    fn test_count_sql_shares_predicate_and_drops_paging() {
        let q = sample_query();
        let (rows_sql, rows_binds) = q.rows_sql("SELECT p.* FROM products p");
        let (count_sql, count_binds) = q.count_sql("SELECT COUNT(*) FROM products p");

        let rows_where = rows_sql
            .split("WHERE")
            .nth(1)
            .and_then(|s| s.split("ORDER BY").next())
            .unwrap()
            .trim()
            .to_string();
        let count_where = count_sql.split("WHERE").nth(1).unwrap().trim().to_string();
        assert_eq!(rows_where, count_where);

        assert!(!count_sql.contains("ORDER BY"));
        assert!(!count_sql.contains("LIMIT"));
        assert_eq!(count_binds.len(), rows_binds.len() - 2);
        assert_eq!(&rows_binds[..count_binds.len()], &count_binds[..]);
    }

    #[test]
    fn test_search_reuses_a_single_bind() {
        let mut q = ListQuery::new();
        q.search(&["title", "description"], "bicycle");
        let (sql, binds) = q.count_sql("SELECT COUNT(*) FROM products");

        assert!(sql.contains("(title ILIKE $1 OR description ILIKE $1)"));
        assert_eq!(binds, vec![Bind::Text("%bicycle%".to_string())]);
    }

    #[test]
    fn test_order_by_rejects_unknown_field() {
        let mut q = ListQuery::new();
        q.order_by(Some("password_hash"), None, ALLOWED, "p.created_at");
        let (sql, _) = q.rows_sql("SELECT p.* FROM products p");
        assert!(sql.contains("ORDER BY p.created_at DESC"));
        assert!(!sql.contains("password_hash"));
    }

    #[test]
    fn test_order_by_direction_defaults_to_desc() {
        let mut q = ListQuery::new();
        q.order_by(Some("price"), Some("sideways"), ALLOWED, "p.created_at");
        let (sql, _) = q.rows_sql("SELECT p.* FROM products p");
        assert!(sql.contains("ORDER BY p.price DESC"));
    }

    #[test]
    fn test_paginate_clamps_out_of_range_values() {
        let mut q = ListQuery::new();
        q.paginate(Some(0), Some(0), 20, 100);
        let (_, binds) = q.rows_sql("SELECT 1");
        assert_eq!(binds, vec![Bind::Int(1), Bind::Int(0)]);

        let mut q = ListQuery::new();
        q.paginate(Some(-3), Some(10_000), 20, 100);
        let (_, binds) = q.rows_sql("SELECT 1");
        assert_eq!(binds, vec![Bind::Int(100), Bind::Int(0)]);
    }

    #[test]
    fn test_empty_predicate_renders_no_where() {
        let mut q = ListQuery::new();
        q.paginate(None, None, 20, 100);
        let (sql, binds) = q.rows_sql("SELECT p.* FROM products p");
        assert_eq!(sql, "SELECT p.* FROM products p LIMIT $1 OFFSET $2");
        assert_eq!(binds, vec![Bind::Int(20), Bind::Int(0)]);
    }

    #[test]
    fn test_param_returns_sequential_placeholders() {
        let mut q = ListQuery::new();
        let a = q.param(Uuid::nil());
        let b = q.param("x");
        assert_eq!(a, "$1");
        assert_eq!(b, "$2");
    }
}
