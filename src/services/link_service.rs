use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{prelude::*, *};
use crate::services::link_cache::LinkCache;
use crate::utils::{short_code, validation::validate_original_url};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Expr, Func, LikeExpr},
};
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// One page of a user's links plus the total number of matches.
#[derive(Debug, Clone)]
pub struct LinkPage {
    pub items: Vec<links::Model>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

pub struct LinkService {
    db: DatabaseConnection,
    cache: LinkCache,
    config: AppConfig,
    own_host: Option<String>,
}

impl LinkService {
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        let cache = LinkCache::new(
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_capacity,
        );
        let own_host = config.public_host();
        Self {
            db,
            cache,
            config,
            own_host,
        }
    }

    pub fn cache(&self) -> &LinkCache {
        &self.cache
    }

    /// Absolute URL a visitor follows for `code`.
    pub fn short_url(&self, code: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            code
        )
    }

    fn check_url(&self, raw: &str) -> Result<String, AppError> {
        validate_original_url(raw, self.config.max_url_length, self.own_host.as_deref())
            .map_err(|e| AppError::BadRequest(e.message))
    }

    #[instrument(name = "LinkService: create", skip(self, original_url))]
    pub async fn create(
        &self,
        owner: &str,
        original_url: &str,
        custom_code: Option<&str>,
    ) -> Result<links::Model, AppError> {
        let original_url = self.check_url(original_url)?;

        if let Some(code) = custom_code {
            short_code::validate_custom(code).map_err(AppError::BadRequest)?;
            return self
                .insert(owner, &original_url, code)
                .await
                .map_err(|e| {
                    if AppError::is_unique_violation(&e) {
                        AppError::Conflict(format!("Short code '{}' is already taken", code))
                    } else {
                        AppError::Database(e)
                    }
                });
        }

        let attempts = self.config.short_code_max_attempts.max(1);
        for attempt in 1..=attempts {
            let code = short_code::generate(self.config.short_code_length);
            if short_code::is_reserved(&code) {
                continue;
            }
            match self.insert(owner, &original_url, &code).await {
                Ok(link) => {
                    info!(short_code = %link.short_code, "Link created");
                    return Ok(link);
                }
                Err(e) if AppError::is_unique_violation(&e) => {
                    warn!(attempt, "Generated short code collided, retrying");
                }
                Err(e) => return Err(AppError::Database(e)),
            }
        }

        Err(AppError::Internal(format!(
            "Could not allocate a unique short code after {} attempts",
            attempts
        )))
    }

    async fn insert(
        &self,
        owner: &str,
        original_url: &str,
        code: &str,
    ) -> Result<links::Model, sea_orm::DbErr> {
        links::ActiveModel {
            user_id: Set(owner.to_string()),
            original_url: Set(original_url.to_string()),
            short_code: Set(code.to_string()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
    }

    pub async fn list(
        &self,
        owner: &str,
        page: u64,
        per_page: u64,
        search: Option<&str>,
    ) -> Result<LinkPage, AppError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);

        let mut cond = Condition::all().add(links::Column::UserId.eq(owner));

        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            // Case-insensitive substring match on either column
            cond = cond.add(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(links::Column::OriginalUrl)))
                            .like(LikeExpr::new(pattern.clone()).escape('\\')),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(links::Column::ShortCode)))
                            .like(LikeExpr::new(pattern).escape('\\')),
                    ),
            );
        }

        let paginator = Links::find()
            .filter(cond)
            .order_by_desc(links::Column::CreatedAt)
            .order_by_desc(links::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(LinkPage {
            items,
            page,
            per_page,
            total,
        })
    }

    pub async fn get(&self, owner: &str, id: i32) -> Result<links::Model, AppError> {
        Links::find_by_id(id)
            .filter(links::Column::UserId.eq(owner))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Link not found".to_string()))
    }

    #[instrument(name = "LinkService: update", skip(self, original_url))]
    pub async fn update(
        &self,
        owner: &str,
        id: i32,
        original_url: Option<&str>,
        new_code: Option<&str>,
    ) -> Result<links::Model, AppError> {
        if original_url.is_none() && new_code.is_none() {
            return Err(AppError::BadRequest(
                "Nothing to update: provide original_url or short_code".to_string(),
            ));
        }

        let original_url = original_url.map(|u| self.check_url(u)).transpose()?;
        if let Some(code) = new_code {
            short_code::validate_custom(code).map_err(AppError::BadRequest)?;
        }

        let existing = self.get(owner, id).await?;
        let old_code = existing.short_code.clone();

        let mut active: links::ActiveModel = existing.into();
        if let Some(url) = original_url {
            active.original_url = Set(url);
        }
        if let Some(code) = new_code {
            if code != old_code {
                active.short_code = Set(code.to_string());
            }
        }

        let updated = active.update(&self.db).await.map_err(|e| {
            if AppError::is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Short code '{}' is already taken",
                    new_code.unwrap_or_default()
                ))
            } else {
                AppError::Database(e)
            }
        })?;

        self.cache.invalidate(&old_code);
        info!(short_code = %updated.short_code, "Link updated");
        Ok(updated)
    }

    pub async fn delete(&self, owner: &str, id: i32) -> Result<(), AppError> {
        let link = self.get(owner, id).await?;
        let code = link.short_code.clone();
        link.delete(&self.db).await?;
        self.cache.invalidate(&code);
        info!(short_code = %code, "Link deleted");
        Ok(())
    }

    /// Public lookup behind the redirect route.
    #[instrument(name = "LinkService: resolve", skip(self))]
    pub async fn resolve(&self, code: &str) -> Result<String, AppError> {
        if let Some(url) = self.cache.get(code) {
            return Ok(url);
        }
        let generation = self.cache.generation();

        let link = Links::find()
            .filter(links::Column::ShortCode.eq(code))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Short link not found".to_string()))?;

        self.cache.insert(code, &link.original_url, generation);
        Ok(link.original_url)
    }
}

/// Makes `%`, `_` and `\` match literally inside a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("my_code"), r"my\_code");
        assert_eq!(escape_like("100%"), r"100\%");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
