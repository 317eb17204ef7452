use super::models::StylingGuide;
use super::{now, DatabasePool};
use crate::error::StoreResult;
use crate::styling::StylingGuides;

/// Versioned styling guides, one version series per product type.
pub struct StylingGuideRepository;

fn normalize(product_type: &str) -> String {
    product_type.trim().to_lowercase()
}

impl StylingGuideRepository {
    /// Save `guide` as the next version for `product_type`.
    pub async fn save(
        pool: &DatabasePool,
        product_type: &str,
        guide: &str,
    ) -> StoreResult<StylingGuide> {
        let product_type = normalize(product_type);
        let mut tx = pool.begin().await?;

        let version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM styling_guides WHERE product_type = ?",
        )
        .bind(&product_type)
        .fetch_one(&mut *tx)
        .await?;

        let saved = sqlx::query_as::<_, StylingGuide>(
            "INSERT INTO styling_guides (product_type, version, guide, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&product_type)
        .bind(version)
        .bind(guide)
        .bind(now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    pub async fn find_by_id(pool: &DatabasePool, id: i64) -> StoreResult<Option<StylingGuide>> {
        let guide = sqlx::query_as::<_, StylingGuide>("SELECT * FROM styling_guides WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(guide)
    }

    /// Latest version for one product type.
    pub async fn latest(
        pool: &DatabasePool,
        product_type: &str,
    ) -> StoreResult<Option<StylingGuide>> {
        let guide = sqlx::query_as::<_, StylingGuide>(
            "SELECT * FROM styling_guides WHERE product_type = ?
             ORDER BY version DESC LIMIT 1",
        )
        .bind(normalize(product_type))
        .fetch_optional(pool)
        .await?;
        Ok(guide)
    }

    /// Latest version of every product type.
    pub async fn latest_all(pool: &DatabasePool) -> StoreResult<Vec<StylingGuide>> {
        let guides = sqlx::query_as::<_, StylingGuide>(
            "SELECT g.* FROM styling_guides g
             JOIN (SELECT product_type, MAX(version) AS version
                   FROM styling_guides GROUP BY product_type) latest
               ON g.product_type = latest.product_type AND g.version = latest.version
             ORDER BY g.product_type ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(guides)
    }

    pub async fn versions(
        pool: &DatabasePool,
        product_type: &str,
    ) -> StoreResult<Vec<StylingGuide>> {
        let guides = sqlx::query_as::<_, StylingGuide>(
            "SELECT * FROM styling_guides WHERE product_type = ? ORDER BY version ASC",
        )
        .bind(normalize(product_type))
        .fetch_all(pool)
        .await?;
        Ok(guides)
    }

    pub async fn list(pool: &DatabasePool) -> StoreResult<Vec<StylingGuide>> {
        let guides = sqlx::query_as::<_, StylingGuide>(
            "SELECT * FROM styling_guides ORDER BY product_type ASC, version ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(guides)
    }

    pub async fn delete(pool: &DatabasePool, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM styling_guides WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lookup table built from the latest guide per product type.
    pub async fn load(pool: &DatabasePool) -> StoreResult<StylingGuides> {
        let guides = Self::latest_all(pool).await?;
        Ok(StylingGuides::from_rows(
            guides.into_iter().map(|g| (g.product_type, g.guide)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_database;

    #[tokio::test]
    async fn test_versions_per_product_type() {
        let db = memory_database().await;
        let v1 = StylingGuideRepository::save(db.pool(), "Dress", "old").await.unwrap();
        let v2 = StylingGuideRepository::save(db.pool(), " dress ", "new").await.unwrap();
        let lamp = StylingGuideRepository::save(db.pool(), "lamp", "bright").await.unwrap();

        assert_eq!(v1.product_type, "dress");
        assert_eq!((v1.version, v2.version, lamp.version), (1, 2, 1));
        assert_eq!(
            StylingGuideRepository::versions(db.pool(), "DRESS")
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            StylingGuideRepository::latest(db.pool(), "dress")
                .await
                .unwrap()
                .unwrap()
                .guide,
            "new"
        );
    }

    #[tokio::test]
    async fn test_latest_all_and_load() {
        let db = memory_database().await;
        StylingGuideRepository::save(db.pool(), "dress", "old").await.unwrap();
        StylingGuideRepository::save(db.pool(), "dress", "new").await.unwrap();
        StylingGuideRepository::save(db.pool(), "default", "Be concise.").await.unwrap();

        let latest = StylingGuideRepository::latest_all(db.pool()).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].product_type, "default");
        assert_eq!(latest[1].guide, "new");

        let guides = StylingGuideRepository::load(db.pool()).await.unwrap();
        assert_eq!(guides.guide_for("dress"), "new");
        assert_eq!(guides.guide_for("lamp"), "Be concise.");
    }

    #[tokio::test]
    async fn test_delete() {
        let db = memory_database().await;
        let guide = StylingGuideRepository::save(db.pool(), "dress", "x").await.unwrap();
        assert!(StylingGuideRepository::delete(db.pool(), guide.id).await.unwrap());
        assert!(StylingGuideRepository::find_by_id(db.pool(), guide.id)
            .await
            .unwrap()
            .is_none());
        assert!(StylingGuideRepository::list(db.pool()).await.unwrap().is_empty());
    }
}
