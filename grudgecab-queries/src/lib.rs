use std::str::FromStr;

use chrono::NaiveDateTime;
use grudgecab_common::{
    models::{Grudge, RatingCodes, Ratings, Story},
    Conf,
};
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, Transaction,
};

pub use sqlx::SqlitePool as Pool;

pub type SqliteTransaction<'l> = Transaction<'l, Sqlite>;

static MIGRATOR: Migrator = sqlx::migrate!();

#[tracing::instrument(skip(conf), err)]
pub async fn init_database_connection(conf: &Conf) -> Result<Pool, grudgecab_common::Report> {
    let options = SqliteConnectOptions::from_str(&conf.database)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    MIGRATOR.run(&pool).await?;

    Ok(pool)
}

#[derive(sqlx::FromRow)]
struct StoryRow {
    id: i64,
    title: String,
    origin: String,
    created: NaiveDateTime,
    updated: NaiveDateTime,
}

impl From<StoryRow> for Story {
    fn from(row: StoryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            origin: row.origin,
            created: row.created,
            updated: row.updated,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GrudgeRow {
    id: i64,
    grudgee_intention: i64,
    grudgee_knowledge: i64,
    seriousness_of_situation: i64,
    grudge_effect: i64,
    grudgee_skill: i64,
    harm_level: i64,
    grr_factor: i64,
    grudge_length: i64,
    grudgee_risk: i64,
    grudge_easily_forgiven: i64,
    grudgee_significance: i64,
    created: NaiveDateTime,
    updated: NaiveDateTime,
    story_id: i64,
    story_title: String,
    story_origin: String,
    story_created: NaiveDateTime,
    story_updated: NaiveDateTime,
}

impl TryFrom<GrudgeRow> for Grudge {
    type Error = grudgecab_common::Report;

    // Decoding is where stored codes are checked against the closed
    // enumerations. A row that fails here was written by something other
    // than this crate.
    fn try_from(row: GrudgeRow) -> Result<Self, Self::Error> {
        let ratings = Ratings::try_from(RatingCodes {
            grudgee_intention: row.grudgee_intention,
            grudgee_knowledge: row.grudgee_knowledge,
            seriousness_of_situation: row.seriousness_of_situation,
            grudge_effect: row.grudge_effect,
            grudgee_skill: row.grudgee_skill,
            harm_level: row.harm_level,
            grr_factor: row.grr_factor,
            grudge_length: row.grudge_length,
            grudgee_risk: row.grudgee_risk,
            grudge_easily_forgiven: row.grudge_easily_forgiven,
            grudgee_significance: row.grudgee_significance,
        })?;

        Ok(Self {
            id: row.id,
            story: Some(Story {
                id: row.story_id,
                title: row.story_title,
                origin: row.story_origin,
                created: row.story_created,
                updated: row.story_updated,
            }),
            ratings: Some(ratings),
            created: row.created,
            updated: row.updated,
        })
    }
}

static GRUDGE_COLUMNS: &str = "
    g.id, g.grudgee_intention, g.grudgee_knowledge, g.seriousness_of_situation,
    g.grudge_effect, g.grudgee_skill, g.harm_level, g.grr_factor,
    g.grudge_length, g.grudgee_risk, g.grudge_easily_forgiven,
    g.grudgee_significance, g.created, g.updated,
    s.id AS story_id, s.title AS story_title, s.origin AS story_origin,
    s.created AS story_created, s.updated AS story_updated
";

#[tracing::instrument(skip(trans, title, origin), err)]
pub async fn create_story(
    trans: &mut SqliteTransaction<'_>,
    title: &str,
    origin: &str,
) -> Result<i64, grudgecab_common::Report> {
    let result = sqlx::query("INSERT INTO stories(title, origin) VALUES (?, ?)")
        .bind(title)
        .bind(origin)
        .execute(&mut *trans)
        .await?;

    Ok(result.last_insert_rowid())
}

#[tracing::instrument(skip(pool), err)]
pub async fn get_story(
    pool: Pool,
    story_id: i64,
) -> Result<Option<Story>, grudgecab_common::Report> {
    let row = sqlx::query_as::<_, StoryRow>(
        "SELECT id, title, origin, created, updated FROM stories WHERE id = ?",
    )
    .bind(story_id)
    .fetch_optional(&pool)
    .await?;

    Ok(row.map(Story::from))
}

/// Deletes a story and, through the schema's cascade, the grudge holding
/// onto it.
#[tracing::instrument(skip(pool), err)]
pub async fn delete_story(pool: Pool, story_id: i64) -> Result<bool, grudgecab_common::Report> {
    let result = sqlx::query("DELETE FROM stories WHERE id = ?")
        .bind(story_id)
        .execute(&pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[tracing::instrument(skip(trans, ratings), err)]
pub async fn create_grudge(
    trans: &mut SqliteTransaction<'_>,
    story_id: i64,
    ratings: &Ratings,
) -> Result<i64, grudgecab_common::Report> {
    let codes = ratings.codes();

    let result = sqlx::query(
        "INSERT INTO grudges(
            story_id, grudgee_intention, grudgee_knowledge,
            seriousness_of_situation, grudge_effect, grudgee_skill,
            harm_level, grr_factor, grudge_length, grudgee_risk,
            grudge_easily_forgiven, grudgee_significance
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(story_id)
    .bind(codes.grudgee_intention)
    .bind(codes.grudgee_knowledge)
    .bind(codes.seriousness_of_situation)
    .bind(codes.grudge_effect)
    .bind(codes.grudgee_skill)
    .bind(codes.harm_level)
    .bind(codes.grr_factor)
    .bind(codes.grudge_length)
    .bind(codes.grudgee_risk)
    .bind(codes.grudge_easily_forgiven)
    .bind(codes.grudgee_significance)
    .execute(&mut *trans)
    .await?;

    Ok(result.last_insert_rowid())
}

#[tracing::instrument(skip(pool), err)]
pub async fn get_grudge(
    pool: Pool,
    grudge_id: i64,
) -> Result<Option<Grudge>, grudgecab_common::Report> {
    let query = format!(
        "SELECT {} FROM grudges g INNER JOIN stories s ON s.id = g.story_id WHERE g.id = ?",
        GRUDGE_COLUMNS,
    );

    let row = sqlx::query_as::<_, GrudgeRow>(&query)
        .bind(grudge_id)
        .fetch_optional(&pool)
        .await?;

    row.map(Grudge::try_from).transpose()
}

#[tracing::instrument(skip(pool), err)]
pub async fn list_grudges(pool: Pool) -> Result<Vec<Grudge>, grudgecab_common::Report> {
    let query = format!(
        "SELECT {} FROM grudges g INNER JOIN stories s ON s.id = g.story_id
         ORDER BY g.created DESC, g.id DESC",
        GRUDGE_COLUMNS,
    );

    let rows = sqlx::query_as::<_, GrudgeRow>(&query).fetch_all(&pool).await?;

    rows.into_iter().map(Grudge::try_from).collect()
}

#[tracing::instrument(skip(pool, ratings), err)]
pub async fn update_grudge(
    pool: Pool,
    grudge_id: i64,
    ratings: &Ratings,
) -> Result<bool, grudgecab_common::Report> {
    let codes = ratings.codes();

    let result = sqlx::query(
        "UPDATE grudges SET
            grudgee_intention = ?, grudgee_knowledge = ?,
            seriousness_of_situation = ?, grudge_effect = ?,
            grudgee_skill = ?, harm_level = ?, grr_factor = ?,
            grudge_length = ?, grudgee_risk = ?, grudge_easily_forgiven = ?,
            grudgee_significance = ?, updated = CURRENT_TIMESTAMP
        WHERE id = ?",
    )
    .bind(codes.grudgee_intention)
    .bind(codes.grudgee_knowledge)
    .bind(codes.seriousness_of_situation)
    .bind(codes.grudge_effect)
    .bind(codes.grudgee_skill)
    .bind(codes.harm_level)
    .bind(codes.grr_factor)
    .bind(codes.grudge_length)
    .bind(codes.grudgee_risk)
    .bind(codes.grudge_easily_forgiven)
    .bind(codes.grudgee_significance)
    .bind(grudge_id)
    .execute(&pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[tracing::instrument(skip(pool), err)]
pub async fn delete_grudge(pool: Pool, grudge_id: i64) -> Result<bool, grudgecab_common::Report> {
    let result = sqlx::query("DELETE FROM grudges WHERE id = ?")
        .bind(grudge_id)
        .execute(&pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_grudge_count(pool: Pool) -> Result<i64, grudgecab_common::Report> {
    #[derive(sqlx::FromRow)]
    struct Count {
        estimate: i64,
    }

    let count = sqlx::query_as::<_, Count>("SELECT COUNT(1) AS estimate FROM grudges")
        .fetch_one(&pool)
        .await?;

    Ok(count.estimate)
}

#[cfg(test)]
mod tests {
    use grudgecab_common::models::{GrrFactor, Intention, RatingCodes};

    use super::*;

    async fn cabinet() -> Pool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);

        // One connection so every query sees the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        MIGRATOR.run(&pool).await.unwrap();

        pool
    }

    fn ratings(additive: i64, risk: i64, forgiven: i64, significance: i64) -> Ratings {
        Ratings::try_from(RatingCodes {
            grudgee_intention: additive,
            grudgee_knowledge: additive,
            seriousness_of_situation: additive,
            grudge_effect: additive,
            grudgee_skill: additive,
            harm_level: additive,
            grr_factor: additive,
            grudge_length: additive,
            grudgee_risk: risk,
            grudge_easily_forgiven: forgiven,
            grudgee_significance: significance,
        })
        .unwrap()
    }

    async fn file_grudge(pool: &Pool, title: &str, ratings: &Ratings) -> i64 {
        let mut trans = pool.begin().await.unwrap();

        let story_id = create_story(&mut trans, title, "It was a whole thing.")
            .await
            .unwrap();
        let grudge_id = create_grudge(&mut trans, story_id, ratings).await.unwrap();

        trans.commit().await.unwrap();

        grudge_id
    }

    #[tokio::test]
    async fn filed_grudges_come_back_with_their_story_and_carat() {
        let pool = cabinet().await;

        let grudge_id = file_grudge(&pool, "The Borrowed Ladder", &ratings(2, -1, -1, 2)).await;

        let grudge = get_grudge(pool.clone(), grudge_id).await.unwrap().unwrap();

        assert_eq!(grudge.to_string(), "Grudge for The Borrowed Ladder");
        assert_eq!(grudge.carat(), Some(16));
        assert_eq!(get_grudge_count(pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_grudges_come_back_as_none() {
        let pool = cabinet().await;

        assert!(get_grudge(pool, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn updating_ratings_changes_the_stored_carat() {
        let pool = cabinet().await;

        let grudge_id = file_grudge(&pool, "The Silent Treatment", &ratings(2, 0, 0, 2)).await;

        let mut heavier = ratings(2, 0, 0, 2);
        heavier.grudgee_intention = Intention::DefinitelyBad;
        heavier.grr_factor = GrrFactor::High;

        assert!(update_grudge(pool.clone(), grudge_id, &heavier).await.unwrap());

        let grudge = get_grudge(pool, grudge_id).await.unwrap().unwrap();

        assert_eq!(grudge.carat(), Some(20));
    }

    #[tokio::test]
    async fn a_story_holds_at_most_one_grudge() {
        let pool = cabinet().await;

        let mut trans = pool.begin().await.unwrap();
        let story_id = create_story(&mut trans, "Double Filed", "Twice the nerve.")
            .await
            .unwrap();
        create_grudge(&mut trans, story_id, &ratings(1, 0, 0, 0))
            .await
            .unwrap();

        let second = create_grudge(&mut trans, story_id, &ratings(3, 0, 0, 4)).await;

        assert!(second.is_err());
    }

    #[tokio::test]
    async fn deleting_a_story_takes_its_grudge_with_it() {
        let pool = cabinet().await;

        let grudge_id = file_grudge(&pool, "Cascade", &ratings(3, 0, 0, 4)).await;
        let grudge = get_grudge(pool.clone(), grudge_id).await.unwrap().unwrap();
        let story = grudge.story.unwrap();

        assert!(delete_story(pool.clone(), story.id).await.unwrap());
        assert!(get_story(pool.clone(), story.id).await.unwrap().is_none());
        assert!(get_grudge(pool.clone(), grudge_id).await.unwrap().is_none());
        assert_eq!(get_grudge_count(pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn grudges_list_newest_first() {
        let pool = cabinet().await;

        let first = file_grudge(&pool, "Older", &ratings(1, 0, 0, 0)).await;
        let second = file_grudge(&pool, "Newer", &ratings(2, 0, 0, 0)).await;

        let grudges = list_grudges(pool).await.unwrap();

        assert_eq!(
            grudges.iter().map(|grudge| grudge.id).collect::<Vec<_>>(),
            vec![second, first],
        );
    }

    #[tokio::test]
    async fn deleting_a_grudge_leaves_its_story_alone() {
        let pool = cabinet().await;

        let grudge_id = file_grudge(&pool, "Orphaned Story", &ratings(1, -1, -1, 0)).await;
        let story_id = get_grudge(pool.clone(), grudge_id)
            .await
            .unwrap()
            .unwrap()
            .story
            .unwrap()
            .id;

        assert!(delete_grudge(pool.clone(), grudge_id).await.unwrap());
        assert!(get_story(pool, story_id).await.unwrap().is_some());
    }
}
