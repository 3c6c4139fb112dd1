use std::time::Duration;

use askama::Template;
use axum::{
    error_handling::HandleErrorLayer,
    extract::{Extension, Form, Path},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
    BoxError, Json, Router, Server,
};
use grudgecab_common::{
    models::{
        EasilyForgiven, Entry, GrrFactor, Grudge, GrudgeLength, GrudgeeRisk,
        GrudgeeSignificance, GrudgeeSkill, HarmScale, Intention, Knowledge, RatingCodes,
        Ratings, Seriousness, Story, StrengthOfEffect,
    },
    Conf,
};
use grudgecab_queries::Pool;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub async fn run(conf: &Conf) -> Result<(), grudgecab_common::Report> {
    let pool = grudgecab_queries::init_database_connection(conf).await?;

    let app: _ = Router::new()
        .route("/", get(index))
        .route("/grudges", post(create))
        .route("/grudges/new", get(new_form))
        .route("/grudges/:id", get(detail).post(update))
        .route("/grudges/:id/edit", get(edit_form))
        .route("/grudges/:id/delete", post(delete))
        .route("/api/grudges", get(api_list))
        .route("/api/grudges/:id", get(api_detail))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|error: BoxError| async move {
                    if error.is::<tower::timeout::error::Elapsed>() {
                        (StatusCode::REQUEST_TIMEOUT, String::new())
                    } else {
                        (StatusCode::INTERNAL_SERVER_ERROR, String::new())
                    }
                }))
                .load_shed()
                .concurrency_limit(1024)
                .timeout(Duration::from_secs(10))
                .layer(Extension(pool))
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        );

    tracing::info!(address = %conf.address(), "starting");

    Server::bind(&conf.address().parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

static STYLE: &str = include_str!("../../assets/grudgecab.css");

#[derive(askama::Template)]
#[template(path = "index.html")]
struct IndexPage {
    css: &'static str,
    count: i64,
    grudges: Vec<Grudge>,
}

async fn index(Extension(pool): Extension<Pool>) -> Result<impl IntoResponse, Error> {
    let count = grudgecab_queries::get_grudge_count(pool.clone()).await?;
    let grudges = grudgecab_queries::list_grudges(pool).await?;

    Ok(Html(
        IndexPage {
            css: STYLE,
            count,
            grudges,
        }
        .render()
        .map_err(Error::from_any)?,
    ))
}

#[derive(askama::Template)]
#[template(path = "detail.html")]
struct DetailPage {
    css: &'static str,
    grudge_id: i64,
    label: String,
    story: Story,
    entries: Vec<Entry>,
    carat: i64,
    updated: chrono::NaiveDateTime,
}

async fn detail(
    Extension(pool): Extension<Pool>,
    Path(grudge_id): Path<i64>,
) -> Result<impl IntoResponse, Error> {
    let grudge = grudgecab_queries::get_grudge(pool, grudge_id)
        .await?
        .ok_or(Error::NotFound)?;

    let (story, ratings) = parts(&grudge)?;

    Ok(Html(
        DetailPage {
            css: STYLE,
            grudge_id: grudge.id,
            label: grudge.to_string(),
            story,
            entries: ratings.entries(),
            carat: ratings.carat(),
            updated: grudge.updated,
        }
        .render()
        .map_err(Error::from_any)?,
    ))
}

#[derive(askama::Template)]
#[template(path = "new.html")]
struct NewPage {
    css: &'static str,
    fields: Vec<Field>,
}

async fn new_form() -> Result<impl IntoResponse, Error> {
    Ok(Html(
        NewPage {
            css: STYLE,
            fields: questionnaire(None),
        }
        .render()
        .map_err(Error::from_any)?,
    ))
}

async fn create(
    Extension(pool): Extension<Pool>,
    Form(form): Form<GrudgeForm>,
) -> Result<impl IntoResponse, Error> {
    let ratings = form.ratings()?;

    let mut trans = pool.begin().await.map_err(Error::from_any)?;

    let story_id =
        grudgecab_queries::create_story(&mut trans, &form.title, &form.origin).await?;
    let grudge_id = grudgecab_queries::create_grudge(&mut trans, story_id, &ratings).await?;

    trans.commit().await.map_err(Error::from_any)?;

    tracing::info!(grudge_id = %grudge_id, carat = %ratings.carat(), "grudge filed");

    Ok(Redirect::to(&format!("/grudges/{}", grudge_id)))
}

#[derive(askama::Template)]
#[template(path = "edit.html")]
struct EditPage {
    css: &'static str,
    grudge_id: i64,
    label: String,
    story: Story,
    fields: Vec<Field>,
}

async fn edit_form(
    Extension(pool): Extension<Pool>,
    Path(grudge_id): Path<i64>,
) -> Result<impl IntoResponse, Error> {
    let grudge = grudgecab_queries::get_grudge(pool, grudge_id)
        .await?
        .ok_or(Error::NotFound)?;

    let (story, ratings) = parts(&grudge)?;

    Ok(Html(
        EditPage {
            css: STYLE,
            grudge_id: grudge.id,
            label: grudge.to_string(),
            story,
            fields: questionnaire(Some(&ratings)),
        }
        .render()
        .map_err(Error::from_any)?,
    ))
}

async fn update(
    Extension(pool): Extension<Pool>,
    Path(grudge_id): Path<i64>,
    Form(form): Form<RatingsForm>,
) -> Result<impl IntoResponse, Error> {
    let ratings = form.ratings()?;

    if !grudgecab_queries::update_grudge(pool, grudge_id, &ratings).await? {
        return Err(Error::NotFound);
    }

    tracing::info!(grudge_id = %grudge_id, carat = %ratings.carat(), "grudge re-weighed");

    Ok(Redirect::to(&format!("/grudges/{}", grudge_id)))
}

async fn delete(
    Extension(pool): Extension<Pool>,
    Path(grudge_id): Path<i64>,
) -> Result<impl IntoResponse, Error> {
    let grudge = grudgecab_queries::get_grudge(pool.clone(), grudge_id)
        .await?
        .ok_or(Error::NotFound)?;

    // Dropping the story cascades to the grudge itself.
    match &grudge.story {
        Some(story) => grudgecab_queries::delete_story(pool, story.id).await?,
        None => grudgecab_queries::delete_grudge(pool, grudge.id).await?,
    };

    tracing::info!(grudge_id = %grudge_id, "grudge let go");

    Ok(Redirect::to("/"))
}

#[derive(serde::Serialize)]
struct ApiGrudge {
    #[serde(flatten)]
    grudge: Grudge,
    label: String,
    carat: Option<i64>,
}

impl From<Grudge> for ApiGrudge {
    fn from(grudge: Grudge) -> Self {
        Self {
            label: grudge.to_string(),
            carat: grudge.carat(),
            grudge,
        }
    }
}

async fn api_list(Extension(pool): Extension<Pool>) -> Result<impl IntoResponse, Error> {
    let grudges = grudgecab_queries::list_grudges(pool).await?;

    Ok(Json(
        grudges.into_iter().map(ApiGrudge::from).collect::<Vec<_>>(),
    ))
}

async fn api_detail(
    Extension(pool): Extension<Pool>,
    Path(grudge_id): Path<i64>,
) -> Result<impl IntoResponse, Error> {
    let grudge = grudgecab_queries::get_grudge(pool, grudge_id)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(Json(ApiGrudge::from(grudge)))
}

// Rows loaded through the query layer always carry both halves; a grudge
// without them did not come from storage.
fn parts(grudge: &Grudge) -> Result<(Story, Ratings), Error> {
    match (&grudge.story, &grudge.ratings) {
        (Some(story), Some(ratings)) => Ok((story.clone(), *ratings)),
        _ => Err(Error::from_any(grudgecab_common::err!(
            "grudge `{}` is missing its story or ratings",
            grudge.id
        ))),
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct GrudgeForm {
    title: String,
    origin: String,
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
}

impl GrudgeForm {
    fn ratings(&self) -> Result<Ratings, Error> {
        decode_ratings(RatingCodes {
            grudgee_intention: self.grudgee_intention,
            grudgee_knowledge: self.grudgee_knowledge,
            seriousness_of_situation: self.seriousness_of_situation,
            grudge_effect: self.grudge_effect,
            grudgee_skill: self.grudgee_skill,
            harm_level: self.harm_level,
            grr_factor: self.grr_factor,
            grudge_length: self.grudge_length,
            grudgee_risk: self.grudgee_risk,
            grudge_easily_forgiven: self.grudge_easily_forgiven,
            grudgee_significance: self.grudgee_significance,
        })
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct RatingsForm {
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
}

impl RatingsForm {
    fn ratings(&self) -> Result<Ratings, Error> {
        decode_ratings(RatingCodes {
            grudgee_intention: self.grudgee_intention,
            grudgee_knowledge: self.grudgee_knowledge,
            seriousness_of_situation: self.seriousness_of_situation,
            grudge_effect: self.grudge_effect,
            grudgee_skill: self.grudgee_skill,
            harm_level: self.harm_level,
            grr_factor: self.grr_factor,
            grudge_length: self.grudge_length,
            grudgee_risk: self.grudgee_risk,
            grudge_easily_forgiven: self.grudge_easily_forgiven,
            grudgee_significance: self.grudgee_significance,
        })
    }
}

fn decode_ratings(codes: RatingCodes) -> Result<Ratings, Error> {
    Ratings::try_from(codes).map_err(Error::BadRequest)
}

struct FieldOption {
    code: i64,
    label: &'static str,
    selected: bool,
}

struct Field {
    name: &'static str,
    question: &'static str,
    options: Vec<FieldOption>,
}

macro_rules! field {
    ($name:ident, $ty:ty, $current:expr) => {
        Field {
            name: stringify!($name),
            question: <$ty>::QUESTION,
            options: <$ty>::ALL
                .iter()
                .map(|variant| FieldOption {
                    code: variant.code(),
                    label: variant.label(),
                    selected: $current
                        .map(|ratings: &Ratings| ratings.$name.code() == variant.code())
                        .unwrap_or(false),
                })
                .collect(),
        }
    };
}

/// The eleven questionnaire fields, with the current answer marked when
/// editing an existing grudge.
fn questionnaire(current: Option<&Ratings>) -> Vec<Field> {
    vec![
        field!(grudgee_intention, Intention, current),
        field!(grudgee_knowledge, Knowledge, current),
        field!(seriousness_of_situation, Seriousness, current),
        field!(grudge_effect, StrengthOfEffect, current),
        field!(grudgee_skill, GrudgeeSkill, current),
        field!(harm_level, HarmScale, current),
        field!(grr_factor, GrrFactor, current),
        field!(grudge_length, GrudgeLength, current),
        field!(grudgee_risk, GrudgeeRisk, current),
        field!(grudge_easily_forgiven, EasilyForgiven, current),
        field!(grudgee_significance, GrudgeeSignificance, current),
    ]
}

#[derive(Debug)]
pub enum Error {
    NotFound,
    BadRequest(grudgecab_common::Report),
    Internal(grudgecab_common::Report),
}

impl Error {
    pub fn from_any<A>(err: A) -> Self
    where
        A: Into<grudgecab_common::Report>,
    {
        Self::Internal(err.into())
    }
}

impl From<grudgecab_common::Report> for Error {
    fn from(err: grudgecab_common::Report) -> Self {
        Self::Internal(err)
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum_core::response::Response {
        #[derive(serde::Serialize)]
        struct Res {
            error: ResErr,
        }

        #[derive(serde::Serialize)]
        struct ResErr {
            code: u16,
            status: &'static str,
        }

        let (status, message) = match self {
            Error::NotFound => (StatusCode::NOT_FOUND, "not found"),
            Error::BadRequest(err) => {
                tracing::warn!(error = ?err, "rejecting request");

                (StatusCode::BAD_REQUEST, "bad request")
            }
            Error::Internal(err) => {
                tracing::error!(error = ?err, "error handling request");

                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        let body = Res {
            error: ResErr {
                code: status.as_u16(),
                status: message,
            },
        };

        (status, Json(body)).into_response()
    }
}
