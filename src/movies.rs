//! Movie rows and their genre/actor/country association sets.

use futures::try_join;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, LoaderTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LikeExpr},
};
use tracing::{debug, info, warn};

use crate::{
    clock::now_sec,
    entities::{actor, country, genre, movie, movie_actor, movie_country, movie_genre, review},
    error::AppResult,
    models::MovieView,
};

/// How many movies the catalogue listing returns.
pub const LATEST_LIMIT: u64 = 100;

#[derive(Clone, Debug, Default)]
pub struct MovieFields {
    pub title: String,
    pub synopsis: Option<String>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub trailer: Option<String>,
    pub category: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct NewMovie {
    pub fields: MovieFields,
    /// Public path of the already stored poster.
    pub poster: String,
    pub genres: Vec<i32>,
    pub actors: Vec<i32>,
    pub countries: Vec<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct MovieChanges {
    pub fields: MovieFields,
    pub poster: Option<String>,
    pub genres: Option<Vec<i32>>,
    pub actors: Option<Vec<i32>>,
    pub countries: Option<Vec<i32>>,
}

pub struct Updated {
    pub movie: MovieView,
    /// Poster path that was replaced and can now be removed from disk.
    pub replaced_poster: Option<String>,
}

/// Replaces one association set of a movie with the rows that exist among `ids`.
/// Returns the ids that were linked; unknown ids are skipped.
macro_rules! replace_set {
    ($conn:expr, $movie_id:expr, $ids:expr, $join:ident, $target:ident, $fk:ident) => {{
        $join::Entity::delete_many()
            .filter($join::Column::MovieId.eq($movie_id))
            .exec($conn)
            .await?;

        let found: Vec<i32> = if $ids.is_empty() {
            Vec::new()
        } else {
            $target::Entity::find()
                .select_only()
                .column($target::Column::Id)
                .filter($target::Column::Id.is_in($ids.iter().copied()))
                .into_tuple()
                .all($conn)
                .await?
        };

        if !found.is_empty() {
            $join::Entity::insert_many(found.iter().map(|&id| $join::ActiveModel {
                movie_id: Set($movie_id),
                $fk: Set(id),
            }))
            .exec_without_returning($conn)
            .await?;
        }

        let dropped: Vec<i32> = $ids.iter().copied().filter(|id| !found.contains(id)).collect();
        if !dropped.is_empty() {
            warn!(movie_id = $movie_id, relation = stringify!($target), ?dropped, "ignoring unknown ids");
        }
        found
    }};
}

async fn replace_genres<C: ConnectionTrait>(conn: &C, movie_id: i32, ids: &[i32]) -> AppResult<Vec<i32>> {
    Ok(replace_set!(conn, movie_id, ids, movie_genre, genre, genre_id))
}

async fn replace_actors<C: ConnectionTrait>(conn: &C, movie_id: i32, ids: &[i32]) -> AppResult<Vec<i32>> {
    Ok(replace_set!(conn, movie_id, ids, movie_actor, actor, actor_id))
}

async fn replace_countries<C: ConnectionTrait>(
    conn: &C,
    movie_id: i32,
    ids: &[i32],
) -> AppResult<Vec<i32>> {
    Ok(replace_set!(conn, movie_id, ids, movie_country, country, country_id))
}

/// Attaches sorted association sets to each movie, preserving the input order.
pub async fn with_associations<C: ConnectionTrait>(
    db: &C,
    movies: Vec<movie::Model>,
) -> AppResult<Vec<MovieView>> {
    if movies.is_empty() {
        return Ok(Vec::new());
    }

    let (genres, actors, countries) = try_join!(
        movies.load_many_to_many(genre::Entity, movie_genre::Entity, db),
        movies.load_many_to_many(actor::Entity, movie_actor::Entity, db),
        movies.load_many_to_many(country::Entity, movie_country::Entity, db),
    )?;

    let views = movies
        .into_iter()
        .zip(genres)
        .zip(actors)
        .zip(countries)
        .map(|(((movie, mut genres), mut actors), mut countries)| {
            genres.sort_by(|a, b| a.name.cmp(&b.name));
            actors.sort_by(|a, b| a.name.cmp(&b.name));
            countries.sort_by(|a, b| a.name.cmp(&b.name));
            MovieView { movie, genres, actors, countries }
        })
        .collect();
    Ok(views)
}

async fn with_associations_one<C: ConnectionTrait>(db: &C, movie: movie::Model) -> AppResult<MovieView> {
    let id = movie.id;
    with_associations(db, vec![movie])
        .await?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("movie {id} vanished while loading associations").into())
}

/// Inserts the movie and links its association sets in one transaction.
pub async fn create(db: &DatabaseConnection, new: NewMovie) -> AppResult<MovieView> {
    let now = now_sec();
    let txn = db.begin().await?;

    let f = new.fields;
    let movie = movie::ActiveModel {
        title: Set(f.title),
        synopsis: Set(f.synopsis),
        year: Set(f.year),
        rating: Set(f.rating),
        poster: Set(new.poster),
        trailer: Set(f.trailer),
        category: Set(f.category),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    replace_genres(&txn, movie.id, &new.genres).await?;
    replace_actors(&txn, movie.id, &new.actors).await?;
    replace_countries(&txn, movie.id, &new.countries).await?;

    txn.commit().await?;
    info!(movie_id = movie.id, title = %movie.title, "movie created");

    with_associations_one(db, movie).await
}

/// The newest movies by id, newest first.
pub async fn latest(db: &DatabaseConnection, limit: u64) -> AppResult<Vec<MovieView>> {
    let movies = movie::Entity::find().order_by_desc(movie::Column::Id).limit(limit).all(db).await?;
    debug!(count = movies.len(), "loaded latest movies");
    with_associations(db, movies).await
}

pub async fn find(db: &DatabaseConnection, id: i32) -> AppResult<Option<MovieView>> {
    let Some(movie) = movie::Entity::find_by_id(id).one(db).await? else {
        return Ok(None);
    };
    Ok(Some(with_associations_one(db, movie).await?))
}

const LIKE_ESCAPE: char = '\\';

/// `%query%` with the LIKE wildcards in `query` matched literally.
fn contains_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Case-insensitive title match, newest first.
pub async fn search(db: &DatabaseConnection, query: &str, limit: u64) -> AppResult<Vec<MovieView>> {
    let pattern = LikeExpr::new(contains_pattern(query)).escape(LIKE_ESCAPE);
    let movies = movie::Entity::find()
        .filter(Expr::col((movie::Entity, movie::Column::Title)).like(pattern))
        .order_by_desc(movie::Column::Id)
        .limit(limit)
        .all(db)
        .await?;
    with_associations(db, movies).await
}

/// Full replace of the simple fields; association sets are replaced only when given.
pub async fn update(db: &DatabaseConnection, id: i32, changes: MovieChanges) -> AppResult<Option<Updated>> {
    let txn = db.begin().await?;

    let Some(existing) = movie::Entity::find_by_id(id).one(&txn).await? else {
        return Ok(None);
    };
    let old_poster = existing.poster.clone();

    let f = changes.fields;
    let mut active = existing.into_active_model();
    active.title = Set(f.title);
    active.synopsis = Set(f.synopsis);
    active.year = Set(f.year);
    active.rating = Set(f.rating);
    active.trailer = Set(f.trailer);
    active.category = Set(f.category);
    active.updated_at = Set(now_sec());
    let replaced_poster = match changes.poster {
        Some(poster) => {
            active.poster = Set(poster);
            Some(old_poster)
        },
        None => None,
    };
    let movie = active.update(&txn).await?;

    if let Some(ids) = &changes.genres {
        replace_genres(&txn, id, ids).await?;
    }
    if let Some(ids) = &changes.actors {
        replace_actors(&txn, id, ids).await?;
    }
    if let Some(ids) = &changes.countries {
        replace_countries(&txn, id, ids).await?;
    }

    txn.commit().await?;
    info!(movie_id = id, "movie updated");

    let movie = with_associations_one(db, movie).await?;
    Ok(Some(Updated { movie, replaced_poster }))
}

/// Clears the association sets and reviews, then deletes the row, all in one transaction.
/// Returns the deleted row so the caller can remove its poster once the commit succeeded.
pub async fn delete(db: &DatabaseConnection, id: i32) -> AppResult<Option<movie::Model>> {
    let txn = db.begin().await?;

    let Some(movie) = movie::Entity::find_by_id(id).one(&txn).await? else {
        return Ok(None);
    };

    replace_genres(&txn, id, &[]).await?;
    replace_actors(&txn, id, &[]).await?;
    replace_countries(&txn, id, &[]).await?;
    review::Entity::delete_many().filter(review::Column::MovieId.eq(id)).exec(&txn).await?;
    movie::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;
    info!(movie_id = id, "movie deleted");
    Ok(Some(movie))
}
