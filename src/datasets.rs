//! Loaders for the MovieLens-20M dataset.
//!
//! Ratings become positive implicit interactions; tags and movie genres
//! become the `(item, tag, category)` taxonomy.
use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::data::{deserialize_timestamp, serialize_timestamp, Interaction, Interactions, TaxonomyLabel};
use crate::{ItemId, Timestamp, UserId, POSITIVE_RATING_THRESHOLD};

/// A row of `ratings.csv`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MovielensRating {
    #[serde(rename = "userId")]
    user_id: UserId,
    #[serde(rename = "movieId")]
    movie_id: ItemId,
    rating: f32,
    #[serde(
        deserialize_with = "deserialize_timestamp",
        serialize_with = "serialize_timestamp"
    )]
    timestamp: Timestamp,
}

impl MovielensRating {
    /// Build a new rating.
    pub fn new(user_id: UserId, movie_id: ItemId, rating: f32, timestamp: Timestamp) -> Self {
        MovielensRating {
            user_id,
            movie_id,
            rating,
            timestamp,
        }
    }
}

/// A row of `tags.csv`. The tag timestamp is not used.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MovielensTag {
    #[serde(rename = "userId")]
    user_id: UserId,
    #[serde(rename = "movieId")]
    movie_id: ItemId,
    tag: String,
}

impl MovielensTag {
    /// Build a new tag assignment.
    pub fn new<T: Into<String>>(user_id: UserId, movie_id: ItemId, tag: T) -> Self {
        MovielensTag {
            user_id,
            movie_id,
            tag: tag.into(),
        }
    }
}

/// A row of `movies.csv`; `genres` is `|`-delimited.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MovielensMovie {
    #[serde(rename = "movieId")]
    movie_id: ItemId,
    title: String,
    genres: String,
}

impl MovielensMovie {
    /// Build a new movie.
    pub fn new<T: Into<String>, G: Into<String>>(movie_id: ItemId, title: T, genres: G) -> Self {
        MovielensMovie {
            movie_id,
            title: title.into(),
            genres: genres.into(),
        }
    }

    /// The movie's genres.
    pub fn genres(&self) -> impl Iterator<Item = &str> {
        self.genres.split('|')
    }
}

/// The three MovieLens tables.
#[derive(Clone, Debug)]
pub struct MovieLens {
    /// Raw ratings.
    pub ratings: Vec<MovielensRating>,
    /// Raw tag assignments.
    pub tags: Vec<MovielensTag>,
    /// The movie catalog.
    pub movies: Vec<MovielensMovie>,
}

impl MovieLens {
    /// Positive interactions, using the default rating threshold.
    pub fn interactions(&self) -> Interactions {
        positive_interactions(&self.ratings, POSITIVE_RATING_THRESHOLD)
    }

    /// The taxonomy of the catalog.
    pub fn taxonomy_labels(&self) -> Vec<TaxonomyLabel> {
        taxonomy_labels(&self.tags, &self.movies)
    }
}

/// Read every row of a CSV file with a header.
pub fn read_csv<T, P>(path: P) -> Result<Vec<T>, failure::Error>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;

    Ok(rows)
}

/// Load `ratings.csv`, `tags.csv` and `movies.csv` from `folder`.
pub fn load_movielens_20m<P: AsRef<Path>>(folder: P) -> Result<MovieLens, failure::Error> {
    let folder = folder.as_ref();

    let data = MovieLens {
        ratings: read_csv(folder.join("ratings.csv"))?,
        tags: read_csv(folder.join("tags.csv"))?,
        movies: read_csv(folder.join("movies.csv"))?,
    };

    info!(
        num_ratings = data.ratings.len(),
        num_tags = data.tags.len(),
        num_movies = data.movies.len(),
        "Loaded MovieLens"
    );

    Ok(data)
}

/// Ratings at or above `threshold`, as implicit interactions.
pub fn positive_interactions(ratings: &[MovielensRating], threshold: f32) -> Interactions {
    ratings
        .iter()
        .filter(|x| x.rating >= threshold)
        .map(|x| Interaction::new(x.user_id, x.movie_id, x.timestamp, x.rating))
        .collect::<Vec<_>>()
        .into()
}

/// Join tags with the genres of their movies.
///
/// Yields one label per distinct `(item, tag, genre)`, in tag order
/// and then genre order. Tags of movies missing from the catalog are
/// dropped.
pub fn taxonomy_labels(tags: &[MovielensTag], movies: &[MovielensMovie]) -> Vec<TaxonomyLabel> {
    let catalog: HashMap<ItemId, &MovielensMovie> = movies.iter().map(|x| (x.movie_id, x)).collect();

    let mut seen = HashSet::new();
    let mut labels = Vec::new();

    for tag in tags {
        let movie = match catalog.get(&tag.movie_id) {
            Some(movie) => movie,
            None => continue,
        };

        for genre in movie.genres() {
            let label = TaxonomyLabel::new(tag.movie_id, tag.tag.as_str(), genre);
            if seen.insert(label.clone()) {
                labels.push(label);
            }
        }
    }

    labels
}
