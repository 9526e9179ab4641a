use serde::{Deserialize, Serialize};

use crate::{
    entities::{
        actor, country, genre, movie,
        user::{self, Role},
    },
    error::{AppError, AppResult},
    upload::{FormFields, ImageFile},
};

/// A movie with its association sets, join-table columns excluded.
#[derive(Clone, Debug, Serialize)]
pub struct MovieView {
    #[serde(flatten)]
    pub movie: movie::Model,
    pub genres: Vec<genre::Model>,
    pub actors: Vec<actor::Model>,
    pub countries: Vec<country::Model>,
}

/// Account fields safe to hand to clients.
#[derive(Clone, Debug, Serialize)]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
    pub last_login: Option<i64>,
    pub created_at: i64,
}

impl From<user::Model> for UserView {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            is_verified: u.is_verified,
            last_login: u.last_login,
            created_at: u.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReviewView {
    pub id: i32,
    pub movie_id: i32,
    pub movie_title: Option<String>,
    pub user_id: i32,
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub rating: i32,
    pub comment: String,
    pub approved: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct NamePayload {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    #[serde(default = "default_true")]
    pub approved: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(alias = "query")]
    pub q: Option<String>,
}

/// The movie multipart form after parsing, before any database work.
#[derive(Debug, Default)]
pub struct MovieForm {
    pub title: Option<String>,
    pub synopsis: Option<String>,
    pub year: Option<i32>,
    pub rating: Option<f64>,
    pub trailer: Option<String>,
    pub category: Option<String>,
    pub poster: Option<ImageFile>,
    /// `None` when the field was absent, which on update means "leave as is".
    pub genres: Option<Vec<i32>>,
    pub actors: Option<Vec<i32>>,
    pub countries: Option<Vec<i32>>,
}

impl MovieForm {
    pub fn from_fields(mut fields: FormFields) -> AppResult<Self> {
        let year = fields
            .text("year")
            .map(|y| y.parse::<i32>().map_err(|_| AppError::validation("Year must be a whole number")))
            .transpose()?;
        let rating = fields
            .text("rating")
            .map(|r| match r.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(AppError::validation("Rating must be a number")),
            })
            .transpose()?;

        let ids = |key: &str| -> AppResult<Option<Vec<i32>>> {
            fields.text.get(key).map(|raw| parse_id_list(key, raw)).transpose()
        };
        let genres = ids("genres")?;
        let actors = ids("actors")?;
        let countries = ids("countries")?;

        Ok(Self {
            title: fields.text("title"),
            synopsis: fields.text("synopsis"),
            year,
            rating,
            trailer: fields.text("trailer"),
            category: fields.text("category"),
            poster: fields.take_file("poster"),
            genres,
            actors,
            countries,
        })
    }

    /// Rejects a poster part that is not an image.
    pub fn check_poster_type(&self) -> AppResult<()> {
        match &self.poster {
            Some(file) if !file.is_image() => {
                Err(AppError::validation("Only image files are allowed for the poster."))
            },
            _ => Ok(()),
        }
    }
}

/// Parses a JSON-serialized list of ids such as `[1,2]` or `["1","2"]`. Blank means empty.
pub fn parse_id_list(field: &str, raw: &str) -> AppResult<Vec<i32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let invalid = || AppError::validation(format!("Invalid {field} list"));

    let values: Vec<serde_json::Value> = serde_json::from_str(raw).map_err(|_| invalid())?;
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let id = match &value {
            serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(invalid)?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_accept_numbers_and_strings() {
        assert_eq!(parse_id_list("genres", "[1,2]").unwrap(), vec![1, 2]);
        assert_eq!(parse_id_list("genres", r#"["3", "4", "3"]"#).unwrap(), vec![3, 4]);
        assert_eq!(parse_id_list("genres", "  ").unwrap(), Vec::<i32>::new());
        assert_eq!(parse_id_list("genres", "[]").unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn id_lists_reject_garbage() {
        let err = parse_id_list("actors", "[1, \"x\"]").unwrap_err();
        assert_eq!(err.to_string(), "Invalid actors list");
        assert!(parse_id_list("actors", "{\"a\":1}").is_err());
        assert!(parse_id_list("actors", "[1.5]").is_err());
    }

    #[test]
    fn movie_form_parses_scalars() {
        let mut fields = FormFields::default();
        fields.text.insert("title".into(), " Goblin ".into());
        fields.text.insert("year".into(), "2016".into());
        fields.text.insert("rating".into(), "8.9".into());
        fields.text.insert("genres".into(), "[1]".into());
        let form = MovieForm::from_fields(fields).unwrap();
        assert_eq!(form.title.as_deref(), Some("Goblin"));
        assert_eq!(form.year, Some(2016));
        assert_eq!(form.rating, Some(8.9));
        assert_eq!(form.genres, Some(vec![1]));
        assert_eq!(form.actors, None);
    }

    #[test]
    fn movie_form_rejects_bad_year() {
        let mut fields = FormFields::default();
        fields.text.insert("year".into(), "twenty".into());
        assert!(MovieForm::from_fields(fields).is_err());
    }
}
