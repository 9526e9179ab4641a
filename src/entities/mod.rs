pub mod actor;
pub mod country;
pub mod genre;
pub mod movie;
pub mod movie_actor;
pub mod movie_country;
pub mod movie_genre;
pub mod review;
pub mod session;
pub mod user;
