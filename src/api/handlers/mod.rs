mod health;
mod songs;

pub use health::health;
pub use songs::{create_song, list_songs};
