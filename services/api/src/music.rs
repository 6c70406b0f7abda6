//! services/api/src/music.rs
//!
//! The static mood-based music catalog. Built once at startup from the
//! configured public base URL and never mutated afterwards; the mp3 files
//! themselves are served as static assets under /music.

use std::collections::HashMap;

use vital_core::domain::Song;

/// (mood, [(id, title, file)]): the fixed catalog shipped with the app.
const CATALOG: &[(&str, &[(&str, &str, &str)])] = &[
    (
        "Stressed",
        &[
            ("1", "Water Fountain", "water_fountain.mp3"),
            ("2", "Beautiful Calming", "Beautiful_Calming_Music.mp3"),
            ("3", "Healing Harmony", "Healing_Harmony.mp3"),
            ("4", "Temple Rhythms", "Temple_Rhythms.mp3"),
        ],
    ),
    (
        "Sad",
        &[
            ("5", "Senorita", "Senorita.mp3"),
            ("6", "Jiya Re", "Jiya_Re.mp3"),
            ("7", "Gilehriyaan", "Gilehriyaan.mp3"),
            ("8", "Feel Good Hindi", "Feel_Good_Hindi.mp3"),
            ("9", "Self love", "Self_love.mp3"),
        ],
    ),
    (
        "Hopeful",
        &[
            ("10", "Give Me Some Sunshine", "Give_Me_Some_Sunshine.mp3"),
            ("11", "All is Well", "All_is_Well.mp3"),
            ("12", "Love You Zindagi", "Love_You_Zindagi.mp3"),
            ("13", "Unstoppable", "Unstoppable.mp3"),
        ],
    ),
    (
        "Motivated",
        &[
            ("14", "Winning Moments", "Winning_Moments.mp3"),
            ("15", "Badal Pe Paon Hain", "Badal_Pe_Paon_Hain.mp3"),
            ("16", "Ziddi Dil", "Ziddi_Dil.mp3"),
            ("17", "Best Motivational", "Best_motivational.mp3"),
        ],
    ),
    (
        "IndianInstrumental",
        &[
            ("18", "Mind Relaxing Meditation", "Mind_Relaxing_Meditation.mp3"),
            ("19", "Indian Traditional", "Indian_Traditional.mp3"),
            ("20", "Traditional Sitar", "Traditional_Sitar.mp3"),
        ],
    ),
];

/// The resolved catalog with absolute asset URLs.
#[derive(Debug, Clone)]
pub struct MoodCatalog {
    songs_by_mood: HashMap<&'static str, Vec<Song>>,
}

impl MoodCatalog {
    /// Resolves the static table against the public base URL.
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let songs_by_mood = CATALOG
            .iter()
            .map(|(mood, songs)| {
                let songs = songs
                    .iter()
                    .map(|(id, title, file)| Song {
                        id: (*id).to_string(),
                        title: (*title).to_string(),
                        url: format!("{}/music/{}", base, file),
                    })
                    .collect();
                (*mood, songs)
            })
            .collect();
        Self { songs_by_mood }
    }

    /// Songs for a mood; an unknown mood is an empty list, not an error.
    pub fn songs_for_mood(&self, mood: &str) -> &[Song] {
        self.songs_by_mood
            .get(mood)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_urls_against_base() {
        let catalog = MoodCatalog::new("https://api.example.com/");
        let songs = catalog.songs_for_mood("Stressed");
        assert_eq!(songs.len(), 4);
        assert_eq!(songs[0].url, "https://api.example.com/music/water_fountain.mp3");
    }

    #[test]
    fn unknown_mood_is_empty() {
        let catalog = MoodCatalog::new("http://localhost:5000");
        assert!(catalog.songs_for_mood("Angry").is_empty());
    }
}
