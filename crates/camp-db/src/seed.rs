//! Sample data for development databases.

use anyhow::Result;
use camp_types::forms::CampgroundInput;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::info;
use uuid::Uuid;

use crate::Database;

const CITIES: &[(&str, &str)] = &[
    ("Flagstaff", "Arizona"),
    ("Bend", "Oregon"),
    ("Moab", "Utah"),
    ("Asheville", "North Carolina"),
    ("Bozeman", "Montana"),
    ("Durango", "Colorado"),
    ("Bar Harbor", "Maine"),
    ("Sedona", "Arizona"),
    ("Estes Park", "Colorado"),
    ("Jackson", "Wyoming"),
    ("Hood River", "Oregon"),
    ("Lake Placid", "New York"),
    ("Gatlinburg", "Tennessee"),
    ("Leavenworth", "Washington"),
    ("Mammoth Lakes", "California"),
    ("Taos", "New Mexico"),
    ("Ely", "Minnesota"),
    ("Marquette", "Michigan"),
    ("Stowe", "Vermont"),
    ("Sandpoint", "Idaho"),
];

const DESCRIPTORS: &[&str] = &[
    "Forest",
    "Ancient",
    "Petrified",
    "Roaring",
    "Cascade",
    "Tumbling",
    "Silent",
    "Redwood",
    "Bullfrog",
    "Maple",
    "Misty",
    "Elk",
    "Grizzly",
    "Ocean",
    "Sea",
    "Sky",
    "Dusty",
    "Diamond",
];

const PLACES: &[&str] = &[
    "Flats",
    "Village",
    "Canyon",
    "Pond",
    "Group Camp",
    "Horse Camp",
    "Ghost Town",
    "Camp",
    "Dispersed Camp",
    "Backcountry",
    "River",
    "Creek",
    "Creekside",
    "Bay",
    "Spring",
    "Bayshore",
    "Sands",
    "Mule Camp",
    "Hunting Camp",
    "Cliffs",
    "Hollow",
];

const DESCRIPTION: &str = "Shaded tent pads, a fire ring at every site and \
    water within a short walk. Quiet hours start at ten.";

impl Database {
    /// Replaces every campground with `count` randomly generated ones
    /// authored by `author_id`.
    pub fn seed_campgrounds(&self, author_id: &str, count: usize) -> Result<usize> {
        let cleared = self.clear_campgrounds()?;
        info!("Removed {} existing campgrounds", cleared);

        let mut rng = rand::rng();
        for _ in 0..count {
            let (city, state) = CITIES.choose(&mut rng).copied().unwrap_or(("Moab", "Utah"));
            let descriptor = DESCRIPTORS.choose(&mut rng).copied().unwrap_or("Misty");
            let place = PLACES.choose(&mut rng).copied().unwrap_or("Camp");

            let input = CampgroundInput {
                title: format!("{descriptor} {place}"),
                location: format!("{city}, {state}"),
                price: f64::from(rng.random_range(0..30u8)),
                description: DESCRIPTION.to_string(),
            };
            self.insert_campground(&Uuid::new_v4().to_string(), author_id, &input, &[])?;
        }

        info!("Seeded {} campgrounds", count);
        Ok(count)
    }
}
