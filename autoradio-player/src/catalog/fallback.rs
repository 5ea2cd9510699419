//! Static fallback catalog (title, artist, genre)

use super::CatalogEntry;

pub const FALLBACK_LEN: usize = 50;

const FALLBACK_CATALOG: [(&str, &str, &str); FALLBACK_LEN] = [
    ("Paint The Town Red", "Doja Cat", "hiphop"),
    ("Cruel Summer", "Taylor Swift", "pop"),
    ("Snooze", "SZA", "rnb"),
    ("Vampire", "Olivia Rodrigo", "pop"),
    ("Last Night", "Morgan Wallen", "pop"),
    ("Kill Bill", "SZA", "rnb"),
    ("Flowers", "Miley Cyrus", "pop"),
    ("As It Was", "Harry Styles", "pop"),
    ("Anti-Hero", "Taylor Swift", "pop"),
    ("Unholy", "Sam Smith", "pop"),
    ("About Damn Time", "Lizzo", "pop"),
    ("Heat Waves", "Glass Animals", "alternative"),
    ("Bad Habit", "Steve Lacy", "rnb"),
    ("Calm Down", "Rema & Selena Gomez", "pop"),
    ("Cupid", "Fifty Fifty", "pop"),
    ("Creepin'", "Metro Boomin ft. The Weeknd & 21 Savage", "hiphop"),
    ("Boy's a Liar Pt 2", "PinkPantheress & Ice Spice", "pop"),
    ("Die For You", "The Weeknd & Ariana Grande", "pop"),
    ("Fukumean", "Gunna", "hiphop"),
    ("Daylight", "David Kushner", "pop"),
    ("All My Life", "Lil Durk ft. J. Cole", "hiphop"),
    ("Fast Car", "Luke Combs", "pop"),
    ("Escapism", "RAYE ft. 070 Shake", "pop"),
    ("Thinkin' Bout Me", "Morgan Wallen", "pop"),
    ("Need a Favor", "Jelly Roll", "pop"),
    ("Dance The Night", "Dua Lipa", "pop"),
    ("Karma", "Taylor Swift ft. Ice Spice", "pop"),
    ("Rich Flex", "Drake & 21 Savage", "hiphop"),
    ("Sprinter", "Dave & Central Cee", "hiphop"),
    ("Greedy", "Tate McRae", "pop"),
    ("Used To Be Young", "Miley Cyrus", "pop"),
    ("Water", "Tyla", "pop"),
    ("Stick Season", "Noah Kahan", "alternative"),
    ("Strangers", "Kenya Grace", "electronic"),
    ("Standing Next To You", "Jung Kook", "pop"),
    ("Seven", "Jung Kook ft. Latto", "pop"),
    ("What Was I Made For?", "Billie Eilish", "pop"),
    ("Lil Boo Thang", "Paul Russell", "pop"),
    ("Popular", "The Weeknd & Playboi Carti", "hiphop"),
    ("Trustfall", "P!nk", "pop"),
    ("Eyes Closed", "Ed Sheeran", "pop"),
    ("Tattoo", "Loreen", "pop"),
    ("I Wanna Be Yours", "Arctic Monkeys", "rock"),
    ("Super Shy", "NewJeans", "pop"),
    ("OMG", "NewJeans", "pop"),
    ("Hype Boy", "NewJeans", "pop"),
    ("MONTERO", "Lil Nas X", "pop"),
    ("Physical", "Dua Lipa", "pop"),
    ("Levitating", "Dua Lipa", "pop"),
    ("Blinding Lights", "The Weeknd", "pop"),
];

/// The fallback list as unresolved entries ranked 1..=50
pub fn fallback_entries() -> Vec<CatalogEntry> {
    FALLBACK_CATALOG
        .iter()
        .enumerate()
        .map(|(i, (title, artist, genre))| CatalogEntry {
            title: title.to_string(),
            artist: artist.to_string(),
            genre: Some(genre.to_string()),
            rank: (i + 1) as u32,
            source: None,
        })
        .collect()
}
