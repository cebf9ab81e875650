// Helpers for normalizing raw tag values

/// Separator used when several genres are stored in one field
pub const GENRE_SEPARATOR: &str = "; ";

/// Normalize the genre items of a tag into a single "; "-joined field.
///
/// Each item is one genre. Only `;` inside an item is treated as a list,
/// so names like "R&B" or "Drum & Bass" are kept whole. Duplicates are
/// dropped, first occurrence wins.
pub fn join_genres<'a>(raw: impl IntoIterator<Item = &'a str>) -> String {
    let mut genres: Vec<&str> = Vec::new();
    for genre in raw.into_iter().flat_map(|item| item.split(';')).map(str::trim) {
        if !genre.is_empty() && !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    genres.join(GENRE_SEPARATOR)
}

/// Track number from "5" or "5/12" forms; anything unparseable is 0
pub fn parse_track_number(value: &str) -> u32 {
    value
        .split('/')
        .next()
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(0)
}

/// Keep only the year part of a date tag ("2003-05-12" -> "2003")
pub fn truncate_year(date: &str) -> String {
    date.trim().chars().take(4).collect()
}
