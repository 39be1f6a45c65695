//! Naming rules for fragments and multi-part archives.
//!
//! A part index is inserted as `.part.<N>` before the final extension of a
//! file name, or appended when the name has no extension:
//!
//! | original     | part 3              |
//! |--------------|---------------------|
//! | `video.mp4`  | `video.part.3.mp4`  |
//! | `LICENSE`    | `LICENSE.part.3`    |
//! | `data.zip`   | `data.part.3.zip`   |

const PART_MARKER: &str = ".part.";

/// Archive file extension, including the dot.
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Insert `.part.<index>` into a file name.
pub fn part_name(file_name: &str, index: usize) -> String {
    match file_name.rfind('.') {
        Some(dot) => {
            let (base, extension) = file_name.split_at(dot);
            format!("{base}{PART_MARKER}{index}{extension}")
        }
        None => format!("{file_name}{PART_MARKER}{index}"),
    }
}

/// Remove a `.part.<N>` infix produced by [`part_name`], if present.
///
/// The rightmost valid infix wins, so names that already contained a
/// `.part.` segment before splitting are restored unchanged.
pub fn strip_part(file_name: &str) -> String {
    match find_part(file_name) {
        Some((start, _, rest)) => format!("{}{}", &file_name[..start], rest),
        None => file_name.to_string(),
    }
}

/// Parse the part index of a file name, if it has one.
pub fn part_index(file_name: &str) -> Option<u64> {
    find_part(file_name).and_then(|(_, digits, _)| digits.parse().ok())
}

/// Name of the archive for `base`, with a part index when the run produced
/// more than one chunk.
pub fn archive_name(base: &str, part: Option<usize>) -> String {
    let name = format!("{base}{ARCHIVE_SUFFIX}");
    match part {
        Some(index) => part_name(&name, index),
        None => name,
    }
}

/// Sort key ordering archives by numeric part index; archives without an
/// index come first.
pub fn archive_sort_key(file_name: &str) -> (Option<u64>, &str) {
    (part_index(file_name), file_name)
}

/// Locate the rightmost `.part.<digits>` followed by end of name or a
/// single extension. Returns (start of marker, digits, remainder).
fn find_part(file_name: &str) -> Option<(usize, &str, &str)> {
    let mut search_end = file_name.len();
    while let Some(start) = file_name[..search_end].rfind(PART_MARKER) {
        let after = &file_name[start + PART_MARKER.len()..];
        let digits_len = after.bytes().take_while(u8::is_ascii_digit).count();
        let rest = &after[digits_len..];
        let rest_ok = rest.is_empty() || (rest.starts_with('.') && !rest[1..].contains('.'));
        if digits_len > 0 && rest_ok {
            return Some((start, &after[..digits_len], rest));
        }
        search_end = start;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_name_inserts_before_extension() {
        assert_eq!(part_name("video.mp4", 0), "video.part.0.mp4");
        assert_eq!(part_name("archive.tar.gz", 12), "archive.tar.part.12.gz");
        assert_eq!(part_name("LICENSE", 3), "LICENSE.part.3");
    }

    #[test]
    fn strip_part_reverses_part_name() {
        for name in ["video.mp4", "LICENSE", "archive.tar.gz", ".hidden", "v1.part.2"] {
            for index in [0, 7, 10, 123] {
                assert_eq!(strip_part(&part_name(name, index)), name);
            }
        }
    }

    #[test]
    fn strip_part_leaves_plain_names() {
        assert_eq!(strip_part("notes.txt"), "notes.txt");
        assert_eq!(strip_part("depart.txt"), "depart.txt");
        assert_eq!(strip_part("a.part.x.txt"), "a.part.x.txt");
    }

    #[test]
    fn archive_names() {
        assert_eq!(archive_name("data", None), "data.zip");
        assert_eq!(archive_name("data", Some(0)), "data.part.0.zip");
        assert_eq!(archive_name("data", Some(11)), "data.part.11.zip");
    }

    #[test]
    fn archives_sort_numerically() {
        let mut names = vec![
            "data.part.10.zip",
            "data.part.2.zip",
            "data.part.1.zip",
            "data.zip",
            "data.part.0.zip",
        ];
        names.sort_by(|a, b| archive_sort_key(a).cmp(&archive_sort_key(b)));
        assert_eq!(
            names,
            vec![
                "data.zip",
                "data.part.0.zip",
                "data.part.1.zip",
                "data.part.2.zip",
                "data.part.10.zip",
            ]
        );
    }
}
