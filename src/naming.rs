//! Release-name classification.
//!
//! Fansub and scene groups encode series, season and episode in wildly
//! different shapes. Normalization strips the decorations (checksums,
//! resolution tags, separator soup) and a small cascade of patterns maps
//! what is left to structured metadata. Paths use `\` as the directory
//! separator; forward slashes are not treated as separators.

use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedName {
    TvShow {
        name: String,
        /// Season 0 holds specials and OVAs.
        season: u32,
        episode: u32,
    },
    Movie {
        name: String,
    },
}

static SEPARATOR_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_+\-. ]+").unwrap());
static BRACKET_GROUPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static PAREN_GROUPS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());
static RESOLUTION_TAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{3,4}p [^\\]*").unwrap());
static DIR_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" *\\ *").unwrap());

// The cascade needs backtracking and a negative lookahead (the trailing
// guard of OTHER_STANDALONE), which the plain regex engine rejects.
static SPECIALS: LazyLock<fancy_regex::Regex> = LazyLock::new(|| {
    fancy_regex::Regex::new(
        r"^(?P<name>.+?) (?:S(?:eason ?)?\d{1,2} )?(?:Special|SP|OVA|OAV|Picture Drama)(?: E?(?P<episode>\d{1,3})?)?$",
    )
    .unwrap()
});
static FORMATTED_STANDALONE: LazyLock<fancy_regex::Regex> = LazyLock::new(|| {
    fancy_regex::Regex::new(r"^(?P<name>.+?) S(?P<season>\d{1,2})E(?P<episode>\d{1,3})(?: .*)?$")
        .unwrap()
});
static STRUCTURED_DIR: LazyLock<fancy_regex::Regex> = LazyLock::new(|| {
    fancy_regex::Regex::new(
        r"^.*\\(?P<name>[^\\]+?) S(?:eason ?)?\d{1,2}(?:P\d{1,2})?(?: [^\\]*)?(?:\\.*)?\\[^\\]*S(?P<season>\d{1,2})E(?P<episode>\d{1,3})(?: [^\\]*)?$",
    )
    .unwrap()
});
static OTHER_STANDALONE: LazyLock<fancy_regex::Regex> = LazyLock::new(|| {
    fancy_regex::Regex::new(
        r"^(?P<name>.+?) (?:S(?:eason ?)?(?P<season>\d{1,2}) ?)?E?(?P<episode>\d{1,3})(?:v\d+)?(?!.* \d{2}(?: |$).*)(?: .*)?$",
    )
    .unwrap()
});

/// Strip release decorations so the patterns see a uniform shape.
fn preprocess(input_path: &str) -> String {
    let stripped = strip_extension(input_path);
    let collapsed = SEPARATOR_RUNS.replace_all(stripped, " ");
    let no_brackets = BRACKET_GROUPS.replace_all(&collapsed, "");
    let no_parens = PAREN_GROUPS.replace_all(&no_brackets, "");
    let no_resolution = RESOLUTION_TAIL.replace_all(&no_parens, "");
    let tight = DIR_SEPARATOR.replace_all(&no_resolution, r"\");
    tight.trim_matches([' ', '-']).to_string()
}

fn strip_extension(path: &str) -> &str {
    let base_start = path.rfind(['\\', '/']).map_or(0, |at| at + 1);
    match path[base_start..].rfind('.') {
        // A leading dot marks a hidden file, not an extension.
        Some(at) if at > 0 => &path[..base_start + at],
        _ => path,
    }
}

fn group_u32(captures: &fancy_regex::Captures, name: &str) -> Option<u32> {
    captures.name(name).and_then(|m| m.as_str().parse().ok())
}

/// Classify an input path as an episode of a show or a movie.
///
/// The patterns run in a fixed order and the first match wins: specials
/// must shadow the episode-number patterns ("Kurenai OVA - 01" is season
/// 0, not episode 1 of "Kurenai OVA"), and the directory-structured
/// pattern must shadow the loose standalone fallback because there the
/// series name lives one level up.
pub fn parse_filename(input_path: &str) -> ParsedName {
    let cleaned = preprocess(input_path);
    let input_name = cleaned
        .rsplit('\\')
        .next()
        .unwrap_or(&cleaned)
        .trim_matches(' ');

    if let Some(captures) = SPECIALS.captures(input_name).ok().flatten() {
        return ParsedName::TvShow {
            name: captures["name"].to_string(),
            season: 0,
            episode: group_u32(&captures, "episode").unwrap_or(1),
        };
    }

    if let Some(captures) = FORMATTED_STANDALONE.captures(input_name).ok().flatten() {
        return ParsedName::TvShow {
            name: captures["name"].to_string(),
            season: group_u32(&captures, "season").expect("season group is mandatory"),
            episode: group_u32(&captures, "episode").expect("episode group is mandatory"),
        };
    }

    if let Some(captures) = STRUCTURED_DIR.captures(&cleaned).ok().flatten() {
        return ParsedName::TvShow {
            name: captures["name"].to_string(),
            season: group_u32(&captures, "season").expect("season group is mandatory"),
            episode: group_u32(&captures, "episode").expect("episode group is mandatory"),
        };
    }

    if let Some(captures) = OTHER_STANDALONE.captures(input_name).ok().flatten() {
        return ParsedName::TvShow {
            name: captures["name"].to_string(),
            season: group_u32(&captures, "season").unwrap_or(1),
            episode: group_u32(&captures, "episode").expect("episode group is mandatory"),
        };
    }

    ParsedName::Movie {
        name: input_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_filename, ParsedName};

    fn tv(name: &str, season: u32, episode: u32) -> ParsedName {
        ParsedName::TvShow {
            name: name.to_string(),
            season,
            episode,
        }
    }

    fn movie(name: &str) -> ParsedName {
        ParsedName::Movie {
            name: name.to_string(),
        }
    }

    #[test]
    fn release_name_conversions() {
        let cases = [
            (
                r"C:\[SHiN-gx] Fight Ippatsu! Juuden-chan!! - Special 1 [720x480 AR h.264 FLAC][v2][FF09021F].mkv",
                tv("Fight Ippatsu! Juuden chan!!", 0, 1),
            ),
            (
                r"C:\[gleam] Kurenai OVA - 01 [OAD][0e73f000].mkv",
                tv("Kurenai", 0, 1),
            ),
            (
                r"C:\[Jarzka] Saki Picture Drama 1 [480p 10bit DVD FLAC] [BA3CE364].mkv",
                tv("Saki", 0, 1),
            ),
            (
                r"C:\[CoalGuys] K-ON!! S2 - 05 [4B19B10F].mkv",
                tv("K ON!!", 2, 5),
            ),
            (
                r"C:\[SubsPlease] RWBY - Hyousetsu Teikoku - 01 (1080p) [FA9C5B87].mkv",
                tv("RWBY Hyousetsu Teikoku", 1, 1),
            ),
            (
                r"C:\[SubsPlease] Tokyo Mew Mew New - 01 (1080p) [440C0CD7].mkv",
                tv("Tokyo Mew Mew New", 1, 1),
            ),
            (
                r"C:\[Erai-raws] Shin Tennis no Ouji-sama - U-17 World Cup - 01 [1080p][Multiple Subtitle][0341CBE1].mkv",
                tv("Shin Tennis no Ouji sama U 17 World Cup", 1, 1),
            ),
            (
                r"C:\[Judas] Kaguya-Sama Wa Kokurasetai - S03E07.mkv",
                tv("Kaguya Sama Wa Kokurasetai", 3, 7),
            ),
            (
                r"C:\[SubsPlease] Rikei ga Koi ni Ochita no de Shoumei shitemita - 08v2 (1080p) [77514EF3].mkv",
                tv("Rikei ga Koi ni Ochita no de Shoumei shitemita", 1, 8),
            ),
            (
                r"C:\[SubsPlease] Rikei ga Koi ni Ochita no de Shoumei shitemita S2 - 08v2 (1080p) [77514EF3].mkv",
                tv("Rikei ga Koi ni Ochita no de Shoumei shitemita", 2, 8),
            ),
            (
                r"C:\Kaguya-sama - Love is War - S00E01 - (S2O1 OVA).mkv",
                tv("Kaguya sama Love is War", 0, 1),
            ),
            (
                r"C:\Kaguya-sama - Love is War - S01E06.mkv",
                tv("Kaguya sama Love is War", 1, 6),
            ),
            (
                r"C:\Kaguya-sama wa Kokurasetai S03 1080p Dual Audio WEBRip AAC x265-EMBER\S03E01-Miko Iino Wants to Be Soothed Kaguya Doesn’t Realize Chika Fujiwara Wants to Battle [8933E8C9].mkv",
                tv("Kaguya sama wa Kokurasetai", 3, 1),
            ),
            (
                r"C:\Kaguya-sama wa Kokurasetai S2 - OVA - 1080p WEB H.264 -NanDesuKa (B-Global).mkv",
                tv("Kaguya sama wa Kokurasetai", 0, 1),
            ),
            (
                r"C:\Tensei shitara Ken Deshita - 01 - 2160p WEB H.264 -NanDesKa.mkv",
                tv("Tensei shitara Ken Deshita", 1, 1),
            ),
            (
                r"C:\Watashi no Shiawase na Kekkon - S01E01 - MULTi.mkv",
                tv("Watashi no Shiawase na Kekkon", 1, 1),
            ),
            (
                r"C:\Monogatari Series\15. Zoku Owarimonogatari\Zoku Owarimonogatari 01 - Koyomi Reverse, Part 1.mkv",
                tv("Zoku Owarimonogatari", 1, 1),
            ),
            (
                r"C:\SNAFU S01-S03+OVA 1080p Dual Audio BDRip 10 bits DD x265-EMBER\SNAFU S02+OVA 1080p Dual Audio BDRip 10 bits DD x265-EMBER\Series\S02E01-Nobody Knows Why They Came to the Service Club [7CE95AC0].mkv",
                tv("SNAFU", 2, 1),
            ),
            (
                r"C:\SNAFU S01-S03+OVA 1080p Dual Audio BDRip 10 bits DD x265-EMBER\SNAFU S02+OVA 1080p Dual Audio BDRip 10 bits DD x265-EMBER\OVA\S02E14 [OVA]-Undoubtedly, Girls Are Made of Sugar, Spice, and Everything Nice [7E9E8A1F].mkv",
                tv("SNAFU", 2, 14),
            ),
            (
                r"C:\Mushoku Tensei S01+SP 1080p Dual Audio BDRip 10 bits DDP x265-EMBER\Mushoku Tensei S01P01 1080p Dual Audio BDRip 10 bits DD x265-EMBER\S01E08-Turning Point 1 V2 [87C2150F].mkv",
                tv("Mushoku Tensei", 1, 8),
            ),
            (
                r"C:\Mushoku Tensei S02P01+SP 1080p Dual Audio BDRip 10 bits DD+ x265-EMBER\S02E01-The Brokenhearted Mage [AFBB9792].mkv",
                tv("Mushoku Tensei", 2, 1),
            ),
            (
                r"C:\A.Terrified.Teacher.at.Ghoul.School!.S01E01.Welcome.to.Hyakki.Academy!.1080p.CR.WEB-DL.JPN.AAC2.0.H.264.MSubs-ToonsHub.mkv",
                tv("A Terrified Teacher at Ghoul School!", 1, 1),
            ),
            (
                r"C:\Tohai.-.Ura.Rate.Mahjong.Tohai.Roku.S01E01.1080p.AMZN.WEB-DL.DDP2.0.H.264-Emmid\Tohai.-.Ura.Rate.Mahjong.Tohai.Roku.S01E01.1080p.AMZN.WEB-DL.DDP2.0.H.264-Emmid.mkv",
                tv("Tohai Ura Rate Mahjong Tohai Roku", 1, 1),
            ),
            (
                r"C:\Temp\Torrents\Elegy.for.the.Henchmen.Fist.of.the.North.Star.S01E01.1080p.AMZN.WEB-DL.JPN.DDP2.0.H.264.ESub-ToonsHub.mkv",
                tv("Elegy for the Henchmen Fist of the North Star", 1, 1),
            ),
        ];
        for (path, expected) in cases {
            assert_eq!(parse_filename(path), expected, "path: {path}");
        }
    }

    #[test]
    fn unrecognized_names_fall_back_to_movie() {
        let cases = [
            (r"C:\Akira [1988] (1080p BluRay).mkv", movie("Akira")),
            (
                r"C:\Movies\Tenki no Ko (Weathering With You).mkv",
                movie("Tenki no Ko"),
            ),
        ];
        for (path, expected) in cases {
            assert_eq!(parse_filename(path), expected, "path: {path}");
        }
    }

    #[test]
    fn seasons_stay_in_range() {
        for (path, expected_season) in [
            (r"C:\Show S99E01.mkv", 99),
            (r"C:\Show Season 12 - 04.mkv", 12),
        ] {
            match parse_filename(path) {
                ParsedName::TvShow {
                    season, episode, ..
                } => {
                    assert_eq!(season, expected_season);
                    assert!(episode >= 1);
                }
                other => panic!("expected a show, got {other:?}"),
            }
        }
    }
}
