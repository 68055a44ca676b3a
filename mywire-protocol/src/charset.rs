//! Charset / collation name to numeric id lookup.
//!
//! Names are matched case-insensitively. A bare charset name (`UTF8MB4`,
//! `LATIN1`) resolves to that charset's default collation.

/// Collation names and their ids.
pub const COLLATIONS: &[(&str, u8)] = &[
    ("BIG5_CHINESE_CI", 1),
    ("LATIN2_CZECH_CS", 2),
    ("DEC8_SWEDISH_CI", 3),
    ("CP850_GENERAL_CI", 4),
    ("LATIN1_GERMAN1_CI", 5),
    ("HP8_ENGLISH_CI", 6),
    ("KOI8R_GENERAL_CI", 7),
    ("LATIN1_SWEDISH_CI", 8),
    ("LATIN2_GENERAL_CI", 9),
    ("SWE7_SWEDISH_CI", 10),
    ("ASCII_GENERAL_CI", 11),
    ("UJIS_JAPANESE_CI", 12),
    ("SJIS_JAPANESE_CI", 13),
    ("CP1251_BULGARIAN_CI", 14),
    ("LATIN1_DANISH_CI", 15),
    ("HEBREW_GENERAL_CI", 16),
    ("TIS620_THAI_CI", 18),
    ("EUCKR_KOREAN_CI", 19),
    ("LATIN7_ESTONIAN_CS", 20),
    ("LATIN2_HUNGARIAN_CI", 21),
    ("KOI8U_GENERAL_CI", 22),
    ("CP1251_UKRAINIAN_CI", 23),
    ("GB2312_CHINESE_CI", 24),
    ("GREEK_GENERAL_CI", 25),
    ("CP1250_GENERAL_CI", 26),
    ("LATIN2_CROATIAN_CI", 27),
    ("GBK_CHINESE_CI", 28),
    ("CP1257_LITHUANIAN_CI", 29),
    ("LATIN5_TURKISH_CI", 30),
    ("LATIN1_GERMAN2_CI", 31),
    ("ARMSCII8_GENERAL_CI", 32),
    ("UTF8_GENERAL_CI", 33),
    ("CP1250_CZECH_CS", 34),
    ("UCS2_GENERAL_CI", 35),
    ("CP866_GENERAL_CI", 36),
    ("KEYBCS2_GENERAL_CI", 37),
    ("MACCE_GENERAL_CI", 38),
    ("MACROMAN_GENERAL_CI", 39),
    ("CP852_GENERAL_CI", 40),
    ("LATIN7_GENERAL_CI", 41),
    ("LATIN7_GENERAL_CS", 42),
    ("MACCE_BIN", 43),
    ("CP1250_CROATIAN_CI", 44),
    ("UTF8MB4_GENERAL_CI", 45),
    ("UTF8MB4_BIN", 46),
    ("LATIN1_BIN", 47),
    ("LATIN1_GENERAL_CI", 48),
    ("LATIN1_GENERAL_CS", 49),
    ("CP1251_BIN", 50),
    ("CP1251_GENERAL_CI", 51),
    ("CP1251_GENERAL_CS", 52),
    ("MACROMAN_BIN", 53),
    ("UTF16_GENERAL_CI", 54),
    ("UTF16_BIN", 55),
    ("UTF16LE_GENERAL_CI", 56),
    ("CP1256_GENERAL_CI", 57),
    ("CP1257_BIN", 58),
    ("CP1257_GENERAL_CI", 59),
    ("UTF32_GENERAL_CI", 60),
    ("UTF32_BIN", 61),
    ("UTF16LE_BIN", 62),
    ("BINARY", 63),
    ("ARMSCII8_BIN", 64),
    ("ASCII_BIN", 65),
    ("CP1250_BIN", 66),
    ("CP1256_BIN", 67),
    ("CP866_BIN", 68),
    ("DEC8_BIN", 69),
    ("GREEK_BIN", 70),
    ("HEBREW_BIN", 71),
    ("HP8_BIN", 72),
    ("KEYBCS2_BIN", 73),
    ("KOI8R_BIN", 74),
    ("KOI8U_BIN", 75),
    ("LATIN2_BIN", 77),
    ("LATIN5_BIN", 78),
    ("LATIN7_BIN", 79),
    ("CP850_BIN", 80),
    ("CP852_BIN", 81),
    ("SWE7_BIN", 82),
    ("UTF8_BIN", 83),
    ("BIG5_BIN", 84),
    ("EUCKR_BIN", 85),
    ("GB2312_BIN", 86),
    ("GBK_BIN", 87),
    ("SJIS_BIN", 88),
    ("TIS620_BIN", 89),
    ("UCS2_BIN", 90),
    ("UJIS_BIN", 91),
    ("GEOSTD8_GENERAL_CI", 92),
    ("GEOSTD8_BIN", 93),
    ("LATIN1_SPANISH_CI", 94),
    ("CP932_JAPANESE_CI", 95),
    ("CP932_BIN", 96),
    ("EUCJPMS_JAPANESE_CI", 97),
    ("EUCJPMS_BIN", 98),
    ("CP1250_POLISH_CI", 99),
    ("UTF8_UNICODE_CI", 192),
    ("UTF8MB4_UNICODE_CI", 224),
    ("UTF8MB4_0900_AI_CI", 255),
];

/// Bare charset names and the id of their default collation.
pub const CHARSET_DEFAULTS: &[(&str, u8)] = &[
    ("BIG5", 1),
    ("DEC8", 3),
    ("CP850", 4),
    ("HP8", 6),
    ("KOI8R", 7),
    ("LATIN1", 8),
    ("LATIN2", 9),
    ("SWE7", 10),
    ("ASCII", 11),
    ("UJIS", 12),
    ("SJIS", 13),
    ("HEBREW", 16),
    ("TIS620", 18),
    ("EUCKR", 19),
    ("KOI8U", 22),
    ("GB2312", 24),
    ("GREEK", 25),
    ("CP1250", 26),
    ("GBK", 28),
    ("LATIN5", 30),
    ("ARMSCII8", 32),
    ("UTF8", 33),
    ("UCS2", 35),
    ("CP866", 36),
    ("KEYBCS2", 37),
    ("MACCE", 38),
    ("MACROMAN", 39),
    ("CP852", 40),
    ("LATIN7", 41),
    ("UTF8MB4", 45),
    ("CP1251", 51),
    ("UTF16", 54),
    ("UTF16LE", 56),
    ("CP1256", 57),
    ("CP1257", 59),
    ("UTF32", 60),
    ("GEOSTD8", 92),
    ("CP932", 95),
    ("EUCJPMS", 97),
];

/// Id of the charset used when none is configured.
pub const DEFAULT_CHARSET: u8 = 33;

/// Resolves a collation or charset name to its numeric id.
pub fn lookup(name: &str) -> Option<u8> {
    COLLATIONS
        .iter()
        .chain(CHARSET_DEFAULTS.iter())
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
}

/// Returns the collation name for an id.
pub fn name_of(id: u8) -> Option<&'static str> {
    COLLATIONS
        .iter()
        .find(|(_, candidate)| *candidate == id)
        .map(|(name, _)| *name)
}
