// Copyright (c) 2025-present, catdice
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Wikipedia language subdomain codes with published dumps.
pub const WIKIPEDIA_LANGUAGE_CODES: &[&str] = &[
    "en", "fr", "de", "es", "ja", "ru", "pt", "zh", "it", "fa", "pl", "ar", "nl", "uk", "he",
    "id", "tr", "cs", "sv", "ko", "vi", "fi", "hu", "ca", "simple", "th", "no", "hi", "bn", "el",
    "ro", "sr", "da", "bg", "eu", "az", "ms", "uz", "et", "sk", "hr", "hy", "sl", "lt", "kk",
    "eo", "lv", "ta", "ur", "ml", "ka", "be", "gl", "sq", "mk", "arz", "sh", "ha", "ceb", "af",
    "ckb", "te", "tl", "bs", "la", "mr", "ky", "is", "mn", "my", "kn", "sw", "nn", "ast",
    "be-tarask", "azb", "pa", "cy", "as", "ne", "yo", "ku", "oc", "ga", "jv", "lb", "sa", "br",
    "tt", "si", "sco", "tg", "als", "fy", "war", "min", "ba", "so", "km", "or", "ig", "pnb",
    "gu", "rw", "ce", "su", "an", "io", "cv", "zh-classical", "bar", "bcl", "lmo", "ht", "mg",
    "yi", "fo", "am", "ia", "ps", "scn", "tk", "wuu", "ban", "qu", "co", "ary", "mai", "sat",
    "zu", "nds", "pms", "kaa", "ace", "lo", "mt", "bh", "bjn", "dag", "mzn", "vec", "szl", "li",
    "vls", "sd", "vo", "om", "sc", "bo", "hyw", "cr", "ang", "tw", "sah", "ab", "gn", "hif",
    "ie", "diq", "mad", "frr", "crh", "lfn", "xmf", "nap", "ext", "ay", "cdo", "frp", "rue",
    "wa", "nds-nl", "tly", "gd", "tcy", "map-bms", "ff", "gor", "iu", "mwl", "mi", "hsb", "ug",
    "guc", "lad", "lij", "se", "pcd", "av", "kw", "dz", "eml", "ilo", "ti", "chr", "ee", "glk",
    "dv", "mhr", "cu", "tay", "kbd", "avk", "roa-tara", "ks", "os", "bat-smg", "atj", "bpy",
    "bug", "gan", "hak", "pam", "gv", "roa-rup", "bxr", "myv", "krc", "kv", "ln", "mni", "new",
    "pap", "pdc", "rm", "sn", "vep", "mrj", "smn", "dsb", "pih", "skr", "st", "tpi", "udm",
    "zea", "bm", "lld", "ksh", "kl", "inh", "kbp", "kab", "csb", "rn", "fiu-vro", "wo", "arc",
    "haw", "ki", "kg", "shi", "tn", "tyv", "fur", "gur", "xal", "nah", "nv", "shn", "za", "ny",
    "got", "koi", "olo", "mnw", "nia", "tum", "ch", "cbk-zam", "gag", "ltg", "jbo", "pcm",
    "nrm", "pag", "szy", "kcg", "xh", "ami", "fat", "fon", "lg", "nov", "blk", "rmy", "alt",
    "tet", "anp", "awa", "bi", "dty", "gpe", "lez", "mdf", "nqo", "sm", "ty", "gom", "ady",
    "fj", "jam", "pnt", "stq", "srn", "pfl", "din", "ik", "lbe", "nso", "pwn", "ss", "to", "ts",
    "ve", "chy", "pi", "sg", "guw", "trv", "gcr", "zh-yue", "zh-min-nan",
];

/// Whether `language` is a known Wikipedia language code.
#[must_use]
pub fn is_valid_language(language: &str) -> bool {
    WIKIPEDIA_LANGUAGE_CODES.contains(&language)
}

#[cfg(test)]
mod tests {
    use super::is_valid_language;

    #[test]
    fn known_codes_validate() {
        assert!(is_valid_language("en"));
        assert!(is_valid_language("simple"));
        assert!(is_valid_language("zh-min-nan"));
        assert!(is_valid_language("be-tarask"));
    }

    #[test]
    fn unknown_codes_fail() {
        assert!(!is_valid_language(""));
        assert!(!is_valid_language("english"));
        assert!(!is_valid_language("EN"));
        assert!(!is_valid_language("xx"));
    }
}
