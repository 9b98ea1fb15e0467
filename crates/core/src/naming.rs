use std::fs;
use std::path::Path;

use regex::RegexBuilder;

/// 掃描資料夾內 `<prefix><數字>.<副檔名>` 的檔案並回傳下一個可用編號。 / Returns the next free number for `<prefix><digits>.<ext>` files in `folder`.
///
/// Only immediate files are inspected. A missing or empty folder yields `1`.
/// Two callers racing on the same folder can observe the same number; the
/// store resolves that with an exclusive create and a retry.
pub fn next_number(folder: &Path, prefix: &str) -> u64 {
    let pattern = format!(r"^{}(\d+)\..*$", regex::escape(prefix));
    let matcher = match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(matcher) => matcher,
        Err(_) => return 1,
    };

    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(_) => return 1,
    };

    let highest = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|ty| ty.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            let captures = matcher.captures(name)?;
            captures.get(1)?.as_str().parse::<u64>().ok()
        })
        .max()
        .unwrap_or(0);

    highest.saturating_add(1)
}

/// 組出 `<prefix><n><ext>`。 / Builds `<prefix><n><ext>`; `ext` may omit its leading dot.
pub fn numbered_name(prefix: &str, number: u64, extension: &str) -> String {
    format!("{prefix}{number}{}", normalize_extension(extension))
}

/// 拆出碰撞時使用的前綴與副檔名。 / Splits a file name into its collision prefix and extension.
///
/// `scratch12.txt` gives `("scratch", ".txt")`; a stem without trailing
/// digits is used whole, so `notes.md` gives `("notes", ".md")`.
pub fn collision_prefix(file_name: &str) -> (String, String) {
    let (stem, extension) = match file_name.rfind('.') {
        Some(0) | None => (file_name, ""),
        Some(index) => file_name.split_at(index),
    };
    let trimmed = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let prefix = if trimmed.is_empty() { stem } else { trimmed };
    (prefix.to_string(), extension.to_string())
}

/// 補上開頭的點；空字串表示沒有副檔名。 / Ensures a leading dot; an empty string means "no extension".
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_or_empty_folder_starts_at_one() {
        let dir = tempdir().unwrap();
        assert_eq!(next_number(&dir.path().join("absent"), "scratch"), 1);
        assert_eq!(next_number(dir.path(), "scratch"), 1);
    }

    #[test]
    fn next_number_exceeds_every_existing_suffix() {
        let dir = tempdir().unwrap();
        for name in ["scratch1.txt", "scratch7.md", "Scratch3.txt", "scratch.txt", "other9.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(next_number(dir.path(), "scratch"), 8);
        assert_eq!(next_number(dir.path(), "other"), 10);
    }

    #[test]
    fn folders_and_extensionless_names_are_ignored() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("scratch40.d")).unwrap();
        fs::write(dir.path().join("scratch20"), "").unwrap();
        fs::write(dir.path().join("scratch2.txt"), "").unwrap();
        assert_eq!(next_number(dir.path(), "scratch"), 3);
    }

    #[test]
    fn prefix_is_matched_literally() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a+b5.txt"), "").unwrap();
        fs::write(dir.path().join("aab9.txt"), "").unwrap();
        assert_eq!(next_number(dir.path(), "a+b"), 6);
    }

    #[test]
    fn oversized_suffixes_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("scratch99999999999999999999999.txt"), "").unwrap();
        fs::write(dir.path().join("scratch4.txt"), "").unwrap();
        assert_eq!(next_number(dir.path(), "scratch"), 5);
    }

    #[test]
    fn collision_prefix_strips_trailing_digits() {
        assert_eq!(
            collision_prefix("scratch12.txt"),
            ("scratch".to_string(), ".txt".to_string())
        );
        assert_eq!(
            collision_prefix("notes.md"),
            ("notes".to_string(), ".md".to_string())
        );
        assert_eq!(collision_prefix("2024"), ("2024".to_string(), String::new()));
        assert_eq!(collision_prefix(".env"), (".env".to_string(), String::new()));
    }

    #[test]
    fn numbered_name_normalizes_extension() {
        assert_eq!(numbered_name("scratch", 3, "txt"), "scratch3.txt");
        assert_eq!(numbered_name("scratch", 3, ".md"), "scratch3.md");
        assert_eq!(numbered_name("scratch", 3, ""), "scratch3");
    }
}
