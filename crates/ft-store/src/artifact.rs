//! Comment-tolerant string-list artifacts.
//!
//! Both the persisted tuning arguments and the tracked-clock declaration are
//! stored as a single JSON array of strings. Lines whose first non-blank
//! character is `#` are comments and never reach the JSON parser. Nothing but
//! an array of strings is accepted.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use ft_types::{config_error, FtResult, StoreError};

/// Default file name of the persisted tuning arguments.
pub const ARGS_FILE_NAME: &str = "NextpnrArgs.json";

/// Default file name of the tracked-clock declaration.
pub const CLOCKS_FILE_NAME: &str = "Clocks.json";

/// Split raw artifact text into its string list, ignoring comment lines.
pub fn parse_string_list(text: &str, path: &Path) -> Result<Vec<String>, StoreError> {
    let body: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect();
    let body = body.join("\n");

    if body.trim().is_empty() {
        return Err(StoreError::Schema {
            path: path.display().to_string(),
            message: "no JSON array of strings present".to_string(),
        });
    }

    serde_json::from_str::<Vec<String>>(&body).map_err(|e| StoreError::Schema {
        path: path.display().to_string(),
        message: format!("expected a JSON array of strings: {e}"),
    })
}

/// Render a string list preceded by `comments`, one `# ` line each.
pub fn render_string_list(items: &[String], comments: &[String]) -> String {
    let mut text = String::new();
    for comment in comments {
        for line in comment.lines() {
            if line.is_empty() {
                text.push_str("#\n");
            } else {
                text.push_str("# ");
                text.push_str(line);
                text.push('\n');
            }
        }
        if comment.is_empty() {
            text.push_str("#\n");
        }
    }
    // Serializing a Vec<String> cannot fail.
    let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
    text.push_str(&json);
    text.push('\n');
    text
}

fn read_text(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

/// Write through a uniquely named sibling file and rename it over `path`, so
/// readers never observe a partial artifact.
fn write_atomically(path: &Path, text: &str) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    };

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(io_err)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(text.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Location of the persisted winning tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    args_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(args_path: impl Into<PathBuf>) -> Self {
        Self {
            args_path: args_path.into(),
        }
    }

    /// Store under `root` with the default file name.
    pub fn in_dir(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(ARGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.args_path
    }

    /// Persist `args` verbatim, preceded by a commented `report`.
    pub fn save_args(&self, args: &[String], report: &[String]) -> FtResult<()> {
        write_atomically(&self.args_path, &render_string_list(args, report))?;
        info!(path = %self.args_path.display(), args = args.len(), "saved tuning arguments");
        Ok(())
    }

    /// The persisted arguments in their stored order, or `None` if nothing
    /// has been saved yet.
    pub fn load_args(&self) -> FtResult<Option<Vec<String>>> {
        let Some(text) = read_text(&self.args_path)? else {
            debug!(path = %self.args_path.display(), "no persisted tuning arguments");
            return Ok(None);
        };
        let args = parse_string_list(&text, &self.args_path)?;
        debug!(path = %self.args_path.display(), ?args, "loaded tuning arguments");
        Ok(Some(args))
    }
}

/// Read the tracked-clock declaration required by optimization.
///
/// A missing file, an empty list, or blank/repeated names are configuration
/// errors.
pub fn load_clock_declarations(path: &Path) -> FtResult<Vec<String>> {
    let text = read_text(path)?.ok_or_else(|| {
        config_error!(
            "optimization needs tracked clocks, but {} does not exist",
            path.display()
        )
    })?;

    let clocks = parse_string_list(&text, path)?;
    if clocks.is_empty() {
        return Err(config_error!(
            "{} declares no tracked clocks",
            path.display()
        ));
    }
    for (i, clock) in clocks.iter().enumerate() {
        if clock.trim().is_empty() {
            return Err(config_error!(
                "{} declares a blank clock name",
                path.display()
            ));
        }
        if clocks[..i].contains(clock) {
            return Err(config_error!(
                "{} declares clock '{clock}' twice",
                path.display()
            ));
        }
    }
    Ok(clocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_types::{FtError, SearchSpace};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn save_then_load_preserves_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::in_dir(dir.path());
        let args = strings(&[
            "--placer-heap-alpha",
            "0.05",
            "--placer-heap-beta",
            "0.8",
            "--placer-heap-critexp",
            "6",
            "--placer-heap-timingweight",
            "19",
        ]);
        let report = strings(&["Clk  Freq", "# looks like a comment", "[\"--not\", \"an arg\"]"]);

        store.save_args(&args, &report).unwrap();
        assert_eq!(store.load_args().unwrap(), Some(args));
    }

    #[test]
    fn every_grid_tuning_survives_a_save_with_hostile_comments() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::in_dir(dir.path());
        let space = SearchSpace::default();
        let report = strings(&[
            "[\"--placer-heap-alpha\", \"9\"]",
            "# [\"--seed\"]",
            "",
            "]",
            "  # indented",
            "{\"not\": \"json\"}\n[\"two\", \"lines\"]",
        ]);

        for index in (0..space.len()).step_by(97) {
            let args = space.point_at_index(index).and_then(|p| space.at(p)).unwrap().to_args();
            store.save_args(&args, &report).unwrap();
            assert_eq!(store.load_args().unwrap(), Some(args), "grid index {index}");
        }
    }

    #[test]
    fn repeated_saves_leave_only_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::in_dir(dir.path());
        for i in 0..5 {
            store.save_args(&strings(&["--seed", &i.to_string()]), &strings(&["run"])).unwrap();
        }

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(ARGS_FILE_NAME)]);
        assert_eq!(store.load_args().unwrap(), Some(strings(&["--seed", "4"])));
    }

    #[test]
    fn missing_args_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested").join("args.json"));
        assert_eq!(store.load_args().unwrap(), None);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("a").join("b").join("args.json"));
        store.save_args(&strings(&["--x"]), &[]).unwrap();
        assert_eq!(store.load_args().unwrap(), Some(strings(&["--x"])));
    }

    #[test]
    fn anything_but_a_string_array_is_rejected() {
        let path = Path::new("args.json");
        for text in [
            "{\"alpha\": 0.1}",
            "[\"--seed\", 5]",
            "__import__('os').system('true')",
            "# only a comment\n",
            "",
            "[\"a\"] [\"b\"]",
        ] {
            assert!(
                matches!(parse_string_list(text, path), Err(StoreError::Schema { .. })),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn comments_may_be_indented() {
        let text = "   # report\n\t# more\n[\n  \"--a\",\n  \"1\"\n]\n";
        assert_eq!(
            parse_string_list(text, Path::new("x")).unwrap(),
            strings(&["--a", "1"])
        );
    }

    #[test]
    fn clock_declarations_must_be_present_and_nonempty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CLOCKS_FILE_NAME);

        assert!(matches!(load_clock_declarations(&path), Err(FtError::Config(_))));

        fs::write(&path, "[]").unwrap();
        assert!(matches!(load_clock_declarations(&path), Err(FtError::Config(_))));

        fs::write(&path, "[\"clk\", \"clk\"]").unwrap();
        assert!(matches!(load_clock_declarations(&path), Err(FtError::Config(_))));

        fs::write(&path, "# tracked clocks\n[\"clk$glb_clk\", \"pix_dclk$SB_IO_IN_$glb_clk\"]").unwrap();
        assert_eq!(
            load_clock_declarations(&path).unwrap(),
            strings(&["clk$glb_clk", "pix_dclk$SB_IO_IN_$glb_clk"])
        );
    }

    #[test]
    fn malformed_clock_declaration_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CLOCKS_FILE_NAME);
        fs::write(&path, "['clk']").unwrap();
        assert!(matches!(
            load_clock_declarations(&path),
            Err(FtError::Store(StoreError::Schema { .. }))
        ));
    }
}
