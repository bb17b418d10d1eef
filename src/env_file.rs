use std::io::Write;
use std::path::Path;

use eyre::Context;
use tracing::{info, instrument};

/// Applies `updates` to the `KEY=value` lines of `content`.
///
/// An existing key is rewritten where it stands and any later duplicates of
/// it are dropped, new keys are appended. Every other line keeps its place and
/// its line ending, appended lines follow the file's newline style.
pub fn apply_updates<K, V>(content: &str, updates: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };

    let mut lines: Vec<String> =
        content.split_inclusive('\n').map(str::to_string).collect();

    if let Some(last) = lines.last_mut() {
        if !last.ends_with('\n') {
            last.push_str(newline);
        }
    }

    for (key, value) in updates {
        let prefix = format!("{}=", key.as_ref());

        match lines.iter().position(|line| line.starts_with(&prefix)) {
            Some(idx) => {
                let ending = line_ending(&lines[idx]).to_string();
                lines[idx] = format!("{}{}{}", prefix, value.as_ref(), ending);

                let mut seen = 0;
                lines.retain(|line| {
                    if !line.starts_with(&prefix) {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => {
                lines.push(format!("{}{}{}", prefix, value.as_ref(), newline))
            }
        }
    }

    lines.concat()
}

fn line_ending(line: &str) -> &str {
    let body = line.trim_end_matches(|c: char| c == '\r' || c == '\n');

    &line[body.len()..]
}

/// Rewrites the env file at `path` with `updates` applied.
///
/// The new content goes to a temporary file next to the target which is then
/// renamed over it, a crash mid-write leaves the old file intact.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn update<K, V>(path: impl AsRef<Path>, updates: &[(K, V)]) -> eyre::Result<()>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let path = path.as_ref();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Reading from {}", path.display()))
        }
    };

    for (key, _) in updates {
        info!("Updating {} in {}", key.as_ref(), path.display());
    }

    let content = apply_updates(&content, updates);

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Creating temporary file in {}", dir.display()))?;

    file.write_all(content.as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .with_context(|| format!("Writing to {}", file.path().display()))?;

    file.persist(path)
        .with_context(|| format!("Replacing {}", path.display()))?;

    Ok(())
}
